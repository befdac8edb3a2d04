//! Error types for the Glimpse question answering pipeline.
//!
//! Errors are organized by stage so the HTTP layer can map each failure to a
//! status code without inspecting message text.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Glimpse operations.
#[derive(Error, Debug)]
pub enum GlimpseError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Request pipeline errors
    #[error("Ask error: {0}")]
    Ask(#[from] AskError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Client input errors. These are the only failures whose message is
/// returned to the caller verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// The declared filename carries an extension outside the allow-list
    #[error("Invalid file type '{extension}'. Allowed types: {allowed}")]
    UnsupportedExtension { extension: String, allowed: String },

    /// Upload exceeds the configured size limit
    #[error("File too large ({size_bytes} bytes). Maximum size is {max_mb}MB")]
    FileTooLarge { size_bytes: u64, max_mb: u64 },

    /// Question is empty or whitespace-only
    #[error("Question cannot be empty")]
    EmptyQuestion,

    /// A required form field was not supplied
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// The request body could not be parsed
    #[error("Malformed request: {0}")]
    Malformed(String),
}

/// Captioning adapter failures.
#[derive(Error, Debug, Clone)]
pub enum CaptionError {
    /// Model files could not be loaded (cached until restart)
    #[error("Failed to load captioning model: {message}")]
    ModelLoad { message: String },

    /// Model download from the hub failed
    #[error("Failed to download {url}: {message}")]
    Download { url: String, message: String },

    /// The image path handed to the captioner does not exist
    #[error("Image file not found: {0}")]
    ImageNotFound(PathBuf),

    /// The image could not be decoded
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// ONNX inference or token decoding failed
    #[error("Caption inference failed: {message}")]
    Inference { message: String },

    /// The model produced no text
    #[error("Model generated an empty caption")]
    Empty,
}

/// QA adapter failures.
#[derive(Error, Debug, Clone)]
pub enum QaError {
    /// No API credential is configured (or it failed startup verification)
    #[error("OpenAI API key not configured. Please set OPENAI_API_KEY environment variable.")]
    NotConfigured,

    /// Transport, HTTP status, or response parsing failure
    #[error("Chat completion request failed: {message}")]
    Request {
        message: String,
        status_code: Option<u16>,
    },

    /// The API answered with no content
    #[error("Chat completion returned no content")]
    EmptyResponse,
}

/// Failures of a single ask request, one variant per orchestrator stage.
#[derive(Error, Debug)]
pub enum AskError {
    #[error(transparent)]
    Input(#[from] InputError),

    /// Writing the temporary image failed
    #[error("Failed to store upload: {0}")]
    Storage(#[from] std::io::Error),

    #[error(transparent)]
    Caption(#[from] CaptionError),

    #[error(transparent)]
    Answer(#[from] QaError),
}

/// Convenience type alias for Glimpse results.
pub type Result<T> = std::result::Result<T, GlimpseError>;
