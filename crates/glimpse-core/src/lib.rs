//! Glimpse Core - embeddable image question answering library.
//!
//! Glimpse takes an uploaded image and a natural-language question, captions
//! the image with a local BLIP model, then asks a chat completion model to
//! answer the question from that caption.
//!
//! # Architecture
//!
//! ```text
//! Upload → Validate → Temp File → Caption (BLIP) → Answer (OpenAI) → JSON
//! ```
//!
//! Each request is independent. The temp file lives exactly as long as the
//! request and the model handles are shared process-wide.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::path::Path;
//!
//! use glimpse_core::{AskService, Config};
//!
//! #[tokio::main]
//! async fn main() -> glimpse_core::Result<()> {
//!     let config = Config::load()?;
//!     let service = AskService::from_config(&config).await;
//!
//!     let outcome = service
//!         .ask_file(Path::new("./ball.jpg"), "What color is the object?")
//!         .await?;
//!     println!("{}: {}", outcome.caption, outcome.answer);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod captioning;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod types;

// Re-exports for convenient access
pub use captioning::{BlipCaptioner, Captioner};
pub use config::Config;
pub use error::{
    AskError, CaptionError, ConfigError, GlimpseError, InputError, QaError, Result,
};
pub use llm::{Answerer, OpenAiAnswerer};
pub use pipeline::{AskService, TempImage, TempStore, Validator};
pub use types::{AskOutcome, Upload};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
