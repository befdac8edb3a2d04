//! Sub-configuration structs and their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where models are stored
    pub model_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("~/.glimpse/models"),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Upload validation and temp storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum upload size in megabytes (1 to 1024)
    pub max_file_size_mb: u64,

    /// Accepted file extensions (lowercase, without the dot)
    pub allowed_extensions: Vec<String>,

    /// Where uploads are written while being captioned.
    /// Defaults to `<os temp>/glimpse`.
    pub temp_dir: Option<PathBuf>,
}

impl UploadConfig {
    /// Upload limit in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 10,
            allowed_extensions: ["jpg", "jpeg", "png", "gif", "bmp", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            temp_dir: None,
        }
    }
}

/// Compute device for captioning inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// CUDA when compiled in, otherwise CPU
    #[default]
    Auto,
    Cpu,
    Cuda,
}

/// Captioning model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptioningConfig {
    /// Local model name (subdirectory of `general.model_dir`)
    pub model: String,

    /// Hugging Face repository the ONNX export is fetched from
    pub repo: String,

    /// Vision encoder path inside the repository
    pub vision_model_file: String,

    /// Text decoder path inside the repository
    pub decoder_model_file: String,

    /// Tokenizer path inside the repository
    pub tokenizer_file: String,

    /// Download missing model files on first use
    pub auto_download: bool,

    /// Load the model at server startup instead of on the first request
    pub warm_up: bool,

    /// Square input resolution of the vision encoder
    pub image_size: u32,

    /// Maximum generated sequence length, BOS included
    pub max_length: usize,

    /// Beam search width
    pub num_beams: usize,

    /// Decoder start token (`[DEC]`)
    pub bos_token_id: i64,

    /// End of sequence token (`[SEP]`)
    pub eos_token_id: i64,

    /// Padding token
    pub pad_token_id: i64,

    /// Inference device
    pub device: Device,
}

impl Default for CaptioningConfig {
    fn default() -> Self {
        Self {
            model: "blip-image-captioning-large".to_string(),
            repo: "Xenova/blip-image-captioning-large".to_string(),
            vision_model_file: "onnx/vision_model.onnx".to_string(),
            decoder_model_file: "onnx/text_decoder_model.onnx".to_string(),
            tokenizer_file: "tokenizer.json".to_string(),
            auto_download: true,
            warm_up: false,
            image_size: 384,
            max_length: 50,
            num_beams: 5,
            bos_token_id: 30522,
            eos_token_id: 102,
            pad_token_id: 0,
            device: Device::Auto,
        }
    }
}

/// Chat completion settings for answering questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    /// OpenAI-compatible API base URL
    pub base_url: String,

    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Model name
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Optional per-request timeout; unset means wait indefinitely
    pub timeout_ms: Option<u64>,

    /// List models once at startup and drop the key if the call fails
    pub verify_on_startup: bool,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: "${OPENAI_API_KEY}".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            timeout_ms: None,
            verify_on_startup: true,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
