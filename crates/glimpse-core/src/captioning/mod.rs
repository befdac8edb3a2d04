//! BLIP image captioning.
//!
//! This module turns an image on disk into a short natural-language caption
//! using a BLIP vision encoder and text decoder running locally via ONNX
//! Runtime.
//!
//! # Usage
//!
//! ```rust,ignore
//! use glimpse_core::captioning::{BlipCaptioner, Captioner};
//! use glimpse_core::Config;
//!
//! let config = Config::default();
//! let captioner = BlipCaptioner::new(config.captioning.clone(), config.captioning_model_dir());
//! let caption = captioner.caption(Path::new("./dog.jpg")).await?;
//! ```

pub(crate) mod beam;
pub(crate) mod blip;
pub mod download;
pub(crate) mod preprocess;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::config::CaptioningConfig;
use crate::error::CaptionError;

pub use self::beam::{beam_search, BeamConfig};
pub use self::blip::{resolve_device, BlipModel};
pub use self::preprocess::preprocess;

/// Local filename of the vision encoder.
pub const VISION_MODEL_FILENAME: &str = "vision_model.onnx";

/// Local filename of the text decoder.
pub const DECODER_MODEL_FILENAME: &str = "text_decoder_model.onnx";

/// Local filename of the tokenizer.
pub const TOKENIZER_FILENAME: &str = "tokenizer.json";

/// Produces a caption for an image file.
///
/// Uses `async_trait` because the orchestrator holds adapters as
/// `Arc<dyn Captioner>`.
#[async_trait]
pub trait Captioner: Send + Sync {
    /// Caption the image at `image_path`. An empty caption is an error.
    async fn caption(&self, image_path: &Path) -> Result<String, CaptionError>;
}

/// Captioner backed by a lazily loaded, process-wide BLIP model.
pub struct BlipCaptioner {
    config: CaptioningConfig,
    model_dir: PathBuf,
    client: reqwest::Client,
    /// Initialised at most once. A failed load is cached as well, so the
    /// captioner stays unavailable until the process restarts.
    model: OnceCell<Result<Arc<BlipModel>, CaptionError>>,
}

impl BlipCaptioner {
    pub fn new(config: CaptioningConfig, model_dir: PathBuf) -> Self {
        Self {
            config,
            model_dir,
            client: reqwest::Client::new(),
            model: OnceCell::new(),
        }
    }

    /// Load the model now instead of on the first request.
    pub async fn warm_up(&self) -> Result<(), CaptionError> {
        self.model().await.map(|_| ())
    }

    async fn model(&self) -> Result<Arc<BlipModel>, CaptionError> {
        self.model.get_or_init(|| self.load()).await.clone()
    }

    async fn load(&self) -> Result<Arc<BlipModel>, CaptionError> {
        let result = self.load_inner().await;
        if let Err(e) = &result {
            tracing::error!("Error loading BLIP model: {e}");
        }
        result
    }

    async fn load_inner(&self) -> Result<Arc<BlipModel>, CaptionError> {
        if self.config.auto_download
            && !download::missing_files(&self.config, &self.model_dir).is_empty()
        {
            download::download_model(&self.client, &self.config, &self.model_dir).await?;
        }

        let model_dir = self.model_dir.clone();
        let config = self.config.clone();
        let model = tokio::task::spawn_blocking(move || BlipModel::load(&model_dir, &config))
            .await
            .map_err(|e| CaptionError::ModelLoad {
                message: format!("Model load task failed: {e}"),
            })??;

        Ok(Arc::new(model))
    }
}

#[async_trait]
impl Captioner for BlipCaptioner {
    async fn caption(&self, image_path: &Path) -> Result<String, CaptionError> {
        let model = self.model().await?;

        if !image_path.exists() {
            return Err(CaptionError::ImageNotFound(image_path.to_path_buf()));
        }

        let start = std::time::Instant::now();
        let path = image_path.to_path_buf();
        let caption = tokio::task::spawn_blocking(move || model.caption(&path))
            .await
            .map_err(|e| CaptionError::Inference {
                message: format!("Caption task failed: {e}"),
            })??;

        tracing::debug!("Captioned {:?} in {:?}: {:?}", image_path, start.elapsed(), caption);

        if caption.trim().is_empty() {
            return Err(CaptionError::Empty);
        }
        Ok(caption)
    }
}
