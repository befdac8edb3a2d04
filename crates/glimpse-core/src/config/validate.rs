//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

/// Largest accepted `upload.max_file_size_mb`.
pub(crate) const MAX_UPLOAD_MB: u64 = 1024;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.upload.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "upload.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.upload.max_file_size_mb > MAX_UPLOAD_MB {
            return Err(ConfigError::ValidationError(format!(
                "upload.max_file_size_mb must be <= {MAX_UPLOAD_MB}"
            )));
        }
        if self.upload.allowed_extensions.is_empty() {
            return Err(ConfigError::ValidationError(
                "upload.allowed_extensions must not be empty".into(),
            ));
        }
        if self.captioning.image_size == 0 {
            return Err(ConfigError::ValidationError(
                "captioning.image_size must be > 0".into(),
            ));
        }
        if self.captioning.num_beams == 0 {
            return Err(ConfigError::ValidationError(
                "captioning.num_beams must be > 0".into(),
            ));
        }
        if self.captioning.max_length < 2 {
            return Err(ConfigError::ValidationError(
                "captioning.max_length must be >= 2".into(),
            ));
        }
        if self.qa.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "qa.max_tokens must be > 0".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.qa.temperature) {
            return Err(ConfigError::ValidationError(
                "qa.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.qa.timeout_ms == Some(0) {
            return Err(ConfigError::ValidationError(
                "qa.timeout_ms must be > 0 when set".into(),
            ));
        }
        Ok(())
    }
}
