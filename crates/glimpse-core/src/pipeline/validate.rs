//! Input validation before anything touches disk.

use std::path::Path;

use crate::config::UploadConfig;
use crate::error::InputError;

/// Validates uploads and questions.
#[derive(Debug, Clone)]
pub struct Validator {
    limits: UploadConfig,
}

impl Validator {
    /// Create a new validator with the given upload limits.
    pub fn new(limits: UploadConfig) -> Self {
        Self { limits }
    }

    /// Check a declared upload against the size limit and the extension
    /// allow-list. Size is checked first so oversized uploads always map to
    /// `FileTooLarge` regardless of their name.
    pub fn validate_upload(&self, file_name: &str, size: u64) -> Result<(), InputError> {
        self.check_size(size)?;
        self.check_extension(file_name)
    }

    /// Fail with `FileTooLarge` if `size` exceeds the configured maximum.
    pub fn check_size(&self, size: u64) -> Result<(), InputError> {
        if size > self.limits.max_file_size_bytes() {
            return Err(InputError::FileTooLarge {
                size_bytes: size,
                max_mb: self.limits.max_file_size_mb,
            });
        }
        Ok(())
    }

    /// Reject questions that are empty or whitespace-only.
    pub fn validate_question(&self, question: &str) -> Result<(), InputError> {
        if question.trim().is_empty() {
            return Err(InputError::EmptyQuestion);
        }
        Ok(())
    }

    /// Upload limit in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.limits.max_file_size_bytes()
    }

    fn check_extension(&self, file_name: &str) -> Result<(), InputError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let allowed = extension.as_deref().is_some_and(|ext| {
            self.limits
                .allowed_extensions
                .iter()
                .any(|a| a.eq_ignore_ascii_case(ext))
        });

        if allowed {
            return Ok(());
        }

        Err(InputError::UnsupportedExtension {
            extension: extension
                .map(|e| format!(".{e}"))
                .unwrap_or_else(|| "(none)".to_string()),
            allowed: self
                .limits
                .allowed_extensions
                .iter()
                .map(|e| format!(".{e}"))
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}
