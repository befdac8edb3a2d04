//! Mapping pipeline failures onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use glimpse_core::{AskError, InputError, QaError};
use serde_json::json;

const CAPTION_FAILED: &str = "Failed to generate image caption";
const ANSWER_FAILED: &str = "Failed to get answer from AI";
const INTERNAL: &str = "Internal server error";

/// An error response rendered as `{"detail": "..."}`.
///
/// Only client input errors carry their own message; every other failure is
/// logged and reported with a fixed message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl From<InputError> for ApiError {
    fn from(err: InputError) -> Self {
        let status = match err {
            InputError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, err.to_string())
    }
}

impl From<AskError> for ApiError {
    fn from(err: AskError) -> Self {
        match err {
            AskError::Input(e) => e.into(),
            AskError::Caption(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, CAPTION_FAILED)
            }
            AskError::Answer(QaError::NotConfigured) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{ANSWER_FAILED}: OpenAI API key not configured"),
            ),
            AskError::Answer(_) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, ANSWER_FAILED),
            AskError::Storage(e) => {
                tracing::error!("Failed to store upload: {e}");
                Self::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
