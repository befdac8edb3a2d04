//! Route handlers.

use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use glimpse_core::{AskOutcome, InputError, Upload};
use serde::Serialize;

use super::{ApiError, AppState};

/// `POST /ask` - caption the uploaded image and answer the question.
///
/// The image part is read chunk by chunk and rejected as soon as it crosses
/// the size limit.
pub async fn ask(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AskOutcome>, ApiError> {
    let mut multipart = multipart
        .map_err(|e| ApiError::from(InputError::Malformed(e.body_text())))?;
    let validator = state.service.validator();

    let mut upload: Option<Upload> = None;
    let mut question: Option<String> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let mut data = Vec::new();
                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    data.extend_from_slice(&chunk);
                    validator.check_size(data.len() as u64)?;
                }
                upload = Some(Upload::new(file_name, data));
            }
            "question" => {
                question = Some(field.text().await.map_err(multipart_error)?);
            }
            other => tracing::debug!("Ignoring unexpected form field {:?}", other),
        }
    }

    let upload = upload.ok_or(InputError::MissingField("image"))?;
    let question = question.ok_or(InputError::MissingField("question"))?;

    let outcome = state.service.ask(upload, &question).await.map_err(|e| {
        let err = ApiError::from(e);
        tracing::debug!("Ask failed with {}: {}", err.status(), err.detail());
        err
    })?;

    Ok(Json(outcome))
}

/// Multipart stream failures. The body limit surfaces here as a 413.
fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, err.body_text())
    } else {
        InputError::Malformed(err.body_text()).into()
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

/// `GET /health` - liveness check. Does not touch either model.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        message: "Glimpse image question answering service is running",
    })
}

#[cfg(test)]
mod tests {
    use std::future::IntoFuture;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use glimpse_core::config::UploadConfig;
    use glimpse_core::{
        Answerer, AskService, CaptionError, Captioner, QaError, TempStore, Validator,
    };
    use serde_json::Value;

    use crate::server::router;

    const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    enum CaptionBehavior {
        Reply(Result<String, CaptionError>),
        Panic,
    }

    struct StubCaptioner {
        behavior: CaptionBehavior,
        calls: AtomicUsize,
        paths: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl Captioner for StubCaptioner {
        async fn caption(&self, image_path: &Path) -> Result<String, CaptionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.paths.lock().unwrap().push(image_path.to_path_buf());
            match &self.behavior {
                CaptionBehavior::Reply(result) => result.clone(),
                CaptionBehavior::Panic => panic!("captioner blew up"),
            }
        }
    }

    /// Echoes the question back so responses can be matched to requests.
    struct StubAnswerer {
        result: Result<String, QaError>,
        echo: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Answerer for StubAnswerer {
        fn name(&self) -> &str {
            "stub"
        }

        fn is_configured(&self) -> bool {
            !matches!(self.result, Err(QaError::NotConfigured))
        }

        async fn answer(&self, _caption: &str, question: &str) -> Result<String, QaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.echo {
                return Ok(format!("Answer to: {question}"));
            }
            self.result.clone()
        }
    }

    struct Harness {
        server: TestServer,
        captioner: Arc<StubCaptioner>,
        answerer: Arc<StubAnswerer>,
        temp_dir: tempfile::TempDir,
    }

    impl Harness {
        fn new(caption: CaptionBehavior, answer: Result<String, QaError>) -> Self {
            Self::build(caption, answer, false)
        }

        fn echoing() -> Self {
            Self::build(
                CaptionBehavior::Reply(Ok("a thing".to_string())),
                Ok(String::new()),
                true,
            )
        }

        fn build(caption: CaptionBehavior, answer: Result<String, QaError>, echo: bool) -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            let captioner = Arc::new(StubCaptioner {
                behavior: caption,
                calls: AtomicUsize::new(0),
                paths: Mutex::new(Vec::new()),
            });
            let answerer = Arc::new(StubAnswerer {
                result: answer,
                echo,
                calls: AtomicUsize::new(0),
            });
            let service = AskService::new(
                Validator::new(UploadConfig::default()),
                TempStore::new(temp_dir.path()),
                captioner.clone(),
                answerer.clone(),
            );
            let server = TestServer::new(router(Arc::new(service))).unwrap();
            Self {
                server,
                captioner,
                answerer,
                temp_dir,
            }
        }

        fn temp_dir_is_empty(&self) -> bool {
            std::fs::read_dir(self.temp_dir.path())
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(true)
        }
    }

    fn red_ball() -> Harness {
        Harness::new(
            CaptionBehavior::Reply(Ok("a red ball on grass".to_string())),
            Ok("The object is red.".to_string()),
        )
    }

    fn form(file_name: &str, bytes: Vec<u8>, question: &str) -> MultipartForm {
        MultipartForm::new()
            .add_part(
                "image",
                Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_type("application/octet-stream"),
            )
            .add_text("question", question)
    }

    #[tokio::test]
    async fn test_ask_returns_three_fields() {
        let h = red_ball();
        let response = h
            .server
            .post("/ask")
            .multipart(form("ball.jpg", JPEG_BYTES.to_vec(), "What color is the object?"))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(
            body,
            serde_json::json!({
                "caption": "a red ball on grass",
                "question": "What color is the object?",
                "answer": "The object is red."
            })
        );
        assert!(h.temp_dir_is_empty());
    }

    #[tokio::test]
    async fn test_disallowed_extension_is_400_without_write() {
        let h = red_ball();
        let response = h
            .server
            .post("/ask")
            .multipart(form("notes.txt", b"hello".to_vec(), "What is this?"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["detail"].as_str().unwrap().contains("Invalid file type"));
        assert_eq!(h.captioner.calls.load(Ordering::SeqCst), 0);
        assert!(h.temp_dir_is_empty());
    }

    #[tokio::test]
    async fn test_oversized_upload_is_413_without_adapter_calls() {
        let h = red_ball();
        let bytes = vec![0u8; 10 * 1024 * 1024 + 1];
        let response = h
            .server
            .post("/ask")
            .multipart(form("huge.png", bytes, "What is this?"))
            .await;

        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(h.captioner.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.answerer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_question_is_400() {
        let h = red_ball();
        let response = h
            .server
            .post("/ask")
            .multipart(form("ball.png", JPEG_BYTES.to_vec(), "   "))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["detail"], "Question cannot be empty");
    }

    #[tokio::test]
    async fn test_missing_fields_are_400() {
        let h = red_ball();

        let only_question = MultipartForm::new().add_text("question", "What?");
        let response = h.server.post("/ask").multipart(only_question).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["detail"].as_str().unwrap().contains("image"));

        let only_image = MultipartForm::new().add_part(
            "image",
            Part::bytes(JPEG_BYTES.to_vec()).file_name("ball.jpg"),
        );
        let response = h.server.post("/ask").multipart(only_image).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_multipart_body_is_400() {
        let h = red_ball();
        let response = h
            .server
            .post("/ask")
            .json(&serde_json::json!({"question": "What?"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn test_caption_failure_is_500() {
        let h = Harness::new(
            CaptionBehavior::Reply(Err(CaptionError::Empty)),
            Ok("unused".to_string()),
        );
        let response = h
            .server
            .post("/ask")
            .multipart(form("ball.jpg", JPEG_BYTES.to_vec(), "What?"))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["detail"], "Failed to generate image caption");
        assert_eq!(h.answerer.calls.load(Ordering::SeqCst), 0);
        assert!(h.temp_dir_is_empty());
    }

    #[tokio::test]
    async fn test_missing_credential_is_500_after_captioning() {
        let h = Harness::new(
            CaptionBehavior::Reply(Ok("a cat".to_string())),
            Err(QaError::NotConfigured),
        );
        let response = h
            .server
            .post("/ask")
            .multipart(form("cat.jpg", JPEG_BYTES.to_vec(), "What animal?"))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert!(body["detail"].as_str().unwrap().contains("not configured"));
        assert_eq!(h.captioner.calls.load(Ordering::SeqCst), 1);
        assert!(h.temp_dir_is_empty());
    }

    #[tokio::test]
    async fn test_answer_failure_is_generic_500() {
        let h = Harness::new(
            CaptionBehavior::Reply(Ok("a cat".to_string())),
            Err(QaError::Request {
                message: "HTTP 500: upstream secret".to_string(),
                status_code: Some(500),
            }),
        );
        let response = h
            .server
            .post("/ask")
            .multipart(form("cat.jpg", JPEG_BYTES.to_vec(), "What animal?"))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["detail"], "Failed to get answer from AI");
    }

    #[tokio::test]
    async fn test_panic_is_500_and_cleans_up() {
        let h = Harness::new(CaptionBehavior::Panic, Ok("unused".to_string()));
        let response = h
            .server
            .post("/ask")
            .multipart(form("ball.jpg", JPEG_BYTES.to_vec(), "What?"))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["detail"], "Internal server error");
        assert!(h.temp_dir_is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_requests_pair_correctly() {
        let h = Harness::echoing();
        let ask = |i: usize| {
            h.server
                .post("/ask")
                .multipart(form("img.jpg", vec![i as u8; 32], &format!("Question {i}?")))
                .into_future()
        };

        let (a, b, c, d) = tokio::join!(ask(0), ask(1), ask(2), ask(3));
        for (i, response) in [a, b, c, d].into_iter().enumerate() {
            response.assert_status_ok();
            let body: Value = response.json();
            assert_eq!(body["question"], format!("Question {i}?"));
            assert_eq!(body["answer"], format!("Answer to: Question {i}?"));
        }

        let mut paths = h.captioner.paths.lock().unwrap().clone();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 4);
        assert!(h.temp_dir_is_empty());
    }

    #[tokio::test]
    async fn test_health() {
        let h = red_ball();
        let response = h.server.get("/health").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert!(body["message"].is_string());
        assert_eq!(h.captioner.calls.load(Ordering::SeqCst), 0);
    }
}
