//! Request orchestration - wires together validation, storage, captioning and QA.

use std::path::Path;
use std::sync::Arc;

use crate::captioning::{BlipCaptioner, Captioner};
use crate::config::Config;
use crate::error::{AskError, CaptionError, QaError};
use crate::llm::{Answerer, OpenAiAnswerer};
use crate::types::{AskOutcome, Upload};

use super::storage::TempStore;
use super::validate::Validator;

/// Runs one ask request through every stage.
///
/// Adapters are held as trait objects so the HTTP layer and tests can swap
/// in their own implementations.
pub struct AskService {
    validator: Validator,
    store: TempStore,
    captioner: Arc<dyn Captioner>,
    answerer: Arc<dyn Answerer>,
}

impl AskService {
    pub fn new(
        validator: Validator,
        store: TempStore,
        captioner: Arc<dyn Captioner>,
        answerer: Arc<dyn Answerer>,
    ) -> Self {
        Self {
            validator,
            store,
            captioner,
            answerer,
        }
    }

    /// Build the production service: BLIP captioner and OpenAI answerer.
    ///
    /// The QA credential is verified here when enabled. The captioning model
    /// is loaded eagerly only if `captioning.warm_up` is set; a failed warm-up
    /// is logged and left cached.
    pub async fn from_config(config: &Config) -> Self {
        let captioner = BlipCaptioner::new(config.captioning.clone(), config.captioning_model_dir());
        if config.captioning.warm_up {
            tracing::info!("Loading captioning model...");
            if captioner.warm_up().await.is_ok() {
                tracing::info!("Captioning model loaded");
            }
        }

        let answerer = OpenAiAnswerer::connect(config.qa.clone()).await;
        if answerer.is_configured() {
            tracing::info!("Answering with {} model {}", answerer.name(), config.qa.model);
        } else {
            tracing::warn!("No usable {} credential; /ask will return 500", answerer.name());
        }

        Self::new(
            Validator::new(config.upload.clone()),
            TempStore::new(config.temp_dir()),
            Arc::new(captioner),
            Arc::new(answerer),
        )
    }

    /// Validator used for early checks (e.g. while streaming an upload).
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Validate, store, caption, answer. The temp file is removed before
    /// this returns, whatever the outcome.
    pub async fn ask(&self, upload: Upload, question: &str) -> Result<AskOutcome, AskError> {
        let start = std::time::Instant::now();

        self.validator
            .validate_upload(&upload.file_name, upload.size())?;
        self.validator.validate_question(question)?;

        let Upload { file_name, data } = upload;
        let image = self.store.persist(data, &file_name).await?;

        let caption = self
            .captioner
            .caption(image.path())
            .await
            .and_then(|caption| match caption.trim() {
                "" => Err(CaptionError::Empty),
                _ => Ok(caption),
            })
            .map_err(|e| {
                tracing::error!("Error generating caption: {e}");
                e
            })?;
        tracing::info!("Generated caption: {caption}");

        let answer = self
            .answerer
            .answer(&caption, question)
            .await
            .and_then(|answer| match answer.trim() {
                "" => Err(QaError::EmptyResponse),
                _ => Ok(answer),
            })
            .map_err(|e| {
                match &e {
                    QaError::Request {
                        status_code: Some(status),
                        ..
                    } => tracing::error!(
                        "Error getting answer from {} (HTTP {status}): {e}",
                        self.answerer.name()
                    ),
                    _ => tracing::error!("Error getting answer from {}: {e}", self.answerer.name()),
                }
                e
            })?;

        drop(image);
        tracing::debug!("Answered in {:?}", start.elapsed());

        Ok(AskOutcome {
            caption,
            question: question.to_string(),
            answer,
        })
    }

    /// Read a local image and run it through [`ask`](Self::ask).
    ///
    /// The declared filename is the file's own name, so the extension rules
    /// apply exactly as for uploads.
    pub async fn ask_file(&self, path: &Path, question: &str) -> crate::Result<AskOutcome> {
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(self.ask(Upload::new(file_name, data), question).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadConfig;
    use crate::error::{CaptionError, GlimpseError, InputError, QaError};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records the paths it was asked to caption and whether they existed.
    struct StubCaptioner {
        result: Result<String, CaptionError>,
        calls: AtomicUsize,
        seen: Mutex<Vec<(PathBuf, bool)>>,
    }

    impl StubCaptioner {
        fn new(result: Result<String, CaptionError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Captioner for StubCaptioner {
        async fn caption(&self, image_path: &Path) -> Result<String, CaptionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((image_path.to_path_buf(), image_path.exists()));
            self.result.clone()
        }
    }

    struct StubAnswerer {
        result: Result<String, QaError>,
        calls: AtomicUsize,
    }

    impl StubAnswerer {
        fn new(result: Result<String, QaError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Answerer for StubAnswerer {
        fn name(&self) -> &str {
            "stub"
        }

        fn is_configured(&self) -> bool {
            !matches!(self.result, Err(QaError::NotConfigured))
        }

        async fn answer(&self, _caption: &str, _question: &str) -> Result<String, QaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn service(
        dir: &Path,
        captioner: Arc<StubCaptioner>,
        answerer: Arc<StubAnswerer>,
    ) -> AskService {
        AskService::new(
            Validator::new(UploadConfig::default()),
            TempStore::new(dir),
            captioner,
            answerer,
        )
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }

    #[tokio::test]
    async fn test_ask_returns_caption_question_answer() {
        let dir = tempfile::tempdir().unwrap();
        let captioner = StubCaptioner::new(Ok("a red ball on grass".to_string()));
        let answerer = StubAnswerer::new(Ok("The object is red.".to_string()));
        let service = service(dir.path(), captioner.clone(), answerer.clone());

        let outcome = service
            .ask(
                Upload::new("ball.jpg", vec![0xFF, 0xD8, 0xFF]),
                "What color is the object?",
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            AskOutcome {
                caption: "a red ball on grass".to_string(),
                question: "What color is the object?".to_string(),
                answer: "The object is red.".to_string(),
            }
        );

        // The captioner saw a real file, which is gone now.
        let seen = captioner.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].1);
        assert!(!seen[0].0.exists());
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_disallowed_extension_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let captioner = StubCaptioner::new(Ok("x".to_string()));
        let answerer = StubAnswerer::new(Ok("y".to_string()));
        let service = service(dir.path(), captioner.clone(), answerer.clone());

        let err = service
            .ask(Upload::new("notes.txt", b"hello".to_vec()), "What?")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AskError::Input(InputError::UnsupportedExtension { .. })
        ));
        assert_eq!(captioner.calls.load(Ordering::SeqCst), 0);
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_oversized_upload_skips_adapters() {
        let dir = tempfile::tempdir().unwrap();
        let captioner = StubCaptioner::new(Ok("x".to_string()));
        let answerer = StubAnswerer::new(Ok("y".to_string()));
        let service = service(dir.path(), captioner.clone(), answerer.clone());

        let data = vec![0u8; 10 * 1024 * 1024 + 1];
        let err = service
            .ask(Upload::new("big.png", data), "What?")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AskError::Input(InputError::FileTooLarge { .. })
        ));
        assert_eq!(captioner.calls.load(Ordering::SeqCst), 0);
        assert_eq!(answerer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let captioner = StubCaptioner::new(Ok("x".to_string()));
        let service = service(
            dir.path(),
            captioner.clone(),
            StubAnswerer::new(Ok("y".to_string())),
        );

        let err = service
            .ask(Upload::new("a.png", vec![1, 2, 3]), "   ")
            .await
            .unwrap_err();

        assert!(matches!(err, AskError::Input(InputError::EmptyQuestion)));
        assert_eq!(captioner.calls.load(Ordering::SeqCst), 0);
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_caption_failure_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let answerer = StubAnswerer::new(Ok("y".to_string()));
        let service = service(
            dir.path(),
            StubCaptioner::new(Err(CaptionError::Empty)),
            answerer.clone(),
        );

        let err = service
            .ask(Upload::new("a.webp", vec![1, 2, 3]), "What?")
            .await
            .unwrap_err();

        assert!(matches!(err, AskError::Caption(CaptionError::Empty)));
        assert_eq!(answerer.calls.load(Ordering::SeqCst), 0);
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_missing_credential_still_captions() {
        let dir = tempfile::tempdir().unwrap();
        let captioner = StubCaptioner::new(Ok("a cat on a sofa".to_string()));
        let service = service(
            dir.path(),
            captioner.clone(),
            StubAnswerer::new(Err(QaError::NotConfigured)),
        );

        let err = service
            .ask(Upload::new("cat.jpeg", vec![1, 2, 3]), "What animal?")
            .await
            .unwrap_err();

        assert!(matches!(err, AskError::Answer(QaError::NotConfigured)));
        assert_eq!(captioner.calls.load(Ordering::SeqCst), 1);
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_concurrent_requests_use_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let captioner = StubCaptioner::new(Ok("a thing".to_string()));
        let service = Arc::new(service(
            dir.path(),
            captioner.clone(),
            StubAnswerer::new(Ok("An answer.".to_string())),
        ));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    let question = format!("Question {i}?");
                    let outcome = service
                        .ask(Upload::new("img.png", vec![i as u8; 16]), &question)
                        .await
                        .unwrap();
                    (question, outcome)
                })
            })
            .collect();

        for handle in handles {
            let (question, outcome) = handle.await.unwrap();
            assert_eq!(outcome.question, question);
        }

        let seen = captioner.seen.lock().unwrap();
        let mut paths: Vec<_> = seen.iter().map(|(p, _)| p.clone()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 8);
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_blank_caption_is_caption_failure() {
        for blank in ["", "   \n"] {
            let dir = tempfile::tempdir().unwrap();
            let answerer = StubAnswerer::new(Ok("unused".to_string()));
            let service = service(
                dir.path(),
                StubCaptioner::new(Ok(blank.to_string())),
                answerer.clone(),
            );

            let err = service
                .ask(Upload::new("a.jpg", vec![1, 2, 3]), "What?")
                .await
                .unwrap_err();

            assert!(matches!(err, AskError::Caption(CaptionError::Empty)));
            assert_eq!(answerer.calls.load(Ordering::SeqCst), 0);
            assert!(dir_is_empty(dir.path()));
        }
    }

    #[tokio::test]
    async fn test_blank_answer_is_answer_failure() {
        for blank in ["", "  "] {
            let dir = tempfile::tempdir().unwrap();
            let service = service(
                dir.path(),
                StubCaptioner::new(Ok("a dog".to_string())),
                StubAnswerer::new(Ok(blank.to_string())),
            );

            let err = service
                .ask(Upload::new("a.jpg", vec![1, 2, 3]), "What animal?")
                .await
                .unwrap_err();

            assert!(matches!(err, AskError::Answer(QaError::EmptyResponse)));
            assert!(dir_is_empty(dir.path()));
        }
    }

    #[tokio::test]
    async fn test_ask_file_reads_local_image() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("ball.png");
        std::fs::write(&image, [0x89, b'P', b'N', b'G']).unwrap();
        let temp = dir.path().join("uploads");
        let service = service(
            &temp,
            StubCaptioner::new(Ok("a red ball".to_string())),
            StubAnswerer::new(Ok("Red.".to_string())),
        );

        let outcome = service.ask_file(&image, "What color?").await.unwrap();
        assert_eq!(outcome.answer, "Red.");
        assert!(dir_is_empty(&temp));

        let err = service
            .ask_file(&dir.path().join("missing.png"), "What color?")
            .await
            .unwrap_err();
        assert!(matches!(err, GlimpseError::Io(_)));

        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, b"text").unwrap();
        let err = service.ask_file(&notes, "What?").await.unwrap_err();
        assert!(matches!(
            err,
            GlimpseError::Ask(AskError::Input(InputError::UnsupportedExtension { .. }))
        ));
    }
}
