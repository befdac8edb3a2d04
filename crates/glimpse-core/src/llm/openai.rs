//! OpenAI answerer using the Chat Completions API.

use super::provider::{resolve_env_var, Answerer, QaRequest};
use crate::config::QaConfig;
use crate::error::QaError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// OpenAI (or compatible) chat completion client.
pub struct OpenAiAnswerer {
    /// `None` when no key is configured or startup verification failed.
    api_key: Option<String>,
    config: QaConfig,
    client: reqwest::Client,
}

impl OpenAiAnswerer {
    /// Create an answerer, resolving the API key from config/environment.
    pub fn new(config: QaConfig) -> Self {
        let api_key = resolve_env_var(&config.api_key);
        if api_key.is_none() {
            tracing::warn!("OpenAI API key not configured; questions will fail until it is set");
        }
        Self {
            api_key,
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create an answerer and, if enabled, check the key by listing models.
    ///
    /// A failed check is logged and the key discarded, so later requests fail
    /// with `NotConfigured` instead of hitting the API with a bad key.
    pub async fn connect(config: QaConfig) -> Self {
        let mut answerer = Self::new(config);
        if answerer.config.verify_on_startup && answerer.api_key.is_some() {
            match answerer.verify().await {
                Ok(()) => tracing::info!("OpenAI client initialized successfully"),
                Err(e) => {
                    tracing::error!("Error initializing OpenAI client: {e}");
                    answerer.api_key = None;
                }
            }
        }
        answerer
    }

    /// `GET {base_url}/models` with the configured key.
    pub async fn verify(&self) -> Result<(), QaError> {
        let api_key = self.api_key.as_deref().ok_or(QaError::NotConfigured)?;

        let mut request = self
            .client
            .get(self.endpoint("models"))
            .header("Authorization", format!("Bearer {api_key}"));
        if let Some(timeout) = self.timeout() {
            request = request.timeout(timeout);
        }

        let resp = request.send().await.map_err(|e| QaError::Request {
            message: format!("OpenAI request failed: {e}"),
            status_code: None,
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(QaError::Request {
                message: format!("OpenAI HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Per-request timeout, if configured.
    fn timeout(&self) -> Option<Duration> {
        self.config.timeout_ms.map(Duration::from_millis)
    }
}

// --- Request types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

#[async_trait]
impl Answerer for OpenAiAnswerer {
    fn name(&self) -> &str {
        "openai"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn answer(&self, caption: &str, question: &str) -> Result<String, QaError> {
        let api_key = self.api_key.as_deref().ok_or(QaError::NotConfigured)?;
        let request = QaRequest::about_caption(caption, question, &self.config);
        let start = Instant::now();

        let body = ChatRequest {
            model: &self.config.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
        };

        let mut http = self
            .client
            .post(self.endpoint("chat/completions"))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(timeout) = self.timeout() {
            http = http.timeout(timeout);
        }

        let resp = http.send().await.map_err(|e| QaError::Request {
            message: format!("OpenAI request failed: {e}"),
            status_code: None,
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(QaError::Request {
                message: format!("OpenAI HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        let chat_resp: ChatResponse = resp.json().await.map_err(|e| QaError::Request {
            message: format!("Failed to parse OpenAI response: {e}"),
            status_code: None,
        })?;

        tracing::debug!(
            "OpenAI answered in {}ms ({:?} tokens)",
            start.elapsed().as_millis(),
            chat_resp.usage.as_ref().map(|u| u.total_tokens)
        );

        extract_answer(chat_resp)
    }
}

/// First choice's trimmed content; empty or missing content is an error.
fn extract_answer(resp: ChatResponse) -> Result<String, QaError> {
    let text = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|t| t.trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(QaError::EmptyResponse);
    }
    Ok(text)
}
