//! Answerer trait and chat request construction.
//!
//! Defines the interface the orchestrator uses to answer questions about a
//! caption, plus the prompt every provider sends.

use async_trait::async_trait;

use crate::config::QaConfig;
use crate::error::QaError;

/// System instruction sent with every question.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant who provides detailed and comprehensive answers about image captions.
You will be provided with image captions and questions about them.

Please provide thorough, detailed answers that:
- Explain your reasoning clearly
- Include relevant details from the caption
- Provide context and insights when possible
- Be informative and educational
- Use 2-4 sentences minimum for most answers

If the caption doesn't contain enough information to answer the question, explain what information is missing and what you can infer from what's available.
Keep your answers informative and engaging while being accurate to the caption content.";

/// A request to answer a question about a captioned image.
#[derive(Debug, Clone)]
pub struct QaRequest {
    /// System instruction
    pub system: String,
    /// User message embedding the caption and question verbatim
    pub user: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl QaRequest {
    /// Build the request for a caption/question pair.
    pub fn about_caption(caption: &str, question: &str, config: &QaConfig) -> Self {
        Self {
            system: SYSTEM_PROMPT.to_string(),
            user: format!("Image caption: {caption}\nQuestion: {question}"),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// Answers a question given an image caption.
///
/// Uses `async_trait` because the orchestrator holds adapters as
/// `Arc<dyn Answerer>`.
#[async_trait]
pub trait Answerer: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Whether a credential is available.
    fn is_configured(&self) -> bool;

    /// Answer `question` about an image described by `caption`.
    async fn answer(&self, caption: &str, question: &str) -> Result<String, QaError>;
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
