//! LLM integration for answering questions about captioned images.
//!
//! Provides the [`Answerer`] abstraction the orchestrator depends on and an
//! OpenAI-compatible chat completion implementation.

pub(crate) mod openai;
pub(crate) mod provider;

pub use openai::OpenAiAnswerer;
pub use provider::{resolve_env_var, Answerer, QaRequest, SYSTEM_PROMPT};
