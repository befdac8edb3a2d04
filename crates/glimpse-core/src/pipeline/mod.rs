//! Request pipeline components.
//!
//! - **validate**: Upload and question validation
//! - **storage**: Scoped temp files for uploads
//! - **service**: Orchestrates validate → store → caption → answer

pub mod service;
pub mod storage;
pub mod validate;

// Re-exports for convenient access
pub use service::AskService;
pub use storage::{TempImage, TempStore};
pub use validate::Validator;
