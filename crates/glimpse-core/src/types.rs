//! Request and response types shared by the service and its front ends.

use serde::{Deserialize, Serialize};

/// An uploaded image as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Filename declared by the client (only its extension is trusted)
    pub file_name: String,
    /// Raw file bytes
    pub data: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
        }
    }

    /// Declared size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Successful result of one ask request. Either every field is populated or
/// the request failed as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskOutcome {
    /// Caption produced by the captioning model
    pub caption: String,
    /// The question as submitted
    pub question: String,
    /// Answer produced by the chat completion model
    pub answer: String,
}
