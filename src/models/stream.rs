//! Incremental LLM output units

use serde::{Deserialize, Serialize};

/// One unit of a streamed response.
///
/// Serialises as `{"content": ...}`, `{"done": true}` or `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamChunk {
    Content { content: String },
    Done { done: bool },
    Error { error: String },
}

impl StreamChunk {
    pub fn content<S: Into<String>>(text: S) -> Self {
        StreamChunk::Content {
            content: text.into(),
        }
    }

    #[must_use]
    pub fn done() -> Self {
        StreamChunk::Done { done: true }
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        StreamChunk::Error {
            error: message.into(),
        }
    }

    /// `true` for `done` and `error` chunks
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamChunk::Content { .. })
    }
}
