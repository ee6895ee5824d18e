//! Error types for the inference backend client

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response record: {0}")]
    Protocol(String),

    #[error("backend reported an error: {0}")]
    Server(String),

    #[error("request cancelled")]
    Cancelled,
}

impl LlmError {
    /// True for failures that happened before or while moving bytes,
    /// as opposed to bytes that arrived but made no sense.
    pub fn is_transport(&self) -> bool {
        matches!(self, LlmError::Transport(_) | LlmError::Status { .. })
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LlmError::Protocol(err.to_string())
        } else {
            LlmError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Protocol(err.to_string())
    }
}

pub type LlmResult<T> = Result<T, LlmError>;
