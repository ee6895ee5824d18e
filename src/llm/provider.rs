//! Provider trait for the inference backend

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::llm::{
    errors::LlmResult,
    types::{FragmentStream, Message},
};

/// Trait for the chat backend
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Start one streaming chat request for `history`.
    ///
    /// `history` must end with the latest user message and must not contain
    /// the empty assistant placeholder of the turn being answered. The
    /// returned stream checks `cancel` before every record it reads.
    async fn chat_completion_stream(
        &self,
        history: Vec<Message>,
        cancel: CancellationToken,
    ) -> LlmResult<FragmentStream>;

    /// Legacy single-shot request; the whole reply comes back at once.
    async fn chat_completion(&self, history: Vec<Message>) -> LlmResult<String>;

    /// Get the provider name
    fn name(&self) -> &str;

    /// Get the model name
    fn model(&self) -> &str;
}

/// Utility functions for provider implementations
pub mod utils {
    /// Strip control characters other than newline and tab so fragments
    /// can't move the terminal cursor.
    pub fn sanitize_content(content: &str) -> String {
        content
            .chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect()
    }

    /// Pull a readable message out of an error body, falling back to the raw text.
    pub fn extract_error_message(body: &str) -> String {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
            if let Some(error) = json.get("error").and_then(|e| e.as_str()) {
                return error.to_string();
            }
        }
        let trimmed = body.trim();
        if trimmed.is_empty() {
            "no response body".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::utils::*;

    #[test]
    fn test_sanitize_keeps_newlines_and_tabs() {
        assert_eq!(sanitize_content("a\x1b[2Jb\n\tc\r"), "a[2Jb\n\tc");
    }

    #[test]
    fn test_extract_error_message() {
        assert_eq!(
            extract_error_message(r#"{"error":"model 'x' not found"}"#),
            "model 'x' not found"
        );
        assert_eq!(extract_error_message("  bad gateway \n"), "bad gateway");
        assert_eq!(extract_error_message(""), "no response body");
    }
}
