//! Common types shared by the backend client and the transcript

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use super::errors::LlmResult;

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A message in the conversation.
///
/// This is both the persisted shape (`{role, content}`) and the shape sent
/// to the backend, so it carries nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// An empty assistant message, the target streamed fragments grow into.
    pub fn placeholder() -> Self {
        Self::new(MessageRole::Assistant, String::new())
    }
}

/// Ordered, finite sequence of assistant text fragments for one request.
///
/// The stream ends after the first error it yields.
pub type FragmentStream = Pin<Box<dyn Stream<Item = LlmResult<String>> + Send>>;

/// Connection settings for the backend client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub model: String,
    pub connect_timeout_secs: Option<u64>,
}
