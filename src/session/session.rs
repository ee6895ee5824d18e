//! Conversation sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::llm::{Message, MessageRole};

/// One conversation.
///
/// Serializes to the on-disk record: `id`, `title`, `messages`, `createdAt`.
/// The storage binding is runtime-only and is restored from the file name
/// the record was loaded from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(rename = "createdAt", alias = "created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    binding: Option<PathBuf>,
}

impl ChatSession {
    /// Create a new, never-saved session
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            messages: Vec::new(),
            created_at: Utc::now(),
            binding: None,
        }
    }

    /// Where this session was last written, if it ever was
    pub fn binding(&self) -> Option<&Path> {
        self.binding.as_deref()
    }

    pub fn is_persisted(&self) -> bool {
        self.binding.is_some()
    }

    pub(crate) fn bind(&mut self, path: PathBuf) {
        self.binding = Some(path);
    }

    /// Append a user message and its empty assistant placeholder.
    ///
    /// Returns the placeholder's index.
    pub fn open_turn(&mut self, text: impl Into<String>) -> usize {
        self.messages.push(Message::user(text));
        self.messages.push(Message::placeholder());
        self.messages.len() - 1
    }

    /// History to send for the turn whose placeholder sits at `placeholder`:
    /// every message before it, copied.
    pub fn history_before(&self, placeholder: usize) -> Vec<Message> {
        self.messages[..placeholder.min(self.messages.len())].to_vec()
    }

    /// Append streamed text to the placeholder at `index`.
    ///
    /// Only the last message can grow, and only if it is an assistant
    /// message; anything else is refused.
    pub fn append_to_placeholder(&mut self, index: usize, text: &str) -> bool {
        if index + 1 != self.messages.len() {
            return false;
        }
        match self.messages.last_mut() {
            Some(message) if message.role == MessageRole::Assistant => {
                message.content.push_str(text);
                true
            }
            _ => false,
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}
