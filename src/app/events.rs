//! Update actions queued for the session controller
//!
//! Background tasks never touch the registry. They describe what happened
//! as an [`AppEvent`] and the controller applies it on its own turn.

use std::{fmt, path::PathBuf};
use uuid::Uuid;

use crate::{llm::LlmError, session::StorageError};

/// Identifies one send-turn; increases monotonically per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(pub(crate) u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "turn-{}", self.0)
    }
}

/// Events that can occur while turns are running
#[derive(Debug)]
pub enum AppEvent {
    /// A fragment of assistant text arrived for a turn
    Fragment {
        session_id: Uuid,
        turn: TurnId,
        text: String,
    },

    /// The response stream for a turn ended, cleanly or not
    TurnEnded {
        session_id: Uuid,
        turn: TurnId,
        error: Option<LlmError>,
    },

    /// A save started at the end of a turn finished
    Persisted {
        session_id: Uuid,
        turn: TurnId,
        result: Result<PathBuf, StorageError>,
    },
}

impl AppEvent {
    /// Get the session ID associated with this event
    pub fn session_id(&self) -> Uuid {
        match self {
            AppEvent::Fragment { session_id, .. }
            | AppEvent::TurnEnded { session_id, .. }
            | AppEvent::Persisted { session_id, .. } => *session_id,
        }
    }

    /// Get the turn this event belongs to
    pub fn turn(&self) -> TurnId {
        match self {
            AppEvent::Fragment { turn, .. }
            | AppEvent::TurnEnded { turn, .. }
            | AppEvent::Persisted { turn, .. } => *turn,
        }
    }
}
