//! Per-session turn state

use tokio_util::sync::CancellationToken;

use super::events::TurnId;

/// Where a session is in its send-turn
#[derive(Debug, Clone, Default)]
pub enum TurnState {
    /// No turn in flight
    #[default]
    Idle,

    /// The background fetch is running and fragments grow the placeholder
    Streaming {
        turn: TurnId,
        placeholder: usize,
        cancel: CancellationToken,
    },

    /// The stream ended cleanly; a save is pending
    Completed { turn: TurnId },

    /// The stream failed or was cancelled; a save is pending
    Failed { turn: TurnId },
}

impl TurnState {
    pub fn is_idle(&self) -> bool {
        matches!(self, TurnState::Idle)
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, TurnState::Streaming { .. })
    }

    /// True once the stream is over but the save hasn't reported back
    pub fn is_persisting(&self) -> bool {
        matches!(self, TurnState::Completed { .. } | TurnState::Failed { .. })
    }

    pub fn turn(&self) -> Option<TurnId> {
        match self {
            TurnState::Idle => None,
            TurnState::Streaming { turn, .. }
            | TurnState::Completed { turn }
            | TurnState::Failed { turn } => Some(*turn),
        }
    }

    /// Placeholder index if `turn` is the one currently streaming
    pub fn streaming_placeholder(&self, turn: TurnId) -> Option<usize> {
        match self {
            TurnState::Streaming {
                turn: current,
                placeholder,
                ..
            } if *current == turn => Some(*placeholder),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TurnState::Idle => "idle",
            TurnState::Streaming { .. } => "streaming",
            TurnState::Completed { .. } => "saving",
            TurnState::Failed { .. } => "saving",
        }
    }
}
