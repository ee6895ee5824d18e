//! Conversation sessions and their persistence
//!
//! This module provides the session data model and the file-backed store
//! that keeps each conversation across restarts.

mod session;
mod store;

pub use session::*;
pub use store::*;
