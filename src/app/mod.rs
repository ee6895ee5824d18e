//! Core application logic and orchestration
//!
//! This module provides the session controller that coordinates send-turns,
//! the background fetch of replies, and persistence of the session registry.

mod agent;
mod controller;
mod events;
pub mod turn;

pub use agent::*;
pub use controller::*;
pub use events::*;
