//! Client for the local inference backend
//!
//! This module sends chat requests to an Ollama server and exposes the
//! reply as an ordered, cancellable stream of text fragments.

pub mod errors;
pub mod ollama;
pub mod provider;
pub mod types;

pub use errors::*;
pub use ollama::OllamaProvider;
pub use provider::*;
pub use types::*;
