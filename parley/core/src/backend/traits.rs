//! Backend Traits
//!
//! Trait definitions for inference backends. The orchestrator only
//! needs a turn list in and a token stream out; implementations handle
//! provider-specific details (request schema, auth, endpoints).

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::session::Turn;

/// Token stream events from the backend
#[derive(Clone, Debug)]
pub enum StreamingToken {
    /// A fragment of the response
    Token(String),
    /// Response completed successfully
    Complete {
        /// The complete message (may differ from concatenated tokens)
        message: String,
    },
    /// Error occurred during streaming
    Error(String),
}

/// A streaming chat request: the context window plus model choice
#[derive(Clone, Debug)]
pub struct ChatRequest {
    /// Model to use (backend-specific identifier)
    pub model: String,
    /// Role/content turns, oldest first, system turn included
    pub turns: Vec<Turn>,
}

impl ChatRequest {
    /// Create a request for `model` over `turns`
    pub fn new(model: impl Into<String>, turns: Vec<Turn>) -> Self {
        Self {
            model: model.into(),
            turns,
        }
    }
}

/// Inference backend trait
///
/// Implement this trait to add support for different providers.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Get the backend name (e.g., "Ollama")
    fn name(&self) -> &str;

    /// Check if the backend is healthy and reachable
    async fn health_check(&self) -> bool;

    /// Send the turn list and get a streaming response
    ///
    /// Returns a channel receiver that yields tokens as they arrive.
    /// The channel closes when the response completes or errors.
    async fn send_streaming(
        &self,
        request: &ChatRequest,
    ) -> anyhow::Result<mpsc::Receiver<StreamingToken>>;
}
