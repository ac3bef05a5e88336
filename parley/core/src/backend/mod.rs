//! Inference Backends
//!
//! Trait abstraction over the model backend plus the Ollama
//! implementation. A backend accepts a list of role/content turns and
//! emits a token stream; everything else about the provider's API is
//! its own business.

pub mod ollama;
pub mod traits;

// Re-exports for convenience
pub use ollama::OllamaBackend;
pub use traits::{ChatBackend, ChatRequest, StreamingToken};
