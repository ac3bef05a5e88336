//! Parley Core
//!
//! Headless library for the parley conversational streaming service:
//! the conversation data model, context window selection, the framed
//! stream protocol (multiplexer and demultiplexer), the persistence and
//! backend collaborator seams, and the orchestrator that ties one
//! exchange together.
//!
//! The daemon and the client are both thin shells over this crate: the
//! daemon exposes the orchestrator over HTTP, the client consumes the
//! demultiplexer and owns the generation lifecycle.

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod protocol;
pub mod session;
pub mod store;

// Re-exports for convenience
pub use backend::{ChatBackend, ChatRequest, OllamaBackend, StreamingToken};
pub use config::{Config, ConfigError};
pub use context::{estimated_tokens, select_window};
pub use error::{ExchangeError, ProtocolError, StoreError};
pub use orchestrator::{ExchangeConfig, ExchangeOrchestrator, ExchangeStream};
pub use protocol::{FrameDecoder, StreamDemultiplexer, StreamEvent};
pub use session::{
    Identity, Role, Session, SessionId, SessionSummary, Turn, MAX_ASSISTANT_CONTENT_CHARS,
    MAX_USER_CONTENT_CHARS,
};
pub use store::{ChatStore, MemoryStore};
