//! Exchange Orchestration
//!
//! Ties one exchange together: resolve or mint the session, append the
//! user turn, select the context window, open the backend stream, and
//! hand back the multiplexed byte stream with a persistence hook for
//! the assembled assistant turn.
//!
//! # Side-effect discipline
//!
//! Exactly one turn append happens synchronously before streaming
//! begins (the user's message) and exactly one happens asynchronously
//! after streaming ends (the assistant's). Validation and lookup
//! failures terminate the request before any mutation. A mid-stream
//! backend failure leaves the user turn in place with no matching
//! assistant turn; nothing is rolled back and no failure marker is
//! persisted - the client surfaces the error.
//!
//! Concurrent generations against the same session from different
//! clients are not guarded here; the single-in-flight rule lives in
//! each client's controller, and cross-client interleaving is outside
//! the contract.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::backend::{ChatBackend, ChatRequest};
use crate::config::Config;
use crate::context::select_window;
use crate::error::ExchangeError;
use crate::protocol::mux::{multiplex, CompletionHook};
use crate::session::{Identity, Role, SessionId, Turn, MAX_USER_CONTENT_CHARS};
use crate::store::ChatStore;

/// Settings the orchestrator needs from the resolved configuration
#[derive(Clone, Debug)]
pub struct ExchangeConfig {
    /// Model identifier sent to the backend
    pub model: String,
    /// System prompt prepended to every window, uncounted
    pub system_prompt: String,
    /// Token budget for context window selection
    pub history_token_budget: u64,
}

impl From<&Config> for ExchangeConfig {
    fn from(config: &Config) -> Self {
        Self {
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            history_token_budget: config.history_token_budget,
        }
    }
}

/// One in-flight exchange: the outbound frames plus the minted id
pub struct ExchangeStream {
    /// Id of the session created for this exchange, if any
    pub minted_session: Option<SessionId>,
    /// Framed bytes in production order; closes on completion, yields
    /// one `Err` and closes on mid-stream failure
    pub frames: mpsc::Receiver<Result<Vec<u8>, ExchangeError>>,
}

impl ExchangeStream {
    /// The outbound frames as a `futures::Stream`, ready to become an
    /// HTTP response body
    pub fn into_frames(self) -> ReceiverStream<Result<Vec<u8>, ExchangeError>> {
        ReceiverStream::new(self.frames)
    }
}

/// Server-side orchestrator for the exchange endpoint
pub struct ExchangeOrchestrator {
    store: Arc<dyn ChatStore>,
    backend: Arc<dyn ChatBackend>,
    config: ExchangeConfig,
}

impl ExchangeOrchestrator {
    /// Create an orchestrator over a store and a backend
    pub fn new(
        store: Arc<dyn ChatStore>,
        backend: Arc<dyn ChatBackend>,
        config: ExchangeConfig,
    ) -> Self {
        Self {
            store,
            backend,
            config,
        }
    }

    /// Handle one exchange request
    ///
    /// # Errors
    ///
    /// - `Validation` for empty or oversized message content, before
    ///   any session mutation
    /// - `NotFound` when the session id is absent, malformed, or owned
    ///   by a different identity
    /// - `Upstream` when the backend stream fails to open
    pub async fn handle_exchange(
        &self,
        identity: &Identity,
        session_id: Option<SessionId>,
        message: &str,
    ) -> Result<ExchangeStream, ExchangeError> {
        validate_user_message(message)?;

        let (session_id, turns, minted) = match session_id {
            Some(id) => {
                let turns = self
                    .store
                    .append_turn(&id, identity, Role::User, message)
                    .await?;
                (id, turns, None)
            }
            None => {
                let session = self.store.create_session(identity, message).await?;
                let minted = session.id.clone();
                (session.id, session.turns, Some(minted))
            }
        };

        let window = select_window(&turns, self.config.history_token_budget);
        let mut request_turns = Vec::with_capacity(window.len() + 1);
        request_turns.push(Turn::system(self.config.system_prompt.clone()));
        request_turns.extend_from_slice(window);

        tracing::debug!(
            session = %session_id,
            history = turns.len(),
            window = window.len(),
            "opening backend stream"
        );

        let request = ChatRequest::new(self.config.model.clone(), request_turns);
        let tokens = self
            .backend
            .send_streaming(&request)
            .await
            .map_err(|e| ExchangeError::Upstream(e.to_string()))?;

        let hook = self.persistence_hook(session_id, identity.clone());
        let frames = multiplex(minted.clone(), tokens, hook);

        Ok(ExchangeStream {
            minted_session: minted,
            frames,
        })
    }

    /// Completion hook appending the assembled assistant turn
    fn persistence_hook(&self, session_id: SessionId, identity: Identity) -> CompletionHook {
        let store = Arc::clone(&self.store);
        Box::new(move |assembled: String| {
            Box::pin(async move {
                store
                    .append_turn(&session_id, &identity, Role::Assistant, &assembled)
                    .await
                    .map(|_| ())
                    .map_err(|e| ExchangeError::Persistence(e.to_string()))
            })
        })
    }
}

/// Validate an incoming user message before any mutation
fn validate_user_message(message: &str) -> Result<(), ExchangeError> {
    if message.is_empty() {
        return Err(ExchangeError::Validation("message is required".to_string()));
    }
    if message.chars().count() > MAX_USER_CONTENT_CHARS {
        return Err(ExchangeError::Validation(format!(
            "message must be at most {MAX_USER_CONTENT_CHARS} characters"
        )));
    }
    Ok(())
}
