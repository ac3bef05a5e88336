//! Chat Store
//!
//! Persistence collaborator for sessions. The store is treated as
//! externally synchronized: `append_turn` is atomic, so a reader never
//! observes a half-appended turn list.
//!
//! Ownership is enforced at this seam: every operation is scoped to the
//! calling identity, and a session that exists but belongs to someone
//! else is reported exactly like one that does not exist.

pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::session::{Identity, Role, Session, SessionId, SessionSummary, Turn};

pub use memory::MemoryStore;

/// Persistence operations for sessions
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Create a new session owned by `owner`, seeded with the first
    /// user turn; the title is derived from that content.
    async fn create_session(
        &self,
        owner: &Identity,
        first_user_content: &str,
    ) -> Result<Session, StoreError>;

    /// Atomically append a turn to an owned session
    ///
    /// Enforces the persisted-turn content invariants and returns the
    /// updated turn list. Fails with `NotFound` for absent, malformed,
    /// or foreign-owned session ids.
    async fn append_turn(
        &self,
        session_id: &SessionId,
        owner: &Identity,
        role: Role,
        content: &str,
    ) -> Result<Vec<Turn>, StoreError>;

    /// Fetch a full session, scoped to its owner
    async fn get_session(
        &self,
        session_id: &SessionId,
        owner: &Identity,
    ) -> Result<Session, StoreError>;

    /// List the caller's sessions, newest-first, messages excluded
    async fn list_sessions(&self, owner: &Identity) -> Result<Vec<SessionSummary>, StoreError>;
}
