//! In-Memory Store
//!
//! Reference `ChatStore` backed by a concurrent map. Each session lives
//! in one map entry, and appends mutate the entry under its shard lock,
//! which gives the atomic append semantics the contract requires.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StoreError;
use crate::session::{
    validate_turn_content, Identity, Role, Session, SessionId, SessionSummary, Turn,
};
use crate::store::ChatStore;

/// One stored session plus its creation sequence number
struct Entry {
    session: Session,
    seq: u64,
}

/// Concurrent in-memory session store
#[derive(Default)]
pub struct MemoryStore {
    sessions: DashMap<SessionId, Entry>,
    /// Monotonic creation counter, used for newest-first listing
    next_seq: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions (all identities)
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn create_session(
        &self,
        owner: &Identity,
        first_user_content: &str,
    ) -> Result<Session, StoreError> {
        validate_turn_content(Role::User, first_user_content)?;

        let session = Session::new(owner.clone(), first_user_content);
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let id = session.id.clone();

        self.sessions.insert(
            id,
            Entry {
                session: session.clone(),
                seq,
            },
        );

        Ok(session)
    }

    async fn append_turn(
        &self,
        session_id: &SessionId,
        owner: &Identity,
        role: Role,
        content: &str,
    ) -> Result<Vec<Turn>, StoreError> {
        validate_turn_content(role, content)?;

        let mut entry = self
            .sessions
            .get_mut(session_id)
            .ok_or(StoreError::NotFound)?;

        if entry.session.owner != *owner {
            return Err(StoreError::NotFound);
        }

        entry.session.append(Turn {
            role,
            content: content.to_string(),
        });

        Ok(entry.session.turns.clone())
    }

    async fn get_session(
        &self,
        session_id: &SessionId,
        owner: &Identity,
    ) -> Result<Session, StoreError> {
        let entry = self.sessions.get(session_id).ok_or(StoreError::NotFound)?;

        if entry.session.owner != *owner {
            return Err(StoreError::NotFound);
        }

        Ok(entry.session.clone())
    }

    async fn list_sessions(&self, owner: &Identity) -> Result<Vec<SessionSummary>, StoreError> {
        let mut owned: Vec<(u64, SessionSummary)> = self
            .sessions
            .iter()
            .filter(|entry| entry.session.owner == *owner)
            .map(|entry| (entry.seq, entry.session.summary()))
            .collect();

        // Newest first by creation order
        owned.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(owned.into_iter().map(|(_, summary)| summary).collect())
    }
}
