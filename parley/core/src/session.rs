//! Conversation Data Model
//!
//! Sessions are named, owned conversations made of ordered turns.
//! A session is created on the first message of a conversation and is
//! only ever mutated by appending turns; deletion is handled outside
//! this core.
//!
//! # Design Philosophy
//!
//! The model is deliberately small: a `Turn` is a role plus content, a
//! `Session` is an owned ordered history. Everything the protocol layer
//! streams or persists is expressed in these types, so the store, the
//! backend and the client all speak the same vocabulary.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// Maximum length of a user turn, in characters
pub const MAX_USER_CONTENT_CHARS: usize = 200;

/// Maximum length of an assistant turn, in characters
pub const MAX_ASSISTANT_CONTENT_CHARS: usize = 150_000;

/// Maximum length of a derived session title, in characters
pub const MAX_TITLE_CHARS: usize = 80;

/// Who authored a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Synthesized instruction preamble, never persisted
    System,
    /// User input
    User,
    /// Model response
    Assistant,
}

/// One message in a conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who authored this turn
    pub role: Role,
    /// The turn content
    pub content: String,
}

impl Turn {
    /// Create a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Create a system turn
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Mint a new unique session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque caller identity, installed by the external auth layer
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(pub String);

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named, owned conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Unique session ID
    pub id: SessionId,
    /// The identity that created and exclusively owns this session
    pub owner: Identity,
    /// Title derived from the first user message
    pub title: String,
    /// Conversation history, oldest first
    pub turns: Vec<Turn>,
    /// When the session was created (Unix timestamp ms)
    pub created_at: u64,
}

impl Session {
    /// Create a new session from the first user message
    ///
    /// The title is derived from the first message, truncated to
    /// [`MAX_TITLE_CHARS`].
    pub fn new(owner: Identity, first_user_content: &str) -> Self {
        Self {
            id: SessionId::new(),
            owner,
            title: derive_title(first_user_content),
            turns: vec![Turn::user(first_user_content)],
            created_at: now_ms(),
        }
    }

    /// Append a turn to the history
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The list projection of this session (messages excluded)
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            title: self.title.clone(),
        }
    }
}

/// List projection of a session: id and title only
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session ID
    pub id: SessionId,
    /// Session title
    pub title: String,
}

/// Derive a session title from the first user message
fn derive_title(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= MAX_TITLE_CHARS {
        trimmed.to_string()
    } else {
        trimmed.chars().take(MAX_TITLE_CHARS).collect()
    }
}

/// Validate content against the persisted-turn invariants
///
/// Only user and assistant turns may be persisted; the system turn is
/// synthesized per request. Content must be non-empty and within the
/// per-role length limit.
pub fn validate_turn_content(role: Role, content: &str) -> Result<(), StoreError> {
    if content.is_empty() {
        return Err(StoreError::InvalidContent("content is required".to_string()));
    }
    match role {
        Role::User => {
            if content.chars().count() > MAX_USER_CONTENT_CHARS {
                return Err(StoreError::InvalidContent(format!(
                    "user content must be at most {MAX_USER_CONTENT_CHARS} characters"
                )));
            }
        }
        Role::Assistant => {
            if content.chars().count() > MAX_ASSISTANT_CONTENT_CHARS {
                return Err(StoreError::InvalidContent(format!(
                    "assistant content must be at most {MAX_ASSISTANT_CONTENT_CHARS} characters"
                )));
            }
        }
        Role::System => {
            return Err(StoreError::InvalidContent(
                "system turns are never persisted".to_string(),
            ));
        }
    }
    Ok(())
}

/// Get current timestamp in milliseconds
fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_session_id_unique() {
        let id1 = SessionId::new();
        let id2 = SessionId::new();
        assert_ne!(id1, id2);
        assert!(!id1.0.is_empty());
    }

    #[test]
    fn test_session_creation() {
        let session = Session::new(Identity("auth0|alice".to_string()), "Hello there");
        assert_eq!(session.title, "Hello there");
        assert_eq!(session.turns.len(), 1);
        assert_eq!(session.turns[0].role, Role::User);
        assert_eq!(session.turns[0].content, "Hello there");
    }

    #[test]
    fn test_title_truncation() {
        let long = "x".repeat(MAX_TITLE_CHARS * 2);
        let session = Session::new(Identity("auth0|alice".to_string()), &long);
        assert_eq!(session.title.chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_summary_excludes_turns() {
        let session = Session::new(Identity("auth0|alice".to_string()), "First question");
        let summary = session.summary();
        assert_eq!(summary.id, session.id);
        assert_eq!(summary.title, "First question");
    }

    #[test]
    fn test_validate_user_content_limit() {
        let at_limit = "x".repeat(MAX_USER_CONTENT_CHARS);
        assert!(validate_turn_content(Role::User, &at_limit).is_ok());

        let over_limit = "x".repeat(MAX_USER_CONTENT_CHARS + 1);
        assert!(validate_turn_content(Role::User, &over_limit).is_err());
    }

    #[test]
    fn test_validate_assistant_content_limit() {
        let at_limit = "x".repeat(MAX_ASSISTANT_CONTENT_CHARS);
        assert!(validate_turn_content(Role::Assistant, &at_limit).is_ok());

        let over_limit = "x".repeat(MAX_ASSISTANT_CONTENT_CHARS + 1);
        assert!(validate_turn_content(Role::Assistant, &over_limit).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_and_system() {
        assert!(validate_turn_content(Role::User, "").is_err());
        assert!(validate_turn_content(Role::System, "preamble").is_err());
    }

    #[test]
    fn test_role_serialization() {
        let turn = Turn::user("hi");
        let json = serde_json::to_string(&turn).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }
}
