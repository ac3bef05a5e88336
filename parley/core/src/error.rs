//! Error Taxonomy
//!
//! Typed errors for the exchange pipeline. Validation and lookup
//! failures terminate a request before any streaming begins; upstream
//! and persistence failures are reported where the stream allows.
//!
//! `NotFound` deliberately covers both "no such session" and "owned by
//! someone else" so a response never reveals whether another identity's
//! session exists.

use thiserror::Error;

/// Errors from the persistence collaborator
#[derive(Debug, Error)]
pub enum StoreError {
    /// Session absent, malformed, or not owned by the caller
    #[error("session not found")]
    NotFound,

    /// Content violates a persisted-turn invariant
    #[error("invalid content: {0}")]
    InvalidContent(String),
}

/// Errors surfaced by an exchange
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Bad, missing, or oversized request content
    #[error("invalid message: {0}")]
    Validation(String),

    /// Session absent or not owned by the caller
    #[error("session not found")]
    NotFound,

    /// Backend stream failed to open or failed mid-stream
    #[error("backend stream failed: {0}")]
    Upstream(String),

    /// Post-stream persistence of the assistant turn failed
    #[error("failed to persist assistant turn: {0}")]
    Persistence(String),
}

impl From<StoreError> for ExchangeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::InvalidContent(msg) => Self::Validation(msg),
        }
    }
}

/// Errors from the wire protocol layer
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A frame exceeded the maximum allowed size
    #[error("frame of {size} bytes exceeds maximum {max}")]
    FrameTooLarge {
        /// Claimed or actual payload size
        size: usize,
        /// Enforced maximum
        max: usize,
    },

    /// Frame checksum verification failed - corruption in transit
    #[error("frame checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Checksum carried in the frame header
        expected: u32,
        /// Checksum computed over the received payload
        actual: u32,
    },

    /// Frame payload did not decode as a stream event
    #[error("malformed frame payload: {0}")]
    MalformedPayload(String),

    /// The underlying transport failed mid-stream
    #[error("transport failed: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_maps_into_exchange_error() {
        assert!(matches!(
            ExchangeError::from(StoreError::NotFound),
            ExchangeError::NotFound
        ));
        assert!(matches!(
            ExchangeError::from(StoreError::InvalidContent("too long".to_string())),
            ExchangeError::Validation(_)
        ));
    }

    #[test]
    fn test_not_found_message_does_not_leak_ownership() {
        // Absent and foreign-owned sessions must render identically.
        assert_eq!(
            StoreError::NotFound.to_string(),
            ExchangeError::NotFound.to_string()
        );
    }
}
