//! Stream Events
//!
//! The typed events multiplexed into one response stream. Content
//! deltas carry the rendered message; control events carry out-of-band
//! signals that are not part of the message itself.

use serde::{Deserialize, Serialize};

use crate::session::SessionId;

/// One event in a response stream
///
/// At most one `SessionCreated` may appear per stream, always first,
/// and only when the request supplied no session id. Every other event
/// is a `ContentDelta` until the stream ends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A session was minted for this exchange; navigate here afterwards
    SessionCreated {
        /// The newly assigned session id
        id: SessionId,
    },

    /// An incremental fragment of the assistant response
    ContentDelta {
        /// The fragment text, in production order
        text: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_event_discriminator() {
        let delta = StreamEvent::ContentDelta {
            text: "hello".to_string(),
        };
        let json = serde_json::to_string(&delta).unwrap();
        assert_eq!(json, r#"{"event":"content_delta","data":{"text":"hello"}}"#);

        let created = StreamEvent::SessionCreated {
            id: SessionId("abc".to_string()),
        };
        let json = serde_json::to_string(&created).unwrap();
        assert_eq!(json, r#"{"event":"session_created","data":{"id":"abc"}}"#);
    }

    #[test]
    fn test_delta_text_round_trips_arbitrary_content() {
        let text = "line\nbreaks, {\"json\":1}, \u{1F980} and \0 nulls";
        let event = StreamEvent::ContentDelta {
            text: text.to_string(),
        };
        let json = serde_json::to_vec(&event).unwrap();
        let back: StreamEvent = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, event);
    }
}
