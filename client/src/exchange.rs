//! Exchange Client
//!
//! Thin HTTP client for the daemon's exchange and session endpoints,
//! plus the driver loop that feeds a demultiplexed stream into a
//! [`GenerationController`].
//!
//! The client is headless: it owns no rendering, only the transport.
//! A UI surface wires its input box to [`run_exchange`] and its view to
//! the controller's accessors.

use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use thiserror::Error;

use parley_core::{
    Identity, Session, SessionId, SessionSummary, StreamDemultiplexer,
};

use crate::controller::{ExchangeOutcome, GenerationController, SubmitError};

/// Demultiplexed event stream over the exchange response body
pub type ExchangeEvents =
    StreamDemultiplexer<BoxStream<'static, Result<Vec<u8>, reqwest::Error>>>;

/// Errors from the exchange client
#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected at the submission boundary, before any request
    #[error(transparent)]
    Submit(#[from] SubmitError),

    /// Transport-level failure
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The daemon rejected the exchange before streaming
    #[error("exchange rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Server-provided message
        message: String,
    },
}

/// Exchange request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeBody<'a> {
    session_id: Option<&'a SessionId>,
    message: &'a str,
}

/// HTTP client for the parley daemon
pub struct ExchangeClient {
    base_url: String,
    identity: Identity,
    http: reqwest::Client,
}

impl ExchangeClient {
    /// Create a client for the daemon at `base_url` (no trailing slash)
    pub fn new(base_url: impl Into<String>, identity: Identity) -> Self {
        Self {
            base_url: base_url.into(),
            identity,
            http: reqwest::Client::new(),
        }
    }

    fn exchange_url(&self) -> String {
        format!("{}/api/exchange", self.base_url)
    }

    fn sessions_url(&self) -> String {
        format!("{}/api/sessions", self.base_url)
    }

    /// Open an exchange and return the demultiplexed event stream
    ///
    /// Non-2xx responses are decoded into [`ClientError::Rejected`]
    /// before a single event is emitted.
    pub async fn open_exchange(
        &self,
        session_id: Option<&SessionId>,
        message: &str,
    ) -> Result<ExchangeEvents, ClientError> {
        let response = self
            .http
            .post(self.exchange_url())
            .header("x-parley-identity", &self.identity.0)
            .json(&ExchangeBody {
                session_id,
                message,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or_else(|| "an error occurred".to_string());
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let transport = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Ok(StreamDemultiplexer::new(transport))
    }

    /// List the caller's sessions, newest first
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, ClientError> {
        let response = self
            .http
            .get(self.sessions_url())
            .header("x-parley-identity", &self.identity.0)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Fetch a full session, including its turns
    pub async fn fetch_session(&self, id: &SessionId) -> Result<Session, ClientError> {
        let response = self
            .http
            .get(format!("{}/{}", self.sessions_url(), id))
            .header("x-parley-identity", &self.identity.0)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

/// Run one full exchange cycle through a controller
///
/// Submits at the controller boundary (enforcing the single-in-flight
/// rule), opens the stream, drives every event into the machine, and
/// settles it. The returned outcome says what to render and where to
/// navigate.
pub async fn run_exchange(
    client: &ExchangeClient,
    controller: &mut GenerationController,
    message: &str,
) -> Result<ExchangeOutcome, ClientError> {
    controller.submit(message)?;
    let session_id = controller.submitted_against().cloned();

    let mut events = match client.open_exchange(session_id.as_ref(), message).await {
        Ok(events) => events,
        Err(e) => {
            controller.stream_failed();
            return Err(e);
        }
    };

    controller.stream_opened();
    Ok(drive_stream(controller, &mut events).await)
}

/// Feed a demultiplexed stream into the controller until it settles
///
/// An abrupt transport failure settles the machine as failed; a clean
/// end settles it normally. Either way the machine ends up `Settled`.
pub async fn drive_stream<S, B, E>(
    controller: &mut GenerationController,
    events: &mut StreamDemultiplexer<S>,
) -> ExchangeOutcome
where
    S: futures::Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    loop {
        match events.next_event().await {
            Some(Ok(event)) => controller.handle_event(event),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "exchange stream aborted");
                return controller.stream_failed();
            }
            None => return controller.stream_ended(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::protocol::{encode_event, StreamEvent};
    use parley_core::Turn;
    use pretty_assertions::assert_eq;

    type Chunk = Result<Vec<u8>, String>;

    fn frames(events: &[StreamEvent]) -> Vec<u8> {
        events
            .iter()
            .flat_map(|e| encode_event(e).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_drive_stream_settles_a_new_session_exchange() {
        let minted = SessionId("fresh".to_string());
        let bytes = frames(&[
            StreamEvent::SessionCreated { id: minted.clone() },
            StreamEvent::ContentDelta { text: "Hel".to_string() },
            StreamEvent::ContentDelta { text: "lo!".to_string() },
        ]);
        let chunks: Vec<Chunk> = bytes.chunks(7).map(|c| Ok(c.to_vec())).collect();
        let mut events = StreamDemultiplexer::new(futures::stream::iter(chunks));

        let mut controller = GenerationController::new(None);
        controller.submit("hi").unwrap();
        controller.stream_opened();

        let outcome = drive_stream(&mut controller, &mut events).await;
        assert_eq!(outcome.navigate_to, Some(minted));
        assert_eq!(outcome.assistant_turn, Some(Turn::assistant("Hello!")));
        assert!(!outcome.failed);
    }

    #[tokio::test]
    async fn test_drive_stream_settles_failure_on_abrupt_end() {
        let bytes = frames(&[StreamEvent::ContentDelta {
            text: "partial".to_string(),
        }]);
        let chunks: Vec<Chunk> = vec![Ok(bytes), Err("connection reset".to_string())];
        let mut events = StreamDemultiplexer::new(futures::stream::iter(chunks));

        let mut controller = GenerationController::new(None);
        controller.submit("hi").unwrap();
        controller.stream_opened();

        let outcome = drive_stream(&mut controller, &mut events).await;
        assert!(outcome.failed);
        assert_eq!(outcome.assistant_turn, None);
        // The optimistic user turn survives the failure
        assert_eq!(controller.pending_turns().len(), 1);
    }

    #[test]
    fn test_exchange_body_wire_shape() {
        let id = SessionId("abc".to_string());
        let body = ExchangeBody {
            session_id: Some(&id),
            message: "hi",
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"sessionId":"abc","message":"hi"}"#);

        let body = ExchangeBody {
            session_id: None,
            message: "hi",
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"sessionId":null,"message":"hi"}"#);
    }
}
