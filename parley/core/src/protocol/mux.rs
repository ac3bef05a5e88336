//! Stream Multiplexer
//!
//! Wraps the backend's raw token stream into one outbound byte stream
//! of framed events, interleaving control events with content deltas.
//!
//! The multiplexer is an explicit two-phase pipeline:
//!
//! 1. **Streaming phase** - an optional `SessionCreated` frame is sent
//!    before any content, then every backend fragment is framed as a
//!    `ContentDelta` in arrival order while the full concatenation is
//!    accumulated.
//! 2. **Completion phase** - runs exactly once when the source is
//!    exhausted: the outbound channel is closed and the completion hook
//!    receives the assembled text for persistence.
//!
//! A client that stops reading does not stop the pipeline: the backend
//! is drained to the end and the completion phase still runs, so the
//! assistant turn is persisted even after the consumer walked away. A
//! backend error terminates the stream and skips the completion phase
//! entirely; nothing partial is persisted.

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::backend::StreamingToken;
use crate::error::ExchangeError;
use crate::protocol::events::StreamEvent;
use crate::protocol::frame::encode_event;
use crate::session::SessionId;

/// Hook invoked exactly once with the fully assembled response text
///
/// Failure is logged by the multiplexer; it cannot affect bytes that
/// have already been delivered.
pub type CompletionHook =
    Box<dyn FnOnce(String) -> BoxFuture<'static, Result<(), ExchangeError>> + Send>;

/// Outbound frame channel capacity
const FRAME_CHANNEL_CAPACITY: usize = 64;

/// Multiplex a backend token stream into framed bytes
///
/// `minted` carries the id of a session created for this exchange, if
/// any; it is emitted as the first frame. The returned receiver yields
/// encoded frames in production order and closes when the stream is
/// complete. A mid-stream backend failure is delivered as an `Err`
/// item, after which the channel closes without running `on_complete`.
pub fn multiplex(
    minted: Option<SessionId>,
    tokens: mpsc::Receiver<StreamingToken>,
    on_complete: CompletionHook,
) -> mpsc::Receiver<Result<Vec<u8>, ExchangeError>> {
    let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    tokio::spawn(run(minted, tokens, on_complete, tx));
    rx
}

async fn run(
    minted: Option<SessionId>,
    mut tokens: mpsc::Receiver<StreamingToken>,
    on_complete: CompletionHook,
    tx: mpsc::Sender<Result<Vec<u8>, ExchangeError>>,
) {
    let mut assembled = String::new();
    let mut receiver_gone = false;
    let mut failed = false;

    if let Some(id) = minted {
        receiver_gone = !send_frame(&tx, &StreamEvent::SessionCreated { id }).await;
    }

    while let Some(token) = tokens.recv().await {
        match token {
            StreamingToken::Token(text) => {
                assembled.push_str(&text);
                if !receiver_gone {
                    let delivered = send_frame(&tx, &StreamEvent::ContentDelta { text }).await;
                    if !delivered {
                        receiver_gone = true;
                        tracing::debug!("client stopped reading; draining backend to completion");
                    }
                }
            }

            StreamingToken::Complete { .. } => break,

            StreamingToken::Error(error) => {
                failed = true;
                tracing::warn!(error = %error, "backend stream failed mid-response");
                if !receiver_gone {
                    let _ = tx.send(Err(ExchangeError::Upstream(error))).await;
                }
                break;
            }
        }
    }

    // Close the outbound stream before persisting: completion must not
    // keep the client waiting, and persistence failure cannot affect
    // bytes already delivered.
    drop(tx);

    if failed {
        return;
    }

    if let Err(e) = on_complete(assembled).await {
        tracing::error!(error = %e, "post-stream persistence failed");
    }
}

/// Encode and send one frame; returns false once the receiver is gone
async fn send_frame(
    tx: &mpsc::Sender<Result<Vec<u8>, ExchangeError>>,
    event: &StreamEvent,
) -> bool {
    match encode_event(event) {
        Ok(bytes) => tx.send(Ok(bytes)).await.is_ok(),
        Err(e) => {
            // A single delta cannot legitimately exceed the frame cap;
            // treat encoding failure as a dead stream.
            tracing::error!(error = %e, "failed to encode outbound frame");
            false
        }
    }
}
