//! Stream Demultiplexer
//!
//! Client-side counterpart of the multiplexer: parses the outbound byte
//! stream back into a typed event sequence.
//!
//! # Design Philosophy
//!
//! The demultiplexer is a pull-based lazy sequence, not a callback
//! loop: the consumer awaits one event at a time and can drop the
//! demultiplexer to cancel. Transport chunking is fully decoupled from
//! event boundaries - a frame may arrive split across any number of
//! chunks, and one chunk may carry many frames.
//!
//! Malformed or truncated trailing data is treated as end-of-stream for
//! the events already emitted; it never panics the consumer. A
//! transport-level failure is surfaced as an error item so the consumer
//! can tell an aborted stream from a completed one.

use std::fmt;

use futures::{Stream, StreamExt};

use crate::error::ProtocolError;
use crate::protocol::events::StreamEvent;
use crate::protocol::frame::FrameDecoder;

/// Incremental parser turning a chunked byte transport into events
pub struct StreamDemultiplexer<S> {
    transport: S,
    decoder: FrameDecoder,
    finished: bool,
}

impl<S, B, E> StreamDemultiplexer<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    /// Wrap a chunked byte transport
    pub fn new(transport: S) -> Self {
        Self {
            transport,
            decoder: FrameDecoder::new(),
            finished: false,
        }
    }

    /// Await the next event
    ///
    /// Returns `None` when the transport has closed (including after
    /// undecodable trailing bytes), or `Some(Err(..))` exactly once if
    /// the transport itself failed mid-stream.
    pub async fn next_event(&mut self) -> Option<Result<StreamEvent, ProtocolError>> {
        if self.finished {
            return None;
        }

        loop {
            match self.decoder.next_frame() {
                Ok(Some(event)) => return Some(Ok(event)),
                Ok(None) => {}
                Err(e) => {
                    // Once framing is corrupt no later boundary can be
                    // trusted; end the sequence with what was emitted.
                    self.finished = true;
                    tracing::warn!(error = %e, "discarding undecodable stream remainder");
                    return None;
                }
            }

            match self.transport.next().await {
                Some(Ok(chunk)) => self.decoder.push(chunk.as_ref()),
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(ProtocolError::Transport(e.to_string())));
                }
                None => {
                    self.finished = true;
                    if self.decoder.has_partial_frame() {
                        tracing::warn!("stream ended with a truncated trailing frame");
                    }
                    return None;
                }
            }
        }
    }

    /// Convert into a `futures::Stream` of events
    pub fn into_stream(self) -> impl Stream<Item = Result<StreamEvent, ProtocolError>> {
        futures::stream::unfold(self, |mut demux| async move {
            demux.next_event().await.map(|item| (item, demux))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::encode_event;
    use crate::session::SessionId;
    use pretty_assertions::assert_eq;

    type Chunk = Result<Vec<u8>, String>;

    fn ok_chunks(chunks: Vec<Vec<u8>>) -> impl Stream<Item = Chunk> + Unpin {
        futures::stream::iter(chunks.into_iter().map(Ok))
    }

    fn sample_events() -> Vec<StreamEvent> {
        vec![
            StreamEvent::SessionCreated {
                id: SessionId("s-42".to_string()),
            },
            StreamEvent::ContentDelta {
                text: "Hello".to_string(),
            },
            StreamEvent::ContentDelta {
                text: ", world".to_string(),
            },
        ]
    }

    fn encode_all(events: &[StreamEvent]) -> Vec<u8> {
        events
            .iter()
            .flat_map(|e| encode_event(e).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_one_chunk_many_frames() {
        let events = sample_events();
        let bytes = encode_all(&events);

        let mut demux = StreamDemultiplexer::new(ok_chunks(vec![bytes]));
        let mut decoded = Vec::new();
        while let Some(item) = demux.next_event().await {
            decoded.push(item.unwrap());
        }
        assert_eq!(decoded, events);
    }

    #[tokio::test]
    async fn test_frames_split_across_chunk_boundaries() {
        let events = sample_events();
        let bytes = encode_all(&events);

        // Deliver in awkward 5-byte chunks
        let chunks: Vec<Vec<u8>> = bytes.chunks(5).map(<[u8]>::to_vec).collect();
        let mut demux = StreamDemultiplexer::new(ok_chunks(chunks));

        let mut decoded = Vec::new();
        while let Some(item) = demux.next_event().await {
            decoded.push(item.unwrap());
        }
        assert_eq!(decoded, events);
    }

    #[tokio::test]
    async fn test_truncated_trailing_frame_is_end_of_stream() {
        let events = sample_events();
        let mut bytes = encode_all(&events);
        // Append half of another frame
        let extra = encode_event(&StreamEvent::ContentDelta {
            text: "lost".to_string(),
        })
        .unwrap();
        bytes.extend_from_slice(&extra[..extra.len() / 2]);

        let mut demux = StreamDemultiplexer::new(ok_chunks(vec![bytes]));
        let mut decoded = Vec::new();
        while let Some(item) = demux.next_event().await {
            decoded.push(item.unwrap());
        }
        // The complete events were all emitted; the remainder vanished.
        assert_eq!(decoded, events);
    }

    #[tokio::test]
    async fn test_garbage_remainder_does_not_panic() {
        let events = sample_events();
        let mut bytes = encode_all(&events);
        // A corrupted length prefix claiming an absurd frame
        bytes.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0]);

        let mut demux = StreamDemultiplexer::new(ok_chunks(vec![bytes]));
        let mut decoded = Vec::new();
        while let Some(item) = demux.next_event().await {
            match item {
                Ok(event) => decoded.push(event),
                Err(e) => panic!("corrupt remainder must end the stream, got {e}"),
            }
        }
        assert_eq!(decoded, events);
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_once() {
        let events = sample_events();
        let bytes = encode_all(&events[..2]);

        let chunks: Vec<Chunk> = vec![Ok(bytes), Err("connection reset".to_string())];
        let mut demux = StreamDemultiplexer::new(futures::stream::iter(chunks));

        assert_eq!(demux.next_event().await.unwrap().unwrap(), events[0]);
        assert_eq!(demux.next_event().await.unwrap().unwrap(), events[1]);
        assert!(matches!(
            demux.next_event().await,
            Some(Err(ProtocolError::Transport(_)))
        ));
        assert!(demux.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_into_stream_yields_same_sequence() {
        let events = sample_events();
        let bytes = encode_all(&events);

        let demux = StreamDemultiplexer::new(ok_chunks(vec![bytes]));
        let decoded: Vec<StreamEvent> = demux
            .into_stream()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(decoded, events);
    }
}
