//! Wire Protocol
//!
//! Typed events multiplexed into a single self-delimiting byte stream:
//! - `events`: the `StreamEvent` tagged union (content vs. control)
//! - `frame`: length-prefixed JSON frames with CRC32 integrity
//! - `mux`: server side - token stream in, framed bytes out, with a
//!   completion hook for post-stream persistence
//! - `demux`: client side - framed bytes in, lazy event sequence out

pub mod demux;
pub mod events;
pub mod frame;
pub mod mux;

// Re-exports for convenience
pub use demux::StreamDemultiplexer;
pub use events::StreamEvent;
pub use frame::{encode_event, FrameDecoder, MAX_FRAME_SIZE};
pub use mux::{multiplex, CompletionHook};
