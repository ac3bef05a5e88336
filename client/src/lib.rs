//! Parley Client
//!
//! Headless client library for the parley daemon:
//! - [`GenerationController`]: the message-composition state machine
//!   (single in-flight generation, route-change reconciliation)
//! - [`ExchangeClient`]: HTTP transport for the exchange and session
//!   endpoints, yielding a demultiplexed event stream
//! - [`run_exchange`]: the driver tying the two together
//!
//! A UI surface renders `pending_turns` plus `streaming_text` (or the
//! `notice` when the stream belongs to a session the user left) and
//! navigates wherever a settled outcome points.

pub mod controller;
pub mod exchange;

// Re-exports for convenience
pub use controller::{
    ExchangeOutcome, GenerationController, GenerationPhase, SubmitError, BUSY_ELSEWHERE_NOTICE,
};
pub use exchange::{drive_stream, run_exchange, ClientError, ExchangeClient, ExchangeEvents};
