//! Generation Controller
//!
//! Client-side state machine owning the lifecycle of one message
//! exchange: `Idle -> Submitting -> Streaming -> Settled -> Idle`.
//!
//! # Design Philosophy
//!
//! The lifecycle lives in a single tagged phase instead of a pile of
//! independent booleans, so impossible combinations ("generating but
//! also accepting input") cannot be represented. Transitions are the
//! only mutation path.
//!
//! Two invariants are enforced here:
//!
//! - **Single in-flight generation**: while a submission is in flight,
//!   further submissions are rejected at the boundary, never queued.
//! - **Route-change reconciliation**: if the displayed session changes
//!   mid-stream, incoming deltas are no longer attributed to the new
//!   view; the view gets a "busy elsewhere" notice and the stale
//!   buffer is discarded when the stream settles.

use thiserror::Error;

use parley_core::{
    protocol::StreamEvent, SessionId, Turn, MAX_USER_CONTENT_CHARS,
};

/// Notice shown when a generation finishes streaming against a view
/// the user has navigated away from
pub const BUSY_ELSEWHERE_NOTICE: &str =
    "A response is still streaming in another conversation; wait for it to finish before sending a new message.";

/// Lifecycle phase of the current exchange cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationPhase {
    /// Ready for a submission
    Idle,
    /// Request sent, stream not yet open
    Submitting,
    /// Consuming stream events
    Streaming,
    /// Stream finished; outcome delivered, awaiting acknowledge
    Settled,
}

/// Rejection reasons at the submission boundary
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// A generation is already in flight; the submission is not queued
    #[error("a generation is already in flight")]
    GenerationInFlight,

    /// Empty message
    #[error("message is required")]
    EmptyMessage,

    /// Message exceeds the user content limit
    #[error("message must be at most {MAX_USER_CONTENT_CHARS} characters")]
    MessageTooLong,
}

/// What one settled exchange produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeOutcome {
    /// The finalized assistant turn; `None` if the exchange failed or
    /// settled against a view the user left
    pub assistant_turn: Option<Turn>,
    /// Session address to navigate to (set when the exchange minted one)
    pub navigate_to: Option<SessionId>,
    /// The stream ended abruptly without completing
    pub failed: bool,
    /// The displayed session changed while streaming
    pub displaced: bool,
}

/// Client-side state machine for message composition
#[derive(Debug)]
pub struct GenerationController {
    phase: GenerationPhase,
    /// Session currently shown by the UI surface
    displayed_session: Option<SessionId>,
    /// Session the in-flight submission was issued against
    submitted_against: Option<SessionId>,
    /// Optimistic local turns for the displayed session
    pending_turns: Vec<Turn>,
    /// Incrementally assembled assistant buffer
    assembled: String,
    /// Session id minted by the server mid-stream, if any
    minted_session: Option<SessionId>,
    /// The last settle was a failure
    failed: bool,
}

impl GenerationController {
    /// Create a controller for the given displayed session
    pub fn new(displayed_session: Option<SessionId>) -> Self {
        Self {
            phase: GenerationPhase::Idle,
            displayed_session,
            submitted_against: None,
            pending_turns: Vec::new(),
            assembled: String::new(),
            minted_session: None,
            failed: false,
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> GenerationPhase {
        self.phase
    }

    /// Whether a generation is in flight (input must stay disabled)
    pub fn in_flight(&self) -> bool {
        matches!(
            self.phase,
            GenerationPhase::Submitting | GenerationPhase::Streaming
        )
    }

    /// The session the in-flight submission targets
    pub fn submitted_against(&self) -> Option<&SessionId> {
        self.submitted_against.as_ref()
    }

    /// Optimistic local turns for the displayed session
    pub fn pending_turns(&self) -> &[Turn] {
        &self.pending_turns
    }

    /// Whether the in-flight stream belongs to a session the user left
    pub fn displaced(&self) -> bool {
        self.in_flight() && self.displayed_session != self.submitted_against
    }

    /// The incremental assistant text the view may render
    ///
    /// `None` unless actively streaming against the displayed session.
    pub fn streaming_text(&self) -> Option<&str> {
        if self.phase == GenerationPhase::Streaming && !self.displaced() {
            Some(&self.assembled)
        } else {
            None
        }
    }

    /// Notice to surface instead of partial content, if any
    pub fn notice(&self) -> Option<&'static str> {
        if self.displaced() {
            Some(BUSY_ELSEWHERE_NOTICE)
        } else {
            None
        }
    }

    /// Submit a message, beginning a new exchange cycle
    ///
    /// Rejected while a generation is in flight (never queued) and for
    /// content that would fail server validation anyway.
    pub fn submit(&mut self, text: &str) -> Result<(), SubmitError> {
        if self.in_flight() {
            return Err(SubmitError::GenerationInFlight);
        }
        if text.is_empty() {
            return Err(SubmitError::EmptyMessage);
        }
        if text.chars().count() > MAX_USER_CONTENT_CHARS {
            return Err(SubmitError::MessageTooLong);
        }

        if self.phase == GenerationPhase::Settled {
            self.acknowledge();
        }

        self.pending_turns.push(Turn::user(text));
        self.submitted_against = self.displayed_session.clone();
        self.assembled.clear();
        self.minted_session = None;
        self.failed = false;
        self.phase = GenerationPhase::Submitting;
        Ok(())
    }

    /// The response stream opened; begin consuming events
    pub fn stream_opened(&mut self) {
        if self.phase == GenerationPhase::Submitting {
            self.phase = GenerationPhase::Streaming;
        }
    }

    /// Feed one stream event into the machine
    pub fn handle_event(&mut self, event: StreamEvent) {
        if self.phase != GenerationPhase::Streaming {
            return;
        }
        match event {
            StreamEvent::SessionCreated { id } => {
                // Recorded for post-stream navigation; displayed
                // content is unaffected.
                self.minted_session = Some(id);
            }
            StreamEvent::ContentDelta { text } => {
                self.assembled.push_str(&text);
            }
        }
    }

    /// The stream completed normally
    pub fn stream_ended(&mut self) -> ExchangeOutcome {
        let displaced = self.displaced();
        self.phase = GenerationPhase::Settled;

        let assistant_turn = if displaced {
            // Stale buffer: never attribute it to the new view
            self.assembled.clear();
            None
        } else {
            let turn = Turn::assistant(std::mem::take(&mut self.assembled));
            self.pending_turns.push(turn.clone());
            Some(turn)
        };

        ExchangeOutcome {
            assistant_turn,
            navigate_to: self.minted_session.clone(),
            failed: false,
            displaced,
        }
    }

    /// The stream ended abruptly without completing
    ///
    /// Partial content is discarded; the optimistic user turn stays
    /// visible so the user can see what went unanswered.
    pub fn stream_failed(&mut self) -> ExchangeOutcome {
        let displaced = self.displaced();
        self.phase = GenerationPhase::Settled;
        self.failed = true;
        self.assembled.clear();

        ExchangeOutcome {
            assistant_turn: None,
            navigate_to: None,
            failed: true,
            displaced,
        }
    }

    /// Whether the last settled exchange failed
    pub fn last_failed(&self) -> bool {
        self.failed
    }

    /// Clear the settled state, returning to idle
    pub fn acknowledge(&mut self) {
        if self.phase == GenerationPhase::Settled {
            self.phase = GenerationPhase::Idle;
            self.assembled.clear();
            self.minted_session = None;
            self.submitted_against = None;
        }
    }

    /// The displayed session changed (navigation)
    ///
    /// Mid-flight, the exchange keeps running against its original
    /// session while the new view starts clean. Otherwise the whole
    /// ephemeral state resets.
    pub fn session_changed(&mut self, new_session: Option<SessionId>) {
        self.displayed_session = new_session;
        self.pending_turns.clear();

        if !self.in_flight() {
            self.phase = GenerationPhase::Idle;
            self.assembled.clear();
            self.minted_session = None;
            self.submitted_against = None;
            self.failed = false;
        }
    }
}
