//! Coordinator state machine phases and the shared observable state.
//!
//! [`Phase`] is the single authoritative state value of the turn
//! coordinator; every transition reads and writes it, so contradictory flag
//! combinations ("listening" with no open capture) cannot exist.
//!
//! [`StatusState`] is the status/error feed: exactly one of the two strings
//! is non-empty at any time.  Setting one clears the other.
//!
//! [`AssistantState`] is the single source of truth for everything a
//! presentation layer needs: current phase, the status/error feed, and the
//! last transcript/reply.  [`SharedState`] (`Arc<Mutex<AssistantState>>`) is
//! cheap to clone and safe to share; the coordinator is its only writer.

use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Phases of one conversational turn.
///
/// The transitions are:
///
/// ```text
/// Idle ──start──▶ AwaitingSession ──session ready──▶ Listening
///                                 ──creation fails─▶ Error
/// Listening ──final transcript──▶ Dispatching
///           ──capture error────▶ Error
///           ──capture ends─────▶ Idle
/// Dispatching ──reply──▶ Speaking      ──failure──▶ Error
/// Speaking ──playback ends──▶ Listening (capture open) / Idle
///          ──playback error─▶ Error
/// any phase ──reset──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Resting; nothing in flight.  Initial phase and the phase after a
    /// clean completion.
    Idle,

    /// A turn was started but the dialogue session is still being created.
    AwaitingSession,

    /// Capture is open and the user may speak.
    Listening,

    /// A final transcript is on its way to the dialogue service.
    Dispatching,

    /// The reply is being voiced.
    Speaking,

    /// The current turn failed.  Terminal for the turn only — the next
    /// start attempt proceeds from here as it would from `Idle`.
    Error,
}

impl Phase {
    /// Returns `true` while a turn is in flight and a new start request
    /// must be rejected rather than queued.
    ///
    /// `Listening` is deliberately not "busy": a start while listening is a
    /// friendly no-op, not a rejection.
    ///
    /// ```
    /// use voice_companion::coordinator::Phase;
    ///
    /// assert!(!Phase::Idle.is_busy());
    /// assert!(Phase::AwaitingSession.is_busy());
    /// assert!(!Phase::Listening.is_busy());
    /// assert!(Phase::Dispatching.is_busy());
    /// assert!(Phase::Speaking.is_busy());
    /// assert!(!Phase::Error.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(self, Phase::AwaitingSession | Phase::Dispatching | Phase::Speaking)
    }

    /// A short human-readable label suitable for display.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::AwaitingSession => "Connecting",
            Phase::Listening => "Listening",
            Phase::Dispatching => "Thinking",
            Phase::Speaking => "Speaking",
            Phase::Error => "Error",
        }
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Idle
    }
}

// ---------------------------------------------------------------------------
// StatusState
// ---------------------------------------------------------------------------

/// The mutually exclusive status/error pair.
///
/// Invariant: at most one of `status` / `error` is non-empty.  The setters
/// are the only way to write, so the invariant holds for all reachable
/// states.
#[derive(Debug, Clone, Default)]
pub struct StatusState {
    status: String,
    error: String,
}

impl StatusState {
    /// Publish a status message, clearing any error.
    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status = msg.into();
        self.error.clear();
    }

    /// Publish an error message, clearing any status.
    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.error = msg.into();
        self.status.clear();
    }

    /// Clear the error without publishing a new status.  Both strings may
    /// be empty at once; never both non-empty.
    pub fn clear_error(&mut self) {
        self.error.clear();
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }
}

// ---------------------------------------------------------------------------
// AssistantState
// ---------------------------------------------------------------------------

/// Shared observable state — everything the presentation layer reads.
#[derive(Debug, Default)]
pub struct AssistantState {
    /// Current phase of the turn coordinator.
    pub phase: Phase,

    /// Status/error feed (mutually exclusive strings).
    pub feedback: StatusState,

    /// The most recent final transcript sent to the dialogue service.
    pub last_transcript: Option<String>,

    /// The most recent reply received from the dialogue service.
    pub last_reply: Option<String>,
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AssistantState`].
///
/// Cheap to clone (`Arc` clone).  Lock with `.lock().unwrap()` for a short
/// critical section; do **not** hold the lock across `.await` points.
pub type SharedState = Arc<Mutex<AssistantState>>;

/// Construct a new [`SharedState`] with the initial resting status.
pub fn new_shared_state() -> SharedState {
    let mut state = AssistantState::default();
    state.feedback.set_status("Inactive. Press Start.");
    Arc::new(Mutex::new(state))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Phase ---

    #[test]
    fn default_phase_is_idle() {
        assert_eq!(Phase::default(), Phase::Idle);
    }

    #[test]
    fn busy_phases() {
        assert!(!Phase::Idle.is_busy());
        assert!(Phase::AwaitingSession.is_busy());
        assert!(!Phase::Listening.is_busy());
        assert!(Phase::Dispatching.is_busy());
        assert!(Phase::Speaking.is_busy());
        assert!(!Phase::Error.is_busy());
    }

    #[test]
    fn labels_are_distinct() {
        let labels = [
            Phase::Idle.label(),
            Phase::AwaitingSession.label(),
            Phase::Listening.label(),
            Phase::Dispatching.label(),
            Phase::Speaking.label(),
            Phase::Error.label(),
        ];
        for (i, a) in labels.iter().enumerate() {
            for b in labels.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    // ---- StatusState mutual exclusion ---

    #[test]
    fn setting_status_clears_error() {
        let mut feed = StatusState::default();
        feed.set_error("boom");
        assert!(feed.has_error());
        assert!(feed.status().is_empty());

        feed.set_status("listening");
        assert_eq!(feed.status(), "listening");
        assert!(feed.error().is_empty());
    }

    #[test]
    fn setting_error_clears_status() {
        let mut feed = StatusState::default();
        feed.set_status("listening");

        feed.set_error("boom");
        assert_eq!(feed.error(), "boom");
        assert!(feed.status().is_empty());
    }

    /// The invariant holds for any interleaving of writes.
    #[test]
    fn exclusion_holds_across_interleavings() {
        let mut feed = StatusState::default();
        let writes = ["s1", "e1", "e2", "s2", "s3", "e3"];
        for (i, msg) in writes.iter().enumerate() {
            if msg.starts_with('s') {
                feed.set_status(*msg);
            } else {
                feed.set_error(*msg);
            }
            let both = !feed.status().is_empty() && !feed.error().is_empty();
            assert!(!both, "write #{i} broke the exclusion invariant");
        }
    }

    #[test]
    fn clear_error_leaves_status_untouched() {
        let mut feed = StatusState::default();
        feed.set_error("boom");
        feed.clear_error();
        assert!(feed.error().is_empty());
        assert!(feed.status().is_empty());
    }

    // ---- SharedState ---

    #[test]
    fn new_shared_state_is_idle_with_greeting() {
        let state = new_shared_state();
        let st = state.lock().unwrap();
        assert_eq!(st.phase, Phase::Idle);
        assert_eq!(st.feedback.status(), "Inactive. Press Start.");
        assert!(st.last_transcript.is_none());
        assert!(st.last_reply.is_none());
    }

    #[test]
    fn shared_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedState>();
    }

    #[test]
    fn shared_state_can_be_cloned_and_mutated() {
        let state = new_shared_state();
        let state2 = Arc::clone(&state);

        state.lock().unwrap().phase = Phase::Listening;
        assert_eq!(state2.lock().unwrap().phase, Phase::Listening);
    }
}
