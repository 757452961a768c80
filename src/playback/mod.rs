//! Speech-playback capability contract.
//!
//! [`SpeechPlayback`] is the interface the turn coordinator uses to voice a
//! reply.  Like [`SpeechCapture`](crate::capture::SpeechCapture) it is
//! event-driven: `speak` hands the backend a channel sender and the backend
//! reports [`PlaybackEvent`]s — utterance started, ended, or failed.
//!
//! [`ConsolePlayback`](console::ConsolePlayback) is a device-free backend
//! that prints the reply and simulates speaking time, used by the demo
//! binary.

pub mod console;

use thiserror::Error;
use tokio::sync::mpsc;

pub use console::ConsolePlayback;

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

/// Errors returned when an utterance cannot be queued at all.
///
/// Failures *during* playback travel as [`PlaybackEvent::Error`] instead.
#[derive(Debug, Clone, Error)]
pub enum PlaybackError {
    /// No synthesis backend is usable on this platform.
    #[error("speech synthesis is not available")]
    Unavailable,

    /// The backend rejected the utterance.
    #[error("failed to queue utterance: {0}")]
    Queue(String),
}

// ---------------------------------------------------------------------------
// PlaybackEvent
// ---------------------------------------------------------------------------

/// Events a playback backend emits over the channel handed to
/// [`SpeechPlayback::speak`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The utterance has started playing.
    Started,
    /// The utterance finished playing to the end.  Not emitted for
    /// utterances cut short by [`cancel`](SpeechPlayback::cancel) or by a
    /// later `speak`.
    Ended,
    /// The synthesis or audio device failed; carries the backend's error
    /// code (e.g. `"synthesis-failed"`, `"audio-busy"`).
    Error(String),
}

// ---------------------------------------------------------------------------
// SpeechPlayback trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for speech-playback backends.
///
/// # Contract
///
/// - `speak` implicitly cancels any in-flight utterance before queueing the
///   new one; the superseded utterance emits no further events.
/// - `cancel` silences the backend without queueing anything; it is a no-op
///   when nothing is playing.
pub trait SpeechPlayback: Send + Sync {
    /// Queue `text` for synthesis, reporting progress through `events`.
    fn speak(
        &self,
        text: &str,
        events: mpsc::UnboundedSender<PlaybackEvent>,
    ) -> Result<(), PlaybackError>;

    /// Cut any in-flight utterance short.
    fn cancel(&self);
}

// Compile-time assertion: Box<dyn SpeechPlayback> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SpeechPlayback>) {}
};
