//! Speech-capture capability contract.
//!
//! # Overview
//!
//! [`SpeechCapture`] is the interface the turn coordinator drives to listen
//! to the user.  It is object-safe and `Send + Sync` so it can be held
//! behind an `Arc<dyn SpeechCapture>`.
//!
//! A capture backend is event-driven: `start` hands it a channel sender and
//! the backend reports everything that happens afterwards as
//! [`CaptureEvent`]s — recognition started, interim/final results, a fault,
//! or the end of the capture session.  A backend stops emitting after
//! [`CaptureEvent::Ended`]; a later `start` opens a fresh session with a
//! result cursor starting at zero.
//!
//! [`TypedCapture`](typed::TypedCapture) is a text-mode backend that treats
//! stdin lines as spoken utterances, so the full conversational loop can run
//! on machines without a microphone.

pub mod typed;

use thiserror::Error;
use tokio::sync::mpsc;

pub use typed::TypedCapture;

// ---------------------------------------------------------------------------
// CaptureCode
// ---------------------------------------------------------------------------

/// Error codes a capture backend can report, mirroring the vocabulary of
/// common speech-recognition engines.
///
/// Codes arriving from a backend as raw strings are parsed with
/// [`CaptureCode::from_wire`]; anything unrecognised lands in
/// [`CaptureCode::Other`] so no backend error is ever silently dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureCode {
    /// The backend heard nothing it could recognise.
    NoSpeech,
    /// The microphone / input device failed.
    AudioCapture,
    /// The user or platform denied microphone permission.
    NotAllowed,
    /// The recognition service could not be reached.
    Network,
    /// The capture session was aborted by the backend.
    Aborted,
    /// The configured language is not supported by the backend.
    LanguageNotSupported,
    /// The platform forbids use of the recognition service.
    ServiceNotAllowed,
    /// The recognition grammar configuration was rejected.
    BadGrammar,
    /// Any code this crate does not know about.
    Other(String),
}

impl CaptureCode {
    /// Parse a backend's raw error-code string.
    pub fn from_wire(code: &str) -> Self {
        match code {
            "no-speech" => Self::NoSpeech,
            "audio-capture" => Self::AudioCapture,
            "not-allowed" => Self::NotAllowed,
            "network" => Self::Network,
            "aborted" => Self::Aborted,
            "language-not-supported" => Self::LanguageNotSupported,
            "service-not-allowed" => Self::ServiceNotAllowed,
            "bad-grammar" => Self::BadGrammar,
            other => Self::Other(other.to_string()),
        }
    }

    /// The wire spelling of this code.
    pub fn as_wire(&self) -> &str {
        match self {
            Self::NoSpeech => "no-speech",
            Self::AudioCapture => "audio-capture",
            Self::NotAllowed => "not-allowed",
            Self::Network => "network",
            Self::Aborted => "aborted",
            Self::LanguageNotSupported => "language-not-supported",
            Self::ServiceNotAllowed => "service-not-allowed",
            Self::BadGrammar => "bad-grammar",
            Self::Other(code) => code,
        }
    }

    /// A human-readable message for this code, suitable for the status feed.
    ///
    /// Raw codes are never shown to the user untranslated.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoSpeech => "No speech was detected. Please try again.".into(),
            Self::AudioCapture => {
                "Audio capture failed. Please check your microphone and system audio settings."
                    .into()
            }
            Self::NotAllowed => {
                "Microphone permission denied. Please enable microphone access for this \
                 application."
                    .into()
            }
            Self::Network => {
                "A network error occurred during speech recognition. Please check your internet \
                 connection."
                    .into()
            }
            Self::Aborted => {
                "Speech recognition was aborted. If this was unexpected, please try again.".into()
            }
            Self::LanguageNotSupported => {
                "The configured language is not supported for speech recognition.".into()
            }
            Self::ServiceNotAllowed => {
                "The speech recognition service is not allowed on this system. Check security \
                 settings."
                    .into()
            }
            Self::BadGrammar => {
                "There was an error with the speech recognition grammar configuration.".into()
            }
            Self::Other(code) => {
                format!("An unexpected speech recognition error occurred: {code}.")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureFault
// ---------------------------------------------------------------------------

/// Errors returned when a capture session cannot be opened at all.
///
/// Faults *during* an open session travel as [`CaptureEvent::Error`] instead.
#[derive(Debug, Clone, Error)]
pub enum CaptureFault {
    /// No capture backend is usable on this platform.
    #[error("speech capture is not available")]
    Unavailable,

    /// `start` was called while a session was already open.
    #[error("speech capture is already running")]
    AlreadyRunning,

    /// The backend rejected the start request.
    #[error("failed to start speech capture: {0}")]
    Start(String),
}

// ---------------------------------------------------------------------------
// Capture events
// ---------------------------------------------------------------------------

/// One recognition hypothesis inside a [`CaptureEvent::Result`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    /// The recognised text fragment.
    pub transcript: String,
    /// `true` once the backend has committed to this fragment; interim
    /// fragments may be revised by a later event at the same cursor.
    pub is_final: bool,
}

/// Events a capture backend emits over the channel handed to
/// [`SpeechCapture::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// The backend has opened the input device and is listening.
    Started,
    /// New or revised recognition results.
    ///
    /// `cursor` is the index of the first entry of `results` within the
    /// session's full result list; it increases monotonically as fragments
    /// are committed.
    Result {
        cursor: u64,
        results: Vec<CaptureResult>,
    },
    /// The backend hit an error.  The session is stopped; an [`Ended`] event
    /// may still follow.
    ///
    /// [`Ended`]: CaptureEvent::Ended
    Error(CaptureCode),
    /// The capture session is over, for whatever reason.  No further events
    /// follow until the next `start`.
    Ended,
}

// ---------------------------------------------------------------------------
// SpeechCapture trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for speech-capture backends.
///
/// # Contract
///
/// - `start` opens one capture session and reports it through `events`;
///   calling it while a session is open returns
///   [`CaptureFault::AlreadyRunning`].
/// - `stop` requests the current session to end.  The backend confirms with
///   [`CaptureEvent::Ended`]; callers must treat the session as open until
///   that event arrives.  `stop` with no open session is a no-op.
/// - Result cursors restart at zero for every session.
pub trait SpeechCapture: Send + Sync {
    /// Open a capture session, reporting all activity through `events`.
    fn start(&self, events: mpsc::UnboundedSender<CaptureEvent>) -> Result<(), CaptureFault>;

    /// Ask the current session to end.
    fn stop(&self);

    /// Whether this backend can capture at all on this platform.
    fn available(&self) -> bool {
        true
    }
}

// Compile-time assertion: Box<dyn SpeechCapture> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SpeechCapture>) {}
};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // --- CaptureCode::from_wire ---

    #[test]
    fn from_wire_parses_known_codes() {
        assert_eq!(CaptureCode::from_wire("no-speech"), CaptureCode::NoSpeech);
        assert_eq!(
            CaptureCode::from_wire("audio-capture"),
            CaptureCode::AudioCapture
        );
        assert_eq!(
            CaptureCode::from_wire("not-allowed"),
            CaptureCode::NotAllowed
        );
        assert_eq!(CaptureCode::from_wire("network"), CaptureCode::Network);
        assert_eq!(CaptureCode::from_wire("aborted"), CaptureCode::Aborted);
        assert_eq!(
            CaptureCode::from_wire("language-not-supported"),
            CaptureCode::LanguageNotSupported
        );
        assert_eq!(
            CaptureCode::from_wire("service-not-allowed"),
            CaptureCode::ServiceNotAllowed
        );
        assert_eq!(
            CaptureCode::from_wire("bad-grammar"),
            CaptureCode::BadGrammar
        );
    }

    #[test]
    fn from_wire_unknown_code_lands_in_other() {
        let code = CaptureCode::from_wire("synthesizer-on-fire");
        assert_eq!(code, CaptureCode::Other("synthesizer-on-fire".into()));
    }

    #[test]
    fn wire_round_trip() {
        for wire in [
            "no-speech",
            "audio-capture",
            "not-allowed",
            "network",
            "aborted",
            "language-not-supported",
            "service-not-allowed",
            "bad-grammar",
            "something-else",
        ] {
            assert_eq!(CaptureCode::from_wire(wire).as_wire(), wire);
        }
    }

    // --- CaptureCode::user_message ---

    /// Every code must map to a distinct, non-empty, translated message.
    #[test]
    fn user_messages_are_distinct_and_non_empty() {
        let codes = [
            CaptureCode::NoSpeech,
            CaptureCode::AudioCapture,
            CaptureCode::NotAllowed,
            CaptureCode::Network,
            CaptureCode::Aborted,
            CaptureCode::LanguageNotSupported,
            CaptureCode::ServiceNotAllowed,
            CaptureCode::BadGrammar,
            CaptureCode::Other("mystery".into()),
        ];

        let messages: Vec<String> = codes.iter().map(|c| c.user_message()).collect();

        for msg in &messages {
            assert!(!msg.is_empty());
        }
        for (i, a) in messages.iter().enumerate() {
            for b in messages.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn permission_message_mentions_microphone() {
        assert!(CaptureCode::NotAllowed
            .user_message()
            .contains("Microphone permission"));
    }

    #[test]
    fn unknown_code_is_still_translated() {
        let msg = CaptureCode::Other("weird".into()).user_message();
        assert!(msg.contains("weird"));
        assert!(msg.contains("unexpected"));
    }
}
