//! Text-mode capture backend that reads utterances from stdin.
//!
//! [`TypedCapture`] stands in for a microphone on machines (or CI boxes)
//! without audio input: every line typed on stdin becomes one *final*
//! transcript.  Like a one-shot recognition engine, the session ends after a
//! single utterance — the coordinator re-opens capture for the next turn.
//!
//! # Shutdown caveat
//!
//! Reading stdin is a blocking call with no portable way to interrupt it, so
//! the reader lives on a dedicated OS thread for the lifetime of the
//! process.  `stop` closes the logical session (the thread's next line is
//! discarded); the thread itself only exits when stdin reaches EOF.

use std::io::BufRead;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::{CaptureEvent, CaptureFault, CaptureResult, SpeechCapture};

// ---------------------------------------------------------------------------
// TypedCapture
// ---------------------------------------------------------------------------

/// Session bookkeeping shared between the reader thread and the trait calls.
struct Session {
    /// Where the open session's events go; `None` when no session is open.
    events: Option<mpsc::UnboundedSender<CaptureEvent>>,
}

/// Stdin-backed [`SpeechCapture`] implementation.
///
/// Construct once with [`TypedCapture::new`] (which spawns the reader
/// thread) and share behind an `Arc`.
pub struct TypedCapture {
    session: Arc<Mutex<Session>>,
    /// Kept so the reader thread is not detached prematurely; never joined
    /// because stdin reads cannot be interrupted.
    _reader: std::thread::JoinHandle<()>,
}

impl TypedCapture {
    /// Spawn the stdin reader thread and return the backend handle.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to create the thread (extremely unlikely).
    pub fn new() -> Self {
        let session = Arc::new(Mutex::new(Session { events: None }));
        let session_clone = Arc::clone(&session);

        let reader = std::thread::Builder::new()
            .name("typed-capture".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let line = match line {
                        Ok(l) => l,
                        Err(e) => {
                            log::error!("typed-capture: stdin read failed: {e}");
                            break;
                        }
                    };

                    let mut guard = session_clone.lock().unwrap();
                    let Some(tx) = guard.events.take() else {
                        // No open session; the line was typed between turns.
                        log::debug!("typed-capture: discarding line typed while idle");
                        continue;
                    };
                    drop(guard);

                    // Single-utterance sessions always report at cursor 0.
                    let _ = tx.send(CaptureEvent::Result {
                        cursor: 0,
                        results: vec![CaptureResult {
                            transcript: line,
                            is_final: true,
                        }],
                    });
                    // One utterance per session, like a non-continuous
                    // recognition engine.
                    let _ = tx.send(CaptureEvent::Ended);
                }
                log::info!("typed-capture: stdin closed, reader thread exiting");
            })
            .expect("failed to spawn typed-capture thread");

        Self {
            session,
            _reader: reader,
        }
    }
}

impl Default for TypedCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechCapture for TypedCapture {
    fn start(&self, events: mpsc::UnboundedSender<CaptureEvent>) -> Result<(), CaptureFault> {
        let mut guard = self.session.lock().unwrap();
        if guard.events.is_some() {
            return Err(CaptureFault::AlreadyRunning);
        }

        let _ = events.send(CaptureEvent::Started);
        guard.events = Some(events);
        Ok(())
    }

    fn stop(&self) {
        let mut guard = self.session.lock().unwrap();
        if let Some(tx) = guard.events.take() {
            let _ = tx.send(CaptureEvent::Ended);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_emits_started_event() {
        let capture = TypedCapture::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        capture.start(tx).expect("start");
        assert_eq!(rx.recv().await, Some(CaptureEvent::Started));
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let capture = TypedCapture::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        capture.start(tx1).expect("first start");
        let err = capture.start(tx2).expect_err("second start must fail");
        assert!(matches!(err, CaptureFault::AlreadyRunning));
    }

    #[tokio::test]
    async fn stop_emits_ended_and_reopens() {
        let capture = TypedCapture::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        capture.start(tx).expect("start");
        capture.stop();

        assert_eq!(rx.recv().await, Some(CaptureEvent::Started));
        assert_eq!(rx.recv().await, Some(CaptureEvent::Ended));

        // A fresh session may be opened after stop.
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        capture.start(tx2).expect("restart");
        assert_eq!(rx2.recv().await, Some(CaptureEvent::Started));
    }

    #[test]
    fn stop_without_session_is_a_noop() {
        let capture = TypedCapture::new();
        capture.stop();
    }
}
