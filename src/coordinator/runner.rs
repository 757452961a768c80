//! Turn coordinator — drives the full listen → dialogue → speak loop.
//!
//! [`TurnCoordinator`] owns the [`SharedState`] and consumes every input as
//! a message on one mpsc channel: public commands (via
//! [`CoordinatorHandle`]), capture events, playback events, and the
//! completions of spawned dialogue work.  A single transition function
//! handles them all, so no two transitions can ever interleave.
//!
//! # Turn flow
//!
//! ```text
//! Command::Start
//!   └─▶ ensure client → session ready?        [AwaitingSession]
//!         └─▶ open capture                    [Listening]
//!               └─▶ final transcript
//!                     └─▶ spawn dialogue send [Dispatching]
//!                           └─▶ speak reply   [Speaking]
//!                                 └─▶ playback ends → Listening / Idle
//! ```
//!
//! # Staleness
//!
//! Suspension points (session creation, the dialogue send, capture and
//! playback event streams) run as spawned tasks that post completions back
//! into the channel tagged with the turn generation current when they were
//! spawned.  `reset`, `set_credential` and each new turn bump the
//! generation, so completions belonging to a superseded turn are recognised
//! and dropped instead of corrupting the current one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::capture::{CaptureEvent, SpeechCapture};
use crate::dialogue::{DialogueError, SessionId};
use crate::playback::{PlaybackEvent, SpeechPlayback};
use crate::session::{SessionError, SessionManager, COMPANION_PERSONA};

use super::state::{Phase, SharedState};
use super::transcript::TranscriptAssembler;

// ---------------------------------------------------------------------------
// Commands and events
// ---------------------------------------------------------------------------

/// Public commands accepted by the coordinator.
#[derive(Debug, Clone)]
pub enum Command {
    /// Replace the dialogue credential (tears down client and session).
    SetCredential(String),
    /// Begin a turn; a friendly no-op while already listening.
    Start,
    /// End the current capture; the dialogue session survives.
    Stop,
    /// Hard reset: stop capture, discard the session, return to `Idle`.
    Reset,
    /// Tear down capability subscriptions and end the event loop.
    Shutdown,
}

/// Everything the event loop consumes.  Completions carry the turn
/// generation current when their work was spawned.
#[derive(Debug)]
enum Event {
    Command(Command),
    SessionReady {
        generation: u64,
        session: SessionId,
    },
    SessionFailed {
        generation: u64,
        error: SessionError,
    },
    Capture {
        generation: u64,
        event: CaptureEvent,
    },
    DialogueDone {
        generation: u64,
        result: Result<String, DialogueError>,
    },
    Playback {
        generation: u64,
        event: PlaybackEvent,
    },
}

// ---------------------------------------------------------------------------
// CoordinatorHandle
// ---------------------------------------------------------------------------

/// Cloneable front door to a running [`TurnCoordinator`].
///
/// All methods are fire-and-forget: the effect (including any error) is
/// observable through the coordinator's [`SharedState`].
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Event>,
}

impl CoordinatorHandle {
    /// Replace the dialogue credential.  Always tears down the existing
    /// client/session pair, even for an unchanged value.
    pub fn set_credential(&self, value: impl Into<String>) {
        self.send(Command::SetCredential(value.into()));
    }

    /// Begin a turn.
    pub fn start(&self) {
        self.send(Command::Start);
    }

    /// End the current capture without closing the dialogue session.
    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    /// Stop capture, discard the session, return to `Idle`.
    pub fn reset(&self) {
        self.send(Command::Reset);
    }

    /// Permanently dispose of the coordinator.
    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    fn send(&self, command: Command) {
        if self.tx.send(Event::Command(command)).is_err() {
            log::warn!("coordinator: command dropped, event loop has ended");
        }
    }
}

// ---------------------------------------------------------------------------
// TurnCoordinator
// ---------------------------------------------------------------------------

/// Sequences speech capture, dialogue-session lifecycle and speech playback
/// for one conversation.
///
/// Create with [`TurnCoordinator::new`], then spawn [`run`](Self::run) as a
/// tokio task and drive it through the returned [`CoordinatorHandle`].
pub struct TurnCoordinator {
    state: SharedState,
    sessions: SessionManager,
    capture: Arc<dyn SpeechCapture>,
    playback: Arc<dyn SpeechPlayback>,
    /// Upper bound on session creation and each dialogue send.
    response_timeout: Duration,

    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,

    /// Turn generation for staleness detection.
    generation: u64,
    /// Whether a capture session is open (set on start, cleared on the
    /// backend's `Ended`).
    capture_open: bool,
    transcript: TranscriptAssembler,
}

impl TurnCoordinator {
    /// Create a coordinator and its command handle.
    ///
    /// # Arguments
    ///
    /// * `state`            — shared observable state (also read by the
    ///   presentation layer).
    /// * `sessions`         — dialogue client/session lifecycle.
    /// * `capture`          — speech-capture backend.
    /// * `playback`         — speech-playback backend.
    /// * `response_timeout` — bound on remote dialogue waits.
    pub fn new(
        state: SharedState,
        sessions: SessionManager,
        capture: Arc<dyn SpeechCapture>,
        playback: Arc<dyn SpeechPlayback>,
        response_timeout: Duration,
    ) -> (Self, CoordinatorHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = CoordinatorHandle { tx: tx.clone() };

        let coordinator = Self {
            state,
            sessions,
            capture,
            playback,
            response_timeout,
            tx,
            rx,
            generation: 0,
            capture_open: false,
            transcript: TranscriptAssembler::new(),
        };

        (coordinator, handle)
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run the coordinator until [`CoordinatorHandle::shutdown`] arrives.
    ///
    /// This is an `async fn` and should be spawned as a tokio task.
    pub async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }

        // Teardown: release capture and silence playback.
        if self.capture_open {
            self.capture.stop();
        }
        self.playback.cancel();
        log::info!("coordinator: event loop ended");
    }

    /// The single transition function.  Returns `false` to end the loop.
    fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::Command(command) => return self.handle_command(command),

            Event::SessionReady {
                generation,
                session,
            } => {
                if self.stale(generation, "session ready") {
                    return true;
                }
                self.sessions.adopt_session(session);
                self.set_status("AI session ready. Start speaking.");
                self.begin_listening();
            }

            Event::SessionFailed { generation, error } => {
                if self.stale(generation, "session failure") {
                    return true;
                }
                self.fail_turn(error.to_string());
            }

            Event::Capture { generation, event } => {
                if self.stale(generation, "capture event") {
                    return true;
                }
                self.handle_capture_event(event);
            }

            Event::DialogueDone { generation, result } => {
                if self.stale(generation, "dialogue completion") {
                    return true;
                }
                self.handle_dialogue_done(result);
            }

            Event::Playback { generation, event } => {
                if self.stale(generation, "playback event") {
                    return true;
                }
                self.handle_playback_event(event);
            }
        }
        true
    }

    // -----------------------------------------------------------------------
    // Command handling
    // -----------------------------------------------------------------------

    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::SetCredential(value) => {
                log::debug!("coordinator: credential change");
                self.abort_turn();
                let mut st = self.state.lock().unwrap();
                st.phase = Phase::Idle;
                match self.sessions.set_credential(&value) {
                    Ok(()) => st.feedback.set_status("Client initialized. Ready."),
                    Err(e) => st.feedback.set_error(e.to_string()),
                }
            }

            Command::Start => self.handle_start(),

            Command::Stop => {
                if self.capture_open {
                    log::debug!("coordinator: stop requested, closing capture");
                    // The transition completes when the backend's Ended
                    // event arrives.
                    self.capture.stop();
                }
            }

            Command::Reset => {
                log::debug!("coordinator: reset");
                self.abort_turn();
                self.sessions.reset_session();
                let mut st = self.state.lock().unwrap();
                st.phase = Phase::Idle;
                st.feedback.set_status("Session Reset. Ready to Start.");
            }

            Command::Shutdown => {
                log::info!("coordinator: shutdown requested");
                self.abort_turn();
                return false;
            }
        }
        true
    }

    fn handle_start(&mut self) {
        match self.phase() {
            Phase::Listening => {
                self.set_status("Already listening.");
                return;
            }
            phase if phase.is_busy() => {
                log::debug!("coordinator: start rejected during {}", phase.label());
                self.set_status("Still busy. Please wait.");
                return;
            }
            _ => {}
        }

        // Starting fresh clears any acknowledged error.
        self.state.lock().unwrap().feedback.clear_error();

        if !self.capture.available() {
            self.fail_turn("Speech capture is not available on this system.");
            return;
        }

        // Anything still being voiced is cut off by a new turn.
        self.playback.cancel();

        let client = match self.sessions.ensure_client() {
            Ok(client) => client,
            Err(e) => {
                self.fail_turn(e.to_string());
                return;
            }
        };

        if self.capture_open {
            // The previous turn errored while its capture session stayed
            // open (e.g. a playback failure).  Resume it instead of opening
            // a second one.
            log::debug!("coordinator: resuming open capture session");
            let mut st = self.state.lock().unwrap();
            st.phase = Phase::Listening;
            st.feedback.set_status("🎤 Listening…");
            return;
        }

        // A new turn begins: older completions are now stale.
        self.generation += 1;
        self.transcript.reset();

        if self.sessions.session().is_some() {
            self.begin_listening();
            return;
        }

        {
            let mut st = self.state.lock().unwrap();
            st.phase = Phase::AwaitingSession;
            st.feedback.set_status("Initializing AI session…");
        }

        let tx = self.tx.clone();
        let generation = self.generation;
        let timeout = self.response_timeout;
        tokio::spawn(async move {
            let event =
                match tokio::time::timeout(timeout, client.create_session(COMPANION_PERSONA))
                    .await
                {
                    Ok(Ok(session)) => Event::SessionReady {
                        generation,
                        session,
                    },
                    Ok(Err(e)) => Event::SessionFailed {
                        generation,
                        error: SessionError::SessionInit(e.to_string()),
                    },
                    Err(_) => Event::SessionFailed {
                        generation,
                        error: SessionError::SessionInit(
                            DialogueError::Timeout.to_string(),
                        ),
                    },
                };
            let _ = tx.send(event);
        });
    }

    // -----------------------------------------------------------------------
    // Capture
    // -----------------------------------------------------------------------

    fn begin_listening(&mut self) {
        let (capture_tx, capture_rx) = mpsc::unbounded_channel();
        match self.capture.start(capture_tx) {
            Ok(()) => {
                self.capture_open = true;
                self.set_phase(Phase::Listening);
                self.forward_capture(capture_rx);
            }
            Err(e) => {
                self.fail_turn(format!("Error starting speech capture: {e}"));
            }
        }
    }

    fn handle_capture_event(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::Started => {
                if self.phase() == Phase::Listening {
                    self.set_status("🎤 Listening…");
                }
            }

            CaptureEvent::Result { cursor, results } => {
                if self.phase() != Phase::Listening {
                    log::debug!("coordinator: capture results outside Listening ignored");
                    return;
                }
                let assembly = self.transcript.ingest(cursor, &results);
                if let Some(preview) = assembly.preview {
                    self.set_status(format!("Thinking: {preview}"));
                }
                if let Some(text) = assembly.finalized {
                    self.dispatch(text);
                }
                // An empty finalised utterance produced neither: dropped
                // silently, still Listening.
            }

            CaptureEvent::Error(code) => {
                if self.phase() == Phase::Listening {
                    self.capture.stop();
                    self.capture_open = false;
                    self.fail_turn(code.user_message());
                } else {
                    // Capture died outside its own phase; close it and let
                    // the in-flight turn finish on its own terms.
                    log::warn!(
                        "coordinator: capture error '{}' outside Listening",
                        code.as_wire()
                    );
                    self.capture.stop();
                    self.capture_open = false;
                }
            }

            CaptureEvent::Ended => {
                self.capture_open = false;
                if self.phase() == Phase::Listening {
                    self.transcript.reset();
                    let mut st = self.state.lock().unwrap();
                    st.phase = Phase::Idle;
                    if !st.feedback.has_error() {
                        st.feedback.set_status("Listening stopped. Press Start.");
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Dialogue
    // -----------------------------------------------------------------------

    fn dispatch(&mut self, text: String) {
        let Some(session) = self.sessions.session() else {
            self.fail_turn("AI session not active. Cannot send message.");
            return;
        };
        let client = match self.sessions.ensure_client() {
            Ok(client) => client,
            Err(e) => {
                self.fail_turn(e.to_string());
                return;
            }
        };

        log::info!("coordinator: dispatching transcript ({} chars)", text.len());
        {
            let mut st = self.state.lock().unwrap();
            st.last_transcript = Some(text.clone());
            st.phase = Phase::Dispatching;
            st.feedback.set_status("Sending to AI…");
        }

        let tx = self.tx.clone();
        let generation = self.generation;
        let timeout = self.response_timeout;
        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, client.send_message(session, &text))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(DialogueError::Timeout),
            };
            let _ = tx.send(Event::DialogueDone { generation, result });
        });
    }

    fn handle_dialogue_done(&mut self, result: Result<String, DialogueError>) {
        if self.phase() != Phase::Dispatching {
            log::debug!("coordinator: dialogue completion outside Dispatching ignored");
            return;
        }

        let reply = match result {
            Ok(reply) if !reply.trim().is_empty() => reply,
            Ok(_) => {
                self.fail_turn(format!(
                    "AI Communication Error: {}",
                    DialogueError::EmptyReply
                ));
                return;
            }
            Err(e) => {
                // The session itself survives; a later start reuses it.
                self.fail_turn(format!("AI Communication Error: {e}"));
                return;
            }
        };

        {
            let mut st = self.state.lock().unwrap();
            st.last_reply = Some(reply.clone());
            st.phase = Phase::Speaking;
            let preview: String = reply.chars().take(50).collect();
            st.feedback.set_status(format!("AI: {preview}…"));
        }

        let (playback_tx, playback_rx) = mpsc::unbounded_channel();
        match self.playback.speak(&reply, playback_tx) {
            Ok(()) => self.forward_playback(playback_rx),
            Err(e) => {
                self.fail_turn(format!("TTS Error: {e}. Could not speak AI response."));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Playback
    // -----------------------------------------------------------------------

    fn handle_playback_event(&mut self, event: PlaybackEvent) {
        if self.phase() != Phase::Speaking {
            log::debug!("coordinator: playback event outside Speaking ignored");
            return;
        }

        match event {
            PlaybackEvent::Started => self.set_status("AI Speaking…"),

            PlaybackEvent::Ended => {
                let mut st = self.state.lock().unwrap();
                if self.capture_open {
                    st.phase = Phase::Listening;
                    st.feedback.set_status("🎤 Listening…");
                } else {
                    st.phase = Phase::Idle;
                    st.feedback.set_status("AI finished. Press Start or speak.");
                }
            }

            PlaybackEvent::Error(code) => {
                // Neither the session nor the capture state is discarded; a
                // later start proceeds normally.
                self.fail_turn(format!(
                    "TTS Error: '{code}'. Could not speak AI response."
                ));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Cancel whatever the current turn holds: capture, playback, pending
    /// completions (via the generation bump), assembled transcript.
    fn abort_turn(&mut self) {
        if self.capture_open {
            self.capture.stop();
            self.capture_open = false;
        }
        self.playback.cancel();
        self.generation += 1;
        self.transcript.reset();
    }

    /// True (and logged) when a completion belongs to a superseded turn.
    fn stale(&self, generation: u64, what: &str) -> bool {
        if generation != self.generation {
            log::debug!(
                "coordinator: stale {what} (generation {generation}, current {})",
                self.generation
            );
            return true;
        }
        false
    }

    fn forward_capture(&self, mut rx: mpsc::UnboundedReceiver<CaptureEvent>) {
        let tx = self.tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if tx.send(Event::Capture { generation, event }).is_err() {
                    break;
                }
            }
        });
    }

    fn forward_playback(&self, mut rx: mpsc::UnboundedReceiver<PlaybackEvent>) {
        let tx = self.tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if tx.send(Event::Playback { generation, event }).is_err() {
                    break;
                }
            }
        });
    }

    fn phase(&self) -> Phase {
        self.state.lock().unwrap().phase
    }

    fn set_phase(&self, phase: Phase) {
        self.state.lock().unwrap().phase = phase;
    }

    fn set_status(&self, msg: impl Into<String>) {
        self.state.lock().unwrap().feedback.set_status(msg);
    }

    /// End the current turn in `Error` with a user-facing message.
    fn fail_turn(&self, message: impl Into<String>) {
        let message = message.into();
        log::error!("coordinator: {message}");
        let mut st = self.state.lock().unwrap();
        st.phase = Phase::Error;
        st.feedback.set_error(message);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
