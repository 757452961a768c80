//! Turn coordination for the voice companion.
//!
//! This module wires the full listen → dialogue → speak loop and exposes
//! the shared state a presentation layer reads.
//!
//! # Architecture
//!
//! ```text
//! CoordinatorHandle (commands)          capability backends
//!        │                                 │ events
//!        ▼                                 ▼
//!   one mpsc channel ◀── generation-tagged completions of spawned work
//!        │
//!        ▼
//! TurnCoordinator::run()  ← async tokio task, single transition function
//!        │
//!        ├─ Start  → ensure client/session → open capture   [Listening]
//!        ├─ final transcript → spawn dialogue send          [Dispatching]
//!        ├─ reply → speak                                   [Speaking]
//!        └─ playback ends → Listening / Idle
//!
//! SharedState (Arc<Mutex<AssistantState>>) ←─── read by the UI
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use voice_companion::capture::TypedCapture;
//! use voice_companion::config::AppConfig;
//! use voice_companion::coordinator::{new_shared_state, TurnCoordinator};
//! use voice_companion::playback::ConsolePlayback;
//! use voice_companion::session::{ApiConnector, SessionManager};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let state = new_shared_state();
//!     let sessions = SessionManager::new(Arc::new(ApiConnector::new(config.dialogue.clone())));
//!
//!     let (coordinator, handle) = TurnCoordinator::new(
//!         state.clone(),
//!         sessions,
//!         Arc::new(TypedCapture::new()),
//!         Arc::new(ConsolePlayback::new()),
//!         Duration::from_millis(config.dialogue.response_timeout_ms),
//!     );
//!     tokio::spawn(coordinator.run());
//!
//!     handle.set_credential("sk-...");
//!     handle.start();
//! }
//! ```

pub mod runner;
pub mod state;
pub mod transcript;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{Command, CoordinatorHandle, TurnCoordinator};
pub use state::{new_shared_state, AssistantState, Phase, SharedState, StatusState};
pub use transcript::{Assembly, TranscriptAssembler};
