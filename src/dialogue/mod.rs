//! Remote dialogue capability.
//!
//! This module provides:
//! * [`DialogueApi`] — async trait implemented by dialogue backends.
//! * [`ApiDialogue`] — OpenAI-compatible REST backend (production).
//! * [`SessionId`] — opaque handle to one multi-turn conversation.
//! * [`DialogueError`] — error variants for dialogue operations.
//!
//! A *session* is one ongoing conversation: a fixed system instruction plus
//! the turn history accumulated by `send_message`.  The coordinator never
//! sees the history — it only holds the [`SessionId`].

pub mod api;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use api::{ApiDialogue, DialogueApi, DialogueError, SessionId};
