//! Core `DialogueApi` trait and `ApiDialogue` implementation.
//!
//! `ApiDialogue` calls any OpenAI-compatible `/v1/chat/completions` endpoint
//! — OpenAI, Groq, LM Studio, vLLM, Ollama (OpenAI mode), etc.  All
//! connection details come from [`DialogueConfig`]; nothing is hardcoded.
//!
//! Session histories live inside the backend, keyed by [`SessionId`]: every
//! `send_message` replays the session's system instruction and prior turns,
//! which is how stateless chat-completion providers carry multi-turn
//! context.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::DialogueConfig;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Opaque handle to one dialogue session held by a [`DialogueApi`] backend.
pub type SessionId = u64;

// ---------------------------------------------------------------------------
// DialogueError
// ---------------------------------------------------------------------------

/// Errors that can occur talking to the dialogue service.
#[derive(Debug, Error)]
pub enum DialogueError {
    /// HTTP transport or connection error.
    #[error("dialogue request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("the AI did not respond in time")]
    Timeout,

    /// The response arrived but no reply text could be extracted from it.
    #[error("malformed dialogue reply: {0}")]
    Malformed(String),

    /// The service replied with empty text.
    #[error("the AI returned an empty reply")]
    EmptyReply,

    /// The given session handle is not known to this backend.
    #[error("unknown dialogue session {0}")]
    UnknownSession(SessionId),

    /// Session creation was rejected by the backend.
    #[error("failed to create dialogue session: {0}")]
    SessionCreate(String),
}

impl From<reqwest::Error> for DialogueError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DialogueError::Timeout
        } else {
            DialogueError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// DialogueApi trait
// ---------------------------------------------------------------------------

/// Async interface to the remote dialogue service.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. wrapped in `Arc<dyn DialogueApi>`).
#[async_trait]
pub trait DialogueApi: Send + Sync {
    /// Open a new session whose every reply is shaped by
    /// `system_instruction`.
    async fn create_session(&self, system_instruction: &str) -> Result<SessionId, DialogueError>;

    /// Send one user utterance into `session` and return the reply text.
    ///
    /// The reply is trimmed; an empty reply is an error, never `Ok("")`.
    async fn send_message(&self, session: SessionId, text: &str)
        -> Result<String, DialogueError>;
}

// ---------------------------------------------------------------------------
// ApiDialogue
// ---------------------------------------------------------------------------

/// One message in a session history, in chat-completions wire shape.
#[derive(Debug, Clone)]
struct ChatTurn {
    role: &'static str,
    content: String,
}

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint.
///
/// # No hardcoded URLs
/// All connection details (`base_url`, `model`, `temperature`) come
/// exclusively from the [`DialogueConfig`] passed to
/// [`ApiDialogue::from_config`]; the credential is supplied separately by
/// the session layer and attached as a bearer token only when non-empty.
pub struct ApiDialogue {
    client: reqwest::Client,
    config: DialogueConfig,
    credential: String,
    next_id: AtomicU64,
    sessions: Mutex<HashMap<SessionId, Vec<ChatTurn>>>,
}

impl ApiDialogue {
    /// Build an `ApiDialogue` from application config and a credential.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.response_timeout_ms`.  A default (no-timeout) client is used
    /// as a last-resort fallback if the builder fails (should never happen
    /// in practice).
    pub fn from_config(config: &DialogueConfig, credential: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.response_timeout_ms))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            credential: credential.to_string(),
            next_id: AtomicU64::new(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Number of sessions currently held (diagnostics / tests).
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait]
impl DialogueApi for ApiDialogue {
    /// Register a new session seeded with `system_instruction`.
    ///
    /// Chat-completion providers have no server-side session object, so
    /// creation is local bookkeeping; the instruction is replayed as the
    /// system message on every send.
    async fn create_session(&self, system_instruction: &str) -> Result<SessionId, DialogueError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let history = vec![ChatTurn {
            role: "system",
            content: system_instruction.to_string(),
        }];
        self.sessions.lock().unwrap().insert(id, history);
        log::debug!("dialogue: session {id} created");
        Ok(id)
    }

    /// Append `text` to the session and request a completion over the full
    /// history.
    ///
    /// The `Authorization: Bearer …` header is attached **only** when the
    /// credential is non-empty — safe for local providers that require no
    /// authentication.
    async fn send_message(
        &self,
        session: SessionId,
        text: &str,
    ) -> Result<String, DialogueError> {
        // Snapshot the history under a short lock; never hold it across an
        // await point.
        let messages: Vec<serde_json::Value> = {
            let mut sessions = self.sessions.lock().unwrap();
            let history = sessions
                .get_mut(&session)
                .ok_or(DialogueError::UnknownSession(session))?;
            history.push(ChatTurn {
                role: "user",
                content: text.to_string(),
            });
            history
                .iter()
                .map(|t| serde_json::json!({ "role": t.role, "content": t.content }))
                .collect()
        };

        let url = format!("{}/v1/chat/completions", self.config.base_url);

        let body = serde_json::json!({
            "model":       self.config.model,
            "messages":    messages,
            "stream":      false,
            "temperature": self.config.temperature,
            "max_tokens":  self.config.max_reply_tokens,
        });

        let mut req = self.client.post(&url).json(&body);
        if !self.credential.is_empty() {
            req = req.bearer_auth(&self.credential);
        }

        let response = req.send().await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DialogueError::Malformed(e.to_string()))?;

        let reply = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| DialogueError::Malformed("no reply text in payload".into()))?
            .trim()
            .to_string();

        if reply.is_empty() {
            return Err(DialogueError::EmptyReply);
        }

        // Record the assistant turn so the next send carries it.  The
        // session may have been discarded while the request was in flight;
        // that reply is stale and simply not recorded.
        if let Some(history) = self.sessions.lock().unwrap().get_mut(&session) {
            history.push(ChatTurn {
                role: "assistant",
                content: reply.clone(),
            });
        }

        Ok(reply)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config() -> DialogueConfig {
        DialogueConfig {
            base_url: "http://localhost:11434".into(),
            model: "qwen2.5:3b".into(),
            temperature: 0.3,
            max_reply_tokens: 64,
            response_timeout_ms: 2_000,
        }
    }

    #[test]
    fn from_config_builds_without_panic() {
        let _dialogue = ApiDialogue::from_config(&make_config(), "sk-test-1234");
    }

    #[test]
    fn from_config_accepts_empty_credential() {
        let _dialogue = ApiDialogue::from_config(&make_config(), "");
    }

    /// Verify that `ApiDialogue` is object-safe (usable as `dyn DialogueApi`).
    #[test]
    fn dialogue_is_object_safe() {
        let dialogue: Box<dyn DialogueApi> =
            Box::new(ApiDialogue::from_config(&make_config(), "sk-test"));
        drop(dialogue);
    }

    #[tokio::test]
    async fn create_session_yields_distinct_ids() {
        let dialogue = ApiDialogue::from_config(&make_config(), "sk-test");

        let a = dialogue.create_session("be brief").await.expect("a");
        let b = dialogue.create_session("be brief").await.expect("b");

        assert_ne!(a, b);
        assert_eq!(dialogue.session_count(), 2);
    }

    #[tokio::test]
    async fn send_to_unknown_session_fails() {
        let dialogue = ApiDialogue::from_config(&make_config(), "sk-test");

        let err = dialogue
            .send_message(999, "hello")
            .await
            .expect_err("unknown session must fail");
        assert!(matches!(err, DialogueError::UnknownSession(999)));
    }

    #[test]
    fn timeout_error_maps_from_reqwest() {
        // Covered indirectly: the From impl picks Timeout for is_timeout()
        // errors.  Here we at least pin the user-facing wording.
        assert!(DialogueError::Timeout.to_string().contains("did not respond"));
        assert!(DialogueError::EmptyReply.to_string().contains("empty"));
    }
}
