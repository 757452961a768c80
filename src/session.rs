//! Dialogue client and session lifecycle, keyed by the credential.
//!
//! [`SessionManager`] owns the only mutable handle to the dialogue client
//! and session.  Its rules:
//!
//! * Setting the credential — to any value, even an unchanged one — tears
//!   down both client and session.  A non-empty value rebuilds the client;
//!   an empty one leaves the feature disabled.  Re-running with an
//!   identical value is a deliberate re-arm hook, not an optimisation miss.
//! * The session is created lazily with the fixed companion persona and
//!   survives turn failures; only a credential change, an explicit reset,
//!   or teardown discards it.
//!
//! The [`DialogueConnector`] seam exists so tests can substitute a scripted
//! backend for [`ApiDialogue`].

use std::sync::Arc;

use thiserror::Error;

use crate::config::DialogueConfig;
use crate::dialogue::{ApiDialogue, DialogueApi, SessionId};

// ---------------------------------------------------------------------------
// Companion persona
// ---------------------------------------------------------------------------

/// The fixed system instruction every session is created with.
///
/// Conversational tone and concise replies are part of the product contract;
/// this text is not configurable.
pub const COMPANION_PERSONA: &str = "You are a friendly and supportive companion. The user is \
currently cleaning their space. Your role is to keep them company with light, engaging \
conversation. You can ask how they're feeling, chat about interesting topics, or offer general \
encouragement. Avoid giving specific cleaning instructions. Just be a pleasant presence. Keep \
your responses concise, typically one or two sentences.";

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Errors from the client/session lifecycle.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// No credential is set; the dialogue feature is disabled.
    #[error("credential is missing — voice companion disabled")]
    CredentialMissing,

    /// The dialogue client could not be constructed.  The next start
    /// attempt retries construction.
    #[error("failed to initialise dialogue client: {0}")]
    ClientInit(String),

    /// Session creation failed.  The session stays absent; the next start
    /// attempt retries creation.
    #[error("AI session initialisation error: {0}")]
    SessionInit(String),
}

// ---------------------------------------------------------------------------
// DialogueConnector
// ---------------------------------------------------------------------------

/// Builds a dialogue client from a credential.
///
/// The production implementation is [`ApiConnector`]; tests substitute a
/// mock to script client-construction failures.
pub trait DialogueConnector: Send + Sync {
    fn connect(&self, credential: &str) -> Result<Arc<dyn DialogueApi>, SessionError>;
}

/// Connects [`ApiDialogue`] backends from a [`DialogueConfig`].
pub struct ApiConnector {
    config: DialogueConfig,
}

impl ApiConnector {
    pub fn new(config: DialogueConfig) -> Self {
        Self { config }
    }
}

impl DialogueConnector for ApiConnector {
    fn connect(&self, credential: &str) -> Result<Arc<dyn DialogueApi>, SessionError> {
        Ok(Arc::new(ApiDialogue::from_config(&self.config, credential)))
    }
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// Keeps the dialogue client/session pair consistent with the credential.
pub struct SessionManager {
    connector: Arc<dyn DialogueConnector>,
    credential: String,
    client: Option<Arc<dyn DialogueApi>>,
    session: Option<SessionId>,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn DialogueConnector>) -> Self {
        Self {
            connector,
            credential: String::new(),
            client: None,
            session: None,
        }
    }

    /// Replace the credential, unconditionally discarding any existing
    /// client and session first.
    ///
    /// Returns [`SessionError::CredentialMissing`] for an empty value and
    /// [`SessionError::ClientInit`] when construction is rejected; in both
    /// cases the client stays absent.
    pub fn set_credential(&mut self, value: &str) -> Result<(), SessionError> {
        self.client = None;
        self.session = None;
        self.credential = value.to_string();

        if value.is_empty() {
            log::info!("session: credential cleared, dialogue disabled");
            return Err(SessionError::CredentialMissing);
        }

        let client = self.connector.connect(value)?;
        self.client = Some(client);
        log::info!("session: dialogue client ready");
        Ok(())
    }

    /// The current client, constructing it from the stored credential if a
    /// previous construction attempt failed.
    pub fn ensure_client(&mut self) -> Result<Arc<dyn DialogueApi>, SessionError> {
        if self.credential.is_empty() {
            return Err(SessionError::CredentialMissing);
        }
        match &self.client {
            Some(client) => Ok(Arc::clone(client)),
            None => {
                let client = self.connector.connect(&self.credential)?;
                self.client = Some(Arc::clone(&client));
                Ok(client)
            }
        }
    }

    /// Create the session if none exists, and return its handle.
    ///
    /// On failure the session stays absent; the failure is surfaced to the
    /// caller and never retried automatically.
    pub async fn ensure_session(&mut self) -> Result<SessionId, SessionError> {
        if let Some(id) = self.session {
            return Ok(id);
        }
        let client = self.ensure_client()?;
        let id = client
            .create_session(COMPANION_PERSONA)
            .await
            .map_err(|e| SessionError::SessionInit(e.to_string()))?;
        self.session = Some(id);
        log::info!("session: dialogue session {id} ready");
        Ok(id)
    }

    /// Store a session created out-of-band (by the coordinator's
    /// awaiting-session task).
    pub fn adopt_session(&mut self, id: SessionId) {
        self.session = Some(id);
    }

    /// Discard the session only; the client survives so "start fresh" needs
    /// no new credential.
    pub fn reset_session(&mut self) {
        if self.session.take().is_some() {
            log::info!("session: dialogue session discarded");
        }
    }

    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    pub fn credential_present(&self) -> bool {
        !self.credential.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Dialogue backend that hands out sequential session ids and echoes.
    struct StubDialogue {
        created: AtomicU64,
    }

    impl StubDialogue {
        fn new() -> Self {
            Self {
                created: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl DialogueApi for StubDialogue {
        async fn create_session(
            &self,
            _system_instruction: &str,
        ) -> Result<SessionId, crate::dialogue::DialogueError> {
            Ok(self.created.fetch_add(1, Ordering::SeqCst) + 1)
        }

        async fn send_message(
            &self,
            _session: SessionId,
            text: &str,
        ) -> Result<String, crate::dialogue::DialogueError> {
            Ok(format!("echo: {text}"))
        }
    }

    /// Connector that always succeeds with a fresh stub.
    struct StubConnector;

    impl DialogueConnector for StubConnector {
        fn connect(&self, _credential: &str) -> Result<Arc<dyn DialogueApi>, SessionError> {
            Ok(Arc::new(StubDialogue::new()))
        }
    }

    /// Connector that always rejects construction.
    struct RefusingConnector;

    impl DialogueConnector for RefusingConnector {
        fn connect(&self, _credential: &str) -> Result<Arc<dyn DialogueApi>, SessionError> {
            Err(SessionError::ClientInit("connection refused".into()))
        }
    }

    /// Connector whose backend rejects session creation.
    struct NoSessionConnector;

    struct NoSessionDialogue;

    #[async_trait]
    impl DialogueApi for NoSessionDialogue {
        async fn create_session(
            &self,
            _system_instruction: &str,
        ) -> Result<SessionId, crate::dialogue::DialogueError> {
            Err(crate::dialogue::DialogueError::SessionCreate(
                "quota exceeded".into(),
            ))
        }

        async fn send_message(
            &self,
            _session: SessionId,
            _text: &str,
        ) -> Result<String, crate::dialogue::DialogueError> {
            unreachable!("no session can exist")
        }
    }

    impl DialogueConnector for NoSessionConnector {
        fn connect(&self, _credential: &str) -> Result<Arc<dyn DialogueApi>, SessionError> {
            Ok(Arc::new(NoSessionDialogue))
        }
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[test]
    fn new_manager_has_nothing() {
        let mgr = SessionManager::new(Arc::new(StubConnector));
        assert!(!mgr.credential_present());
        assert!(!mgr.has_client());
        assert!(mgr.session().is_none());
    }

    #[test]
    fn set_credential_builds_client() {
        let mut mgr = SessionManager::new(Arc::new(StubConnector));
        mgr.set_credential("abc").expect("client");
        assert!(mgr.has_client());
        assert!(mgr.credential_present());
    }

    #[test]
    fn empty_credential_disables_and_discards() {
        let mut mgr = SessionManager::new(Arc::new(StubConnector));
        mgr.set_credential("abc").expect("client");

        let err = mgr.set_credential("").expect_err("empty must fail");
        assert!(matches!(err, SessionError::CredentialMissing));
        assert!(!mgr.has_client());
        assert!(mgr.session().is_none());
    }

    #[tokio::test]
    async fn identical_credential_still_discards_session() {
        let mut mgr = SessionManager::new(Arc::new(StubConnector));
        mgr.set_credential("abc").expect("client");
        mgr.ensure_session().await.expect("session");
        assert!(mgr.session().is_some());

        // Same value still means a full teardown.
        mgr.set_credential("abc").expect("client again");
        assert!(mgr.session().is_none());
        assert!(mgr.has_client());
    }

    #[test]
    fn refused_client_leaves_client_absent() {
        let mut mgr = SessionManager::new(Arc::new(RefusingConnector));
        let err = mgr.set_credential("abc").expect_err("must refuse");
        assert!(matches!(err, SessionError::ClientInit(_)));
        assert!(!mgr.has_client());
        // The credential is retained so a later attempt can retry.
        assert!(mgr.credential_present());
    }

    #[tokio::test]
    async fn ensure_session_is_lazy_and_sticky() {
        let mut mgr = SessionManager::new(Arc::new(StubConnector));
        mgr.set_credential("abc").expect("client");

        let first = mgr.ensure_session().await.expect("first");
        let second = mgr.ensure_session().await.expect("second");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn ensure_session_without_credential_fails() {
        let mut mgr = SessionManager::new(Arc::new(StubConnector));
        let err = mgr.ensure_session().await.expect_err("no credential");
        assert!(matches!(err, SessionError::CredentialMissing));
    }

    #[tokio::test]
    async fn rejected_session_creation_leaves_session_absent() {
        let mut mgr = SessionManager::new(Arc::new(NoSessionConnector));
        mgr.set_credential("abc").expect("client");

        let err = mgr.ensure_session().await.expect_err("creation refused");
        assert!(matches!(err, SessionError::SessionInit(_)));
        assert!(mgr.session().is_none());
        // Client untouched — only the session failed.
        assert!(mgr.has_client());
    }

    #[tokio::test]
    async fn reset_session_keeps_client() {
        let mut mgr = SessionManager::new(Arc::new(StubConnector));
        mgr.set_credential("abc").expect("client");
        mgr.ensure_session().await.expect("session");

        mgr.reset_session();

        assert!(mgr.session().is_none());
        assert!(mgr.has_client());
    }

    #[tokio::test]
    async fn ensure_client_retries_after_refusal() {
        // First connector refuses; emulate recovery by swapping behaviour
        // through set_credential on a fresh manager with a working connector.
        let mut refused = SessionManager::new(Arc::new(RefusingConnector));
        assert!(refused.set_credential("abc").is_err());
        assert!(refused.ensure_client().is_err());

        let mut mgr = SessionManager::new(Arc::new(StubConnector));
        assert!(mgr.set_credential("abc").is_ok());
        assert!(mgr.ensure_client().is_ok());
    }

    #[test]
    fn persona_is_conversational_and_concise() {
        assert!(COMPANION_PERSONA.contains("companion"));
        assert!(COMPANION_PERSONA.contains("concise"));
    }
}
