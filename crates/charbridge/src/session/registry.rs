//! Session registry: conversation creation, message exchange, and
//! recovery-on-expiry.
//!
//! The registry owns the session store and the single guard that serializes
//! all session work. `respond` never fails: backend errors are absorbed here
//! and converted into one of two fixed replies, so the relay loop always has
//! exactly one piece of text to send back.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::{ChatBackend, ChatError};

use super::store::{ConversationSession, SessionStore};
use super::{CONNECTIVITY_ERROR_REPLY, GENERIC_ERROR_REPLY, UserId};

// ============================================================================
// Session Registry
// ============================================================================

/// Registry for per-user AI conversations.
///
/// All creation, use, and recovery of sessions — across all users — runs
/// under one internal mutex, held for the full duration of a `respond` call
/// including both backend round-trips. The backend client objects are not
/// proven safe for concurrent use, and the store must not be mutated while
/// an exchange is in flight.
pub struct SessionRegistry {
    store: Mutex<SessionStore>,
    backend: Arc<dyn ChatBackend>,
    character_id: String,
}

/// Result of closing all sessions at shutdown.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Number of sessions closed cleanly.
    pub closed: usize,
    /// Sessions whose close failed (user id, error message).
    pub failed: Vec<(UserId, String)>,
}

impl SessionRegistry {
    pub fn new(backend: Arc<dyn ChatBackend>, character_id: impl Into<String>) -> Self {
        Self {
            store: Mutex::new(SessionStore::new()),
            backend,
            character_id: character_id.into(),
        }
    }

    /// Produce the reply for one user message.
    ///
    /// Creates the user's session lazily on first contact, reuses it
    /// afterwards, and recreates it once — transparently — when the backend
    /// reports the session closed. Always returns reply text; never an
    /// error.
    pub async fn respond(&self, user_id: UserId, prompt: &str) -> String {
        let mut store = self.store.lock().await;

        let session = match store.get(user_id) {
            Some(existing) => existing.clone(),
            None => match self.open_session(&mut store, user_id).await {
                Ok(created) => created,
                Err(ChatError::SessionClosed) => {
                    return self.recover_and_resend(&mut store, user_id, prompt).await;
                }
                Err(e) => {
                    warn!(user_id, error = %e, "Failed to open chat session");
                    return GENERIC_ERROR_REPLY.to_string();
                }
            },
        };

        match session
            .client
            .send_message(&self.character_id, &session.chat_id, prompt)
            .await
        {
            Ok(reply) => reply,
            Err(ChatError::SessionClosed) => {
                self.recover_and_resend(&mut store, user_id, prompt).await
            }
            Err(e) => {
                // The stored session stays as-is: an unrelated failure must
                // not corrupt prior state.
                warn!(user_id, error = %e, "Backend call failed");
                GENERIC_ERROR_REPLY.to_string()
            }
        }
    }

    /// Close every stored session, best-effort, and leave the store empty.
    ///
    /// Runs under the same guard as `respond`, so it cannot race an
    /// in-flight exchange. Individual close failures are collected and
    /// logged, never fatal.
    pub async fn shutdown(&self) -> ShutdownReport {
        let mut store = self.store.lock().await;
        let mut report = ShutdownReport::default();

        for (user_id, session) in store.drain() {
            match session.client.close().await {
                Ok(()) => {
                    debug!(user_id, "Closed chat session");
                    report.closed += 1;
                }
                Err(e) => {
                    warn!(user_id, error = %e, "Failed to close chat session");
                    report.failed.push((user_id, e.to_string()));
                }
            }
        }

        info!(
            closed = report.closed,
            failed = report.failed.len(),
            "Session shutdown complete"
        );
        report
    }

    /// Number of active sessions.
    pub async fn len(&self) -> usize {
        self.store.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.lock().await.is_empty()
    }

    // ------------------------------------------------------------------------
    // Private Helpers
    // ------------------------------------------------------------------------

    /// Connect a fresh client, create a conversation, and store the pair.
    async fn open_session(
        &self,
        store: &mut SessionStore,
        user_id: UserId,
    ) -> Result<ConversationSession, ChatError> {
        let client = self.backend.connect().await?;
        let chat = client.create_chat(&self.character_id).await?;

        // The greeting is informational only; it is never sent to the user.
        info!(
            user_id,
            chat_id = %chat.chat_id,
            greeting = chat.greeting.as_deref().unwrap_or(""),
            "Created new chat session"
        );

        let session = ConversationSession {
            client,
            chat_id: chat.chat_id,
        };
        store.put(user_id, session.clone());
        Ok(session)
    }

    /// One-shot recovery: discard the stored session, build a brand-new
    /// client and conversation, and resend the prompt once.
    ///
    /// The new entry is stored only if the resend succeeds; a failed
    /// recovery leaves no session recorded, so the next message starts
    /// fresh.
    async fn recover_and_resend(
        &self,
        store: &mut SessionStore,
        user_id: UserId,
        prompt: &str,
    ) -> String {
        info!(user_id, "Chat session closed, creating a new one");
        store.delete(user_id);

        match self.try_recover(prompt).await {
            Ok((session, reply)) => {
                store.put(user_id, session);
                reply
            }
            Err(e) => {
                warn!(user_id, error = %e, "Failed to recover chat session");
                CONNECTIVITY_ERROR_REPLY.to_string()
            }
        }
    }

    async fn try_recover(
        &self,
        prompt: &str,
    ) -> Result<(ConversationSession, String), ChatError> {
        let client = self.backend.connect().await?;
        let chat = client.create_chat(&self.character_id).await?;
        let reply = client
            .send_message(&self.character_id, &chat.chat_id, prompt)
            .await?;

        Ok((
            ConversationSession {
                client,
                chat_id: chat.chat_id,
            },
            reply,
        ))
    }
}
