//! In-memory session store.
//!
//! A pure data structure: no locking of its own. The registry owns the one
//! guard that serializes every access, so nothing here needs to be
//! thread-safe in isolation.

use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::ChatClient;

use super::UserId;

/// One user's ongoing AI conversation: the authenticated client handle and
/// the conversation it hosts.
///
/// Considered valid until the backend signals otherwise; never expired
/// proactively.
#[derive(Clone)]
pub struct ConversationSession {
    pub client: Arc<dyn ChatClient>,
    pub chat_id: String,
}

/// Mapping from user identity to conversation session, one entry per user.
#[derive(Default)]
pub struct SessionStore {
    entries: HashMap<UserId, ConversationSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: UserId) -> Option<&ConversationSession> {
        self.entries.get(&user_id)
    }

    pub fn put(&mut self, user_id: UserId, session: ConversationSession) {
        self.entries.insert(user_id, session);
    }

    /// Remove a user's session. Returns true if an entry was removed.
    pub fn delete(&mut self, user_id: UserId) -> bool {
        self.entries.remove(&user_id).is_some()
    }

    /// Remove and return every entry, leaving the store empty.
    pub fn drain(&mut self) -> Vec<(UserId, ConversationSession)> {
        self.entries.drain().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
