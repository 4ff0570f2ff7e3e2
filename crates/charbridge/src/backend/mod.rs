//! AI backend abstraction.
//!
//! The session registry talks to the backend only through these traits, so
//! tests can substitute a scripted double and the HTTP client stays an
//! implementation detail.

mod characterai;
mod error;

use std::sync::Arc;

use async_trait::async_trait;

pub use characterai::{CharacterAiBackend, CharacterAiClient};
pub use error::ChatError;

/// A freshly created conversation.
#[derive(Debug, Clone)]
pub struct NewChat {
    /// Backend-assigned conversation id.
    pub chat_id: String,
    /// Greeting turn returned by creation. Informational only; it is logged
    /// but never relayed to the user.
    pub greeting: Option<String>,
}

/// Factory for authenticated backend clients.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Authenticate a fresh client against the backend.
    async fn connect(&self) -> Result<Arc<dyn ChatClient>, ChatError>;
}

/// An authenticated client holding one remote session.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Create a new conversation with the given character.
    async fn create_chat(&self, character_id: &str) -> Result<NewChat, ChatError>;

    /// Send a message within a conversation and return the primary response
    /// candidate's text.
    async fn send_message(
        &self,
        character_id: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<String, ChatError>;

    /// End the remote session.
    async fn close(&self) -> Result<(), ChatError>;
}
