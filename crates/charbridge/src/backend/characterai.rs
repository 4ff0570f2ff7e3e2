//! Character AI HTTP client.
//!
//! Speaks the chat-history API: conversations are created against a fixed
//! character id, messages are exchanged as "turns" carrying one or more
//! response candidates, and the backend marks one candidate as primary.
//!
//! Session invalidation surfaces as HTTP 401 and is mapped to
//! [`ChatError::SessionClosed`]; every other failure is a generic backend
//! error. All calls carry a per-request deadline so a hung backend cannot
//! block the relay indefinitely.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::{CharacterSettings, DEFAULT_REQUEST_TIMEOUT};

use super::error::ChatError;
use super::{ChatBackend, ChatClient, NewChat};

// ============================================================================
// Backend (client factory)
// ============================================================================

/// Factory for authenticated Character AI clients.
pub struct CharacterAiBackend {
    base_url: String,
    token: String,
    request_timeout: Duration,
}

impl CharacterAiBackend {
    pub fn new(settings: &CharacterSettings) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[async_trait]
impl ChatBackend for CharacterAiBackend {
    async fn connect(&self) -> Result<Arc<dyn ChatClient>, ChatError> {
        let http = Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(ChatError::Request)?;

        let client = CharacterAiClient {
            http,
            base_url: self.base_url.clone(),
            token: self.token.clone(),
        };

        // Validate the token up front so a dead credential fails the
        // connect, not the first message.
        client.fetch_account().await?;

        Ok(Arc::new(client))
    }
}

// ============================================================================
// Client (one remote session)
// ============================================================================

/// An authenticated Character AI client.
pub struct CharacterAiClient {
    http: Client,
    base_url: String,
    token: String,
}

impl CharacterAiClient {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Build a request with the token auth header.
    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "application/json")
    }

    async fn fetch_account(&self) -> Result<(), ChatError> {
        let response = self
            .request(self.http.get(self.url("/chat/user/")))
            .send()
            .await
            .map_err(map_transport_error)?;
        check_status(response).await.map(|_| ())
    }
}

#[async_trait]
impl ChatClient for CharacterAiClient {
    async fn create_chat(&self, character_id: &str) -> Result<NewChat, ChatError> {
        let body = CreateChatRequest {
            character_external_id: character_id,
            history_external_id: None,
        };

        let response = self
            .request(self.http.post(self.url("/chat/history/create/")))
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_status(response).await?;

        let created: CreateChatResponse =
            response.json().await.map_err(map_transport_error)?;

        let greeting = created
            .messages
            .first()
            .and_then(|turn| turn.primary_candidate())
            .map(|candidate| candidate.raw_content.clone());

        debug!(chat_id = %created.external_id, "Created chat history");

        Ok(NewChat {
            chat_id: created.external_id,
            greeting,
        })
    }

    async fn send_message(
        &self,
        character_id: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<String, ChatError> {
        let body = SendMessageRequest {
            character_external_id: character_id,
            history_external_id: chat_id,
            text,
        };

        let response = self
            .request(self.http.post(self.url("/chat/message/")))
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_status(response).await?;

        let turn: TurnPayload = response.json().await.map_err(map_transport_error)?;

        let candidate = turn
            .primary_candidate()
            .ok_or_else(|| ChatError::Malformed("turn has no candidates".to_string()))?;

        Ok(candidate.raw_content.clone())
    }

    async fn close(&self) -> Result<(), ChatError> {
        let response = self
            .request(self.http.post(self.url("/chat/session/end/")))
            .send()
            .await
            .map_err(map_transport_error)?;
        check_status(response).await.map(|_| ())
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(serde::Serialize)]
struct CreateChatRequest<'a> {
    character_external_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    history_external_id: Option<&'a str>,
}

#[derive(serde::Deserialize)]
struct CreateChatResponse {
    external_id: String,
    /// The greeting turn, when the character has one.
    #[serde(default)]
    messages: Vec<TurnPayload>,
}

#[derive(serde::Serialize)]
struct SendMessageRequest<'a> {
    character_external_id: &'a str,
    history_external_id: &'a str,
    text: &'a str,
}

#[derive(serde::Deserialize)]
struct TurnPayload {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    primary_candidate_id: Option<String>,
}

#[derive(serde::Deserialize)]
struct Candidate {
    candidate_id: String,
    raw_content: String,
}

impl TurnPayload {
    /// The candidate marked primary by the backend, falling back to the
    /// first candidate.
    fn primary_candidate(&self) -> Option<&Candidate> {
        match &self.primary_candidate_id {
            Some(id) => self
                .candidates
                .iter()
                .find(|c| &c.candidate_id == id)
                .or_else(|| self.candidates.first()),
            None => self.candidates.first(),
        }
    }
}

// ============================================================================
// Error Mapping
// ============================================================================

/// Map a transport-level failure to the backend taxonomy.
fn map_transport_error(e: reqwest::Error) -> ChatError {
    if e.is_timeout() {
        ChatError::Timeout
    } else {
        ChatError::Request(e)
    }
}

/// Map a non-success status to the backend taxonomy.
///
/// 401 means the token or session is no longer valid on the remote side.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ChatError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.as_u16() == 401 {
        return Err(ChatError::SessionClosed);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ChatError::Api {
        status: status.as_u16(),
        message,
    })
}
