//! Gateway protocol types for communication between charbridge and a chat
//! gateway.
//!
//! The protocol is bidirectional:
//!
//! - **Commands** (charbridge → gateway): instructions for the gateway
//! - **Events** (gateway → charbridge): notifications from the gateway
//!
//! Both sides are plain serde types so a gateway can run in-process over
//! channels or be serialized as JSON Lines if it ever lives elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Commands (charbridge → Gateway)
// ============================================================================

/// Commands sent from charbridge to a gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayCommand {
    /// Send a text message to a chat.
    SendMessage {
        request_id: String,
        chat_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply_to: Option<String>,
    },

    /// Show a typing indicator in a chat.
    SendTyping {
        chat_id: String,
        /// Duration in seconds (0 = stop typing indicator).
        #[serde(default)]
        duration: u32,
    },

    /// Health check / ping.
    Ping { request_id: String },

    /// Request graceful shutdown.
    Shutdown,
}

// ============================================================================
// Events (Gateway → charbridge)
// ============================================================================

/// Events sent from a gateway to charbridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Gateway is authenticated and ready to receive commands.
    Ready {
        gateway: String,
        version: String,
        #[serde(default)]
        capabilities: Vec<String>,
    },

    /// Incoming message from a user.
    MessageReceived(Box<MessageReceivedData>),

    /// Command completed successfully.
    CommandOk {
        request_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },

    /// Command failed.
    CommandError {
        request_id: String,
        code: String,
        message: String,
    },

    /// Response to a Ping command.
    Pong {
        request_id: String,
        uptime_seconds: u64,
        connected: bool,
    },

    /// Gateway-level error (not tied to a specific command).
    Error {
        code: String,
        message: String,
        /// Whether this error is fatal (gateway will shut down).
        #[serde(default)]
        fatal: bool,
    },

    /// Gateway is shutting down.
    Shutdown { reason: String },
}

/// Data for an incoming message event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReceivedData {
    pub message_id: String,
    pub chat_id: String,
    pub sender: Sender,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Timestamp when the message was sent (from the platform).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Sender information for incoming messages.
///
/// Identifiers are strings at the protocol layer; the core parses the
/// numeric identity where it needs one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sender {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Content of an incoming message.
///
/// The relay is text-only; gateways surface anything else as `Unknown` or
/// drop it before it reaches the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text message.
    Text { text: String },

    /// Unknown/unsupported content type.
    Unknown {
        #[serde(default)]
        raw: serde_json::Value,
    },
}

impl MessageContent {
    /// Extract text content if this is a text message.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text { text } => Some(text),
            MessageContent::Unknown { .. } => None,
        }
    }
}

// ============================================================================
// Gateway Capabilities
// ============================================================================

/// Well-known gateway capabilities.
pub mod capabilities {
    /// Gateway supports typing indicators.
    pub const TYPING: &str = "typing";
    /// Gateway supports reply-to (threading).
    pub const REPLY: &str = "reply";
}

// ============================================================================
// Error Codes
// ============================================================================

/// Well-known error codes for CommandError and Error events.
pub mod error_codes {
    /// Chat/conversation not found.
    pub const CHAT_NOT_FOUND: &str = "chat_not_found";
    /// Sending a message failed.
    pub const SEND_FAILED: &str = "send_failed";
    /// Platform API error.
    pub const PLATFORM_ERROR: &str = "platform_error";
    /// Gateway not connected to the platform.
    pub const NOT_CONNECTED: &str = "not_connected";
}
