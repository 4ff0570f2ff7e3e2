//! Gateway message handler that relays messages to the session registry.
//!
//! Applies the access-control gate, then delegates to
//! [`SessionRegistry::respond`]. Unauthorized senders get silence — no
//! reply, no error, nothing observable.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use charbridge_gateway_protocol::MessageReceivedData;

use crate::access::AuthorizedSet;
use crate::session::SessionRegistry;

use super::manager::{GatewayManager, MessageHandler};

/// Handler that relays authorized messages to the AI backend.
pub struct RelayHandler {
    authorized: AuthorizedSet,
    registry: Arc<SessionRegistry>,
    gateways: GatewayManager,
}

impl RelayHandler {
    pub fn new(
        authorized: AuthorizedSet,
        registry: Arc<SessionRegistry>,
        gateways: GatewayManager,
    ) -> Self {
        Self {
            authorized,
            registry,
            gateways,
        }
    }
}

#[async_trait]
impl MessageHandler for RelayHandler {
    async fn handle_message(&self, gateway: &str, data: &MessageReceivedData) -> Option<String> {
        // The platform hands us string ids; the session key is numeric
        let Ok(user_id) = data.sender.id.parse::<u64>() else {
            debug!(sender_id = %data.sender.id, "Ignoring sender with non-numeric id");
            return None;
        };

        if !self
            .authorized
            .is_authorized(user_id, data.sender.username.as_deref())
        {
            debug!(user_id, "Ignoring unauthorized sender");
            return None;
        }

        let Some(text) = data.content.as_text() else {
            debug!(user_id, "Ignoring non-text content");
            return None;
        };

        debug!(
            user_id,
            chat_id = %data.chat_id,
            chars = text.chars().count(),
            "Relaying message"
        );

        // Best-effort; the reply does not depend on it
        let _ = self.gateways.send_typing(gateway, &data.chat_id).await;

        Some(self.registry.respond(user_id, text).await)
    }
}
