//! Gateway manager: registration, message routing, and lifecycle.
//!
//! The manager hands each registered gateway a command receiver and an event
//! sender, then drives an event loop that dispatches inbound messages to the
//! configured [`MessageHandler`] and sends any returned text back as a reply
//! to the originating message.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, warn};

use charbridge_gateway_protocol::{GatewayCommand, GatewayEvent, MessageReceivedData};

// ============================================================================
// Gateway Manager
// ============================================================================

/// Manager for gateway plugins.
#[derive(Clone)]
pub struct GatewayManager {
    inner: Arc<RwLock<GatewayManagerInner>>,
}

struct GatewayManagerInner {
    /// Command senders by gateway name.
    gateways: HashMap<String, mpsc::Sender<GatewayCommand>>,

    /// Message handler for incoming messages.
    handler: Option<Arc<dyn MessageHandler>>,

    /// JoinHandles for event loop tasks, awaited at shutdown.
    event_handles: Vec<tokio::task::JoinHandle<()>>,
}

impl GatewayManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(GatewayManagerInner {
                gateways: HashMap::new(),
                handler: None,
                event_handles: Vec::new(),
            })),
        }
    }

    /// Set the message handler for incoming gateway messages.
    pub async fn set_handler(&self, handler: Arc<dyn MessageHandler>) {
        let mut inner = self.inner.write().await;
        inner.handler = Some(handler);
    }

    /// Register a gateway and get channels for communication.
    ///
    /// Returns:
    /// - `Receiver<GatewayCommand>`: the gateway receives commands from here
    /// - `Sender<GatewayEvent>`: the gateway sends events into here
    pub async fn register(
        &self,
        name: impl Into<String>,
    ) -> (mpsc::Receiver<GatewayCommand>, mpsc::Sender<GatewayEvent>) {
        let name = name.into();
        let (cmd_tx, cmd_rx) = mpsc::channel(100);
        let (evt_tx, evt_rx) = mpsc::channel(100);

        {
            let mut inner = self.inner.write().await;
            inner.gateways.insert(name.clone(), cmd_tx);
        }

        // Spawn the event loop for this gateway
        let manager = self.clone();
        let gateway_name = name.clone();
        let join_handle = tokio::spawn(async move {
            manager.handle_events(gateway_name, evt_rx).await;
        });

        {
            let mut inner = self.inner.write().await;
            inner.event_handles.push(join_handle);
        }

        info!(gateway = %name, "Gateway registered");
        (cmd_rx, evt_tx)
    }

    /// Unregister a gateway.
    pub async fn unregister(&self, name: &str) {
        let mut inner = self.inner.write().await;
        if inner.gateways.remove(name).is_some() {
            info!(gateway = %name, "Gateway unregistered");
        }
    }

    /// List all registered gateways.
    pub async fn list(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        inner.gateways.keys().cloned().collect()
    }

    /// Send a message through a gateway.
    pub async fn send_message(
        &self,
        gateway: &str,
        chat_id: &str,
        content: &str,
        reply_to: Option<String>,
    ) -> Result<(), SendError> {
        let Some(tx) = self.command_tx(gateway).await else {
            warn!(gateway = %gateway, "Gateway not found");
            return Err(SendError::ChannelClosed);
        };

        let command = GatewayCommand::SendMessage {
            request_id: ulid::Ulid::new().to_string(),
            chat_id: chat_id.to_string(),
            content: content.to_string(),
            reply_to,
        };

        tx.send(command).await.map_err(|_| SendError::ChannelClosed)
    }

    /// Send a typing indicator through a gateway.
    pub async fn send_typing(&self, gateway: &str, chat_id: &str) -> Result<(), SendError> {
        let Some(tx) = self.command_tx(gateway).await else {
            return Err(SendError::ChannelClosed);
        };

        let command = GatewayCommand::SendTyping {
            chat_id: chat_id.to_string(),
            duration: 5,
        };

        tx.send(command).await.map_err(|_| SendError::ChannelClosed)
    }

    /// Shutdown all gateways gracefully.
    pub async fn shutdown(&self) {
        let gateways = {
            let inner = self.inner.read().await;
            inner
                .gateways
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Vec<_>>()
        };

        for (name, tx) in gateways {
            debug!(gateway = %name, "Sending shutdown to gateway");
            let _ = tx.send(GatewayCommand::Shutdown).await;
        }

        // Wait for event loop tasks to finish
        let handles = {
            let mut inner = self.inner.write().await;
            std::mem::take(&mut inner.event_handles)
        };
        for handle in handles {
            let _ = handle.await;
        }
    }

    async fn command_tx(&self, gateway: &str) -> Option<mpsc::Sender<GatewayCommand>> {
        let inner = self.inner.read().await;
        inner.gateways.get(gateway).cloned()
    }

    /// Handle events from a gateway until its channel closes.
    async fn handle_events(&self, gateway: String, mut rx: mpsc::Receiver<GatewayEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                GatewayEvent::Ready {
                    gateway: gw_name,
                    version,
                    capabilities,
                } => {
                    info!(
                        gateway = %gateway,
                        reported_name = %gw_name,
                        version = %version,
                        capabilities = ?capabilities,
                        "Gateway ready"
                    );
                }

                GatewayEvent::MessageReceived(data) => {
                    debug!(
                        gateway = %gateway,
                        message_id = %data.message_id,
                        chat_id = %data.chat_id,
                        sender_id = %data.sender.id,
                        "Message received from gateway"
                    );

                    let handler = {
                        let inner = self.inner.read().await;
                        inner.handler.clone()
                    };

                    let Some(handler) = handler else {
                        warn!(gateway = %gateway, "No message handler registered");
                        continue;
                    };

                    // Handled inline: the session registry serializes all
                    // backend work anyway, so there is nothing to gain from
                    // spawning per-message tasks here.
                    let response = handler.handle_message(&gateway, &data).await;

                    if let Some(response) = response {
                        if let Err(e) = self
                            .send_message(
                                &gateway,
                                &data.chat_id,
                                &response,
                                Some(data.message_id.clone()),
                            )
                            .await
                        {
                            error!(
                                gateway = %gateway,
                                chat_id = %data.chat_id,
                                error = %e,
                                "Failed to send response"
                            );
                        }
                    }
                }

                GatewayEvent::CommandOk {
                    request_id,
                    message_id,
                } => {
                    debug!(
                        gateway = %gateway,
                        request_id = %request_id,
                        message_id = ?message_id,
                        "Command completed"
                    );
                }

                GatewayEvent::CommandError {
                    request_id,
                    code,
                    message,
                } => {
                    error!(
                        gateway = %gateway,
                        request_id = %request_id,
                        code = %code,
                        message = %message,
                        "Command failed"
                    );
                }

                GatewayEvent::Error {
                    code,
                    message,
                    fatal,
                } => {
                    if fatal {
                        error!(
                            gateway = %gateway,
                            code = %code,
                            message = %message,
                            "Fatal gateway error"
                        );
                        self.unregister(&gateway).await;
                    } else {
                        warn!(
                            gateway = %gateway,
                            code = %code,
                            message = %message,
                            "Gateway error"
                        );
                    }
                }

                GatewayEvent::Shutdown { reason } => {
                    info!(gateway = %gateway, reason = %reason, "Gateway shutdown");
                    self.unregister(&gateway).await;
                    break;
                }

                GatewayEvent::Pong {
                    request_id,
                    uptime_seconds,
                    connected,
                } => {
                    debug!(
                        gateway = %gateway,
                        request_id = %request_id,
                        uptime_seconds = %uptime_seconds,
                        connected = %connected,
                        "Gateway pong"
                    );
                }
            }
        }

        debug!(gateway = %gateway, "Gateway event loop stopped");
    }
}

impl Default for GatewayManager {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Message Handler
// ============================================================================

/// Handler for incoming gateway messages.
///
/// The manager calls this for every received message; the returned text, if
/// any, is sent back as a reply to the originating message.
#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle an incoming message from a gateway.
    ///
    /// Returns the response content to send back, or None for silence.
    async fn handle_message(&self, gateway: &str, data: &MessageReceivedData) -> Option<String>;
}

/// Error sending a command to a gateway.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("gateway channel closed")]
    ChannelClosed,
}
