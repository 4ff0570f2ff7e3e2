//! Telegram gateway for charbridge using teloxide.
//!
//! The gateway is started in two steps: [`TelegramGateway::authenticate`]
//! verifies the bot token against the Bot API (failure here is fatal to the
//! run — the process must not enter its event loop without an authenticated
//! transport), and [`AuthenticatedGateway::start`] runs the dispatcher,
//! translating Telegram updates into protocol events and protocol commands
//! into Bot API calls.

use std::time::Instant;

use charbridge_gateway_protocol::{
    GatewayCommand, GatewayEvent, MessageContent, MessageReceivedData, Sender, capabilities,
};
use teloxide::prelude::*;
use teloxide::types::{MediaKind, Message, MessageKind};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the Telegram gateway.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Telegram bot token from BotFather.
    pub bot_token: String,
}

impl TelegramConfig {
    /// Create a new config with the given bot token.
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
        }
    }
}

/// Error during gateway authentication.
#[derive(Debug, Error)]
pub enum GatewayInitError {
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("telegram authentication failed: {0}")]
    Auth(#[from] teloxide::RequestError),
}

// ============================================================================
// Telegram Gateway
// ============================================================================

/// Telegram gateway that bridges the Telegram Bot API with charbridge.
pub struct TelegramGateway {
    config: TelegramConfig,
}

impl TelegramGateway {
    /// Create a new Telegram gateway.
    pub fn new(config: TelegramConfig) -> Self {
        Self { config }
    }

    /// Verify the bot token against the Bot API.
    ///
    /// Calls `getMe`; an invalid token or unreachable API surfaces here,
    /// before any update is ever polled.
    pub async fn authenticate(self) -> Result<AuthenticatedGateway, GatewayInitError> {
        // HTTP client timeout must exceed the long-polling timeout
        let client = teloxide::net::default_reqwest_settings()
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;

        let bot = Bot::with_client(&self.config.bot_token, client);
        let me = bot.get_me().await?;

        info!(username = %me.username(), "Telegram bot authenticated");

        Ok(AuthenticatedGateway {
            bot,
            started_at: Instant::now(),
        })
    }
}

/// A Telegram gateway with a verified bot token.
pub struct AuthenticatedGateway {
    bot: Bot,
    started_at: Instant,
}

impl AuthenticatedGateway {
    /// Start the gateway and communicate via the provided channels.
    ///
    /// This method blocks until shutdown is requested.
    pub async fn start(
        self,
        event_tx: mpsc::Sender<GatewayEvent>,
        mut command_rx: mpsc::Receiver<GatewayCommand>,
    ) {
        let bot = self.bot;

        let ready_event = GatewayEvent::Ready {
            gateway: "telegram".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities: vec![
                capabilities::TYPING.to_string(),
                capabilities::REPLY.to_string(),
            ],
        };
        if event_tx.send(ready_event).await.is_err() {
            warn!("Event channel closed before gateway start");
            return;
        }

        info!("Telegram gateway starting");

        let message_handler = Update::filter_message().endpoint({
            let event_tx = event_tx.clone();
            move |msg: Message| {
                let event_tx = event_tx.clone();
                async move {
                    if let Err(e) = handle_message(&msg, &event_tx).await {
                        warn!(error = %e, "Failed to handle message");
                    }
                    respond(())
                }
            }
        });

        let mut dispatcher = Dispatcher::builder(bot.clone(), message_handler).build();
        let shutdown_token = dispatcher.shutdown_token();

        // Clone for the command handler task
        let bot_for_commands = bot.clone();
        let event_tx_for_commands = event_tx.clone();
        let started_at = self.started_at;

        let command_handle = tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                match command {
                    GatewayCommand::SendMessage {
                        request_id,
                        chat_id,
                        content,
                        reply_to,
                    } => {
                        let result = send_message(
                            &bot_for_commands,
                            &chat_id,
                            &content,
                            reply_to.as_deref(),
                        )
                        .await;

                        let event = match result {
                            Ok(msg_id) => GatewayEvent::CommandOk {
                                request_id,
                                message_id: Some(msg_id),
                            },
                            Err(e) => GatewayEvent::CommandError {
                                request_id,
                                code: charbridge_gateway_protocol::error_codes::SEND_FAILED
                                    .to_string(),
                                message: e,
                            },
                        };

                        if event_tx_for_commands.send(event).await.is_err() {
                            break;
                        }
                    }

                    GatewayCommand::SendTyping { chat_id, .. } => {
                        let chat_id: i64 = match chat_id.parse() {
                            Ok(id) => id,
                            Err(_) => continue,
                        };
                        let _ = bot_for_commands
                            .send_chat_action(ChatId(chat_id), teloxide::types::ChatAction::Typing)
                            .await;
                    }

                    GatewayCommand::Ping { request_id } => {
                        let event = GatewayEvent::Pong {
                            request_id,
                            uptime_seconds: started_at.elapsed().as_secs(),
                            connected: true,
                        };
                        if event_tx_for_commands.send(event).await.is_err() {
                            break;
                        }
                    }

                    GatewayCommand::Shutdown => {
                        info!("Telegram gateway received shutdown command");
                        match shutdown_token.shutdown() {
                            // Triggering is enough; the dispatcher drains on its own
                            Ok(f) => drop(f),
                            Err(e) => warn!(error = %e, "Failed to shutdown dispatcher"),
                        }
                        let _ = event_tx_for_commands
                            .send(GatewayEvent::Shutdown {
                                reason: "shutdown requested".to_string(),
                            })
                            .await;
                        break;
                    }
                }
            }
            debug!("Command handler stopped");
        });

        // Long polling with a timeout shorter than the HTTP client's
        let polling = teloxide::update_listeners::Polling::builder(bot)
            .timeout(std::time::Duration::from_secs(30))
            .build();

        // Blocks until shutdown
        dispatcher
            .dispatch_with_listener(
                polling,
                teloxide::error_handlers::LoggingErrorHandler::with_custom_text(
                    "Telegram polling error (will retry)",
                ),
            )
            .await;

        command_handle.abort();
        info!("Telegram gateway stopped");
    }
}

// ============================================================================
// Message Handling
// ============================================================================

async fn handle_message(
    msg: &Message,
    event_tx: &mpsc::Sender<GatewayEvent>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(content) = extract_content(msg) else {
        debug!(chat_id = %msg.chat.id, "Ignoring non-text message");
        return Ok(());
    };

    let Some(sender) = extract_sender(msg) else {
        debug!(chat_id = %msg.chat.id, "Ignoring message without a sender");
        return Ok(());
    };

    let event = GatewayEvent::MessageReceived(Box::new(MessageReceivedData {
        message_id: msg.id.0.to_string(),
        chat_id: msg.chat.id.0.to_string(),
        sender,
        content,
        reply_to: msg.reply_to_message().map(|m| m.id.0.to_string()),
        timestamp: Some(msg.date),
    }));

    event_tx.send(event).await?;
    Ok(())
}

fn extract_content(msg: &Message) -> Option<MessageContent> {
    match &msg.kind {
        MessageKind::Common(common) => match &common.media_kind {
            MediaKind::Text(text) => Some(MessageContent::Text {
                text: text.text.clone(),
            }),
            _ => None,
        },
        _ => None,
    }
}

fn extract_sender(msg: &Message) -> Option<Sender> {
    msg.from.as_ref().map(|user| Sender {
        id: user.id.0.to_string(),
        username: user.username.clone(),
        display_name: Some(
            format!(
                "{} {}",
                user.first_name,
                user.last_name.as_deref().unwrap_or("")
            )
            .trim()
            .to_string(),
        ),
    })
}

// ============================================================================
// Command Execution
// ============================================================================

async fn send_message(
    bot: &Bot,
    chat_id: &str,
    content: &str,
    reply_to: Option<&str>,
) -> Result<String, String> {
    let chat_id: i64 = chat_id.parse().map_err(|_| "invalid chat_id".to_string())?;

    let mut request = bot.send_message(ChatId(chat_id), content);

    if let Some(reply_to) = reply_to
        && let Ok(msg_id) = reply_to.parse::<i32>()
    {
        request = request.reply_parameters(teloxide::types::ReplyParameters::new(
            teloxide::types::MessageId(msg_id),
        ));
    }

    let msg = request.await.map_err(|e| e.to_string())?;
    Ok(msg.id.0.to_string())
}
