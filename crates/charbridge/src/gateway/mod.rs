//! Gateway system: the bridge between chat platforms and the session
//! registry.
//!
//! A gateway runs in-process and talks to the core over a pair of mpsc
//! channels carrying protocol commands and events. The [`GatewayManager`]
//! owns the channels and the event loop; the [`RelayHandler`] turns inbound
//! messages into session-registry calls.

pub mod handler;
pub mod manager;

// Re-export protocol types from the protocol crate
pub use charbridge_gateway_protocol::{
    GatewayCommand, GatewayEvent, MessageContent, MessageReceivedData, Sender, capabilities,
    error_codes,
};

pub use handler::RelayHandler;
pub use manager::{GatewayManager, MessageHandler, SendError};

// Re-export the Telegram gateway
pub use charbridge_gateway_telegram::{
    AuthenticatedGateway, GatewayInitError, TelegramConfig, TelegramGateway,
};
