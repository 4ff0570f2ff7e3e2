//! The `run` command: startup, the relay event loop, and ordered shutdown.
//!
//! Startup order: configuration (fatal on error), backend + session
//! registry, gateway manager + relay handler, Telegram authentication
//! (fatal on error), then the gateway event loop. Shutdown order: stop the
//! gateway first so no new events arrive, then close every AI session.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};

use charbridge::access::AuthorizedSet;
use charbridge::backend::CharacterAiBackend;
use charbridge::config::Config;
use charbridge::gateway::{GatewayManager, RelayHandler, TelegramConfig, TelegramGateway};
use charbridge::session::SessionRegistry;

pub async fn run() -> Result<()> {
    let config = Config::from_env().context("configuration error")?;

    // Session layer
    let backend = Arc::new(CharacterAiBackend::new(&config.character));
    let registry = Arc::new(SessionRegistry::new(
        backend,
        config.character.character_id.clone(),
    ));

    // Gateway layer
    let gateways = GatewayManager::new();
    let handler = RelayHandler::new(
        AuthorizedSet::from_settings(&config.access),
        registry.clone(),
        gateways.clone(),
    );
    gateways.set_handler(Arc::new(handler)).await;

    // Authenticate the transport before entering the event loop; a bad bot
    // token aborts the run here.
    let gateway = TelegramGateway::new(TelegramConfig::new(&config.telegram.bot_token))
        .authenticate()
        .await
        .context("telegram transport initialization failed")?;

    let (cmd_rx, evt_tx) = gateways.register("telegram").await;
    let gateway_handle = tokio::spawn(async move {
        gateway.start(evt_tx, cmd_rx).await;
    });

    info!("charbridge is up and relaying messages");

    shutdown_signal().await;

    // Stop the gateway first so no new events race the session sweep
    gateways.shutdown().await;
    if let Err(e) = gateway_handle.await {
        warn!(error = ?e, "Gateway task panicked during shutdown");
    }

    let report = registry.shutdown().await;
    for (user_id, error) in &report.failed {
        warn!(user_id, error = %error, "Session left unclosed");
    }

    info!("charbridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
