//! The `check` command: configuration preflight.
//!
//! Loads the environment configuration and prints a redacted summary, so a
//! deployment can be validated without touching Telegram or the backend.

use anyhow::{Context, Result};

use charbridge::config::Config;

pub fn run() -> Result<()> {
    let config = Config::from_env().context("configuration error")?;

    println!("Configuration OK");
    println!("  telegram bot token:  {}", redact(&config.telegram.bot_token));
    println!("  backend token:       {}", redact(&config.character.token));
    println!("  character id:        {}", config.character.character_id);
    println!("  backend base url:    {}", config.character.base_url);
    println!(
        "  allowed user ids:    {}",
        config.access.allowed_user_ids.len()
    );
    println!(
        "  allowed usernames:   {}",
        config.access.allowed_usernames.len()
    );

    Ok(())
}

/// Keep the first few characters of a secret, mask the rest.
fn redact(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}… ({} chars)", visible, secret.chars().count())
}
