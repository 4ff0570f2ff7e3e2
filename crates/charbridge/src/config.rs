//! Environment-driven configuration.
//!
//! All settings come from the process environment; a missing or empty
//! required variable is a fatal startup error, before any session work
//! begins.

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;

/// Default base URL for the Character AI HTTP API.
pub const DEFAULT_BASE_URL: &str = "https://plus.character.ai";

/// Default per-request deadline for backend calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram: TelegramSettings,
    pub character: CharacterSettings,
    pub access: AccessSettings,
}

#[derive(Debug, Clone)]
pub struct TelegramSettings {
    /// Bot token from BotFather.
    pub bot_token: String,
}

#[derive(Debug, Clone)]
pub struct CharacterSettings {
    /// Backend auth token.
    pub token: String,
    /// The character id all conversations target.
    pub character_id: String,
    /// Base URL of the backend API.
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct AccessSettings {
    /// Numeric user ids allowed to use the bot.
    pub allowed_user_ids: HashSet<u64>,
    /// Usernames allowed to use the bot.
    pub allowed_usernames: HashSet<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable '{0}' is not set")]
    MissingVar(String),

    #[error("environment variable '{name}' is invalid: {reason}")]
    InvalidVar { name: String, reason: String },
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            telegram: TelegramSettings {
                bot_token: required_var("TELEGRAM_BOT_TOKEN")?,
            },
            character: CharacterSettings {
                token: required_var("CHARACTER_AI_TOKEN")?,
                character_id: required_var("CHARACTER_AI_ID")?,
                base_url: optional_var("CHARACTER_AI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            },
            access: AccessSettings {
                allowed_user_ids: parse_id_list(
                    "ALLOWED_USER_IDS",
                    &required_var("ALLOWED_USER_IDS")?,
                )?,
                allowed_usernames: parse_name_list(&required_var("ALLOWED_USERNAMES")?),
            },
        })
    }
}

// ============================================================================
// Environment Access
// ============================================================================

fn required_var(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name.to_string())),
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// ============================================================================
// List Parsing
// ============================================================================

/// Parse a comma-separated list of numeric ids.
///
/// Whitespace around entries is trimmed; empty segments (e.g. from a
/// trailing comma) are skipped. A non-numeric entry is a fatal error.
fn parse_id_list(name: &str, raw: &str) -> Result<HashSet<u64>, ConfigError> {
    let mut ids = HashSet::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let id = entry.parse::<u64>().map_err(|_| ConfigError::InvalidVar {
            name: name.to_string(),
            reason: format!("'{}' is not a numeric user id", entry),
        })?;
        ids.insert(id);
    }
    Ok(ids)
}

/// Parse a comma-separated list of usernames, trimming whitespace and
/// skipping empty segments.
fn parse_name_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
