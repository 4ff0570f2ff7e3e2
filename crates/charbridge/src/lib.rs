//! charbridge core: configuration, access control, the AI backend client,
//! the session registry, and the gateway plumbing that ties them together.

pub mod access;
pub mod backend;
pub mod config;
pub mod gateway;
pub mod session;

/// Crate version, reported by the CLI and the gateway Ready event.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
