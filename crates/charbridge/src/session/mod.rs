//! Session management: one persistent AI conversation per user.
//!
//! The [`SessionRegistry`] is the only writer of session state and the only
//! component that talks to the AI backend during normal operation. All
//! access is serialized by the registry's internal guard.

mod registry;
mod store;

pub use registry::{SessionRegistry, ShutdownReport};
pub use store::{ConversationSession, SessionStore};

/// Stable numeric id identifying a chat-platform end user.
pub type UserId = u64;

/// Reply sent when recreating a session after expiry failed as well.
pub const CONNECTIVITY_ERROR_REPLY: &str =
    "A connection error occurred. Please try again later.";

/// Reply sent on any other backend failure.
pub const GENERIC_ERROR_REPLY: &str = "Sorry, something went wrong. Please try again later.";
