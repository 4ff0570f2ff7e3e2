//! Access control for inbound messages.
//!
//! The bot is invisible to strangers: a sender that is neither in the id
//! allowlist nor in the username allowlist gets no reply at all.

use std::collections::HashSet;

use crate::config::AccessSettings;

/// The set of identities allowed to use the bot.
///
/// Built once at startup from configuration and read-only for the lifetime
/// of the process.
#[derive(Debug, Clone)]
pub struct AuthorizedSet {
    ids: HashSet<u64>,
    names: HashSet<String>,
}

impl AuthorizedSet {
    pub fn new(ids: HashSet<u64>, names: HashSet<String>) -> Self {
        Self { ids, names }
    }

    pub fn from_settings(settings: &AccessSettings) -> Self {
        Self {
            ids: settings.allowed_user_ids.clone(),
            names: settings.allowed_usernames.clone(),
        }
    }

    /// Check whether a sender is authorized.
    ///
    /// True iff the numeric id is allowlisted, or the username is present,
    /// non-empty, and allowlisted.
    pub fn is_authorized(&self, user_id: u64, username: Option<&str>) -> bool {
        if self.ids.contains(&user_id) {
            return true;
        }
        match username {
            Some(name) if !name.is_empty() => self.names.contains(name),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authorized() -> AuthorizedSet {
        AuthorizedSet::new(
            HashSet::from([42, 7]),
            HashSet::from(["alice".to_string(), "bob".to_string()]),
        )
    }

    #[test]
    fn allows_by_id() {
        let set = authorized();
        assert!(set.is_authorized(42, None));
        assert!(set.is_authorized(7, Some("nobody")));
    }

    #[test]
    fn allows_by_username() {
        let set = authorized();
        assert!(set.is_authorized(999, Some("alice")));
    }

    #[test]
    fn denies_unknown_sender() {
        let set = authorized();
        assert!(!set.is_authorized(999, Some("mallory")));
        assert!(!set.is_authorized(999, None));
    }

    #[test]
    fn empty_username_does_not_match() {
        let set = authorized();
        assert!(!set.is_authorized(999, Some("")));
    }

    #[test]
    fn empty_sets_deny_everyone() {
        let set = AuthorizedSet::new(HashSet::new(), HashSet::new());
        assert!(!set.is_authorized(42, Some("alice")));
    }

    #[test]
    fn id_match_wins_even_with_unlisted_username() {
        let set = authorized();
        assert!(set.is_authorized(42, Some("mallory")));
    }
}
