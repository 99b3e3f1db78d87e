//! Shared registries: active matches and pending authentications.
//!
//! Both are injected into the [`Matchmaker`](crate::Matchmaker) rather
//! than living as globals, so independent orchestrator instances (and
//! tests) never interfere. Match driver tasks run concurrently, so the
//! maps sit behind a mutex.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use stonewire_protocol::UserId;

/// Map from participant id to the id of the match they are in.
///
/// Invariant: a participant is in at most one match. Pair inserts are
/// all-or-nothing; removals are idempotent.
#[derive(Debug, Default)]
pub struct MatchRegistry {
    entries: Mutex<HashMap<UserId, String>>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the participant is currently in a match.
    pub fn contains(&self, user: UserId) -> bool {
        self.lock().contains_key(&user)
    }

    /// The id of the match the participant is in, if any.
    pub fn match_of(&self, user: UserId) -> Option<String> {
        self.lock().get(&user).cloned()
    }

    /// Registers both participants under `match_id` in one step.
    ///
    /// Fails with the offending participant if either is already
    /// registered; in that case neither entry is written.
    pub fn register_pair(
        &self,
        a: UserId,
        b: UserId,
        match_id: &str,
    ) -> Result<(), UserId> {
        let mut entries = self.lock();
        if entries.contains_key(&a) {
            return Err(a);
        }
        if entries.contains_key(&b) {
            return Err(b);
        }
        entries.insert(a, match_id.to_owned());
        entries.insert(b, match_id.to_owned());
        Ok(())
    }

    /// Removes both participants. Absent entries are ignored.
    pub fn release_pair(&self, a: UserId, b: UserId) {
        let mut entries = self.lock();
        entries.remove(&a);
        entries.remove(&b);
    }

    /// Number of registered participants.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, String>> {
        self.entries.lock().expect("match registry poisoned")
    }
}

/// Set of external users with an authentication in flight.
///
/// At most one pending authentication per user; completion and
/// cancellation both clear the entry idempotently.
#[derive(Debug, Default)]
pub struct AuthRegistry {
    pending: Mutex<HashSet<String>>,
}

impl AuthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an authentication as pending. Returns `false` if one is
    /// already in flight for this key.
    pub fn begin(&self, key: &str) -> bool {
        self.lock().insert(key.to_owned())
    }

    /// Clears a pending authentication. A no-op if none is pending.
    pub fn finish(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Whether an authentication is in flight for this key.
    pub fn is_pending(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.pending.lock().expect("auth registry poisoned")
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_pair_rejects_when_first_is_taken() {
        let registry = MatchRegistry::new();
        registry.register_pair(UserId(1), UserId(2), "m-1").unwrap();

        let err = registry
            .register_pair(UserId(1), UserId(3), "m-2")
            .unwrap_err();
        assert_eq!(err, UserId(1));
        // All-or-nothing: the free participant was not written either.
        assert!(!registry.contains(UserId(3)));
    }

    #[test]
    fn test_register_pair_rejects_when_second_is_taken() {
        let registry = MatchRegistry::new();
        registry.register_pair(UserId(1), UserId(2), "m-1").unwrap();

        let err = registry
            .register_pair(UserId(3), UserId(2), "m-2")
            .unwrap_err();
        assert_eq!(err, UserId(2));
        assert!(!registry.contains(UserId(3)));
    }

    #[test]
    fn test_register_pair_records_match_id_for_both() {
        let registry = MatchRegistry::new();
        registry.register_pair(UserId(1), UserId(2), "m-1").unwrap();

        assert_eq!(registry.match_of(UserId(1)).as_deref(), Some("m-1"));
        assert_eq!(registry.match_of(UserId(2)).as_deref(), Some("m-1"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_release_pair_is_idempotent() {
        let registry = MatchRegistry::new();
        registry.register_pair(UserId(1), UserId(2), "m-1").unwrap();

        registry.release_pair(UserId(1), UserId(2));
        registry.release_pair(UserId(1), UserId(2));
        assert!(registry.is_empty());

        // Releasing never-registered participants is also fine.
        registry.release_pair(UserId(8), UserId(9));
    }

    #[test]
    fn test_auth_begin_rejects_duplicate_until_finished() {
        let auths = AuthRegistry::new();
        assert!(auths.begin("discord:100"));
        assert!(!auths.begin("discord:100"));
        assert!(auths.is_pending("discord:100"));

        auths.finish("discord:100");
        assert!(!auths.is_pending("discord:100"));
        assert!(auths.begin("discord:100"));
    }

    #[test]
    fn test_auth_finish_absent_key_is_a_noop() {
        let auths = AuthRegistry::new();
        auths.finish("discord:100");
        assert!(!auths.is_pending("discord:100"));
    }
}
