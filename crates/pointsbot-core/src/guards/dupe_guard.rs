use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Identity of an inbound update for duplicate suppression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DupeKey {
    chat_id: i64,
    message_id: i32,
    payload: Option<String>,
}

impl DupeKey {
    /// Key of a plain message.
    #[must_use]
    pub const fn message(chat_id: i64, message_id: i32) -> Self {
        Self {
            chat_id,
            message_id,
            payload: None,
        }
    }

    /// Key of a button press on a message.
    ///
    /// Different buttons under the same message are distinct updates.
    #[must_use]
    pub fn callback(chat_id: i64, message_id: i32, payload: impl Into<String>) -> Self {
        Self {
            chat_id,
            message_id,
            payload: Some(payload.into()),
        }
    }

    /// Chat the update belongs to.
    #[must_use]
    pub const fn chat_id(&self) -> i64 {
        self.chat_id
    }
}

/// TTL-bounded at-most-once filter.
///
/// Expired entries are swept on every call; the table is bounded by the
/// number of distinct updates seen within one TTL.
#[derive(Debug)]
pub struct DupeGuard {
    ttl: Duration,
    seen: DashMap<DupeKey, Instant>,
}

impl DupeGuard {
    /// Create a guard remembering keys for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: DashMap::new(),
        }
    }

    /// `true` the first time `key` is seen within the TTL, `false` after.
    #[must_use]
    pub fn allow(&self, key: &DupeKey) -> bool {
        self.allow_at(key, Instant::now())
    }

    pub(crate) fn allow_at(&self, key: &DupeKey, now: Instant) -> bool {
        let ttl = self.ttl;
        self.seen
            .retain(|_, seen_at| now.saturating_duration_since(*seen_at) < ttl);

        match self.seen.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(now);
                true
            }
        }
    }

    /// Number of remembered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether no keys are remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_once_within_ttl_then_again_after() {
        let guard = DupeGuard::new(Duration::from_secs(300));
        let key = DupeKey::message(1, 10);
        let start = Instant::now();

        assert!(guard.allow_at(&key, start));
        assert!(!guard.allow_at(&key, start + Duration::from_secs(10)));
        assert!(!guard.allow_at(&key, start + Duration::from_secs(299)));
        assert!(guard.allow_at(&key, start + Duration::from_secs(300)));
    }

    #[test]
    fn test_payload_distinguishes_callbacks() {
        let guard = DupeGuard::new(Duration::from_secs(60));
        let now = Instant::now();

        assert!(guard.allow_at(&DupeKey::callback(1, 10, "book:1"), now));
        assert!(guard.allow_at(&DupeKey::callback(1, 10, "book:2"), now));
        assert!(guard.allow_at(&DupeKey::message(1, 10), now));
        assert!(!guard.allow_at(&DupeKey::callback(1, 10, "book:1"), now));
    }

    #[test]
    fn test_expired_entries_are_swept() {
        let guard = DupeGuard::new(Duration::from_secs(5));
        let start = Instant::now();
        for message_id in 0..10 {
            assert!(guard.allow_at(&DupeKey::message(1, message_id), start));
        }
        assert_eq!(guard.len(), 10);

        assert!(guard.allow_at(&DupeKey::message(2, 0), start + Duration::from_secs(6)));
        assert_eq!(guard.len(), 1);
    }
}
