//! In-process chat guards
//!
//! Duplicate suppression and rate limiting run on every inbound update;
//! the chat lock serializes multi-step interactions within one chat. All
//! state is private to the process and rebuilt empty on restart.

mod chat_limiter;
mod dupe_guard;
mod rate_limiter;

pub use chat_limiter::{ChatLimiter, ChatLockGuard};
pub use dupe_guard::{DupeGuard, DupeKey};
pub use rate_limiter::RateLimiter;

use crate::config::CoreSettings;
use tracing::debug;

/// Decision on an inbound update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Handle the update
    Allowed,
    /// Already handled within the dedup window
    Duplicate,
    /// The chat ran out of tokens
    RateLimited,
}

impl Admission {
    /// Whether the update should reach a handler.
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// The three guards, constructed once at startup and shared by handlers.
#[derive(Debug)]
pub struct InboundGuards {
    /// Duplicate suppression
    pub dupes: DupeGuard,
    /// Per-chat token bucket
    pub rate: RateLimiter,
    /// Per-chat step serialization
    pub chats: ChatLimiter,
}

impl InboundGuards {
    /// Build guards from settings.
    #[must_use]
    pub fn new(settings: &CoreSettings) -> Self {
        Self {
            dupes: DupeGuard::new(settings.dedup_ttl()),
            rate: RateLimiter::new(settings.rate_limit_rps, settings.rate_limit_burst),
            chats: ChatLimiter::new(settings.chat_lock_idle()),
        }
    }

    /// Run duplicate suppression, then rate limiting.
    ///
    /// A redelivered update is dropped before it can consume a token.
    #[must_use]
    pub fn admit(&self, key: &DupeKey) -> Admission {
        if !self.dupes.allow(key) {
            debug!(chat_id = key.chat_id(), "Duplicate update dropped");
            return Admission::Duplicate;
        }
        if !self.rate.allow(key.chat_id()) {
            debug!(chat_id = key.chat_id(), "Update rate limited");
            return Admission::RateLimited;
        }
        Admission::Allowed
    }
}
