use dashmap::DashMap;
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

impl Bucket {
    fn tokens_at(&self, now: Instant, rps: f64, burst: f64) -> f64 {
        now.saturating_duration_since(self.refilled_at)
            .as_secs_f64()
            .mul_add(rps, self.tokens)
            .min(burst)
    }
}

/// Per-chat token bucket.
///
/// Tokens refill continuously at `rps` per second up to `burst`. Each
/// admitted call consumes one token; a call finding less than one token is
/// rejected without waiting. Buckets that have refilled to `burst` are
/// dropped, since a fresh bucket behaves the same.
#[derive(Debug)]
pub struct RateLimiter {
    rps: f64,
    burst: f64,
    buckets: DashMap<i64, Bucket>,
}

impl RateLimiter {
    /// Create a limiter. A burst below one token is raised to one.
    #[must_use]
    pub fn new(rps: f64, burst: f64) -> Self {
        Self {
            rps: rps.max(0.0),
            burst: burst.max(1.0),
            buckets: DashMap::new(),
        }
    }

    /// Try to consume a token for `chat_id`.
    #[must_use]
    pub fn allow(&self, chat_id: i64) -> bool {
        self.allow_at(chat_id, Instant::now())
    }

    pub(crate) fn allow_at(&self, chat_id: i64, now: Instant) -> bool {
        self.sweep(now);

        let mut bucket = self.buckets.entry(chat_id).or_insert(Bucket {
            tokens: self.burst,
            refilled_at: now,
        });

        bucket.tokens = bucket.tokens_at(now, self.rps, self.burst);
        bucket.refilled_at = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn sweep(&self, now: Instant) {
        self.buckets
            .retain(|_, bucket| bucket.tokens_at(now, self.rps, self.burst) < self.burst);
    }

    /// Number of chats with a bucket.
    #[must_use]
    pub fn tracked_chats(&self) -> usize {
        self.buckets.len()
    }
}
