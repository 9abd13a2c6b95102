//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! the operational constants of the reminder scheduler and chat guards.

use chrono::TimeDelta;
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lead time of the long-horizon reminder (24 hours).
pub const LONG_REMINDER_LEAD_SECS: i64 = 24 * 60 * 60;
/// Lead time of the short-horizon reminder (1 hour).
pub const SHORT_REMINDER_LEAD_SECS: i64 = 60 * 60;
/// Half-width of the window around `now + horizon` that a poll matches.
pub const REMINDER_TOLERANCE_SECS: u64 = 60;
/// Upper bound on slots handled by one scheduler tick.
pub const REMINDER_BATCH_SIZE: u32 = 100;
/// Period between scheduler polls.
pub const REMINDER_POLL_SECS: u64 = 60;

/// Tokens refilled per second for each chat.
pub const RATE_LIMIT_RPS: f64 = 1.0;
/// Token bucket ceiling for each chat.
pub const RATE_LIMIT_BURST: f64 = 5.0;
/// How long an inbound update key is remembered.
pub const DEDUP_TTL_SECS: u64 = 300;
/// Idle time after which a chat lock may be evicted.
pub const CHAT_LOCK_IDLE_SECS: u64 = 3600;

/// Maximum free slots listed in one reply.
pub const FREE_SLOTS_LIST_LIMIT: u32 = 30;
/// Days covered by a free-slot listing without an explicit date.
pub const FREE_SLOTS_DEFAULT_DAYS: i64 = 7;

/// Build the layered configuration shared by every settings struct.
///
/// Sources, later ones win: `config/default`, `config/{RUN_MODE}`,
/// `config/local`, `APP__`-prefixed environment, plain environment.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be read.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // ignore_empty treats empty env vars as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Core settings: storage, time zone, scheduler and guard tuning.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoreSettings {
    /// sqlx connection string of the slot database.
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// School time zone as an IANA name, e.g. `Europe/Moscow`.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    /// Reminder poll tolerance in seconds.
    #[serde(default = "default_reminder_tolerance_secs")]
    pub reminder_tolerance_secs: u64,
    /// Reminder batch size.
    #[serde(default = "default_reminder_batch_size")]
    pub reminder_batch_size: u32,
    /// Reminder poll period in seconds.
    #[serde(default = "default_reminder_poll_secs")]
    pub reminder_poll_secs: u64,
    /// Rate limiter refill rate.
    #[serde(default = "default_rate_limit_rps")]
    pub rate_limit_rps: f64,
    /// Rate limiter burst.
    #[serde(default = "default_rate_limit_burst")]
    pub rate_limit_burst: f64,
    /// Duplicate-update memory in seconds.
    #[serde(default = "default_dedup_ttl_secs")]
    pub dedup_ttl_secs: u64,
    /// Chat lock idle eviction in seconds.
    #[serde(default = "default_chat_lock_idle_secs")]
    pub chat_lock_idle_secs: u64,
}

fn default_database_url() -> String {
    "sqlite://pointsbot.db?mode=rwc".to_string()
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

const fn default_reminder_tolerance_secs() -> u64 {
    REMINDER_TOLERANCE_SECS
}

const fn default_reminder_batch_size() -> u32 {
    REMINDER_BATCH_SIZE
}

const fn default_reminder_poll_secs() -> u64 {
    REMINDER_POLL_SECS
}

const fn default_rate_limit_rps() -> f64 {
    RATE_LIMIT_RPS
}

const fn default_rate_limit_burst() -> f64 {
    RATE_LIMIT_BURST
}

const fn default_dedup_ttl_secs() -> u64 {
    DEDUP_TTL_SECS
}

const fn default_chat_lock_idle_secs() -> u64 {
    CHAT_LOCK_IDLE_SECS
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            time_zone: default_time_zone(),
            reminder_tolerance_secs: REMINDER_TOLERANCE_SECS,
            reminder_batch_size: REMINDER_BATCH_SIZE,
            reminder_poll_secs: REMINDER_POLL_SECS,
            rate_limit_rps: RATE_LIMIT_RPS,
            rate_limit_burst: RATE_LIMIT_BURST,
            dedup_ttl_secs: DEDUP_TTL_SECS,
            chat_lock_idle_secs: CHAT_LOCK_IDLE_SECS,
        }
    }
}

impl CoreSettings {
    /// Load core settings from config files and environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or the time zone is unknown.
    pub fn new() -> Result<Self, ConfigError> {
        let settings: Self = build_config()?.try_deserialize()?;
        settings.time_zone()?;
        Ok(settings)
    }

    /// The school time zone.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `time_zone` is not an IANA zone name.
    pub fn time_zone(&self) -> Result<Tz, ConfigError> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|e| ConfigError::Message(format!("time_zone {:?}: {e}", self.time_zone)))
    }

    /// Reminder poll tolerance.
    #[must_use]
    pub fn reminder_tolerance(&self) -> TimeDelta {
        i64::try_from(self.reminder_tolerance_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or_else(|| TimeDelta::seconds(60))
    }

    /// Reminder poll period.
    #[must_use]
    pub fn reminder_poll_period(&self) -> Duration {
        Duration::from_secs(self.reminder_poll_secs.max(1))
    }

    /// Duplicate-update memory.
    #[must_use]
    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_secs)
    }

    /// Chat lock idle eviction.
    #[must_use]
    pub fn chat_lock_idle(&self) -> Duration {
        Duration::from_secs(self.chat_lock_idle_secs)
    }
}
