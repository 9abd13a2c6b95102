//! Telegram transport settings.

use config::ConfigError;
use pointsbot_core::config::CoreSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    pub telegram_token: String,
    /// Comma-separated list of staff user IDs allowed to manage slots.
    #[serde(rename = "staff_ids")]
    pub staff_ids_str: Option<String>,
    /// Chat that receives error reports.
    #[serde(default)]
    pub admin_chat_id: Option<i64>,
}

/// Combined settings used by the Telegram transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Core settings shared across transport handlers.
    pub core: Arc<CoreSettings>,
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(core: CoreSettings, telegram: TelegramSettings) -> Self {
        Self {
            core: Arc::new(core),
            telegram: Arc::new(telegram),
        }
    }
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        pointsbot_core::config::build_config()?.try_deserialize()
    }

    /// Returns the set of staff user IDs.
    #[must_use]
    pub fn staff_ids(&self) -> HashSet<i64> {
        self.staff_ids_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .filter_map(|id| id.parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `user_id` may generate and cancel slots.
    #[must_use]
    pub fn is_staff(&self, user_id: i64) -> bool {
        self.staff_ids().contains(&user_id)
    }
}

/// First delay of the interactive reply retry (milliseconds).
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound on one retry delay (milliseconds).
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4_000;
/// Retries after the first failed attempt.
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
