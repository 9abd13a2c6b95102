//! Contact lookup for slot parties
//!
//! The notification dispatcher needs a chat to write to for each staff
//! member and requester. Contacts are recorded whenever a user talks to the
//! bot.

use crate::storage::StorageError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, SqlitePool};

/// How to reach a user.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Contact {
    /// User identity
    pub user_id: i64,
    /// Private chat with the bot, if the user ever opened one
    pub chat_id: Option<i64>,
    /// Name shown to the other party
    pub display_name: String,
}

impl Contact {
    /// Display name, or a neutral placeholder when none is known.
    #[must_use]
    pub fn name_or_placeholder(&self) -> &str {
        if self.display_name.trim().is_empty() {
            "someone"
        } else {
            &self.display_name
        }
    }
}

/// Interface for user lookup
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve a user to a contact. `Ok(None)` means the user is unknown.
    async fn resolve(&self, user_id: i64) -> Result<Option<Contact>, StorageError>;
}

/// SQLite-backed user directory.
#[derive(Clone, Debug)]
pub struct SqliteUserDirectory {
    pool: SqlitePool,
}

impl SqliteUserDirectory {
    /// Wrap a pool whose schema is already migrated.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record or refresh a contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub async fn register(
        &self,
        user_id: i64,
        chat_id: i64,
        display_name: &str,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO users (user_id, chat_id, display_name, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (user_id) DO UPDATE SET
                chat_id = excluded.chat_id,
                display_name = excluded.display_name,
                updated_at = excluded.updated_at
            ",
        )
        .bind(user_id)
        .bind(chat_id)
        .bind(display_name)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn resolve(&self, user_id: i64) -> Result<Option<Contact>, StorageError> {
        let contact = sqlx::query_as::<_, Contact>(
            "SELECT user_id, chat_id, display_name FROM users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(contact)
    }
}
