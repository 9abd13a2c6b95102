//! Storage layer for slots and contacts
//!
//! Provides the SQLite pool, the schema the core relies on and the shared
//! storage error type.

use sqlx::sqlite::SqlitePoolOptions;

pub use sqlx::sqlite::SqlitePool;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Error reported by the database driver
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A stored row violates an invariant of the model
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

/// Open a connection pool and make sure the schema exists.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or migrated.
pub async fn connect(database_url: &str) -> Result<SqlitePool, StorageError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await?;
    migrate(&pool).await?;
    info!("Slot storage ready.");
    Ok(pool)
}

/// Open a private in-memory database with the schema applied.
///
/// The pool holds exactly one connection that never expires, so every
/// query sees the same database.
///
/// # Errors
///
/// Returns an error if SQLite cannot be initialised.
pub async fn in_memory() -> Result<SqlitePool, StorageError> {
    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Create tables and indexes if they are missing.
///
/// Instants are stored as unix seconds so that window queries compare
/// integers.
///
/// # Errors
///
/// Returns an error if a DDL statement fails.
pub async fn migrate(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS slots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            group_id INTEGER NOT NULL,
            start_at INTEGER NOT NULL,
            end_at INTEGER NOT NULL,
            holder_id INTEGER,
            reminded_long INTEGER NOT NULL DEFAULT 0,
            reminded_short INTEGER NOT NULL DEFAULT 0,
            CHECK (start_at < end_at),
            UNIQUE (owner_id, start_at)
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE INDEX IF NOT EXISTS idx_slots_start
        ON slots(start_at, holder_id)
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE INDEX IF NOT EXISTS idx_slots_holder
        ON slots(holder_id, start_at)
        WHERE holder_id IS NOT NULL
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER PRIMARY KEY,
            chat_id INTEGER,
            display_name TEXT NOT NULL DEFAULT '',
            updated_at INTEGER NOT NULL
        )
        ",
    )
    .execute(pool)
    .await?;

    Ok(())
}
