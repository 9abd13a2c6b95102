use super::{FreeSlotFilter, NewSlot, ReminderHorizon, Slot, SlotStore};
use crate::storage::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

const SLOT_COLUMNS: &str =
    "id, owner_id, group_id, start_at, end_at, holder_id, reminded_long, reminded_short";

#[derive(FromRow)]
struct SlotRow {
    id: i64,
    owner_id: i64,
    group_id: i64,
    start_at: i64,
    end_at: i64,
    holder_id: Option<i64>,
    reminded_long: bool,
    reminded_short: bool,
}

impl TryFrom<SlotRow> for Slot {
    type Error = StorageError;

    fn try_from(row: SlotRow) -> Result<Self, Self::Error> {
        let start_at = from_unix(row.id, row.start_at)?;
        let end_at = from_unix(row.id, row.end_at)?;
        if start_at >= end_at {
            return Err(StorageError::CorruptRow(format!(
                "slot {} ends before it starts",
                row.id
            )));
        }
        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            group_id: row.group_id,
            start_at,
            end_at,
            holder_id: row.holder_id,
            reminded_long: row.reminded_long,
            reminded_short: row.reminded_short,
        })
    }
}

fn from_unix(slot_id: i64, secs: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| StorageError::CorruptRow(format!("slot {slot_id} has timestamp {secs}")))
}

fn into_slots(rows: Vec<SlotRow>) -> Result<Vec<Slot>, StorageError> {
    rows.into_iter().map(Slot::try_from).collect()
}

/// SQLite-backed slot storage.
#[derive(Clone, Debug)]
pub struct SqliteSlotStore {
    pool: SqlitePool,
}

impl SqliteSlotStore {
    /// Wrap a pool whose schema is already migrated.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SlotStore for SqliteSlotStore {
    async fn insert_slots(&self, slots: Vec<NewSlot>) -> Result<u64, StorageError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for slot in &slots {
            let result = sqlx::query(
                r"
                INSERT INTO slots (owner_id, group_id, start_at, end_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT (owner_id, start_at) DO NOTHING
                ",
            )
            .bind(slot.owner_id)
            .bind(slot.group_id)
            .bind(slot.start_at.timestamp())
            .bind(slot.end_at.timestamp())
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        debug!(planned = slots.len(), inserted, "Slot batch committed");
        Ok(inserted)
    }

    async fn try_book(&self, slot_id: i64, requester_id: i64) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r"
            UPDATE slots SET holder_id = ?
            WHERE id = ? AND holder_id IS NULL
            ",
        )
        .bind(requester_id)
        .bind(slot_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get(&self, slot_id: i64) -> Result<Option<Slot>, StorageError> {
        let row = sqlx::query_as::<_, SlotRow>(&format!(
            "SELECT {SLOT_COLUMNS} FROM slots WHERE id = ?"
        ))
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Slot::try_from).transpose()
    }

    async fn list_free(&self, filter: FreeSlotFilter) -> Result<Vec<Slot>, StorageError> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {SLOT_COLUMNS} FROM slots WHERE holder_id IS NULL AND start_at >= "
        ));
        query.push_bind(filter.from.timestamp());
        query.push(" AND start_at < ");
        query.push_bind(filter.to.timestamp());
        if let Some(group_id) = filter.group_id {
            query.push(" AND group_id = ");
            query.push_bind(group_id);
        }
        if let Some(owner_id) = filter.owner_id {
            query.push(" AND owner_id = ");
            query.push_bind(owner_id);
        }
        query.push(" ORDER BY start_at ASC, id ASC LIMIT ");
        query.push_bind(i64::from(filter.limit));

        let rows = query
            .build_query_as::<SlotRow>()
            .fetch_all(&self.pool)
            .await?;
        into_slots(rows)
    }

    async fn list_booked_by(
        &self,
        holder_id: i64,
        from: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Slot>, StorageError> {
        let rows = sqlx::query_as::<_, SlotRow>(&format!(
            "SELECT {SLOT_COLUMNS} FROM slots
             WHERE holder_id = ? AND start_at >= ?
             ORDER BY start_at ASC, id ASC LIMIT ?"
        ))
        .bind(holder_id)
        .bind(from.timestamp())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        into_slots(rows)
    }

    async fn release(&self, slot_id: i64, owner_id: i64) -> Result<Option<Slot>, StorageError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, SlotRow>(&format!(
            "SELECT {SLOT_COLUMNS} FROM slots WHERE id = ? AND owner_id = ?"
        ))
        .bind(slot_id)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(slot) = row.map(Slot::try_from).transpose()? else {
            return Ok(None);
        };
        let Some(holder_id) = slot.holder_id else {
            return Ok(None);
        };

        // Conditional on the holder we read, so a concurrent rebooking is
        // never cleared by mistake.
        let result = sqlx::query(
            r"
            UPDATE slots SET holder_id = NULL
            WHERE id = ? AND owner_id = ? AND holder_id = ?
            ",
        )
        .bind(slot_id)
        .bind(owner_id)
        .bind(holder_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((result.rows_affected() == 1).then_some(slot))
    }

    async fn due_for_reminder(
        &self,
        horizon: ReminderHorizon,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Slot>, StorageError> {
        let flag = horizon.flag_column();
        let rows = sqlx::query_as::<_, SlotRow>(&format!(
            "SELECT {SLOT_COLUMNS} FROM slots
             WHERE holder_id IS NOT NULL AND {flag} = 0
               AND start_at >= ? AND start_at <= ?
             ORDER BY start_at ASC, id ASC LIMIT ?"
        ))
        .bind(from.timestamp())
        .bind(to.timestamp())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        into_slots(rows)
    }

    async fn mark_reminded(
        &self,
        horizon: ReminderHorizon,
        slot_ids: Vec<i64>,
    ) -> Result<u64, StorageError> {
        if slot_ids.is_empty() {
            return Ok(0);
        }

        let flag = horizon.flag_column();
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "UPDATE slots SET {flag} = ({flag} OR 1) WHERE id IN ("
        ));
        let mut ids = query.separated(", ");
        for id in &slot_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(")");

        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
