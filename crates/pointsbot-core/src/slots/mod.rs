//! Consultation slots
//!
//! The slot model, the weekly generation planner and the storage contract
//! that booking and reminders rely on.

mod planner;
mod sqlite;

pub use planner::{plan_slots, GenerateRequest, PlanError};
pub use sqlite::SqliteSlotStore;

use crate::config::{LONG_REMINDER_LEAD_SECS, SHORT_REMINDER_LEAD_SECS};
use crate::storage::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A bookable consultation window of one staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Storage identity
    pub id: i64,
    /// Staff member who owns the slot
    pub owner_id: i64,
    /// Group the slot is offered to
    pub group_id: i64,
    /// Start instant
    pub start_at: DateTime<Utc>,
    /// End instant, always after `start_at`
    pub end_at: DateTime<Utc>,
    /// Requester holding the booking, if any
    pub holder_id: Option<i64>,
    /// Long-horizon reminder already delivered
    pub reminded_long: bool,
    /// Short-horizon reminder already delivered
    pub reminded_short: bool,
}

impl Slot {
    /// Whether nobody holds the slot.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.holder_id.is_none()
    }

    /// Whether the reminder for `horizon` has been delivered.
    #[must_use]
    pub const fn is_reminded(&self, horizon: ReminderHorizon) -> bool {
        match horizon {
            ReminderHorizon::Long => self.reminded_long,
            ReminderHorizon::Short => self.reminded_short,
        }
    }

    /// Human-readable local time range, e.g. `Mon 19.10 16:20–16:40`.
    #[must_use]
    pub fn label(&self, tz: Tz) -> String {
        let start = self.start_at.with_timezone(&tz);
        let end = self.end_at.with_timezone(&tz);
        format!("{}–{}", start.format("%a %d.%m %H:%M"), end.format("%H:%M"))
    }
}

/// A slot about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSlot {
    /// Owning staff member
    pub owner_id: i64,
    /// Target group
    pub group_id: i64,
    /// Start instant
    pub start_at: DateTime<Utc>,
    /// End instant
    pub end_at: DateTime<Utc>,
}

/// The two independent reminder horizons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReminderHorizon {
    /// About a day ahead
    Long,
    /// About an hour ahead
    Short,
}

impl ReminderHorizon {
    /// Both horizons, long first.
    pub const ALL: [Self; 2] = [Self::Long, Self::Short];

    /// How long before the slot start the reminder is due.
    #[must_use]
    pub fn lead_time(self) -> TimeDelta {
        match self {
            Self::Long => TimeDelta::seconds(LONG_REMINDER_LEAD_SECS),
            Self::Short => TimeDelta::seconds(SHORT_REMINDER_LEAD_SECS),
        }
    }

    pub(crate) const fn flag_column(self) -> &'static str {
        match self {
            Self::Long => "reminded_long",
            Self::Short => "reminded_short",
        }
    }
}

impl fmt::Display for ReminderHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "24h"),
            Self::Short => write!(f, "1h"),
        }
    }
}

/// Query for unbooked slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeSlotFilter {
    /// Only slots offered to this group
    pub group_id: Option<i64>,
    /// Only slots of this staff member
    pub owner_id: Option<i64>,
    /// Inclusive lower bound on the start
    pub from: DateTime<Utc>,
    /// Exclusive upper bound on the start
    pub to: DateTime<Utc>,
    /// Maximum number of rows
    pub limit: u32,
}

/// Storage contract for slots.
///
/// Every call is a fresh query; implementations must not cache slot state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SlotStore: Send + Sync {
    /// Insert slots in one transaction, skipping existing `(owner, start)`
    /// pairs. Returns the number of rows actually inserted.
    async fn insert_slots(&self, slots: Vec<NewSlot>) -> Result<u64, StorageError>;

    /// Set the holder only if the slot is currently unbooked.
    ///
    /// Returns `true` iff this call performed the transition.
    async fn try_book(&self, slot_id: i64, requester_id: i64) -> Result<bool, StorageError>;

    /// Fetch one slot.
    async fn get(&self, slot_id: i64) -> Result<Option<Slot>, StorageError>;

    /// Unbooked slots matching the filter, ascending by start.
    async fn list_free(&self, filter: FreeSlotFilter) -> Result<Vec<Slot>, StorageError>;

    /// Slots held by a requester starting at or after `from`.
    async fn list_booked_by(
        &self,
        holder_id: i64,
        from: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Slot>, StorageError>;

    /// Clear the holder of a booked slot owned by `owner_id`.
    ///
    /// Returns the slot as it was before the release, or `None` if the slot
    /// does not exist, belongs to someone else or is not booked.
    async fn release(&self, slot_id: i64, owner_id: i64) -> Result<Option<Slot>, StorageError>;

    /// Booked slots starting within `[from, to]` whose flag for `horizon`
    /// is still unset, ascending by start.
    async fn due_for_reminder(
        &self,
        horizon: ReminderHorizon,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Slot>, StorageError>;

    /// Set the `horizon` flag on every listed slot with `flag OR 1`.
    async fn mark_reminded(
        &self,
        horizon: ReminderHorizon,
        slot_ids: Vec<i64>,
    ) -> Result<u64, StorageError>;
}
