//! Booking orchestration
//!
//! Ties slot storage to notifications: race-free booking with read-after-
//! write, idempotent generation, owner cancellation and the read paths the
//! chat handlers present.

use crate::config::{FREE_SLOTS_DEFAULT_DAYS, FREE_SLOTS_LIST_LIMIT};
use crate::notify::NotificationDispatcher;
use crate::slots::{plan_slots, FreeSlotFilter, GenerateRequest, PlanError, Slot, SlotStore};
use crate::storage::StorageError;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors of booking operations.
#[derive(Error, Debug)]
pub enum BookingError {
    /// Storage fault
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Invalid generation request
    #[error("Invalid request: {0}")]
    Plan(#[from] PlanError),
}

/// Result of a booking attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingOutcome {
    /// The requester now holds the slot
    Booked(Slot),
    /// Someone else holds it, it was already held by the requester, or it
    /// does not exist
    Unavailable,
}

/// Counts reported after generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateSummary {
    /// Slots the request describes
    pub planned: usize,
    /// Slots that did not exist yet
    pub created: u64,
}

impl GenerateSummary {
    /// Planned slots that already existed.
    #[must_use]
    pub fn duplicates(&self) -> u64 {
        u64::try_from(self.planned)
            .unwrap_or(u64::MAX)
            .saturating_sub(self.created)
    }
}

/// Booking API used by chat handlers and form flows.
pub struct BookingService {
    store: Arc<dyn SlotStore>,
    dispatcher: Arc<NotificationDispatcher>,
    tz: Tz,
}

impl BookingService {
    /// Create a service working in the `tz` time zone.
    #[must_use]
    pub fn new(
        store: Arc<dyn SlotStore>,
        dispatcher: Arc<NotificationDispatcher>,
        tz: Tz,
    ) -> Self {
        Self {
            store,
            dispatcher,
            tz,
        }
    }

    /// The configured time zone.
    #[must_use]
    pub const fn time_zone(&self) -> Tz {
        self.tz
    }

    /// Book a slot for a requester and notify both parties on success.
    ///
    /// # Errors
    ///
    /// Returns an error only for storage faults; contention is
    /// `BookingOutcome::Unavailable`.
    pub async fn book(
        &self,
        slot_id: i64,
        requester_id: i64,
    ) -> Result<BookingOutcome, BookingError> {
        if !self.store.try_book(slot_id, requester_id).await? {
            debug!(slot_id, requester_id, "Slot not available");
            return Ok(BookingOutcome::Unavailable);
        }

        let Some(slot) = self.store.get(slot_id).await? else {
            warn!(slot_id, "Booked slot disappeared before notification");
            return Ok(BookingOutcome::Unavailable);
        };

        info!(slot_id, requester_id, owner_id = slot.owner_id, "Slot booked");
        self.dispatcher.notify_booked(&slot).await;
        Ok(BookingOutcome::Booked(slot))
    }

    /// Generate weekly slots; existing `(owner, start)` pairs are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid request (before touching storage) or
    /// a storage fault (nothing is inserted).
    pub async fn generate(
        &self,
        request: &GenerateRequest,
        now: DateTime<Utc>,
    ) -> Result<GenerateSummary, BookingError> {
        let slots = plan_slots(request, now, self.tz)?;
        let planned = slots.len();
        let created = self.store.insert_slots(slots).await?;
        info!(
            owner_id = request.owner_id,
            group_id = request.group_id,
            planned,
            created,
            "Slots generated"
        );
        Ok(GenerateSummary { planned, created })
    }

    /// Unbooked slots matching a filter.
    ///
    /// # Errors
    ///
    /// Returns an error on storage faults.
    pub async fn free_slots(&self, filter: FreeSlotFilter) -> Result<Vec<Slot>, BookingError> {
        Ok(self.store.list_free(filter).await?)
    }

    /// Unbooked future slots of one owner, on a local date or for the
    /// coming week.
    ///
    /// # Errors
    ///
    /// Returns an error on storage faults.
    pub async fn free_slots_of(
        &self,
        owner_id: i64,
        date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Slot>, BookingError> {
        let (from, to) = match date {
            Some(date) => {
                let Some((day_start, day_end)) = date
                    .succ_opt()
                    .map(|next| (self.local_midnight(date), self.local_midnight(next)))
                else {
                    return Ok(Vec::new());
                };
                (day_start.max(now), day_end)
            }
            None => (now, now + TimeDelta::days(FREE_SLOTS_DEFAULT_DAYS)),
        };
        if from >= to {
            return Ok(Vec::new());
        }

        self.free_slots(FreeSlotFilter {
            group_id: None,
            owner_id: Some(owner_id),
            from,
            to,
            limit: FREE_SLOTS_LIST_LIMIT,
        })
        .await
    }

    /// Upcoming slots held by a requester.
    ///
    /// # Errors
    ///
    /// Returns an error on storage faults.
    pub async fn my_bookings(
        &self,
        holder_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Slot>, BookingError> {
        Ok(self
            .store
            .list_booked_by(holder_id, now, FREE_SLOTS_LIST_LIMIT)
            .await?)
    }

    /// Release a booking as the slot owner and notify the former holder.
    ///
    /// Returns the slot as it was before the release, or `None` if the
    /// owner has no booked slot with this id.
    ///
    /// # Errors
    ///
    /// Returns an error on storage faults.
    pub async fn cancel(&self, slot_id: i64, owner_id: i64) -> Result<Option<Slot>, BookingError> {
        let Some(slot) = self.store.release(slot_id, owner_id).await? else {
            debug!(slot_id, owner_id, "Nothing to cancel");
            return Ok(None);
        };

        if let Some(holder_id) = slot.holder_id {
            info!(slot_id, owner_id, holder_id, "Booking cancelled by owner");
            let released = Slot {
                holder_id: None,
                ..slot.clone()
            };
            self.dispatcher
                .notify_cancelled_by_owner(&released, holder_id)
                .await;
        }
        Ok(Some(slot))
    }

    /// First instant of a local date. Days and their lengths follow the
    /// zone, so a DST day spans 23 or 25 hours.
    fn local_midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_time(NaiveTime::MIN);
        // Zones that jump at midnight start the day at the end of the gap
        (0..=2)
            .find_map(|hour| {
                self.tz
                    .from_local_datetime(&(midnight + TimeDelta::hours(hour)))
                    .earliest()
            })
            .map_or_else(|| midnight.and_utc(), |dt| dt.with_timezone(&Utc))
    }
}
