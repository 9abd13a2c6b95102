use super::ReminderConfig;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use pointsbot_core::notify::NotificationDispatcher;
use pointsbot_core::report::ErrorReporter;
use pointsbot_core::slots::{Slot, SlotStore};
use pointsbot_core::storage::StorageError;
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters of one scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Slots returned by the due query
    pub due: usize,
    /// Due slots handled by an overlapping tick, already flagged or released
    pub skipped: usize,
    /// Slots whose notification reached every reachable party
    pub notified: usize,
    /// Slots with at least one failed delivery; retried next tick
    pub failed: usize,
    /// Flags set by the batched mark
    pub marked: u64,
}

/// Slot ids a tick is working on. Released on drop.
struct Claim {
    in_flight: Arc<Mutex<HashSet<i64>>>,
    ids: Vec<i64>,
}

impl Claim {
    fn acquire(in_flight: &Arc<Mutex<HashSet<i64>>>, candidates: &[Slot]) -> Self {
        let mut set = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let ids = candidates
            .iter()
            .map(|slot| slot.id)
            .filter(|id| set.insert(*id))
            .collect();
        Self {
            in_flight: Arc::clone(in_flight),
            ids,
        }
    }

    fn contains(&self, slot_id: i64) -> bool {
        self.ids.contains(&slot_id)
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        let mut set = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for id in &self.ids {
            set.remove(id);
        }
    }
}

/// Periodic reminder delivery for one horizon.
///
/// A slot is notified at most once per horizon: overlapping ticks skip slots
/// another tick has claimed, the claim is held until the flag is written,
/// and every claimed slot is re-read so a flag written after the due query
/// is still seen.
pub struct ReminderScheduler {
    store: Arc<dyn SlotStore>,
    dispatcher: Arc<NotificationDispatcher>,
    reporter: Arc<dyn ErrorReporter>,
    config: ReminderConfig,
    in_flight: Arc<Mutex<HashSet<i64>>>,
}

impl ReminderScheduler {
    /// Create a scheduler.
    #[must_use]
    pub fn new(
        store: Arc<dyn SlotStore>,
        dispatcher: Arc<NotificationDispatcher>,
        reporter: Arc<dyn ErrorReporter>,
        config: ReminderConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            reporter,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Scheduler configuration.
    #[must_use]
    pub const fn config(&self) -> &ReminderConfig {
        &self.config
    }

    /// Run one poll, dispatch and mark cycle as of `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the due query or the mark update fails. Slots
    /// notified before a failed mark will be notified again next tick.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, StorageError> {
        let horizon = self.config.horizon;
        let target = now + horizon.lead_time();
        let due = self
            .store
            .due_for_reminder(
                horizon,
                target - self.config.tolerance,
                target + self.config.tolerance,
                self.config.batch_size,
            )
            .await?;

        let claim = Claim::acquire(&self.in_flight, &due);
        let mut report = TickReport {
            due: due.len(),
            skipped: due.len() - claim.ids.len(),
            ..TickReport::default()
        };

        let mut delivered = Vec::with_capacity(claim.ids.len());
        for slot in due.iter().filter(|slot| claim.contains(slot.id)) {
            // The due rows may predate a mark by a tick that already let go
            let slot = match self.store.get(slot.id).await {
                Ok(Some(fresh)) if !fresh.is_reminded(horizon) && !fresh.is_free() => fresh,
                Ok(_) => {
                    debug!(%horizon, slot_id = slot.id, "Slot no longer due");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(%horizon, slot_id = slot.id, error = %e, "Slot re-read failed");
                    report.failed += 1;
                    continue;
                }
            };
            let outcome = self.dispatcher.notify_reminder(&slot, horizon).await;
            if outcome.is_complete() {
                delivered.push(slot.id);
            } else {
                report.failed += 1;
            }
        }
        report.notified = delivered.len();

        if !delivered.is_empty() {
            report.marked = self.store.mark_reminded(horizon, delivered).await?;
        }
        drop(claim);

        Ok(report)
    }

    /// Tick every period until `cancel` fires.
    ///
    /// Errors and panics inside a tick are reported and the loop keeps
    /// going. Cancellation is observed between ticks.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let horizon = self.config.horizon;
        let mut ticker = tokio::time::interval(self.config.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(%horizon, period = ?self.config.period, "Reminder scheduler started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let context = format!("reminder tick ({horizon})");
            match AssertUnwindSafe(self.tick(Utc::now())).catch_unwind().await {
                Ok(Ok(report)) if report.due > 0 => {
                    info!(
                        %horizon,
                        due = report.due,
                        skipped = report.skipped,
                        notified = report.notified,
                        failed = report.failed,
                        marked = report.marked,
                        "Reminder tick finished"
                    );
                }
                Ok(Ok(_)) => debug!(%horizon, "Nothing due"),
                Ok(Err(e)) => {
                    warn!(%horizon, error = %e, "Reminder tick failed");
                    self.reporter.report(&context, &e.to_string()).await;
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    warn!(%horizon, panic = %message, "Reminder tick panicked");
                    self.reporter
                        .report(&context, &format!("panic: {message}"))
                        .await;
                }
            }
        }

        info!(%horizon, "Reminder scheduler stopped");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
