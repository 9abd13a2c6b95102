//! Reminder scheduling
//!
//! One scheduler per horizon polls storage for booked slots starting around
//! `now + horizon`, notifies both parties and marks the slot.

mod scheduler;

pub use scheduler::{ReminderScheduler, TickReport};

use chrono::TimeDelta;
use pointsbot_core::config::CoreSettings;
use pointsbot_core::notify::NotificationDispatcher;
use pointsbot_core::report::ErrorReporter;
use pointsbot_core::slots::{ReminderHorizon, SlotStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Settings of one reminder scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderConfig {
    /// Horizon this scheduler serves
    pub horizon: ReminderHorizon,
    /// Half-width of the matched start window
    pub tolerance: TimeDelta,
    /// Maximum slots per tick
    pub batch_size: u32,
    /// Time between ticks
    pub period: Duration,
}

impl ReminderConfig {
    /// Config for `horizon` from core settings.
    #[must_use]
    pub fn from_settings(horizon: ReminderHorizon, settings: &CoreSettings) -> Self {
        Self {
            horizon,
            tolerance: settings.reminder_tolerance(),
            batch_size: settings.reminder_batch_size.max(1),
            period: settings.reminder_poll_period(),
        }
    }
}

/// Spawn the loop of one scheduler on the Tokio runtime.
pub fn spawn_reminder_scheduler(
    scheduler: Arc<ReminderScheduler>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(scheduler.run(cancel))
}

/// Spawn one scheduler per horizon, all stopped by `cancel`.
pub fn spawn_reminder_schedulers(
    store: &Arc<dyn SlotStore>,
    dispatcher: &Arc<NotificationDispatcher>,
    reporter: &Arc<dyn ErrorReporter>,
    settings: &CoreSettings,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    ReminderHorizon::ALL
        .into_iter()
        .map(|horizon| {
            let scheduler = Arc::new(ReminderScheduler::new(
                Arc::clone(store),
                Arc::clone(dispatcher),
                Arc::clone(reporter),
                ReminderConfig::from_settings(horizon, settings),
            ));
            spawn_reminder_scheduler(scheduler, cancel.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_default_settings() {
        let config = ReminderConfig::from_settings(ReminderHorizon::Long, &CoreSettings::default());
        assert_eq!(config.tolerance, TimeDelta::seconds(60));
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.period, Duration::from_secs(60));
    }

    #[test]
    fn test_zero_batch_is_raised() {
        let settings = CoreSettings {
            reminder_batch_size: 0,
            ..CoreSettings::default()
        };
        let config = ReminderConfig::from_settings(ReminderHorizon::Short, &settings);
        assert_eq!(config.batch_size, 1);
    }
}
