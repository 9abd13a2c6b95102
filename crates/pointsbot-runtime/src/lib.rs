#![deny(missing_docs)]
//! Points bot runtime helpers.
//!
//! Transport-agnostic background work: the periodic reminder schedulers and
//! their spawn and shutdown handles.

/// Reminder scheduling.
pub mod reminders;

pub use reminders::{
    spawn_reminder_scheduler, spawn_reminder_schedulers, ReminderConfig, ReminderScheduler,
    TickReport,
};
