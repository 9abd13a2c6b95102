//! Testing helpers and fakes.
//!
//! Provides slot fixtures, a reporter that records instead of logging and
//! permissive mocks for the outbound traits.

use crate::notify::MockMessageSender;
use crate::report::ErrorReporter;
use crate::slots::Slot;
use crate::users::{Contact, MockUserDirectory};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::sync::Mutex;

/// Fixed reference instant used by fixtures: Monday 2026-10-19 16:00 UTC.
#[must_use]
pub fn reference_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 16, 0, 0)
        .single()
        .expect("valid instant")
}

/// An unbooked 20-minute slot starting at [`reference_start`].
#[must_use]
pub fn slot_at(id: i64, owner_id: i64) -> Slot {
    let start_at = reference_start();
    Slot {
        id,
        owner_id,
        group_id: 1,
        start_at,
        end_at: start_at + TimeDelta::minutes(20),
        holder_id: None,
        reminded_long: false,
        reminded_short: false,
    }
}

/// Reporter that keeps every `(context, error)` pair.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
    /// Everything reported so far.
    #[must_use]
    pub fn reports(&self) -> Vec<(String, String)> {
        self.reports.lock().expect("reporter lock").clone()
    }
}

#[async_trait]
impl ErrorReporter for RecordingReporter {
    async fn report(&self, context: &str, error: &str) {
        self.reports
            .lock()
            .expect("reporter lock")
            .push((context.to_string(), error.to_string()));
    }
}

/// A sender that accepts every message.
#[must_use]
pub fn mock_sender_ok() -> MockMessageSender {
    let mut mock = MockMessageSender::new();
    mock.expect_send_html().returning(|_, _| Ok(()));
    mock
}

/// A directory where every user is reachable in a chat equal to their id.
#[must_use]
pub fn mock_directory_all_reachable() -> MockUserDirectory {
    let mut mock = MockUserDirectory::new();
    mock.expect_resolve().returning(|user_id| {
        Ok(Some(Contact {
            user_id,
            chat_id: Some(user_id),
            display_name: format!("user{user_id}"),
        }))
    });
    mock
}
