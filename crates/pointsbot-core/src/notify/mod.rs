//! Slot notifications
//!
//! Formats booking, reminder and cancellation messages and sends them to
//! both parties of a slot. Each party is handled independently: an
//! unreachable party is skipped, a failed send is reported and never
//! retried here.

mod messages;

pub use messages::{render, Party, SlotEvent};

use crate::report::ErrorReporter;
use crate::slots::{ReminderHorizon, Slot};
use crate::storage::StorageError;
use crate::users::{Contact, UserDirectory};
use async_trait::async_trait;
use chrono_tz::Tz;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors delivering one message.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The transport refused or failed the send
    #[error("Send error: {0}")]
    Send(String),
    /// The recipient could not be looked up
    #[error("Lookup error: {0}")]
    Lookup(#[from] StorageError),
}

/// Outbound message capability of the transport.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send an HTML-formatted message to a chat.
    async fn send_html(&self, chat_id: i64, text: String) -> Result<(), DeliveryError>;
}

/// Result for one party.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyOutcome {
    /// Message accepted by the transport
    Delivered,
    /// No reachable destination; nothing was sent
    Skipped,
    /// Lookup or send failed
    Failed,
}

/// Per-party results of one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Slot owner
    pub owner: PartyOutcome,
    /// Booking holder
    pub holder: PartyOutcome,
}

impl DeliveryReport {
    /// No party failed. Skipped parties count as done.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.owner != PartyOutcome::Failed && self.holder != PartyOutcome::Failed
    }
}

enum Lookup {
    Found(Contact),
    Unknown,
    Failed(StorageError),
}

/// Sends slot messages to owners and holders.
pub struct NotificationDispatcher {
    sender: Arc<dyn MessageSender>,
    directory: Arc<dyn UserDirectory>,
    reporter: Arc<dyn ErrorReporter>,
    tz: Tz,
}

impl NotificationDispatcher {
    /// Create a dispatcher rendering times in `tz`.
    #[must_use]
    pub fn new(
        sender: Arc<dyn MessageSender>,
        directory: Arc<dyn UserDirectory>,
        reporter: Arc<dyn ErrorReporter>,
        tz: Tz,
    ) -> Self {
        Self {
            sender,
            directory,
            reporter,
            tz,
        }
    }

    /// Tell both parties that `slot` was booked.
    pub async fn notify_booked(&self, slot: &Slot) -> DeliveryReport {
        self.dispatch(SlotEvent::Booked, slot, slot.holder_id).await
    }

    /// Remind both parties that `slot` starts within `horizon`.
    pub async fn notify_reminder(&self, slot: &Slot, horizon: ReminderHorizon) -> DeliveryReport {
        self.dispatch(SlotEvent::Reminder(horizon), slot, slot.holder_id)
            .await
    }

    /// Tell the former holder, and the owner, that the owner cancelled.
    ///
    /// `affected_party_id` is the holder at the time of cancellation; the
    /// slot itself may already be released.
    pub async fn notify_cancelled_by_owner(
        &self,
        slot: &Slot,
        affected_party_id: i64,
    ) -> DeliveryReport {
        self.dispatch(SlotEvent::CancelledByOwner, slot, Some(affected_party_id))
            .await
    }

    async fn dispatch(
        &self,
        event: SlotEvent,
        slot: &Slot,
        holder_id: Option<i64>,
    ) -> DeliveryReport {
        let (owner, holder) = tokio::join!(
            self.lookup(Some(slot.owner_id)),
            self.lookup(holder_id)
        );

        let owner_name = display_name(&owner).to_string();
        let holder_name = display_name(&holder).to_string();
        let label = slot.label(self.tz);

        let (owner, holder) = tokio::join!(
            self.deliver(event, slot, Party::Owner, owner, &label, &holder_name),
            self.deliver(event, slot, Party::Holder, holder, &label, &owner_name),
        );

        let report = DeliveryReport { owner, holder };
        debug!(slot_id = slot.id, ?event, ?report, "Notification dispatched");
        report
    }

    async fn lookup(&self, user_id: Option<i64>) -> Lookup {
        let Some(user_id) = user_id else {
            return Lookup::Unknown;
        };
        match self.directory.resolve(user_id).await {
            Ok(Some(contact)) => Lookup::Found(contact),
            Ok(None) => Lookup::Unknown,
            Err(e) => Lookup::Failed(e),
        }
    }

    async fn deliver(
        &self,
        event: SlotEvent,
        slot: &Slot,
        party: Party,
        recipient: Lookup,
        label: &str,
        counterpart: &str,
    ) -> PartyOutcome {
        let contact = match recipient {
            Lookup::Found(contact) => contact,
            Lookup::Unknown => return PartyOutcome::Skipped,
            Lookup::Failed(e) => {
                self.fail(slot, party, &DeliveryError::Lookup(e)).await;
                return PartyOutcome::Failed;
            }
        };
        let Some(chat_id) = contact.chat_id else {
            debug!(slot_id = slot.id, user_id = contact.user_id, "No chat for party, skipping");
            return PartyOutcome::Skipped;
        };

        let text = render(event, party, label, counterpart);
        match self.sender.send_html(chat_id, text).await {
            Ok(()) => PartyOutcome::Delivered,
            Err(e) => {
                self.fail(slot, party, &e).await;
                PartyOutcome::Failed
            }
        }
    }

    async fn fail(&self, slot: &Slot, party: Party, error: &DeliveryError) {
        warn!(slot_id = slot.id, ?party, error = %error, "Slot notification failed");
        self.reporter
            .report(&format!("notify slot {} ({party:?})", slot.id), &error.to_string())
            .await;
    }
}

fn display_name(lookup: &Lookup) -> &str {
    match lookup {
        Lookup::Found(contact) => contact.name_or_placeholder(),
        Lookup::Unknown | Lookup::Failed(_) => "someone",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{slot_at, RecordingReporter};
    use crate::users::MockUserDirectory;
    use mockall::predicate::eq;

    const OWNER: i64 = 7;
    const HOLDER: i64 = 21;

    fn contact(user_id: i64, chat_id: Option<i64>, name: &str) -> Contact {
        Contact {
            user_id,
            chat_id,
            display_name: name.to_string(),
        }
    }

    fn directory_with(holder_chat: Option<i64>) -> MockUserDirectory {
        let mut directory = MockUserDirectory::new();
        directory
            .expect_resolve()
            .with(eq(OWNER))
            .returning(|_| Ok(Some(contact(OWNER, Some(700), "Ms. Smith"))));
        directory
            .expect_resolve()
            .with(eq(HOLDER))
            .returning(move |_| Ok(Some(contact(HOLDER, holder_chat, "Pete"))));
        directory
    }

    const fn utc() -> Tz {
        Tz::UTC
    }

    fn booked_slot() -> Slot {
        Slot {
            holder_id: Some(HOLDER),
            ..slot_at(1, OWNER)
        }
    }

    #[tokio::test]
    async fn test_booked_reaches_both_parties() {
        let mut sender = MockMessageSender::new();
        sender
            .expect_send_html()
            .withf(|chat_id, text| *chat_id == 700 && text.contains("Pete"))
            .times(1)
            .returning(|_, _| Ok(()));
        sender
            .expect_send_html()
            .withf(|chat_id, text| *chat_id == 210 && text.contains("Ms. Smith"))
            .times(1)
            .returning(|_, _| Ok(()));

        let reporter = Arc::new(RecordingReporter::default());
        let dispatcher = NotificationDispatcher::new(
            Arc::new(sender),
            Arc::new(directory_with(Some(210))),
            reporter.clone(),
            utc(),
        );

        let report = dispatcher.notify_booked(&booked_slot()).await;
        assert_eq!(report.owner, PartyOutcome::Delivered);
        assert_eq!(report.holder, PartyOutcome::Delivered);
        assert!(reporter.reports().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_holder_is_skipped() {
        let mut sender = MockMessageSender::new();
        sender
            .expect_send_html()
            .with(eq(700), mockall::predicate::always())
            .times(1)
            .returning(|_, _| Ok(()));

        let dispatcher = NotificationDispatcher::new(
            Arc::new(sender),
            Arc::new(directory_with(None)),
            Arc::new(RecordingReporter::default()),
            utc(),
        );

        let report = dispatcher
            .notify_reminder(&booked_slot(), ReminderHorizon::Short)
            .await;
        assert_eq!(report.holder, PartyOutcome::Skipped);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_one_failed_send_does_not_block_the_other() {
        let mut sender = MockMessageSender::new();
        sender
            .expect_send_html()
            .with(eq(700), mockall::predicate::always())
            .times(1)
            .returning(|_, _| Err(DeliveryError::Send("bot was blocked".to_string())));
        sender
            .expect_send_html()
            .with(eq(210), mockall::predicate::always())
            .times(1)
            .returning(|_, _| Ok(()));

        let reporter = Arc::new(RecordingReporter::default());
        let dispatcher = NotificationDispatcher::new(
            Arc::new(sender),
            Arc::new(directory_with(Some(210))),
            reporter.clone(),
            utc(),
        );

        let report = dispatcher.notify_booked(&booked_slot()).await;
        assert_eq!(report.owner, PartyOutcome::Failed);
        assert_eq!(report.holder, PartyOutcome::Delivered);
        assert!(!report.is_complete());
        assert_eq!(reporter.reports().len(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_addresses_former_holder() {
        let mut sender = MockMessageSender::new();
        sender
            .expect_send_html()
            .withf(|chat_id, text| *chat_id == 210 && text.contains("cancelled your consultation"))
            .times(1)
            .returning(|_, _| Ok(()));
        sender
            .expect_send_html()
            .withf(|chat_id, _| *chat_id == 700)
            .times(1)
            .returning(|_, _| Ok(()));

        let dispatcher = NotificationDispatcher::new(
            Arc::new(sender),
            Arc::new(directory_with(Some(210))),
            Arc::new(RecordingReporter::default()),
            utc(),
        );

        // Already released: the holder comes from the argument
        let released = slot_at(1, OWNER);
        let report = dispatcher.notify_cancelled_by_owner(&released, HOLDER).await;
        assert_eq!(report.holder, PartyOutcome::Delivered);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_reported() {
        let mut directory = MockUserDirectory::new();
        directory
            .expect_resolve()
            .returning(|_| Err(StorageError::CorruptRow("users".to_string())));
        let sender = MockMessageSender::new();
        let reporter = Arc::new(RecordingReporter::default());

        let dispatcher = NotificationDispatcher::new(
            Arc::new(sender),
            Arc::new(directory),
            reporter.clone(),
            utc(),
        );

        let report = dispatcher.notify_booked(&booked_slot()).await;
        assert_eq!(report.owner, PartyOutcome::Failed);
        assert_eq!(report.holder, PartyOutcome::Failed);
        assert_eq!(reporter.reports().len(), 2);
    }
}
