use crate::slots::ReminderHorizon;

/// What happened to the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEvent {
    /// A requester took the slot
    Booked,
    /// The slot starts within the horizon
    Reminder(ReminderHorizon),
    /// The owner released the booking
    CancelledByOwner,
}

/// Which side of the slot a message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    /// Staff member owning the slot
    Owner,
    /// Requester holding the booking
    Holder,
}

fn horizon_phrase(horizon: ReminderHorizon) -> &'static str {
    match horizon {
        ReminderHorizon::Long => "tomorrow",
        ReminderHorizon::Short => "in one hour",
    }
}

/// Render the HTML message for one party.
///
/// `label` is the slot's local time range, `counterpart` the other party's
/// display name. Both are escaped here.
#[must_use]
pub fn render(event: SlotEvent, party: Party, label: &str, counterpart: &str) -> String {
    let label = html_escape::encode_text(label);
    let counterpart = html_escape::encode_text(counterpart);

    match (event, party) {
        (SlotEvent::Booked, Party::Owner) => {
            format!("📅 <b>{counterpart}</b> booked your consultation slot <b>{label}</b>.")
        }
        (SlotEvent::Booked, Party::Holder) => {
            format!("✅ You are booked for <b>{label}</b> with <b>{counterpart}</b>.")
        }
        (SlotEvent::Reminder(horizon), Party::Owner) => format!(
            "⏰ Reminder: consultation with <b>{counterpart}</b> {} at <b>{label}</b>.",
            horizon_phrase(horizon)
        ),
        (SlotEvent::Reminder(horizon), Party::Holder) => format!(
            "⏰ Reminder: your consultation with <b>{counterpart}</b> is {} at <b>{label}</b>.",
            horizon_phrase(horizon)
        ),
        (SlotEvent::CancelledByOwner, Party::Owner) => {
            format!("🗑 You cancelled the booking of <b>{counterpart}</b> for <b>{label}</b>.")
        }
        (SlotEvent::CancelledByOwner, Party::Holder) => format!(
            "❌ <b>{counterpart}</b> cancelled your consultation at <b>{label}</b>. \
             Please pick another slot."
        ),
    }
}
