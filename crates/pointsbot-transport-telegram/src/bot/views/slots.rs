//! Slot booking UI components
//!
//! Contains keyboards, text messages, and formatters for the slot commands.

use chrono_tz::Tz;
use pointsbot_core::booking::GenerateSummary;
use pointsbot_core::commands::{book_callback_data, CommandError};
use pointsbot_core::slots::{PlanError, Slot};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

// ─────────────────────────────────────────────────────────────────────────────
// Trait definition
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for slot UI view rendering
pub trait SlotView {
    /// Greeting after `/start`
    fn welcome_message(is_staff: bool) -> String;

    /// Listing of free slots, or a notice that there are none
    fn free_slots(owner_id: i64, slots: &[Slot], tz: Tz) -> String;

    /// Confirmation shown to the requester after a successful booking
    fn booked(slot: &Slot, tz: Tz) -> String;

    /// The slot was taken by someone else or does not exist
    fn unavailable() -> &'static str;

    /// Upcoming bookings of the requester
    fn my_bookings(slots: &[Slot], tz: Tz) -> String;

    /// Result of a generate command
    fn generated(summary: GenerateSummary) -> String;

    /// Result of a cancel command
    fn cancelled(slot: Option<&Slot>, tz: Tz) -> String;

    /// Malformed command arguments
    fn command_error(error: &CommandError) -> String;

    /// Rejected generation window
    fn plan_error(error: &PlanError) -> String;

    /// Command restricted to staff
    fn staff_only() -> &'static str;

    /// Anything that went wrong on our side
    fn internal_error() -> &'static str;
}

// ─────────────────────────────────────────────────────────────────────────────
// Default implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Default English implementation of `SlotView`
pub struct DefaultSlotView;

fn escape(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

fn slot_line(slot: &Slot, tz: Tz) -> String {
    format!("• <code>#{}</code> {}", slot.id, escape(&slot.label(tz)))
}

impl SlotView for DefaultSlotView {
    fn welcome_message(is_staff: bool) -> String {
        let mut text = String::from(
            "👋 <b>Consultation booking</b>\n\n\
             /free &lt;teacher_id&gt; [YYYY-MM-DD] - free slots\n\
             /book &lt;slot_id&gt; - book a slot\n\
             /my - your bookings",
        );
        if is_staff {
            text.push_str(
                "\n\n<b>Staff</b>\n\
                 /generate &lt;weekday&gt; &lt;HH:MM&gt; &lt;HH:MM&gt; &lt;step&gt; &lt;group_id&gt; [weeks]\n\
                 /cancel &lt;slot_id&gt;",
            );
        }
        text
    }

    fn free_slots(owner_id: i64, slots: &[Slot], tz: Tz) -> String {
        if slots.is_empty() {
            return format!("No free slots for teacher <code>{owner_id}</code>.");
        }
        let lines: Vec<String> = slots.iter().map(|s| slot_line(s, tz)).collect();
        format!(
            "🗓 <b>Free slots</b> (teacher <code>{owner_id}</code>)\n{}\n\nTap a slot to book it.",
            lines.join("\n")
        )
    }

    fn booked(slot: &Slot, tz: Tz) -> String {
        format!("✅ Booked: {}", escape(&slot.label(tz)))
    }

    fn unavailable() -> &'static str {
        "⚠️ This slot is no longer available."
    }

    fn my_bookings(slots: &[Slot], tz: Tz) -> String {
        if slots.is_empty() {
            return "You have no upcoming consultations.".to_string();
        }
        let lines: Vec<String> = slots.iter().map(|s| slot_line(s, tz)).collect();
        format!("📋 <b>Your consultations</b>\n{}", lines.join("\n"))
    }

    fn generated(summary: GenerateSummary) -> String {
        format!(
            "✅ Created {} slot(s), {} already existed.",
            summary.created,
            summary.duplicates()
        )
    }

    fn cancelled(slot: Option<&Slot>, tz: Tz) -> String {
        slot.map_or_else(
            || "⚠️ Nothing to cancel: the slot is not yours or not booked.".to_string(),
            |slot| {
                format!(
                    "🗑 Booking cancelled, slot reopened: {}",
                    escape(&slot.label(tz))
                )
            },
        )
    }

    fn command_error(error: &CommandError) -> String {
        format!("⚠️ {}", escape(&error.to_string()))
    }

    fn plan_error(error: &PlanError) -> String {
        format!("⚠️ Cannot generate slots: {}", escape(&error.to_string()))
    }

    fn staff_only() -> &'static str {
        "⛔️ This command is for staff only."
    }

    fn internal_error() -> &'static str {
        "❌ Something went wrong. Please try again later."
    }
}

/// One "book" button per free slot.
#[must_use]
pub fn free_slots_keyboard(slots: &[Slot], tz: Tz) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = slots
        .iter()
        .map(|slot| {
            vec![InlineKeyboardButton::callback(
                slot.label(tz),
                book_callback_data(slot.id),
            )]
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}
