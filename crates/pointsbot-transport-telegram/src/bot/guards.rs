//! Inbound update admission
//!
//! Maps Telegram updates onto [`DupeKey`]s and runs them through the shared
//! [`InboundGuards`] before any handler sees them.

use pointsbot_core::guards::{DupeKey, InboundGuards};
use teloxide::types::{CallbackQuery, Message};
use tracing::debug;

/// Dedup key of a message update.
#[must_use]
pub fn message_key(msg: &Message) -> DupeKey {
    DupeKey::message(msg.chat.id.0, msg.id.0)
}

/// Dedup key of a button press, or `None` for presses without a message.
///
/// Presses of the same button by different users in a group are distinct.
#[must_use]
pub fn callback_key(q: &CallbackQuery) -> Option<DupeKey> {
    let message = q.message.as_ref()?;
    Some(DupeKey::callback(
        message.chat().id.0,
        message.id().0,
        callback_payload(q.from.id.0, q.data.as_deref()),
    ))
}

fn callback_payload(user_id: u64, data: Option<&str>) -> String {
    format!("{user_id}:{}", data.unwrap_or_default())
}

/// dptree filter for messages.
#[must_use]
pub fn admit_message(msg: &Message, guards: &InboundGuards) -> bool {
    guards.admit(&message_key(msg)).is_allowed()
}

/// dptree filter for callback queries.
#[must_use]
pub fn admit_callback(q: &CallbackQuery, guards: &InboundGuards) -> bool {
    let Some(key) = callback_key(q) else {
        debug!(user_id = q.from.id.0, "Callback without message dropped");
        return false;
    };
    guards.admit(&key).is_allowed()
}
