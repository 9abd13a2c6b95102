use crate::bot::handlers::{book_and_reply, remember_contact, HandlerContext};
use anyhow::Result;
use pointsbot_core::commands::parse_book_callback;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::debug;

/// Handle a press on an inline "book" button.
///
/// # Errors
///
/// Returns an error if the callback has no chat or the reply cannot be sent.
pub async fn handle_book_callback(
    bot: Bot,
    q: CallbackQuery,
    ctx: Arc<HandlerContext>,
) -> Result<()> {
    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };

    let _ = bot.answer_callback_query(q.id.clone()).await;

    let Some(slot_id) = parse_book_callback(data) else {
        debug!(data, "Unknown callback payload");
        return Ok(());
    };

    let user_id = q.from.id.0.cast_signed();
    let chat_id = q
        .message
        .as_ref()
        .map(|msg| msg.chat().id)
        .ok_or_else(|| anyhow::anyhow!("Callback message missing chat id"))?;

    remember_contact(&ctx, &q.from, chat_id).await;
    book_and_reply(&bot, chat_id, user_id, slot_id, &ctx).await
}
