use crate::bot::resilient::send_message_resilient;
use crate::bot::views::{free_slots_keyboard, DefaultSlotView, SlotView};
use crate::config::BotSettings;
use anyhow::Result;
use chrono::Utc;
use pointsbot_core::booking::{BookingError, BookingOutcome, BookingService};
use pointsbot_core::commands::{
    parse_free, parse_generate, parse_slot_id, CommandError, BOOK_USAGE, CANCEL_USAGE,
};
use pointsbot_core::guards::InboundGuards;
use pointsbot_core::report::ErrorReporter;
use pointsbot_core::users::SqliteUserDirectory;
use std::sync::Arc;
use teloxide::{prelude::*, types::User, utils::command::BotCommands};
use tracing::{info, warn};

/// Bot commands
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Register with the bot and show the welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Show the command list
    #[command(description = "Show this help.")]
    Help,
    /// List free slots of a teacher
    #[command(description = "<teacher_id> [YYYY-MM-DD] - free slots.")]
    Free(String),
    /// Book a slot by id
    #[command(description = "<slot_id> - book a slot.")]
    Book(String),
    /// List own bookings
    #[command(description = "your upcoming consultations.")]
    My,
    /// Generate weekly slots (staff)
    #[command(
        description = "<weekday> <HH:MM> <HH:MM> <step_minutes> <group_id> [weeks] - create slots (staff)."
    )]
    Generate(String),
    /// Cancel a booking of an own slot (staff)
    #[command(description = "<slot_id> - cancel a booking (staff).")]
    Cancel(String),
}

/// Everything the handlers need, injected as one dptree dependency.
pub struct HandlerContext {
    /// Booking API
    pub service: Arc<BookingService>,
    /// Contact registry for notifications
    pub directory: Arc<SqliteUserDirectory>,
    /// Where storage failures go
    pub reporter: Arc<dyn ErrorReporter>,
    /// Dedup, rate limit and per-chat locks
    pub guards: Arc<InboundGuards>,
    /// Settings
    pub settings: Arc<BotSettings>,
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
#[must_use]
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

fn display_name(user: &User) -> String {
    let full_name = user.full_name();
    if !full_name.trim().is_empty() {
        return full_name;
    }
    user.username.clone().unwrap_or_default()
}

/// Upsert the sender as a notification contact.
///
/// Failures are logged and do not stop the command.
pub async fn remember_contact(ctx: &HandlerContext, user: &User, chat_id: ChatId) {
    let user_id = user.id.0.cast_signed();
    if let Err(e) = ctx
        .directory
        .register(user_id, chat_id.0, &display_name(user))
        .await
    {
        warn!(user_id, error = %e, "Failed to register contact");
    }
}

async fn reply(bot: &Bot, chat_id: ChatId, text: impl Into<String>) -> Result<()> {
    send_message_resilient(bot, chat_id, text, None).await?;
    Ok(())
}

/// Report a failure and give the user a generic answer.
async fn reply_failure(
    bot: &Bot,
    chat_id: ChatId,
    ctx: &HandlerContext,
    context: &str,
    error: &BookingError,
) -> Result<()> {
    if let BookingError::Plan(e) = error {
        return reply(bot, chat_id, DefaultSlotView::plan_error(e)).await;
    }
    ctx.reporter.report(context, &error.to_string()).await;
    reply(bot, chat_id, DefaultSlotView::internal_error()).await
}

async fn reply_usage(bot: &Bot, chat_id: ChatId, error: &CommandError) -> Result<()> {
    reply(bot, chat_id, DefaultSlotView::command_error(error)).await
}

/// Handle the /start command
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn start(bot: Bot, msg: Message, ctx: Arc<HandlerContext>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    info!("User {user_id} started the bot");
    let is_staff = ctx.settings.telegram.is_staff(user_id);
    reply(&bot, msg.chat.id, DefaultSlotView::welcome_message(is_staff)).await
}

/// Handle the /help command
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn help(bot: Bot, msg: Message) -> Result<()> {
    let text = html_escape::encode_text(&Command::descriptions().to_string()).into_owned();
    reply(&bot, msg.chat.id, text).await
}

/// Handle the /free command
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn free(bot: Bot, msg: Message, ctx: Arc<HandlerContext>, args: String) -> Result<()> {
    let args = match parse_free(&args) {
        Ok(args) => args,
        Err(e) => return reply_usage(&bot, msg.chat.id, &e).await,
    };

    let slots = match ctx
        .service
        .free_slots_of(args.owner_id, args.date, Utc::now())
        .await
    {
        Ok(slots) => slots,
        Err(e) => return reply_failure(&bot, msg.chat.id, &ctx, "free slots", &e).await,
    };

    let tz = ctx.service.time_zone();
    let text = DefaultSlotView::free_slots(args.owner_id, &slots, tz);
    let keyboard = (!slots.is_empty()).then(|| free_slots_keyboard(&slots, tz));
    send_message_resilient(&bot, msg.chat.id, text, keyboard).await?;
    Ok(())
}

/// Book `slot_id` for `requester_id` while holding the chat lock, then
/// answer in `chat_id`.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn book_and_reply(
    bot: &Bot,
    chat_id: ChatId,
    requester_id: i64,
    slot_id: i64,
    ctx: &HandlerContext,
) -> Result<()> {
    let _lock = ctx.guards.chats.lock(chat_id.0).await;
    match ctx.service.book(slot_id, requester_id).await {
        Ok(BookingOutcome::Booked(slot)) => {
            let tz = ctx.service.time_zone();
            reply(bot, chat_id, DefaultSlotView::booked(&slot, tz)).await
        }
        Ok(BookingOutcome::Unavailable) => {
            reply(bot, chat_id, DefaultSlotView::unavailable()).await
        }
        Err(e) => reply_failure(bot, chat_id, ctx, "book", &e).await,
    }
}

/// Handle the /book command
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn book(bot: Bot, msg: Message, ctx: Arc<HandlerContext>, args: String) -> Result<()> {
    let slot_id = match parse_slot_id(&args, BOOK_USAGE) {
        Ok(id) => id,
        Err(e) => return reply_usage(&bot, msg.chat.id, &e).await,
    };
    book_and_reply(&bot, msg.chat.id, get_user_id_safe(&msg), slot_id, &ctx).await
}

/// Handle the /my command
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn my(bot: Bot, msg: Message, ctx: Arc<HandlerContext>) -> Result<()> {
    match ctx
        .service
        .my_bookings(get_user_id_safe(&msg), Utc::now())
        .await
    {
        Ok(slots) => {
            let text = DefaultSlotView::my_bookings(&slots, ctx.service.time_zone());
            reply(&bot, msg.chat.id, text).await
        }
        Err(e) => reply_failure(&bot, msg.chat.id, &ctx, "my bookings", &e).await,
    }
}

/// Handle the /generate command (staff only)
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn generate(
    bot: Bot,
    msg: Message,
    ctx: Arc<HandlerContext>,
    args: String,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    if !ctx.settings.telegram.is_staff(user_id) {
        return reply(&bot, msg.chat.id, DefaultSlotView::staff_only()).await;
    }
    let request = match parse_generate(&args, user_id) {
        Ok(request) => request,
        Err(e) => return reply_usage(&bot, msg.chat.id, &e).await,
    };

    let _lock = ctx.guards.chats.lock(msg.chat.id.0).await;
    match ctx.service.generate(&request, Utc::now()).await {
        Ok(summary) => reply(&bot, msg.chat.id, DefaultSlotView::generated(summary)).await,
        Err(e) => reply_failure(&bot, msg.chat.id, &ctx, "generate", &e).await,
    }
}

/// Handle the /cancel command (staff only)
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn cancel(bot: Bot, msg: Message, ctx: Arc<HandlerContext>, args: String) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    if !ctx.settings.telegram.is_staff(user_id) {
        return reply(&bot, msg.chat.id, DefaultSlotView::staff_only()).await;
    }
    let slot_id = match parse_slot_id(&args, CANCEL_USAGE) {
        Ok(id) => id,
        Err(e) => return reply_usage(&bot, msg.chat.id, &e).await,
    };

    let _lock = ctx.guards.chats.lock(msg.chat.id.0).await;
    match ctx.service.cancel(slot_id, user_id).await {
        Ok(slot) => {
            let text = DefaultSlotView::cancelled(slot.as_ref(), ctx.service.time_zone());
            reply(&bot, msg.chat.id, text).await
        }
        Err(e) => reply_failure(&bot, msg.chat.id, &ctx, "cancel", &e).await,
    }
}
