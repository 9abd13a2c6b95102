use crate::bot;
use crate::bot::guards::{admit_callback, admit_message};
use crate::bot::handlers::{remember_contact, Command, HandlerContext};
use crate::bot::TelegramSender;
use crate::config::BotSettings;
use pointsbot_core::booking::BookingService;
use pointsbot_core::guards::InboundGuards;
use pointsbot_core::notify::{MessageSender, NotificationDispatcher};
use pointsbot_core::report::{ChatReporter, ErrorReporter, TracingReporter};
use pointsbot_core::slots::{SlotStore, SqliteSlotStore};
use pointsbot_core::storage::{self, SqlitePool};
use pointsbot_core::users::SqliteUserDirectory;
use pointsbot_runtime::spawn_reminder_schedulers;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Run the Telegram transport runtime.
///
/// Returns after ctrl-c once the reminder schedulers have stopped.
pub async fn run_bot(settings: Arc<BotSettings>) {
    let tz = match settings.core.time_zone() {
        Ok(tz) => tz,
        Err(e) => {
            error!("Invalid time zone: {}", e);
            std::process::exit(1);
        }
    };
    let pool = init_storage(&settings).await;

    let bot = Bot::new(settings.telegram.telegram_token.clone());
    let sender: Arc<dyn MessageSender> = Arc::new(TelegramSender::new(bot.clone()));
    let reporter = init_reporter(&settings, &sender);

    let store: Arc<dyn SlotStore> = Arc::new(SqliteSlotStore::new(pool.clone()));
    let directory = Arc::new(SqliteUserDirectory::new(pool));
    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::clone(&sender),
        directory.clone(),
        Arc::clone(&reporter),
        tz,
    ));
    let service = Arc::new(BookingService::new(
        Arc::clone(&store),
        Arc::clone(&dispatcher),
        tz,
    ));
    let guards = Arc::new(InboundGuards::new(&settings.core));

    let cancel = CancellationToken::new();
    let schedulers =
        spawn_reminder_schedulers(&store, &dispatcher, &reporter, &settings.core, &cancel);
    info!("{} reminder schedulers started.", schedulers.len());

    let ctx = Arc::new(HandlerContext {
        service,
        directory,
        reporter,
        guards,
        settings,
    });

    info!("Bot is running...");

    Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![ctx])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Dispatcher stopped, waiting for reminder schedulers...");
    cancel.cancel();
    for handle in schedulers {
        if let Err(e) = handle.await {
            error!("Reminder scheduler task failed: {}", e);
        }
    }
    info!("Shutdown complete.");
}

async fn init_storage(settings: &BotSettings) -> SqlitePool {
    match storage::connect(&settings.core.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to initialize slot storage: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_reporter(
    settings: &BotSettings,
    sender: &Arc<dyn MessageSender>,
) -> Arc<dyn ErrorReporter> {
    if let Some(admin_chat_id) = settings.telegram.admin_chat_id {
        info!("Error reports go to admin chat {}", admin_chat_id);
        Arc::new(ChatReporter::new(Arc::clone(sender), admin_chat_id))
    } else {
        info!("No admin chat configured, errors are only logged.");
        Arc::new(TracingReporter)
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_callback_query()
                .filter(|q: CallbackQuery, ctx: Arc<HandlerContext>| {
                    admit_callback(&q, &ctx.guards)
                })
                .endpoint(handle_callback),
        )
        .branch(Update::filter_callback_query().endpoint(answer_rejected_callback))
        .branch(
            Update::filter_message()
                .filter(|msg: Message, ctx: Arc<HandlerContext>| {
                    admit_message(&msg, &ctx.guards)
                })
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    ctx: Arc<HandlerContext>,
) -> Result<(), teloxide::RequestError> {
    if let Some(user) = msg.from.as_ref() {
        remember_contact(&ctx, user, msg.chat.id).await;
    }

    let res = match cmd {
        Command::Start => bot::handlers::start(bot, msg, ctx).await,
        Command::Help => bot::handlers::help(bot, msg).await,
        Command::Free(args) => bot::handlers::free(bot, msg, ctx, args).await,
        Command::Book(args) => bot::handlers::book(bot, msg, ctx, args).await,
        Command::My => bot::handlers::my(bot, msg, ctx).await,
        Command::Generate(args) => bot::handlers::generate(bot, msg, ctx, args).await,
        Command::Cancel(args) => bot::handlers::cancel(bot, msg, ctx, args).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    ctx: Arc<HandlerContext>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::callbacks::handle_book_callback(bot, q, ctx).await {
        error!("Book callback handler error: {}", e);
    }
    respond(())
}

/// Stop the button spinner of a press the guards turned away.
async fn answer_rejected_callback(
    bot: Bot,
    q: CallbackQuery,
) -> Result<(), teloxide::RequestError> {
    debug!(user_id = q.from.id.0, "Callback rejected by guards");
    let _ = bot.answer_callback_query(q.id.clone()).await;
    respond(())
}
