use std::sync::Arc;

use teloxide::{
    dispatching::Dispatcher, dptree, error_handlers::LoggingErrorHandler, prelude::*,
    update_listeners::Polling,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Span};

use rtb_core::{
    backlog::Backlog,
    commands::CommandDispatcher,
    config::Config,
    logging,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    reminders::{BroadcastReport, ReminderBroadcaster},
    scheduler::{CronExpr, ReminderScheduler},
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<CommandDispatcher>,
    pub span: Span,
}

fn messenger(bot: &Bot) -> Arc<dyn MessagingPort> {
    let raw: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    Arc::new(ThrottledMessenger::new(raw, ThrottleConfig::default()))
}

fn schedule(cfg: &Config) -> anyhow::Result<Option<CronExpr>> {
    match &cfg.reminder_cron {
        Some(src) => Ok(Some(CronExpr::parse(src)?)),
        None => Ok(None),
    }
}

/// Long-poll Telegram and serve commands until Ctrl-C.
///
/// Runs the reminder scheduler alongside when a schedule is configured.
pub async fn run_polling(cfg: Arc<Config>, backlog: Arc<Backlog>) -> anyhow::Result<()> {
    let span = logging::component("telegram");
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => info!(parent: &span, bot = %me.username(), "bot started"),
        Err(e) => warn!(parent: &span, error = %e, "could not fetch bot identity"),
    }

    let messenger = messenger(&bot);
    let expr = schedule(&cfg)?;
    let note = expr.as_ref().map(CronExpr::describe);

    let dispatcher = Arc::new(CommandDispatcher::new(
        backlog.clone(),
        messenger.clone(),
        note.as_deref(),
        logging::component("commands"),
    ));

    let cancel = CancellationToken::new();
    let scheduler = match expr {
        Some(expr) => {
            let broadcaster = Arc::new(ReminderBroadcaster::new(
                backlog,
                messenger,
                logging::component("reminders"),
            ));
            let scheduler =
                ReminderScheduler::new(expr, broadcaster, logging::component("scheduler"));
            Some(scheduler.start(cancel.clone()))
        }
        None => {
            info!(parent: &span, "reminders disabled");
            None
        }
    };

    let state = Arc::new(AppState {
        dispatcher,
        span: span.clone(),
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    let listener = Polling::builder(bot.clone())
        .timeout(cfg.poll_timeout)
        .build();

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("update listener error"),
        )
        .await;

    cancel.cancel();
    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            warn!(parent: &span, error = %e, "reminder scheduler task failed");
        }
    }
    info!(parent: &span, "bot stopped");
    Ok(())
}

/// Run a single reminder broadcast and return its outcome.
pub async fn send_reminders_once(
    cfg: Arc<Config>,
    backlog: Arc<Backlog>,
) -> anyhow::Result<BroadcastReport> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());
    let broadcaster =
        ReminderBroadcaster::new(backlog, messenger(&bot), logging::component("reminders"));
    Ok(broadcaster.broadcast().await?)
}
