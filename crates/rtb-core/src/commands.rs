//! Command dispatch: one inbound `/command`, one reply.

use std::sync::Arc;

use tracing::{debug, error, warn, Instrument, Span};

use crate::{
    backlog::{Backlog, Completion},
    domain::ChatId,
    messaging::{port::MessagingPort, types::IncomingCommand},
    replies, Error, Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Add(String),
    Done,
    Current,
    Next,
    Skip,
}

impl BotCommand {
    /// Map a command name (without `/` or `@bot`) to a known command.
    pub fn parse(name: &str, args: &str) -> Option<Self> {
        let cmd = match name.to_lowercase().as_str() {
            "start" | "help" => Self::Start,
            "add" => Self::Add(args.to_string()),
            "done" => Self::Done,
            "current" => Self::Current,
            "next" => Self::Next,
            "skip" => Self::Skip,
            _ => return None,
        };
        Some(cmd)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Add(_) => "add",
            Self::Done => "done",
            Self::Current => "current",
            Self::Next => "next",
            Self::Skip => "skip",
        }
    }
}

pub struct CommandDispatcher {
    backlog: Arc<Backlog>,
    messenger: Arc<dyn MessagingPort>,
    greeting: String,
    span: Span,
}

impl CommandDispatcher {
    pub fn new(
        backlog: Arc<Backlog>,
        messenger: Arc<dyn MessagingPort>,
        reminder_note: Option<&str>,
        span: Span,
    ) -> Self {
        Self {
            backlog,
            messenger,
            greeting: replies::greeting(reminder_note),
            span,
        }
    }

    /// Handle one command. Unknown commands are ignored.
    ///
    /// Internal failures are reported to the chat with a generic notice and
    /// returned; the caller only logs them.
    pub async fn dispatch(&self, incoming: &IncomingCommand) -> Result<()> {
        let Some(cmd) = BotCommand::parse(&incoming.name, &incoming.args) else {
            debug!(parent: &self.span, command = %incoming.name, "ignoring unknown command");
            return Ok(());
        };

        let span = tracing::info_span!(
            parent: &self.span,
            "command",
            command = cmd.name(),
            chat_id = %incoming.chat_id,
        );
        self.run(cmd, incoming).instrument(span).await
    }

    async fn run(&self, cmd: BotCommand, incoming: &IncomingCommand) -> Result<()> {
        let chat_id = incoming.chat_id;
        let user = match self
            .backlog
            .ensure_user_exists(&incoming.external_id, chat_id)
            .await
        {
            Ok(user) => user,
            Err(e) => return self.fail(chat_id, e).await,
        };

        let text = match cmd {
            BotCommand::Start => self.greeting.clone(),

            BotCommand::Add(url) => match self.backlog.add_task(&user, &url).await {
                Ok(_) => replies::TASK_ADDED.to_string(),
                Err(Error::Validation(reason)) => {
                    debug!(%reason, "rejected add");
                    replies::EMPTY_URL.to_string()
                }
                Err(e) => return self.fail(chat_id, e).await,
            },

            BotCommand::Done => match self.backlog.complete_in_progress(&user).await {
                Ok(Completion::NothingInProgress) => replies::NOTHING_IN_PROGRESS.to_string(),
                Ok(Completion::Completed { remaining, .. }) => replies::done(remaining),
                Err(e) => return self.fail(chat_id, e).await,
            },

            BotCommand::Current => match self.backlog.current_task(&user).await {
                Ok(Some(task)) => replies::current(&task.url),
                Ok(None) => replies::NOTHING_IN_PROGRESS.to_string(),
                Err(e) => return self.fail(chat_id, e).await,
            },

            BotCommand::Next => {
                match replies::for_next_task(self.backlog.next_task(&user).await) {
                    Ok(text) => text,
                    Err(e) => return self.fail(chat_id, e).await,
                }
            }

            BotCommand::Skip => match replies::for_next_task(self.backlog.skip(&user).await) {
                Ok(text) => text,
                Err(e) => return self.fail(chat_id, e).await,
            },
        };

        self.reply(chat_id, &text).await
    }

    async fn reply(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.messenger
            .send_text(chat_id, text)
            .await
            .map(|_| ())
            .inspect_err(|e| warn!(error = %e, "could not send reply"))
    }

    /// Log `err`, tell the user something went wrong, and hand `err` back.
    async fn fail(&self, chat_id: ChatId, err: Error) -> Result<()> {
        error!(error = %err, "command failed");
        if let Err(send_err) = self
            .messenger
            .send_text(chat_id, replies::GENERIC_FAILURE)
            .await
        {
            warn!(error = %send_err, "could not send failure notice");
        }
        Err(err)
    }
}
