//! Telegram update handlers.
//!
//! Updates are reduced to an [`IncomingCommand`] and handed to the core
//! dispatcher. Anything that is not a `/command` is ignored.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};
use tracing::{debug, warn};

use rtb_core::{domain::ChatId, messaging::types::IncomingCommand};

use crate::router::AppState;

mod commands;

pub use commands::parse_command;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if !text.starts_with('/') {
        return Ok(());
    }
    let Some(from) = msg.from() else {
        debug!(parent: &state.span, chat_id = msg.chat.id.0, "command without sender, ignoring");
        return Ok(());
    };

    let (name, args) = parse_command(text);
    let incoming = IncomingCommand {
        chat_id: ChatId(msg.chat.id.0),
        external_id: from.id.0.to_string(),
        name,
        args,
    };

    // The dispatcher already answered the chat; failures are only logged here.
    if let Err(e) = state.dispatcher.dispatch(&incoming).await {
        warn!(
            parent: &state.span,
            chat_id = incoming.chat_id.0,
            command = %incoming.name,
            error = %e,
            "command failed"
        );
    }
    Ok(())
}
