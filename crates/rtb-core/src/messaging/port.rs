use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    Result,
};

/// Outbound messaging port.
///
/// Replies are plain text keyed by destination chat. Failures map to
/// [`crate::Error::Messaging`]; callers decide whether to swallow them.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;
}
