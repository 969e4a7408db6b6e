use crate::domain::ChatId;

/// A `/command` received from a chat, stripped of messenger specifics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingCommand {
    pub chat_id: ChatId,
    /// The messenger's identifier of the sender.
    pub external_id: String,
    pub name: String,
    pub args: String,
}
