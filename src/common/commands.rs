use super::types::ParticipantId;

/// Commands the front end sends to the chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Switch the open conversation. `None` closes it.
    SelectPeer(Option<ParticipantId>),
    /// Send text to the currently selected peer.
    SendMessage(String),
    /// Ask for the participant directory (everyone except ourselves),
    /// optionally narrowed to display names containing the search text.
    ListParticipants(Option<String>),
    Shutdown,
}
