use std::fmt;

use super::types::{Participant, ParticipantId};
use crate::sync::ConversationSnapshot;

/// Realtime state of the push channel for the open conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChannelStatus {
    /// No conversation selected, nothing subscribed.
    #[default]
    Idle,
    Live,
    /// Subscription failed or was lost; history stays visible but new
    /// messages only show up after the next selection.
    Degraded(String),
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Live => f.write_str("live"),
            Self::Degraded(reason) => write!(f, "degraded ({reason})"),
        }
    }
}

/// Events the chat session emits towards the front end.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Identity lookup returned NotFound; another attempt follows.
    IdentityPending { attempt: u32 },
    Ready { participant_id: ParticipantId },
    Participants(Vec<Participant>),
    ConversationUpdated(ConversationSnapshot),
    ChannelStatusChanged(ChannelStatus),
    /// A send was rolled back. `draft` is the text to put back into the input.
    SendFailed { draft: String, error: String },
    Error(String),
}
