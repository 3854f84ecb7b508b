pub mod commands;
pub mod error;
pub mod events;
pub mod types;

pub use commands::SessionCommand;
pub use error::{ChatError, ChatResult};
pub use events::{ChannelStatus, SessionEvent};
pub use types::{Message, MessageId, NewMessage, NewParticipant, Participant, ParticipantId};
