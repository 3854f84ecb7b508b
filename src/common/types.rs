use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{ChatError, ChatResult};

const TEMP_ID_PREFIX: &str = "tmp-";

/// Internal id of a chat participant (the `users.id` column).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Id of a message row. Optimistic entries carry a temporary id until the
/// authoritative row replaces them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn temporary() -> Self {
        Self(format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4()))
    }

    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_ID_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chat user as stored in the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub external_id: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Participant {
    /// Case-insensitive substring match on the display name. A blank query
    /// matches everyone.
    pub fn matches_search(&self, query: &str) -> bool {
        let query = query.trim();
        query.is_empty()
            || self
                .display_name
                .to_lowercase()
                .contains(&query.to_lowercase())
    }
}

/// Provisioning request for a participant coming from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewParticipant {
    pub external_id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// One direct message between two participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: ParticipantId,
    pub receiver_id: ParticipantId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Correlation id generated by the sending client and echoed back by the store.
    #[serde(default)]
    pub client_ref: Option<String>,
    /// Local-only marker for entries not yet confirmed by the store.
    #[serde(skip)]
    pub optimistic: bool,
}

impl Message {
    /// Builds the locally displayed entry for a send that is still in flight.
    pub fn optimistic(request: &NewMessage) -> Self {
        Self {
            id: MessageId::temporary(),
            sender_id: request.sender_id.clone(),
            receiver_id: request.receiver_id.clone(),
            content: request.content.clone(),
            created_at: Utc::now(),
            client_ref: Some(request.client_ref.clone()),
            optimistic: true,
        }
    }

    /// True when the message was exchanged between `a` and `b`, in either direction.
    pub fn is_between(&self, a: &ParticipantId, b: &ParticipantId) -> bool {
        (&self.sender_id == a && &self.receiver_id == b)
            || (&self.sender_id == b && &self.receiver_id == a)
    }

    pub fn involves(&self, participant: &ParticipantId) -> bool {
        &self.sender_id == participant || &self.receiver_id == participant
    }
}

/// Insert request for the message store. Content is always trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMessage {
    pub sender_id: ParticipantId,
    pub receiver_id: ParticipantId,
    pub content: String,
    pub client_ref: String,
}

impl NewMessage {
    pub fn new(
        sender_id: ParticipantId,
        receiver_id: ParticipantId,
        content: &str,
    ) -> ChatResult<Self> {
        let content = validate_content(content)?;
        Ok(Self {
            sender_id,
            receiver_id,
            content,
            client_ref: Uuid::new_v4().to_string(),
        })
    }
}

/// Rejects blank content before any network call is made.
pub fn validate_content(content: &str) -> ChatResult<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ChatError::Validation(
            "message content is empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}
