use rusqlite::{OptionalExtension, Result as SqlResult, params};
use std::path::Path;
use uuid::Uuid;

use super::database::Database;
use super::models::{
    MESSAGE_COLUMNS, PARTICIPANT_COLUMNS, message_from_row, participant_from_row, stored_now,
    to_millis,
};
use crate::common::{Message, MessageId, NewMessage, NewParticipant, Participant, ParticipantId};

/// Database holding participants and direct messages.
pub struct ChatDatabase {
    db: Database,
}

impl ChatDatabase {
    /// Open the chat database at a custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> SqlResult<Self> {
        let chat_db = Self {
            db: Database::open(path)?,
        };
        chat_db.init_schema()?;
        Ok(chat_db)
    }

    pub fn in_memory() -> SqlResult<Self> {
        let chat_db = Self {
            db: Database::in_memory()?,
        };
        chat_db.init_schema()?;
        Ok(chat_db)
    }

    fn init_schema(&self) -> SqlResult<()> {
        let conn = self.db.connection();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                external_id TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                avatar_url TEXT,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                sender_id TEXT NOT NULL REFERENCES users(id),
                receiver_id TEXT NOT NULL REFERENCES users(id),
                content TEXT NOT NULL,
                client_ref TEXT,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_pair
             ON messages(sender_id, receiver_id, created_at)",
            [],
        )?;

        Ok(())
    }

    // ========== Participants ==========

    /// Create the participant for an external identity, or return the existing one.
    pub fn provision_participant(&self, new: &NewParticipant) -> SqlResult<Participant> {
        if let Some(existing) = self.participant_by_external_id(&new.external_id)? {
            return Ok(existing);
        }

        let participant = Participant {
            id: ParticipantId::new(Uuid::new_v4().to_string()),
            external_id: new.external_id.clone(),
            display_name: new.display_name.clone(),
            avatar_url: new.avatar_url.clone(),
            created_at: stored_now(),
        };
        self.db.connection().execute(
            "INSERT INTO users (id, external_id, display_name, avatar_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                participant.id.as_str(),
                participant.external_id,
                participant.display_name,
                participant.avatar_url,
                to_millis(&participant.created_at)
            ],
        )?;
        Ok(participant)
    }

    pub fn participant_by_external_id(&self, external_id: &str) -> SqlResult<Option<Participant>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM users WHERE external_id = ?1"
        ))?;
        stmt.query_row(params![external_id], participant_from_row)
            .optional()
    }

    /// Everyone except `excluding`, ordered by display name.
    pub fn participants_except(&self, excluding: &ParticipantId) -> SqlResult<Vec<Participant>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM users
             WHERE id != ?1
             ORDER BY display_name ASC, created_at ASC"
        ))?;

        let participants = stmt
            .query_map(params![excluding.as_str()], participant_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(participants)
    }

    // ========== Messages ==========

    /// Persist a message; the store assigns the permanent id and timestamp.
    pub fn insert_message(&self, new: &NewMessage) -> SqlResult<Message> {
        let message = Message {
            id: MessageId::new(Uuid::new_v4().to_string()),
            sender_id: new.sender_id.clone(),
            receiver_id: new.receiver_id.clone(),
            content: new.content.clone(),
            created_at: stored_now(),
            client_ref: Some(new.client_ref.clone()),
            optimistic: false,
        };

        self.db.connection().execute(
            "INSERT INTO messages (id, sender_id, receiver_id, content, client_ref, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id.as_str(),
                message.sender_id.as_str(),
                message.receiver_id.as_str(),
                message.content,
                message.client_ref,
                to_millis(&message.created_at)
            ],
        )?;
        Ok(message)
    }

    /// All messages exchanged between `a` and `b`, oldest first.
    pub fn conversation(&self, a: &ParticipantId, b: &ParticipantId) -> SqlResult<Vec<Message>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE (sender_id = ?1 AND receiver_id = ?2)
                OR (sender_id = ?2 AND receiver_id = ?1)
             ORDER BY created_at ASC, rowid ASC"
        ))?;

        let messages = stmt
            .query_map(params![a.as_str(), b.as_str()], message_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(messages)
    }

}
