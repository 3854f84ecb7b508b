use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

use crate::common::{Message, MessageId, Participant, ParticipantId};

pub(crate) const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, content, client_ref, created_at";
pub(crate) const PARTICIPANT_COLUMNS: &str = "id, external_id, display_name, avatar_url, created_at";

/// Timestamps are stored as unix milliseconds.
pub(crate) fn to_millis(at: &DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// Current time truncated to the millisecond precision the tables keep.
pub(crate) fn stored_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn from_millis(index: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            Type::Integer,
            format!("timestamp out of range: {millis}").into(),
        )
    })
}

/// Maps a row selected with [`MESSAGE_COLUMNS`].
pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: MessageId::new(row.get::<_, String>(0)?),
        sender_id: ParticipantId::new(row.get::<_, String>(1)?),
        receiver_id: ParticipantId::new(row.get::<_, String>(2)?),
        content: row.get(3)?,
        client_ref: row.get(4)?,
        created_at: from_millis(5, row.get(5)?)?,
        optimistic: false,
    })
}

/// Maps a row selected with [`PARTICIPANT_COLUMNS`].
pub(crate) fn participant_from_row(row: &Row<'_>) -> rusqlite::Result<Participant> {
    Ok(Participant {
        id: ParticipantId::new(row.get::<_, String>(0)?),
        external_id: row.get(1)?,
        display_name: row.get(2)?,
        avatar_url: row.get(3)?,
        created_at: from_millis(4, row.get(4)?)?,
    })
}
