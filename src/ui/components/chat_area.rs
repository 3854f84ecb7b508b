use std::io::{self, Write};

use crate::sync::ConversationSnapshot;

pub fn render(out: &mut impl Write, snapshot: &ConversationSnapshot) -> io::Result<()> {
    let Some(peer) = &snapshot.peer else {
        return writeln!(out, "-- no conversation open (/open <participant-id>) --");
    };

    writeln!(out, "-- conversation with {peer} [{}] --", snapshot.channel)?;
    if snapshot.loading {
        writeln!(out, "   loading history...")?;
    } else if snapshot.messages.is_empty() {
        writeln!(out, "   no messages yet")?;
    }

    for message in &snapshot.messages {
        let who = if message.sender_id == snapshot.participant_id {
            "you"
        } else {
            message.sender_id.as_str()
        };
        let marker = if message.optimistic { " (sending)" } else { "" };
        writeln!(
            out,
            "[{}] {who}: {}{marker}",
            message.created_at.format("%H:%M:%S"),
            message.content
        )?;
    }

    if let Some(error) = &snapshot.error {
        writeln!(out, "!  {error}")?;
    }
    Ok(())
}
