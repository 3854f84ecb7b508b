use std::io::{self, Write};

use crate::common::Participant;

/// Prints the participant directory.
pub fn render(out: &mut impl Write, participants: &[Participant]) -> io::Result<()> {
    if participants.is_empty() {
        return writeln!(out, "No other participants yet");
    }

    writeln!(out, "Participants:")?;
    for participant in participants {
        writeln!(out, "  {}  {}", participant.id, participant.display_name)?;
    }
    Ok(())
}
