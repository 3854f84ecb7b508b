use crate::common::{ParticipantId, SessionCommand};

pub const HELP: &str =
    "commands: /users [search]  /open <participant-id>  /close  /retry  /quit  /help";

/// What a line typed into the terminal asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    Session(SessionCommand),
    /// Resend the text of the last failed message.
    Retry,
    Help,
    Quit,
    Invalid(String),
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Option<InputAction> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Some(command) = trimmed.strip_prefix('/') else {
        return Some(InputAction::Session(SessionCommand::SendMessage(
            line.to_string(),
        )));
    };

    if let Some(rest) = command.strip_prefix("users") {
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            let search = Some(rest.trim().to_string()).filter(|query| !query.is_empty());
            return Some(InputAction::Session(SessionCommand::ListParticipants(search)));
        }
    }

    let mut parts = command.split_whitespace();
    let action = match (parts.next(), parts.next(), parts.next()) {
        (Some("open"), Some(peer), None) => {
            InputAction::Session(SessionCommand::SelectPeer(Some(ParticipantId::new(peer))))
        }
        (Some("open"), _, _) => InputAction::Invalid("usage: /open <participant-id>".to_string()),
        (Some("close"), None, _) => InputAction::Session(SessionCommand::SelectPeer(None)),
        (Some("retry"), None, _) => InputAction::Retry,
        (Some("help"), _, _) => InputAction::Help,
        (Some("quit") | Some("exit"), None, _) => InputAction::Quit,
        _ => InputAction::Invalid(format!("unknown command `{trimmed}`")),
    };
    Some(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_sent_verbatim() {
        assert_eq!(
            parse("  hello there "),
            Some(InputAction::Session(SessionCommand::SendMessage(
                "  hello there ".to_string()
            )))
        );
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(parse("   "), None);
    }

    #[test]
    fn slash_commands() {
        assert_eq!(
            parse("/open u-42"),
            Some(InputAction::Session(SessionCommand::SelectPeer(Some(
                ParticipantId::new("u-42")
            ))))
        );
        assert_eq!(
            parse("/close"),
            Some(InputAction::Session(SessionCommand::SelectPeer(None)))
        );
        assert_eq!(
            parse("/users"),
            Some(InputAction::Session(SessionCommand::ListParticipants(None)))
        );
        assert_eq!(
            parse("/users  ana lima "),
            Some(InputAction::Session(SessionCommand::ListParticipants(Some(
                "ana lima".to_string()
            ))))
        );
        assert_eq!(parse("/retry"), Some(InputAction::Retry));
        assert_eq!(parse("/quit"), Some(InputAction::Quit));
        assert_eq!(parse("/help"), Some(InputAction::Help));
    }

    #[test]
    fn malformed_commands_are_reported() {
        assert!(matches!(parse("/open"), Some(InputAction::Invalid(_))));
        assert!(matches!(parse("/open a b"), Some(InputAction::Invalid(_))));
        assert!(matches!(parse("/dance"), Some(InputAction::Invalid(_))));
        assert!(matches!(parse("/usersx"), Some(InputAction::Invalid(_))));
    }
}
