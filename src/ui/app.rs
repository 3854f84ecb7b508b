use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::common::{SessionCommand, SessionEvent};

use super::components::{chat_area, input_bar, input_bar::InputAction, sidebar};

/// Line-oriented terminal front end for a chat session.
pub struct TerminalApp {
    command_sender: mpsc::Sender<SessionCommand>,
    event_receiver: mpsc::Receiver<SessionEvent>,
    /// Text of the last failed send, offered again by `/retry`.
    draft: Option<String>,
}

impl TerminalApp {
    pub fn new(
        command_sender: mpsc::Sender<SessionCommand>,
        event_receiver: mpsc::Receiver<SessionEvent>,
    ) -> Self {
        Self {
            command_sender,
            event_receiver,
            draft: None,
        }
    }

    /// Reads stdin and renders session events until `/quit`, end of input, or
    /// the session going away.
    pub async fn run(mut self) -> io::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut input_open = true;
        println!("{}", input_bar::HELP);

        loop {
            tokio::select! {
                line = lines.next_line(), if input_open => {
                    match line? {
                        Some(line) => {
                            if !self.handle_input(&line).await {
                                break;
                            }
                        }
                        None => {
                            input_open = false;
                            self.send_command(SessionCommand::Shutdown).await;
                        }
                    }
                }
                event = self.event_receiver.recv() => {
                    match event {
                        Some(event) => self.handle_session_event(event, &mut io::stdout().lock())?,
                        None => break,
                    }
                }
            }
        }

        Ok(())
    }

    /// Returns `false` once the user asked to quit.
    async fn handle_input(&mut self, line: &str) -> bool {
        let Some(action) = input_bar::parse(line) else {
            return true;
        };

        match action {
            InputAction::Session(command) => self.send_command(command).await,
            InputAction::Retry => match self.draft.take() {
                Some(draft) => {
                    self.send_command(SessionCommand::SendMessage(draft)).await;
                }
                None => println!("nothing to retry"),
            },
            InputAction::Help => println!("{}", input_bar::HELP),
            InputAction::Invalid(reason) => println!("{reason}"),
            InputAction::Quit => {
                self.send_command(SessionCommand::Shutdown).await;
                return false;
            }
        }
        true
    }

    fn handle_session_event(&mut self, event: SessionEvent, out: &mut impl Write) -> io::Result<()> {
        match event {
            SessionEvent::IdentityPending { attempt } => {
                writeln!(out, "waiting for your account to be provisioned (attempt {attempt})")?;
            }
            SessionEvent::Ready { participant_id } => {
                writeln!(out, "signed in as {participant_id}")?;
            }
            SessionEvent::Participants(participants) => sidebar::render(out, &participants)?,
            SessionEvent::ConversationUpdated(snapshot) => {
                if snapshot.draft.is_some() {
                    self.draft = snapshot.draft.clone();
                }
                chat_area::render(out, &snapshot)?;
            }
            SessionEvent::ChannelStatusChanged(status) => {
                writeln!(out, "realtime: {status}")?;
            }
            SessionEvent::SendFailed { draft, error } => {
                writeln!(out, "not sent: {error}")?;
                if !draft.trim().is_empty() {
                    writeln!(out, "  /retry to send again: {draft}")?;
                    self.draft = Some(draft);
                }
            }
            SessionEvent::Error(error) => writeln!(out, "error: {error}")?,
        }
        out.flush()
    }

    async fn send_command(&self, command: SessionCommand) {
        if let Err(err) = self.command_sender.send(command).await {
            log::warn!("Failed to send command to session: {err}");
        }
    }
}
