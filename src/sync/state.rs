use std::mem;

use crate::common::{
    ChannelStatus, ChatError, ChatResult, Message, MessageId, NewMessage, ParticipantId,
};

use super::reconcile::{Outcome, insert_ordered, reconcile};

/// Immutable copy of the conversation handed to the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSnapshot {
    pub participant_id: ParticipantId,
    pub peer: Option<ParticipantId>,
    pub messages: Vec<Message>,
    pub loading: bool,
    pub error: Option<String>,
    pub channel: ChannelStatus,
    /// Text of the last failed send, kept for retry.
    pub draft: Option<String>,
}

/// Tags a history fetch with the selection it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub peer: ParticipantId,
}

/// A send whose optimistic entry is on screen while the insert is in flight.
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub generation: u64,
    pub temp_id: MessageId,
    pub request: NewMessage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The row belongs to another conversation, or nothing is selected.
    Ignored,
    Applied(Outcome),
}

/// Message list for the selected direct conversation.
///
/// Every transition runs to completion on the session task; stale async
/// results are recognised by the selection generation they carry.
#[derive(Debug, Clone)]
pub struct ConversationState {
    participant_id: ParticipantId,
    peer: Option<ParticipantId>,
    generation: u64,
    messages: Vec<Message>,
    loading: bool,
    error: Option<String>,
    channel: ChannelStatus,
    draft: Option<String>,
}

impl ConversationState {
    pub fn new(participant_id: ParticipantId) -> Self {
        Self {
            participant_id,
            peer: None,
            generation: 0,
            messages: Vec::new(),
            loading: false,
            error: None,
            channel: ChannelStatus::Idle,
            draft: None,
        }
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    /// Bumped on every selection change.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn peer(&self) -> Option<&ParticipantId> {
        self.peer.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn channel(&self) -> &ChannelStatus {
        &self.channel
    }

    pub fn draft(&self) -> Option<&str> {
        self.draft.as_deref()
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            participant_id: self.participant_id.clone(),
            peer: self.peer.clone(),
            messages: self.messages.clone(),
            loading: self.loading,
            error: self.error.clone(),
            channel: self.channel.clone(),
            draft: self.draft.clone(),
        }
    }

    /// Switches to `peer`, dropping everything shown for the previous one.
    /// Returns the ticket the history fetch must be tagged with.
    pub fn select_peer(&mut self, peer: Option<ParticipantId>) -> Option<FetchTicket> {
        self.generation += 1;
        self.messages.clear();
        self.error = None;
        self.draft = None;
        self.peer = peer;

        match &self.peer {
            Some(peer) => {
                self.loading = true;
                Some(FetchTicket {
                    generation: self.generation,
                    peer: peer.clone(),
                })
            }
            None => {
                self.loading = false;
                self.channel = ChannelStatus::Idle;
                None
            }
        }
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation && self.peer.as_ref() == Some(&ticket.peer)
    }

    /// Applies a finished history fetch. Results for an older selection are
    /// discarded and `false` is returned.
    pub fn apply_history(
        &mut self,
        ticket: &FetchTicket,
        result: ChatResult<Vec<Message>>,
    ) -> bool {
        if !self.is_current(ticket) {
            log::debug!(
                "Discarding stale history for {} (generation {} != {})",
                ticket.peer,
                ticket.generation,
                self.generation
            );
            return false;
        }
        self.loading = false;

        match result {
            Ok(mut history) => {
                history.sort_by_key(|message| message.created_at);
                // Events and sends that landed while the fetch was in flight.
                let arrived = mem::take(&mut self.messages);
                self.messages = history;
                for message in arrived {
                    self.merge_into_history(message);
                }
                self.error = None;
            }
            Err(err) => {
                log::warn!("Loading history with {} failed: {err}", ticket.peer);
                self.error = Some(err.to_string());
            }
        }
        true
    }

    fn merge_into_history(&mut self, message: Message) {
        if !message.optimistic {
            self.messages = reconcile(mem::take(&mut self.messages), message).messages;
            return;
        }
        let confirmed = self.messages.iter().any(|existing| {
            !existing.optimistic
                && existing.client_ref.is_some()
                && existing.client_ref == message.client_ref
        });
        if !confirmed {
            insert_ordered(&mut self.messages, message);
        }
    }

    /// Validates `content` and shows it immediately as an optimistic entry.
    pub fn begin_send(&mut self, content: &str) -> ChatResult<PendingSend> {
        let Some(peer) = self.peer.clone() else {
            return Err(ChatError::Validation("no conversation selected".to_string()));
        };
        let request = NewMessage::new(self.participant_id.clone(), peer, content)?;
        let entry = Message::optimistic(&request);
        let pending = PendingSend {
            generation: self.generation,
            temp_id: entry.id.clone(),
            request,
        };

        insert_ordered(&mut self.messages, entry);
        self.error = None;
        self.draft = None;
        Ok(pending)
    }

    /// Settles an in-flight send. A failure removes the optimistic entry and
    /// keeps the text as the draft; a success leaves the entry for the push
    /// channel to confirm.
    pub fn complete_send(&mut self, pending: &PendingSend, result: &ChatResult<Message>) {
        if pending.generation != self.generation {
            log::debug!("Send {} settled after selection changed", pending.temp_id);
            return;
        }

        match result {
            Ok(stored) => {
                log::debug!("Send {} stored as {}", pending.temp_id, stored.id);
            }
            Err(err) => {
                let before = self.messages.len();
                self.messages.retain(|message| message.id != pending.temp_id);
                if self.messages.len() != before {
                    log::warn!("Rolled back send {}: {err}", pending.temp_id);
                }
                self.error = Some(err.to_string());
                self.draft = Some(pending.request.content.clone());
            }
        }
    }

    /// Applies an insert event delivered by the push channel.
    pub fn apply_event(&mut self, message: Message) -> EventOutcome {
        let Some(peer) = &self.peer else {
            return EventOutcome::Ignored;
        };
        if !message.is_between(&self.participant_id, peer) {
            return EventOutcome::Ignored;
        }

        let result = reconcile(mem::take(&mut self.messages), message);
        self.messages = result.messages;
        EventOutcome::Applied(result.outcome)
    }

    /// Returns whether the status actually changed.
    pub fn set_channel_status(&mut self, status: ChannelStatus) -> bool {
        if self.channel == status {
            return false;
        }
        self.channel = status;
        true
    }
}
