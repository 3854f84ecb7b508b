//! Merging authoritative insert events into a locally ordered message list.

use crate::common::Message;

/// What [`reconcile`] did with an incoming row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// New message, inserted at its timestamp position.
    Appended,
    /// Replaced the optimistic entry it confirms.
    Reconciled,
    /// Already present under the same permanent id; list unchanged.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub messages: Vec<Message>,
    pub outcome: Outcome,
}

/// Applies one authoritative message to `messages`, which must already be
/// sorted by `created_at`.
///
/// Optimistic entries are matched by the client correlation id. Rows without
/// one (written by clients that do not send it) fall back to the oldest
/// optimistic entry from the same sender with identical content.
pub fn reconcile(mut messages: Vec<Message>, mut incoming: Message) -> Reconciled {
    if messages
        .iter()
        .any(|existing| !existing.optimistic && existing.id == incoming.id)
    {
        return Reconciled {
            messages,
            outcome: Outcome::Duplicate,
        };
    }

    incoming.optimistic = false;
    let outcome = match find_optimistic(&messages, &incoming) {
        Some(index) => {
            messages[index] = incoming;
            restore_order(&mut messages, index);
            Outcome::Reconciled
        }
        None => {
            insert_ordered(&mut messages, incoming);
            Outcome::Appended
        }
    };

    Reconciled { messages, outcome }
}

fn find_optimistic(messages: &[Message], incoming: &Message) -> Option<usize> {
    match incoming.client_ref.as_deref() {
        Some(client_ref) => messages.iter().position(|existing| {
            existing.optimistic && existing.client_ref.as_deref() == Some(client_ref)
        }),
        None => messages.iter().position(|existing| {
            existing.optimistic
                && existing.sender_id == incoming.sender_id
                && existing.content == incoming.content
        }),
    }
}

/// Inserts after every entry with the same or an earlier timestamp, so ties
/// keep the order in which they were applied.
pub(crate) fn insert_ordered(messages: &mut Vec<Message>, message: Message) {
    let position = messages.partition_point(|existing| existing.created_at <= message.created_at);
    messages.insert(position, message);
}

fn restore_order(messages: &mut Vec<Message>, index: usize) {
    let at = messages[index].created_at;
    let after_previous = index == 0 || messages[index - 1].created_at <= at;
    let before_next = index + 1 == messages.len() || at <= messages[index + 1].created_at;
    if !(after_previous && before_next) {
        let moved = messages.remove(index);
        insert_ordered(messages, moved);
    }
}
