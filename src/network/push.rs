use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::common::{ChatError, ChatResult, Message, ParticipantId};

/// Which inserts on the messages table a subscriber wants to see.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InsertFilter {
    /// Only rows sent or received by this participant. `None` means every row.
    pub participant: Option<ParticipantId>,
}

impl InsertFilter {
    pub fn all_messages() -> Self {
        Self::default()
    }

    pub fn involving(participant: ParticipantId) -> Self {
        Self {
            participant: Some(participant),
        }
    }

    pub fn matches(&self, message: &Message) -> bool {
        self.participant
            .as_ref()
            .is_none_or(|participant| message.involves(participant))
    }
}

/// Events delivered over a subscription. Delivery is at-least-once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Inserted(Message),
    Disconnected(String),
}

/// Source of realtime insert events.
pub trait PushChannel: Send + Sync + 'static {
    fn subscribe(&self, filter: InsertFilter) -> ChatResult<Subscription>;
}

type ReleaseFn = Box<dyn FnOnce(u64) + Send + Sync>;

/// Live subscription handle. Released by [`Subscription::unsubscribe`] or on drop,
/// whichever comes first.
pub struct Subscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<ChannelEvent>,
    release: Option<ReleaseFn>,
}

impl Subscription {
    pub fn new(
        id: u64,
        receiver: mpsc::UnboundedReceiver<ChannelEvent>,
        release: impl FnOnce(u64) + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            receiver,
            release: Some(Box::new(release)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            self.receiver.close();
            release(self.id);
            log::debug!("Released push subscription {}", self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl Stream for Subscription {
    type Item = ChannelEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("released", &self.release.is_none())
            .finish()
    }
}

struct Subscriber {
    filter: InsertFilter,
    sender: mpsc::UnboundedSender<ChannelEvent>,
}

#[derive(Default)]
struct Hub {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
}

/// In-process realtime hub. The SQLite store publishes every successful insert
/// here, mirroring a database change feed.
#[derive(Clone, Default)]
pub struct LocalPushChannel {
    hub: Arc<Mutex<Hub>>,
}

impl LocalPushChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(hub: &Mutex<Hub>) -> MutexGuard<'_, Hub> {
        hub.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fan an inserted row out to every matching subscriber. Returns how many
    /// subscribers received it.
    pub fn publish_insert(&self, message: &Message) -> usize {
        let mut hub = Self::lock(&self.hub);
        let mut delivered = 0;
        hub.subscribers.retain(|id, subscriber| {
            if !subscriber.filter.matches(message) {
                return true;
            }
            match subscriber.sender.send(ChannelEvent::Inserted(message.clone())) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    log::debug!("Dropping closed push subscriber {id}");
                    false
                }
            }
        });
        delivered
    }

    /// Notify all subscribers that the feed is gone and forget them.
    pub fn disconnect_all(&self, reason: &str) {
        let mut hub = Self::lock(&self.hub);
        for (_, subscriber) in hub.subscribers.drain() {
            let _ = subscriber
                .sender
                .send(ChannelEvent::Disconnected(reason.to_string()));
        }
        log::warn!("Push channel disconnected all subscribers: {reason}");
    }

    pub fn subscriber_count(&self) -> usize {
        Self::lock(&self.hub).subscribers.len()
    }
}

impl PushChannel for LocalPushChannel {
    fn subscribe(&self, filter: InsertFilter) -> ChatResult<Subscription> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = {
            let mut hub = Self::lock(&self.hub);
            hub.next_id += 1;
            let id = hub.next_id;
            hub.subscribers.insert(id, Subscriber { filter, sender });
            id
        };

        let weak: Weak<Mutex<Hub>> = Arc::downgrade(&self.hub);
        Ok(Subscription::new(id, receiver, move |id| {
            if let Some(hub) = weak.upgrade() {
                Self::lock(&hub).subscribers.remove(&id);
            }
        }))
    }
}

/// Channel used when no realtime backend is configured. Every subscribe
/// attempt fails, which leaves sessions in the degraded (history-only) mode.
#[derive(Debug, Clone, Default)]
pub struct DetachedChannel;

impl PushChannel for DetachedChannel {
    fn subscribe(&self, _filter: InsertFilter) -> ChatResult<Subscription> {
        Err(ChatError::transport("no realtime channel configured"))
    }
}
