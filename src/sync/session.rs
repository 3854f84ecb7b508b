use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;

use crate::common::{
    ChannelStatus, ChatResult, Message, Participant, ParticipantId, SessionCommand, SessionEvent,
};
use crate::network::{ChannelEvent, InsertFilter, PushChannel, Subscription};
use crate::storage::{MessageStore, ParticipantStore};

use super::identity::{IdentityResolver, RetryPolicy};
use super::reconcile::Outcome;
use super::state::{ConversationState, EventOutcome, FetchTicket, PendingSend};

/// Results of store calls running on background tasks, fed back into the loop.
enum Completion {
    History {
        ticket: FetchTicket,
        result: ChatResult<Vec<Message>>,
    },
    Send {
        pending: PendingSend,
        result: ChatResult<Message>,
    },
    Participants(ChatResult<Vec<Participant>>),
}

/// Drives one signed-in user's direct-message view.
///
/// Commands, store completions and push events are handled one at a time on
/// the task running [`ChatSession::run`]; only store I/O happens elsewhere.
pub struct ChatSession<S, C> {
    store: Arc<S>,
    channel: C,
    identity: IdentityResolver<S>,
    retry: RetryPolicy,
    event_sender: mpsc::Sender<SessionEvent>,
    command_receiver: mpsc::Receiver<SessionCommand>,
    completion_sender: mpsc::UnboundedSender<Completion>,
    completion_receiver: mpsc::UnboundedReceiver<Completion>,
    subscription: Option<Subscription>,
}

impl<S, C> ChatSession<S, C>
where
    S: MessageStore + ParticipantStore,
    C: PushChannel,
{
    pub fn new(
        store: Arc<S>,
        channel: C,
        external_id: impl Into<String>,
        retry: RetryPolicy,
        event_sender: mpsc::Sender<SessionEvent>,
        command_receiver: mpsc::Receiver<SessionCommand>,
    ) -> Self {
        let (completion_sender, completion_receiver) = mpsc::unbounded_channel();
        Self {
            identity: IdentityResolver::new(Arc::clone(&store), external_id),
            store,
            channel,
            retry,
            event_sender,
            command_receiver,
            completion_sender,
            completion_receiver,
            subscription: None,
        }
    }

    /// Resolves the identity, then serves commands until `Shutdown` or until
    /// the command sender is dropped.
    pub async fn run(mut self) -> ChatResult<()> {
        let participant_id = self.resolve_identity().await?;
        self.emit(SessionEvent::Ready {
            participant_id: participant_id.clone(),
        })
        .await;

        let mut state = ConversationState::new(participant_id);
        log::info!("Chat session loop started");

        loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(SessionCommand::Shutdown) | None => break,
                        Some(command) => self.handle_command(command, &mut state).await,
                    }
                }
                Some(completion) = self.completion_receiver.recv() => {
                    self.handle_completion(completion, &mut state).await;
                }
                event = next_channel_event(&mut self.subscription) => {
                    self.handle_channel_event(event, &mut state).await;
                }
            }
        }

        self.release_subscription();
        log::info!("Chat session loop stopped");
        Ok(())
    }

    async fn resolve_identity(&mut self) -> ChatResult<ParticipantId> {
        let sender = self.event_sender.clone();
        let result = self
            .identity
            .resolve_with_retry(self.retry, |attempt| {
                if let Err(err) = sender.try_send(SessionEvent::IdentityPending { attempt }) {
                    log::debug!("Dropped identity-pending notice: {err}");
                }
            })
            .await;

        if let Err(err) = &result {
            log::error!(
                "Unable to resolve identity {}: {err}",
                self.identity.external_id()
            );
            self.emit(SessionEvent::Error(err.to_string())).await;
        }
        result
    }

    async fn handle_command(&mut self, command: SessionCommand, state: &mut ConversationState) {
        match command {
            SessionCommand::SelectPeer(peer) => self.select_peer(peer, state).await,
            SessionCommand::SendMessage(content) => self.send_message(content, state).await,
            SessionCommand::ListParticipants(search) => {
                let store = Arc::clone(&self.store);
                let me = state.participant_id().clone();
                let completions = self.completion_sender.clone();
                tokio::spawn(async move {
                    let result = store.list_participants(&me).await.map(|participants| {
                        let query = search.unwrap_or_default();
                        participants
                            .into_iter()
                            .filter(|participant| participant.matches_search(&query))
                            .collect()
                    });
                    let _ = completions.send(Completion::Participants(result));
                });
            }
            SessionCommand::Shutdown => {}
        }
    }

    async fn select_peer(&mut self, peer: Option<ParticipantId>, state: &mut ConversationState) {
        // Old handler goes first so nothing for the previous peer lands in the new view.
        self.release_subscription();
        let channel_before = state.channel().clone();

        if let Some(ticket) = state.select_peer(peer) {
            log::info!("Opening conversation with {}", ticket.peer);
            let filter = InsertFilter::involving(state.participant_id().clone());
            let status = match self.channel.subscribe(filter) {
                Ok(subscription) => {
                    log::debug!("Push subscription {} active", subscription.id());
                    self.subscription = Some(subscription);
                    ChannelStatus::Live
                }
                Err(err) => {
                    log::warn!("Realtime updates unavailable: {err}");
                    ChannelStatus::Degraded(err.to_string())
                }
            };
            state.set_channel_status(status);
            self.spawn_history_fetch(ticket, state.participant_id().clone());
        }

        if state.channel() != &channel_before {
            self.emit(SessionEvent::ChannelStatusChanged(state.channel().clone()))
                .await;
        }
        self.emit_snapshot(state).await;
    }

    fn spawn_history_fetch(&self, ticket: FetchTicket, me: ParticipantId) {
        let store = Arc::clone(&self.store);
        let completions = self.completion_sender.clone();
        tokio::spawn(async move {
            let result = store.fetch_history(&me, &ticket.peer).await;
            let _ = completions.send(Completion::History { ticket, result });
        });
    }

    async fn send_message(&mut self, content: String, state: &mut ConversationState) {
        let pending = match state.begin_send(&content) {
            Ok(pending) => pending,
            Err(err) => {
                log::warn!("Rejected send: {err}");
                self.emit(SessionEvent::SendFailed {
                    draft: content,
                    error: err.to_string(),
                })
                .await;
                return;
            }
        };
        self.emit_snapshot(state).await;

        let store = Arc::clone(&self.store);
        let completions = self.completion_sender.clone();
        tokio::spawn(async move {
            let result = store.insert(pending.request.clone()).await;
            let _ = completions.send(Completion::Send { pending, result });
        });
    }

    async fn handle_completion(&mut self, completion: Completion, state: &mut ConversationState) {
        match completion {
            Completion::History { ticket, result } => {
                if state.apply_history(&ticket, result) {
                    self.emit_snapshot(state).await;
                }
            }
            Completion::Send { pending, result } => {
                state.complete_send(&pending, &result);
                if let Err(err) = &result {
                    self.emit(SessionEvent::SendFailed {
                        draft: pending.request.content.clone(),
                        error: err.to_string(),
                    })
                    .await;
                }
                if pending.generation == state.generation() {
                    self.emit_snapshot(state).await;
                }
            }
            Completion::Participants(Ok(participants)) => {
                self.emit(SessionEvent::Participants(participants)).await;
            }
            Completion::Participants(Err(err)) => {
                log::warn!("Listing participants failed: {err}");
                self.emit(SessionEvent::Error(err.to_string())).await;
            }
        }
    }

    async fn handle_channel_event(
        &mut self,
        event: Option<ChannelEvent>,
        state: &mut ConversationState,
    ) {
        let reason = match event {
            Some(ChannelEvent::Inserted(message)) => {
                let id = message.id.clone();
                match state.apply_event(message) {
                    EventOutcome::Ignored => {}
                    EventOutcome::Applied(Outcome::Duplicate) => {
                        log::debug!("Ignoring redelivered message {id}");
                    }
                    EventOutcome::Applied(outcome) => {
                        log::debug!("Message {id}: {outcome:?}");
                        self.emit_snapshot(state).await;
                    }
                }
                return;
            }
            Some(ChannelEvent::Disconnected(reason)) => reason,
            None => "push channel closed".to_string(),
        };

        log::warn!("Lost realtime updates: {reason}");
        self.release_subscription();
        if state.set_channel_status(ChannelStatus::Degraded(reason)) {
            self.emit(SessionEvent::ChannelStatusChanged(state.channel().clone()))
                .await;
        }
        self.emit_snapshot(state).await;
    }

    fn release_subscription(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }

    async fn emit_snapshot(&self, state: &ConversationState) {
        self.emit(SessionEvent::ConversationUpdated(state.snapshot()))
            .await;
    }

    async fn emit(&self, event: SessionEvent) {
        if let Err(err) = self.event_sender.send(event).await {
            log::debug!("Front end gone, dropping session event: {err}");
        }
    }
}

async fn next_channel_event(subscription: &mut Option<Subscription>) -> Option<ChannelEvent> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ChatError, NewMessage, NewParticipant};
    use crate::network::{DetachedChannel, LocalPushChannel};
    use crate::storage::SqliteStore;
    use crate::sync::ConversationSnapshot;
    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    /// SQLite store with switchable failures and gated history fetches.
    struct ScriptedStore {
        inner: SqliteStore,
        fail_inserts: AtomicBool,
        fail_history: AtomicBool,
        gates: Mutex<HashMap<ParticipantId, oneshot::Receiver<()>>>,
    }

    impl ScriptedStore {
        fn new(inner: SqliteStore) -> Self {
            Self {
                inner,
                fail_inserts: AtomicBool::new(false),
                fail_history: AtomicBool::new(false),
                gates: Mutex::new(HashMap::new()),
            }
        }

        fn hold_history_for(&self, peer: &ParticipantId) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(peer.clone(), rx);
            tx
        }
    }

    impl ParticipantStore for ScriptedStore {
        fn find_participant(
            &self,
            external_id: &str,
        ) -> impl Future<Output = ChatResult<Option<Participant>>> + Send {
            self.inner.find_participant(external_id)
        }

        fn list_participants(
            &self,
            excluding: &ParticipantId,
        ) -> impl Future<Output = ChatResult<Vec<Participant>>> + Send {
            self.inner.list_participants(excluding)
        }

        fn provision_participant(
            &self,
            new: NewParticipant,
        ) -> impl Future<Output = ChatResult<Participant>> + Send {
            self.inner.provision_participant(new)
        }
    }

    impl MessageStore for ScriptedStore {
        fn fetch_history(
            &self,
            a: &ParticipantId,
            b: &ParticipantId,
        ) -> impl Future<Output = ChatResult<Vec<Message>>> + Send {
            let gate = self.gates.lock().unwrap().remove(b);
            let fail = self.fail_history.load(Ordering::SeqCst);
            let fetch = self.inner.fetch_history(a, b);
            async move {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                if fail {
                    return Err(ChatError::transport("history unavailable"));
                }
                fetch.await
            }
        }

        fn insert(&self, message: NewMessage) -> impl Future<Output = ChatResult<Message>> + Send {
            let fail = self.fail_inserts.load(Ordering::SeqCst);
            let insert = self.inner.insert(message);
            async move {
                if fail {
                    return Err(ChatError::transport("insert rejected"));
                }
                insert.await
            }
        }
    }

    struct Harness {
        commands: mpsc::Sender<SessionCommand>,
        events: mpsc::Receiver<SessionEvent>,
        task: JoinHandle<ChatResult<()>>,
    }

    impl Harness {
        fn start<S, C>(store: Arc<S>, channel: C, external_id: &str) -> Self
        where
            S: MessageStore + ParticipantStore,
            C: PushChannel,
        {
            let (commands, command_receiver) = mpsc::channel(16);
            let (event_sender, events) = mpsc::channel(64);
            let retry = RetryPolicy {
                attempts: 2,
                delay: Duration::from_millis(5),
            };
            let session =
                ChatSession::new(store, channel, external_id, retry, event_sender, command_receiver);
            Self {
                commands,
                events,
                task: tokio::spawn(session.run()),
            }
        }

        async fn send(&self, command: SessionCommand) {
            self.commands.send(command).await.unwrap();
        }

        async fn next_event(&mut self) -> SessionEvent {
            timeout(WAIT, self.events.recv())
                .await
                .expect("timed out waiting for session event")
                .expect("session ended")
        }

        async fn snapshot_where(
            &mut self,
            mut predicate: impl FnMut(&ConversationSnapshot) -> bool,
        ) -> ConversationSnapshot {
            loop {
                if let SessionEvent::ConversationUpdated(snapshot) = self.next_event().await {
                    if predicate(&snapshot) {
                        return snapshot;
                    }
                }
            }
        }

        async fn shutdown(self) -> ChatResult<()> {
            self.send(SessionCommand::Shutdown).await;
            timeout(WAIT, self.task).await.unwrap().unwrap()
        }
    }

    async fn provision(store: &SqliteStore, external_id: &str) -> ParticipantId {
        store
            .provision_participant(NewParticipant {
                external_id: external_id.to_string(),
                display_name: external_id.to_string(),
                avatar_url: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn ready(harness: &mut Harness) -> ParticipantId {
        loop {
            if let SessionEvent::Ready { participant_id } = harness.next_event().await {
                return participant_id;
            }
        }
    }

    #[tokio::test]
    async fn send_is_reconciled_through_push_channel() {
        let store = SqliteStore::in_memory().unwrap();
        let x = provision(&store, "x").await;
        let y = provision(&store, "y").await;
        let hub = store.push_channel();
        let mut harness = Harness::start(Arc::new(store), hub.clone(), "x");
        assert_eq!(ready(&mut harness).await, x);

        harness.send(SessionCommand::SelectPeer(Some(y.clone()))).await;
        let loaded = harness.snapshot_where(|s| !s.loading).await;
        assert!(loaded.messages.is_empty());
        assert_eq!(loaded.channel, ChannelStatus::Live);

        harness.send(SessionCommand::SendMessage("hello".into())).await;
        let shown = harness.snapshot_where(|s| !s.messages.is_empty()).await;
        assert!(shown.messages[0].optimistic);

        let confirmed = harness
            .snapshot_where(|s| s.messages.iter().all(|m| !m.optimistic))
            .await;
        assert_eq!(confirmed.messages.len(), 1);
        assert_eq!(confirmed.messages[0].content, "hello");

        harness.shutdown().await.unwrap();
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn inbound_messages_are_deduplicated() {
        let store = SqliteStore::in_memory().unwrap();
        provision(&store, "x").await;
        let y = provision(&store, "y").await;
        let z = provision(&store, "z").await;
        let hub = store.push_channel();
        let store = Arc::new(store);
        let mut harness = Harness::start(Arc::clone(&store), hub.clone(), "x");
        let x = ready(&mut harness).await;

        harness.send(SessionCommand::SelectPeer(Some(y.clone()))).await;
        harness.snapshot_where(|s| !s.loading).await;

        let from_y = store
            .insert(NewMessage::new(y.clone(), x.clone(), "ping").unwrap())
            .await
            .unwrap();
        harness.snapshot_where(|s| s.messages.len() == 1).await;

        hub.publish_insert(&from_y);
        store
            .insert(NewMessage::new(z, x.clone(), "elsewhere").unwrap())
            .await
            .unwrap();
        store
            .insert(NewMessage::new(y, x, "pong").unwrap())
            .await
            .unwrap();

        let latest = harness.snapshot_where(|s| s.messages.len() >= 2).await;
        let contents: Vec<_> = latest.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["ping", "pong"]);
        harness.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn failed_insert_rolls_back_and_returns_draft() {
        let sqlite = SqliteStore::in_memory().unwrap();
        provision(&sqlite, "x").await;
        let y = provision(&sqlite, "y").await;
        let hub = sqlite.push_channel();
        let store = Arc::new(ScriptedStore::new(sqlite));
        store.fail_inserts.store(true, Ordering::SeqCst);
        let mut harness = Harness::start(Arc::clone(&store), hub, "x");
        ready(&mut harness).await;

        harness.send(SessionCommand::SelectPeer(Some(y))).await;
        harness.snapshot_where(|s| !s.loading).await;
        harness.send(SessionCommand::SendMessage(" lost ".into())).await;

        let draft = loop {
            if let SessionEvent::SendFailed { draft, .. } = harness.next_event().await {
                break draft;
            }
        };
        assert_eq!(draft, "lost");

        let rolled_back = harness.snapshot_where(|s| s.draft.is_some()).await;
        assert!(rolled_back.messages.is_empty());
        assert!(rolled_back.error.is_some());
        harness.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn late_history_for_previous_peer_is_discarded() {
        let sqlite = SqliteStore::in_memory().unwrap();
        let x = provision(&sqlite, "x").await;
        let a = provision(&sqlite, "a").await;
        let b = provision(&sqlite, "b").await;
        sqlite
            .insert(NewMessage::new(a.clone(), x.clone(), "from a").unwrap())
            .await
            .unwrap();
        sqlite
            .insert(NewMessage::new(b.clone(), x.clone(), "from b").unwrap())
            .await
            .unwrap();
        let hub = sqlite.push_channel();
        let store = Arc::new(ScriptedStore::new(sqlite));
        let release_a = store.hold_history_for(&a);

        let mut harness = Harness::start(Arc::clone(&store), hub, "x");
        ready(&mut harness).await;
        harness.send(SessionCommand::SelectPeer(Some(a))).await;
        harness.send(SessionCommand::SelectPeer(Some(b.clone()))).await;

        let shown = harness
            .snapshot_where(|s| s.peer.as_ref() == Some(&b) && !s.loading)
            .await;
        assert_eq!(shown.messages.len(), 1);
        assert_eq!(shown.messages[0].content, "from b");

        release_a.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        harness.send(SessionCommand::SendMessage("still b".into())).await;

        let after = harness.snapshot_where(|s| s.messages.len() >= 2).await;
        assert_eq!(after.peer, Some(b));
        assert!(after.messages.iter().all(|m| m.content != "from a"));
        harness.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn without_realtime_sends_stay_optimistic() {
        let store = SqliteStore::in_memory().unwrap();
        provision(&store, "x").await;
        let y = provision(&store, "y").await;
        let mut harness = Harness::start(Arc::new(store), DetachedChannel, "x");
        ready(&mut harness).await;

        harness.send(SessionCommand::SelectPeer(Some(y))).await;
        let degraded = loop {
            if let SessionEvent::ChannelStatusChanged(status) = harness.next_event().await {
                break status;
            }
        };
        assert!(matches!(degraded, ChannelStatus::Degraded(_)));

        harness.send(SessionCommand::SendMessage("hi".into())).await;
        harness.snapshot_where(|s| !s.messages.is_empty()).await;
        // Second snapshot follows the successful insert.
        let settled = harness.snapshot_where(|s| !s.messages.is_empty()).await;
        assert_eq!(settled.messages.len(), 1);
        assert!(settled.messages[0].optimistic);
        assert_eq!(settled.error, None);
        harness.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn channel_loss_keeps_loaded_history() {
        let store = SqliteStore::in_memory().unwrap();
        let x = provision(&store, "x").await;
        let y = provision(&store, "y").await;
        store
            .insert(NewMessage::new(y.clone(), x, "kept").unwrap())
            .await
            .unwrap();
        let hub = store.push_channel();
        let mut harness = Harness::start(Arc::new(store), hub.clone(), "x");
        ready(&mut harness).await;

        harness.send(SessionCommand::SelectPeer(Some(y))).await;
        harness.snapshot_where(|s| !s.loading).await;
        hub.disconnect_all("maintenance");

        let degraded = harness
            .snapshot_where(|s| matches!(s.channel, ChannelStatus::Degraded(_)))
            .await;
        assert_eq!(degraded.messages.len(), 1);
        assert_eq!(degraded.messages[0].content, "kept");
        harness.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn selection_changes_swap_the_subscription() {
        let store = SqliteStore::in_memory().unwrap();
        provision(&store, "x").await;
        let a = provision(&store, "a").await;
        let b = provision(&store, "b").await;
        let hub = store.push_channel();
        let mut harness = Harness::start(Arc::new(store), hub.clone(), "x");
        ready(&mut harness).await;
        assert_eq!(hub.subscriber_count(), 0);

        harness.send(SessionCommand::SelectPeer(Some(a))).await;
        harness.send(SessionCommand::SelectPeer(Some(b.clone()))).await;
        harness
            .snapshot_where(|s| s.peer.as_ref() == Some(&b) && !s.loading)
            .await;
        assert_eq!(hub.subscriber_count(), 1);

        harness.send(SessionCommand::SelectPeer(None)).await;
        let closed = harness.snapshot_where(|s| s.peer.is_none()).await;
        assert_eq!(closed.channel, ChannelStatus::Idle);
        assert_eq!(hub.subscriber_count(), 0);
        harness.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn failed_history_is_reported_in_the_snapshot() {
        let sqlite = SqliteStore::in_memory().unwrap();
        provision(&sqlite, "x").await;
        let y = provision(&sqlite, "y").await;
        let hub = sqlite.push_channel();
        let store = Arc::new(ScriptedStore::new(sqlite));
        store.fail_history.store(true, Ordering::SeqCst);
        let mut harness = Harness::start(Arc::clone(&store), hub, "x");
        ready(&mut harness).await;

        harness.send(SessionCommand::SelectPeer(Some(y))).await;
        let failed = harness.snapshot_where(|s| !s.loading).await;
        assert!(failed.messages.is_empty());
        assert!(failed.error.as_deref().unwrap().contains("history unavailable"));
        harness.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn lists_other_participants() {
        let store = SqliteStore::in_memory().unwrap();
        provision(&store, "x").await;
        provision(&store, "y").await;
        let hub = store.push_channel();
        let mut harness = Harness::start(Arc::new(store), hub, "x");
        ready(&mut harness).await;

        harness.send(SessionCommand::ListParticipants(None)).await;
        let listed = loop {
            if let SessionEvent::Participants(list) = harness.next_event().await {
                break list;
            }
        };
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].external_id, "y");
        harness.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn participant_search_narrows_directory() {
        let store = SqliteStore::in_memory().unwrap();
        provision(&store, "x").await;
        for (external_id, name) in [("ana", "Ana Lima"), ("bo", "Bo"), ("lia", "Lia")] {
            store
                .provision_participant(NewParticipant {
                    external_id: external_id.to_string(),
                    display_name: name.to_string(),
                    avatar_url: None,
                })
                .await
                .unwrap();
        }
        let hub = store.push_channel();
        let mut harness = Harness::start(Arc::new(store), hub, "x");
        ready(&mut harness).await;

        harness
            .send(SessionCommand::ListParticipants(Some("LI".into())))
            .await;
        let listed = loop {
            if let SessionEvent::Participants(list) = harness.next_event().await {
                break list;
            }
        };
        let names: Vec<_> = listed.iter().map(|p| p.display_name.as_str()).collect();
        assert_eq!(names, vec!["Ana Lima", "Lia"]);
        harness.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn unprovisioned_identity_ends_session() {
        let store = SqliteStore::in_memory().unwrap();
        let hub = store.push_channel();
        let mut harness = Harness::start(Arc::new(store), hub, "nobody");

        assert!(matches!(
            harness.next_event().await,
            SessionEvent::IdentityPending { attempt: 1 }
        ));
        assert!(matches!(harness.next_event().await, SessionEvent::Error(_)));

        let result = timeout(WAIT, harness.task).await.unwrap().unwrap();
        assert!(matches!(result, Err(ChatError::NotFound { .. })));
    }
}
