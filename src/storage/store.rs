use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::common::{
    ChatError, ChatResult, Message, NewMessage, NewParticipant, Participant, ParticipantId,
};
use crate::network::LocalPushChannel;

use super::chat_db::ChatDatabase;

/// Participant lookups backing identity resolution and the directory.
pub trait ParticipantStore: Send + Sync + 'static {
    fn find_participant(
        &self,
        external_id: &str,
    ) -> impl Future<Output = ChatResult<Option<Participant>>> + Send;

    fn list_participants(
        &self,
        excluding: &ParticipantId,
    ) -> impl Future<Output = ChatResult<Vec<Participant>>> + Send;

    fn provision_participant(
        &self,
        new: NewParticipant,
    ) -> impl Future<Output = ChatResult<Participant>> + Send;
}

/// Reads and writes of message rows.
pub trait MessageStore: Send + Sync + 'static {
    /// Every message between `a` and `b` in either direction, oldest first.
    fn fetch_history(
        &self,
        a: &ParticipantId,
        b: &ParticipantId,
    ) -> impl Future<Output = ChatResult<Vec<Message>>> + Send;

    fn insert(&self, message: NewMessage) -> impl Future<Output = ChatResult<Message>> + Send;
}

/// Embedded store: SQLite on a blocking thread, inserts fanned out through an
/// in-process push channel.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<ChatDatabase>>,
    channel: LocalPushChannel,
}

impl SqliteStore {
    pub fn new(db: ChatDatabase, channel: LocalPushChannel) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            channel,
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> ChatResult<Self> {
        Ok(Self::new(ChatDatabase::with_path(path)?, LocalPushChannel::new()))
    }

    pub fn in_memory() -> ChatResult<Self> {
        Ok(Self::new(ChatDatabase::in_memory()?, LocalPushChannel::new()))
    }

    /// The change feed this store publishes inserts to.
    pub fn push_channel(&self) -> LocalPushChannel {
        self.channel.clone()
    }

    async fn with_db<T, F>(&self, op: F) -> ChatResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&ChatDatabase) -> rusqlite::Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|_| ChatError::transport("database handle poisoned"))?;
            op(&guard).map_err(ChatError::from)
        })
        .await?
    }
}

impl ParticipantStore for SqliteStore {
    fn find_participant(
        &self,
        external_id: &str,
    ) -> impl Future<Output = ChatResult<Option<Participant>>> + Send {
        let external_id = external_id.to_string();
        self.with_db(move |db| db.participant_by_external_id(&external_id))
    }

    fn list_participants(
        &self,
        excluding: &ParticipantId,
    ) -> impl Future<Output = ChatResult<Vec<Participant>>> + Send {
        let excluding = excluding.clone();
        self.with_db(move |db| db.participants_except(&excluding))
    }

    fn provision_participant(
        &self,
        new: NewParticipant,
    ) -> impl Future<Output = ChatResult<Participant>> + Send {
        self.with_db(move |db| db.provision_participant(&new))
    }
}

impl MessageStore for SqliteStore {
    fn fetch_history(
        &self,
        a: &ParticipantId,
        b: &ParticipantId,
    ) -> impl Future<Output = ChatResult<Vec<Message>>> + Send {
        let (a, b) = (a.clone(), b.clone());
        self.with_db(move |db| db.conversation(&a, &b))
    }

    fn insert(&self, message: NewMessage) -> impl Future<Output = ChatResult<Message>> + Send {
        async move {
            let content = crate::common::types::validate_content(&message.content)?;
            let request = NewMessage { content, ..message };
            let stored = self.with_db(move |db| db.insert_message(&request)).await?;
            let delivered = self.channel.publish_insert(&stored);
            log::debug!("Stored message {} (pushed to {delivered} subscribers)", stored.id);
            Ok(stored)
        }
    }
}
