use std::sync::Arc;
use std::time::Duration;

use crate::common::{ChatError, ChatResult, ParticipantId};
use crate::storage::ParticipantStore;

/// How long to keep asking for a participant that has not been provisioned yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(500),
        }
    }
}

/// Maps the signed-in external identity to its participant id, once per session.
pub struct IdentityResolver<S> {
    store: Arc<S>,
    external_id: String,
    resolved: Option<ParticipantId>,
}

impl<S: ParticipantStore> IdentityResolver<S> {
    pub fn new(store: Arc<S>, external_id: impl Into<String>) -> Self {
        Self {
            store,
            external_id: external_id.into(),
            resolved: None,
        }
    }

    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn cached(&self) -> Option<&ParticipantId> {
        self.resolved.as_ref()
    }

    /// Looks the participant up, or answers from the cache. `NotFound` is not
    /// cached so a later call can pick up a freshly provisioned record.
    pub async fn resolve(&mut self) -> ChatResult<ParticipantId> {
        if let Some(id) = &self.resolved {
            return Ok(id.clone());
        }

        match self.store.find_participant(&self.external_id).await? {
            Some(participant) => {
                log::info!(
                    "Resolved identity {} to participant {}",
                    self.external_id,
                    participant.id
                );
                self.resolved = Some(participant.id.clone());
                Ok(participant.id)
            }
            None => Err(ChatError::NotFound {
                external_id: self.external_id.clone(),
            }),
        }
    }

    /// Retries `NotFound` according to `policy`, calling `on_pending` with the
    /// attempt number before each wait. Other errors are returned at once.
    pub async fn resolve_with_retry(
        &mut self,
        policy: RetryPolicy,
        mut on_pending: impl FnMut(u32),
    ) -> ChatResult<ParticipantId> {
        let attempts = policy.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.resolve().await {
                Err(ChatError::NotFound { .. }) if attempt < attempts => {
                    log::info!(
                        "Participant for {} not provisioned yet (attempt {attempt}/{attempts})",
                        self.external_id
                    );
                    on_pending(attempt);
                    tokio::time::sleep(policy.delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
