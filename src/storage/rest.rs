use std::future::Future;

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::common::{
    ChatError, ChatResult, Message, NewMessage, NewParticipant, Participant, ParticipantId,
};

use super::store::{MessageStore, ParticipantStore};

const USERS_TABLE: &str = "users";
const MESSAGES_TABLE: &str = "messages";

/// Hosted store speaking the PostgREST query surface (`/rest/v1/<table>`).
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> ChatResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ChatError::Config("REST store URL is empty".to_string()));
        }
        Ok(Self {
            client: Client::builder().build()?,
            base_url,
            api_key: api_key.into(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn rows<T: DeserializeOwned>(request: RequestBuilder) -> ChatResult<Vec<T>> {
        let response = request.send().await?.error_for_status()?;
        Ok(response.json::<Vec<T>>().await?)
    }

    async fn insert_returning<T: DeserializeOwned>(
        &self,
        table: &str,
        body: &impl serde::Serialize,
    ) -> ChatResult<T> {
        let request = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(body);
        Self::rows::<T>(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::transport(format!("insert into {table} returned no row")))
    }
}

/// `or=` filter selecting both directions of a direct conversation.
pub(crate) fn conversation_filter(a: &ParticipantId, b: &ParticipantId) -> String {
    format!("(and(sender_id.eq.{a},receiver_id.eq.{b}),and(sender_id.eq.{b},receiver_id.eq.{a}))")
}

impl ParticipantStore for RestStore {
    fn find_participant(
        &self,
        external_id: &str,
    ) -> impl Future<Output = ChatResult<Option<Participant>>> + Send {
        let request = self.request(Method::GET, USERS_TABLE).query(&[
            ("select", "*".to_string()),
            ("external_id", format!("eq.{external_id}")),
            ("limit", "1".to_string()),
        ]);
        async move { Ok(Self::rows::<Participant>(request).await?.into_iter().next()) }
    }

    fn list_participants(
        &self,
        excluding: &ParticipantId,
    ) -> impl Future<Output = ChatResult<Vec<Participant>>> + Send {
        let request = self.request(Method::GET, USERS_TABLE).query(&[
            ("select", "*".to_string()),
            ("id", format!("neq.{excluding}")),
            ("order", "display_name.asc".to_string()),
        ]);
        Self::rows::<Participant>(request)
    }

    fn provision_participant(
        &self,
        new: NewParticipant,
    ) -> impl Future<Output = ChatResult<Participant>> + Send {
        async move {
            if let Some(existing) = self.find_participant(&new.external_id).await? {
                return Ok(existing);
            }
            self.insert_returning(USERS_TABLE, &new).await
        }
    }
}

impl MessageStore for RestStore {
    fn fetch_history(
        &self,
        a: &ParticipantId,
        b: &ParticipantId,
    ) -> impl Future<Output = ChatResult<Vec<Message>>> + Send {
        let request = self.request(Method::GET, MESSAGES_TABLE).query(&[
            ("select", "*".to_string()),
            ("or", conversation_filter(a, b)),
            ("order", "created_at.asc".to_string()),
        ]);
        Self::rows::<Message>(request)
    }

    fn insert(&self, message: NewMessage) -> impl Future<Output = ChatResult<Message>> + Send {
        async move {
            let content = crate::common::types::validate_content(&message.content)?;
            let request = NewMessage { content, ..message };
            self.insert_returning(MESSAGES_TABLE, &request).await
        }
    }
}
