use thiserror::Error;

pub type ChatResult<T> = Result<T, ChatError>;

/// Failures surfaced by identity lookup, the message store and the push channel.
#[derive(Debug, Error)]
pub enum ChatError {
    /// No participant exists yet for the external identity. Transient: the
    /// provisioning hook may not have run yet.
    #[error("participant not provisioned for identity {external_id}")]
    NotFound { external_id: String },

    #[error("invalid message: {0}")]
    Validation(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ChatError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Whether retrying the same operation later can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Transport(_))
    }
}

impl From<rusqlite::Error> for ChatError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Transport(format!("database: {err}"))
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(format!("http: {err}"))
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Transport(format!("payload: {err}"))
    }
}

impl From<tokio::task::JoinError> for ChatError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Transport(format!("background task failed: {err}"))
    }
}
