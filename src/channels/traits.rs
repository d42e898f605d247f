use async_trait::async_trait;

use crate::store::ChatId;

/// Failure talking to an external channel.
///
/// Never crosses the core boundary: the dispatcher and the ingest loop log
/// these and carry on.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{channel} answered with HTTP status {status}")]
    Status { channel: &'static str, status: u16 },

    #[error("{channel} API error: {description}")]
    Api {
        channel: &'static str,
        description: String,
    },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// One inbound update from a chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUpdate {
    /// Monotonic id assigned by the remote API.
    pub update_id: i64,
    /// `None` for updates that carry no text message (edits, callbacks, ...).
    pub message: Option<ChatMessage>,
}

/// Text message received from a chat identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: ChatId,
    pub text: String,
}

/// Direct-message transport (long-poll in, send out).
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Stable transport identifier (e.g. `telegram`).
    fn id(&self) -> &'static str;

    /// Fetch updates with id >= `offset`, waiting up to `timeout_secs` for
    /// new ones to arrive.
    async fn poll(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<ChatUpdate>, ChannelError>;

    /// Send a text message to a chat identity.
    async fn send(&self, recipient: ChatId, text: &str) -> Result<(), ChannelError>;
}

/// Group webhook transport.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Post `message` to `url`, mentioning `handle`.
    async fn post(&self, url: &str, handle: &str, message: &str) -> Result<(), ChannelError>;
}
