use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::channels::traits::{ChannelError, WebhookTransport};

/// Discord-style incoming-webhook client.
///
/// Posts `{"content": "Hej <@handle>!\n<message>"}` to the group's webhook URL.
#[derive(Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
}

impl WebhookClient {
    pub fn new(timeout: Duration) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

/// Body posted for one member notification.
#[must_use]
pub fn webhook_payload(handle: &str, message: &str) -> serde_json::Value {
    json!({
        "content": format!("Hej <@{handle}>!\n{message}"),
    })
}

#[async_trait]
impl WebhookTransport for WebhookClient {
    async fn post(&self, url: &str, handle: &str, message: &str) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(url)
            .json(&webhook_payload(handle, message))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() >= 300 {
            return Err(ChannelError::Status {
                channel: "webhook",
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
