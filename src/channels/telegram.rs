use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::channels::traits::{ChannelError, ChatMessage, ChatTransport, ChatUpdate};
use crate::config::TelegramConfig;
use crate::store::ChatId;

/// Telegram Bot API adapter (long-poll `getUpdates` + `sendMessage`).
#[derive(Clone)]
pub struct TelegramClient {
    /// `{api_base_url}/bot{token}`
    bot_url: String,
    client: reqwest::Client,
}

impl TelegramClient {
    /// Build a client against `api_base_url` (normally
    /// `https://api.telegram.org`). `request_timeout` must exceed the
    /// long-poll timeout or every idle poll fails.
    pub fn new(
        api_base_url: &str,
        bot_token: &str,
        request_timeout: Duration,
    ) -> Result<Self, ChannelError> {
        if bot_token.trim().is_empty() {
            return Err(ChannelError::NotConfigured("telegram bot token"));
        }
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            bot_url: format!("{}/bot{}", api_base_url.trim_end_matches('/'), bot_token),
            client,
        })
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self, ChannelError> {
        Self::new(
            &config.api_base_url,
            &config.bot_token,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    async fn decode<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, ChannelError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Status {
                channel: "telegram",
                status: status.as_u16(),
            });
        }
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| ChannelError::Decode(e.to_string()))?;
        if !body.ok {
            return Err(ChannelError::Api {
                channel: "telegram",
                description: body.description.unwrap_or_default(),
            });
        }
        body.result
            .ok_or_else(|| ChannelError::Decode("telegram response without result".to_owned()))
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    fn id(&self) -> &'static str {
        "telegram"
    }

    async fn poll(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<ChatUpdate>, ChannelError> {
        let mut query = vec![("timeout", timeout_secs.to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }
        let response = self
            .client
            .get(format!("{}/getUpdates", self.bot_url))
            .query(&query)
            .send()
            .await?;
        let updates: Vec<RawUpdate> = Self::decode(response).await?;
        Ok(updates.into_iter().map(RawUpdate::into_update).collect())
    }

    async fn send(&self, recipient: ChatId, text: &str) -> Result<(), ChannelError> {
        let body = json!({
            "chat_id": recipient.0,
            "text": text,
        });
        let response = self
            .client
            .post(format!("{}/sendMessage", self.bot_url))
            .json(&body)
            .send()
            .await?;
        let _: serde_json::Value = Self::decode(response).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    from: Option<RawUser>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: i64,
}

impl RawUpdate {
    fn into_update(self) -> ChatUpdate {
        let message = self.message.and_then(|m| {
            Some(ChatMessage {
                sender: ChatId(m.from?.id),
                text: m.text?,
            })
        });
        ChatUpdate {
            update_id: self.update_id,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn rejects_empty_token() {
        let err = TelegramClient::new("https://api.telegram.org", " ", Duration::from_secs(30))
            .err()
            .expect("empty token rejected");
        assert!(matches!(err, ChannelError::NotConfigured(_)));
    }

    #[test]
    fn builds_bot_url_without_double_slash() {
        let client =
            TelegramClient::new("http://localhost:9/", "123:abc", Duration::from_secs(30)).unwrap();
        assert_eq!(client.bot_url, "http://localhost:9/bot123:abc");
    }

    #[test]
    fn update_without_text_has_no_message() {
        let raw: Vec<RawUpdate> = serde_json::from_str(
            r#"[
                {"update_id": 5, "message": {"from": {"id": 9}, "text": "/start"}},
                {"update_id": 6, "message": {"from": {"id": 9}, "sticker": {}}},
                {"update_id": 7, "edited_message": {"text": "x"}}
            ]"#,
        )
        .unwrap();
        let updates: Vec<ChatUpdate> = raw.into_iter().map(RawUpdate::into_update).collect();
        assert_eq!(
            updates[0].message,
            Some(ChatMessage {
                sender: ChatId(9),
                text: "/start".to_owned()
            })
        );
        assert!(updates[1].message.is_none());
        assert!(updates[2].message.is_none());
        assert_eq!(updates[2].update_id, 7);
    }
}
