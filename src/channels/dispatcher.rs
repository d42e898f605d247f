//! Fan-out of notifications to group members.
//!
//! Each member is reached through the best channel available to them:
//! a bound chat identity first, then the group webhook (when the group has
//! one and the member registered a handle). Members with neither are
//! skipped silently.
//!
//! Delivery is fire-and-forget. Failures are logged and counted, never
//! returned, and never stop delivery to the remaining members.

use std::sync::Arc;

use tracing::{debug, warn};

use super::messages;
use super::traits::{ChatTransport, WebhookTransport};
use crate::store::{AccountId, ChatId, GroupId, Store, StoreError};

/// Channel a notification went out on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryChannel {
    Chat,
    Webhook,
}

/// Result of notifying a single member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered(DeliveryChannel),
    /// Member has no notification channel; not an error.
    NoChannel,
    Failed,
}

/// Tally of outcomes across several members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn record(&mut self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered(_) => self.delivered += 1,
            DeliveryOutcome::NoChannel => self.skipped += 1,
            DeliveryOutcome::Failed => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: DeliveryReport) {
        self.delivered += other.delivered;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Sends messages to members over chat and webhook transports.
pub struct NotificationDispatcher {
    store: Arc<dyn Store>,
    chat: Option<Arc<dyn ChatTransport>>,
    webhook: Option<Arc<dyn WebhookTransport>>,
    public_url: String,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn Store>, public_url: impl Into<String>) -> Self {
        Self {
            store,
            chat: None,
            webhook: None,
            public_url: public_url.into(),
        }
    }

    #[must_use]
    pub fn with_chat(mut self, chat: Arc<dyn ChatTransport>) -> Self {
        self.chat = Some(chat);
        self
    }

    #[must_use]
    pub fn with_webhook(mut self, webhook: Arc<dyn WebhookTransport>) -> Self {
        self.webhook = Some(webhook);
        self
    }

    /// Base URL appended to digests.
    #[must_use]
    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    /// Deliver `message` to one member over their best channel.
    pub async fn notify_member(&self, account_id: &AccountId, message: &str) -> DeliveryOutcome {
        match self.store.get_chat_binding(account_id) {
            Ok(Some(chat_id)) if self.chat.is_some() => {
                return self.send_direct(chat_id, message).await;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(account_id = %account_id, error = %e, "chat binding lookup failed");
                return DeliveryOutcome::Failed;
            }
        }

        let target = match self.webhook_target(account_id) {
            Ok(Some(target)) => target,
            Ok(None) => {
                debug!(account_id = %account_id, "no notification channel bound, skipping");
                return DeliveryOutcome::NoChannel;
            }
            Err(e) => {
                warn!(account_id = %account_id, error = %e, "webhook lookup failed");
                return DeliveryOutcome::Failed;
            }
        };
        let Some(webhook) = &self.webhook else {
            return DeliveryOutcome::NoChannel;
        };

        let (url, handle) = target;
        match webhook.post(&url, &handle, message).await {
            Ok(()) => DeliveryOutcome::Delivered(DeliveryChannel::Webhook),
            Err(e) => {
                warn!(account_id = %account_id, error = %e, "webhook delivery failed");
                DeliveryOutcome::Failed
            }
        }
    }

    /// Send `message` straight to a chat identity.
    pub async fn send_direct(&self, chat_id: ChatId, message: &str) -> DeliveryOutcome {
        let Some(chat) = &self.chat else {
            debug!(chat_id = %chat_id, "no chat transport configured, skipping");
            return DeliveryOutcome::NoChannel;
        };
        match chat.send(chat_id, message).await {
            Ok(()) => DeliveryOutcome::Delivered(DeliveryChannel::Chat),
            Err(e) => {
                warn!(
                    chat_id = %chat_id,
                    channel = chat.id(),
                    error = %e,
                    "chat delivery failed"
                );
                DeliveryOutcome::Failed
            }
        }
    }

    /// Deliver `message` to every member of a group, one at a time.
    pub async fn notify_group(&self, group_id: &GroupId, message: &str) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let members = match self.store.list_group_members(group_id) {
            Ok(members) => members,
            Err(e) => {
                warn!(group_id = %group_id, error = %e, "cannot list group members");
                return report;
            }
        };
        for member in members {
            report.record(self.notify_member(&member.id, message).await);
        }
        report
    }

    /// Send the shared-tasks digest to the whole group. No-op for an empty
    /// list.
    pub async fn notify_group_broadcast(
        &self,
        group_id: &GroupId,
        titles: &[String],
    ) -> DeliveryReport {
        if titles.is_empty() {
            return DeliveryReport::default();
        }
        let message = messages::shared_digest(titles, &self.public_url);
        self.notify_group(group_id, &message).await
    }

    /// Send each assignee a digest of their own due tasks.
    pub async fn notify_per_member_digest(
        &self,
        digests: &[(AccountId, Vec<String>)],
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for (account_id, titles) in digests {
            if titles.is_empty() {
                continue;
            }
            let message = messages::assigned_digest(titles, &self.public_url);
            report.record(self.notify_member(account_id, &message).await);
        }
        report
    }

    fn webhook_target(&self, account_id: &AccountId) -> Result<Option<(String, String)>, StoreError> {
        let Some(group_id) = self
            .store
            .get_account(account_id)?
            .and_then(|account| account.group_id)
        else {
            return Ok(None);
        };
        let Some(webhook) = self.store.get_group_webhook(&group_id)? else {
            return Ok(None);
        };
        let Some(handle) = self.store.get_webhook_handle(account_id)? else {
            return Ok(None);
        };
        Ok(Some((webhook.url, handle)))
    }
}
