//! Per-account and per-group notification settings.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::dispatcher::{DeliveryOutcome, NotificationDispatcher};
use super::messages;
use crate::error::{ChoreError, Result};
use crate::store::{Account, AccountId, Group, GroupWebhook, Store};

/// What an account currently has configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotificationInfo {
    /// Actor owns their group and may configure its webhook.
    pub group_owner: bool,
    /// A chat identity is bound to the account.
    pub chat_connected: bool,
    /// The actor's group has a webhook.
    pub webhook_configured: bool,
    /// Handle mentioned in webhook posts for this account.
    pub webhook_handle: Option<String>,
}

/// Settings operations exposed to the web layer.
pub struct NotificationSettings {
    store: Arc<dyn Store>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl NotificationSettings {
    pub fn new(store: Arc<dyn Store>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    pub fn notification_info(&self, actor: &AccountId) -> Result<NotificationInfo> {
        let (account, group) = self.actor_group(actor)?;
        Ok(NotificationInfo {
            group_owner: group.owner_id == account.id,
            chat_connected: self.store.get_chat_binding(actor)?.is_some(),
            webhook_configured: self.store.get_group_webhook(&group.id)?.is_some(),
            webhook_handle: self.store.get_webhook_handle(actor)?,
        })
    }

    /// Set the group webhook. Only the group owner may do this.
    pub fn setup_group_webhook(&self, actor: &AccountId, url: &str) -> Result<()> {
        self.setup_group_webhook_at(actor, url, Utc::now())
    }

    pub fn setup_group_webhook_at(
        &self,
        actor: &AccountId,
        url: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let (account, group) = self.actor_group(actor)?;
        if group.owner_id != account.id {
            return Err(ChoreError::NotGroupOwner);
        }

        let parsed = url::Url::parse(url.trim())
            .map_err(|e| ChoreError::Validation(format!("invalid webhook URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ChoreError::Validation(format!(
                "webhook URL must be http(s), got {}",
                parsed.scheme()
            )));
        }

        self.store.upsert_group_webhook(&GroupWebhook {
            group_id: group.id.clone(),
            url: parsed.to_string(),
            created_at: now,
        })?;
        info!(group_id = %group.id, "group webhook configured");
        Ok(())
    }

    /// Register the handle mentioned for this account in webhook posts.
    pub fn set_webhook_handle(&self, actor: &AccountId, handle: &str) -> Result<()> {
        let handle = handle.trim();
        if handle.is_empty() {
            return Err(ChoreError::Validation(
                "webhook handle must not be empty".to_owned(),
            ));
        }
        if self.store.get_account(actor)?.is_none() {
            return Err(ChoreError::not_found("account", actor));
        }
        self.store.upsert_webhook_handle(actor, handle)?;
        info!(account_id = %actor, "webhook handle registered");
        Ok(())
    }

    /// Send a fixed test message through the actor's best channel.
    pub async fn send_test_notification(&self, actor: &AccountId) -> Result<DeliveryOutcome> {
        if self.store.get_account(actor)?.is_none() {
            return Err(ChoreError::not_found("account", actor));
        }
        Ok(self
            .dispatcher
            .notify_member(actor, messages::TEST_NOTIFICATION)
            .await)
    }

    fn actor_group(&self, actor: &AccountId) -> Result<(Account, Group)> {
        let account = self
            .store
            .get_account(actor)?
            .ok_or_else(|| ChoreError::not_found("account", actor))?;
        let group_id = account.group_id.clone().ok_or(ChoreError::NotInGroup)?;
        let group = self
            .store
            .get_group(&group_id)?
            .ok_or_else(|| ChoreError::not_found("group", &group_id))?;
        Ok((account, group))
    }
}
