//! Connect codes: pairing a chat identity with an account.
//!
//! A code is issued to a chat identity on `/connect` and redeemed by an
//! authenticated account through the deep link. Codes are single-use and
//! expire 24 hours after issue.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::dispatcher::{DeliveryOutcome, NotificationDispatcher};
use super::messages;
use crate::error::{ChoreError, Result};
use crate::store::{AccountId, ChatId, ConnectCode, Store};

/// Issues and redeems connect codes.
pub struct ConnectService {
    store: Arc<dyn Store>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl ConnectService {
    pub fn new(store: Arc<dyn Store>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Issue a fresh code for `chat_id`, deleting any earlier ones.
    pub fn issue(&self, chat_id: ChatId) -> Result<ConnectCode> {
        self.issue_at(chat_id, Utc::now())
    }

    pub fn issue_at(&self, chat_id: ChatId, now: DateTime<Utc>) -> Result<ConnectCode> {
        let code = ConnectCode {
            code: uuid::Uuid::new_v4().to_string(),
            chat_id,
            issued_at: now,
            account_id: None,
        };
        let purged = self.store.replace_connect_codes(&code)?;
        info!(chat_id = %chat_id, purged, "connect code issued");
        Ok(code)
    }

    /// Bind the code's chat identity to `account_id`.
    ///
    /// Fails with [`ChoreError::ExpiredOrInvalidToken`] when the code is
    /// unknown, already redeemed, or older than 24 hours. Any previous chat
    /// binding of the account is replaced. Returns the bound chat identity.
    pub async fn redeem_connect_code(&self, account_id: &AccountId, code: &str) -> Result<ChatId> {
        self.redeem_connect_code_at(account_id, code, Utc::now())
            .await
    }

    pub async fn redeem_connect_code_at(
        &self,
        account_id: &AccountId,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<ChatId> {
        if self.store.get_account(account_id)?.is_none() {
            return Err(ChoreError::not_found("account", account_id));
        }

        let stored = self
            .store
            .get_connect_code(code)?
            .ok_or(ChoreError::ExpiredOrInvalidToken)?;
        if stored.account_id.is_some() || stored.is_expired_at(now) {
            return Err(ChoreError::ExpiredOrInvalidToken);
        }
        // Redeeming and binding happen together; the conditional bind is
        // also the single-use guard.
        if !self.store.bind_connect_code(code, account_id)? {
            return Err(ChoreError::ExpiredOrInvalidToken);
        }
        info!(
            account_id = %account_id,
            chat_id = %stored.chat_id,
            "chat identity connected"
        );

        if self
            .dispatcher
            .send_direct(stored.chat_id, messages::CONNECTED)
            .await
            == DeliveryOutcome::Failed
        {
            warn!(chat_id = %stored.chat_id, "connect confirmation was not delivered");
        }
        Ok(stored.chat_id)
    }
}
