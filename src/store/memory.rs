//! In-memory store backend.
//!
//! Used by tests and by `store.backend = "memory"`. Everything lives behind
//! one `Mutex`, so each call is atomic on its own.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::types::{
    Account, AccountId, ChatId, ConnectCode, Group, GroupId, GroupWebhook, Task, TaskId,
};
use super::{AccountStore, ChannelBindingStore, ConnectCodeStore, StoreError, TaskStore};

#[derive(Default)]
struct Inner {
    accounts: HashMap<AccountId, Account>,
    groups: Vec<Group>,
    /// (group, account, joined_at, sequence)
    memberships: Vec<(GroupId, AccountId, DateTime<Utc>, u64)>,
    tasks: Vec<Task>,
    webhooks: HashMap<GroupId, GroupWebhook>,
    webhook_handles: HashMap<AccountId, String>,
    chat_bindings: HashMap<AccountId, ChatId>,
    connect_codes: Vec<ConnectCode>,
    sequence: u64,
}

impl Inner {
    /// Account with its group taken from the membership list.
    fn account(&self, id: &AccountId) -> Option<Account> {
        let mut account = self.accounts.get(id)?.clone();
        account.group_id = self
            .memberships
            .iter()
            .find(|(_, member, _, _)| member == id)
            .map(|(group_id, _, _, _)| group_id.clone());
        Some(account)
    }

    fn bind_chat(&mut self, account_id: &AccountId, chat_id: ChatId) {
        self.chat_bindings.retain(|_, bound| *bound != chat_id);
        self.chat_bindings.insert(account_id.clone(), chat_id);
    }
}

/// Mutex-guarded in-memory implementation of every store contract.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }
}

impl AccountStore for MemoryStore {
    fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    fn get_account(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.lock()?.account(id))
    }

    fn insert_group(&self, group: &Group) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.groups.retain(|g| g.id != group.id);
        inner.groups.push(group.clone());
        Ok(())
    }

    fn get_group(&self, id: &GroupId) -> Result<Option<Group>, StoreError> {
        Ok(self.lock()?.groups.iter().find(|g| &g.id == id).cloned())
    }

    fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        let mut groups = self.lock()?.groups.clone();
        groups.sort_by_key(|g| g.created_at);
        Ok(groups)
    }

    fn add_group_member(
        &self,
        group_id: &GroupId,
        account_id: &AccountId,
        joined_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.sequence += 1;
        let seq = inner.sequence;
        inner.memberships.retain(|(_, a, _, _)| a != account_id);
        inner
            .memberships
            .push((group_id.clone(), account_id.clone(), joined_at, seq));
        Ok(())
    }

    fn list_group_members(&self, group_id: &GroupId) -> Result<Vec<Account>, StoreError> {
        let inner = self.lock()?;
        let mut rows: Vec<_> = inner
            .memberships
            .iter()
            .filter(|(g, _, _, _)| g == group_id)
            .collect();
        rows.sort_by_key(|(_, _, joined_at, seq)| (*joined_at, *seq));
        Ok(rows
            .into_iter()
            .filter_map(|(_, account_id, _, _)| inner.account(account_id))
            .collect())
    }
}

impl TaskStore for MemoryStore {
    fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.tasks.push(task.clone());
        Ok(())
    }

    fn update_task(&self, task: &Task) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let Some(existing) = inner
            .tasks
            .iter_mut()
            .find(|t| t.id == task.id && t.deleted_at.is_none())
        else {
            return Ok(false);
        };
        existing.title = task.title.clone();
        existing.description = task.description.clone();
        existing.group_id = task.group_id.clone();
        existing.assignee = task.assignee.clone();
        existing.rotating_assignee = task.rotating_assignee;
        existing.interval_unit = task.interval_unit.clone();
        existing.interval_size = task.interval_size;
        existing.next_due = task.next_due;
        existing.updated_at = task.updated_at;
        Ok(true)
    }

    fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self
            .lock()?
            .tasks
            .iter()
            .find(|t| &t.id == id && t.deleted_at.is_none())
            .cloned())
    }

    fn list_tasks_for_group(&self, group_id: &GroupId) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .lock()?
            .tasks
            .iter()
            .filter(|t| &t.group_id == group_id && t.deleted_at.is_none())
            .cloned()
            .collect())
    }

    fn record_completion(
        &self,
        id: &TaskId,
        completed_at: DateTime<Utc>,
        next_due: DateTime<Utc>,
        assignee: Option<&AccountId>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let Some(task) = inner
            .tasks
            .iter_mut()
            .find(|t| &t.id == id && t.deleted_at.is_none())
        else {
            return Ok(false);
        };
        task.completed_at = Some(completed_at);
        task.updated_at = completed_at;
        task.next_due = next_due;
        task.assignee = assignee.cloned();
        Ok(true)
    }

    fn delete_task(&self, id: &TaskId, deleted_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let Some(task) = inner
            .tasks
            .iter_mut()
            .find(|t| &t.id == id && t.deleted_at.is_none())
        else {
            return Ok(false);
        };
        task.deleted_at = Some(deleted_at);
        Ok(true)
    }
}

impl ChannelBindingStore for MemoryStore {
    fn upsert_group_webhook(&self, webhook: &GroupWebhook) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner
            .webhooks
            .insert(webhook.group_id.clone(), webhook.clone());
        Ok(())
    }

    fn get_group_webhook(&self, group_id: &GroupId) -> Result<Option<GroupWebhook>, StoreError> {
        Ok(self.lock()?.webhooks.get(group_id).cloned())
    }

    fn upsert_webhook_handle(
        &self,
        account_id: &AccountId,
        handle: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner
            .webhook_handles
            .insert(account_id.clone(), handle.to_owned());
        Ok(())
    }

    fn get_webhook_handle(&self, account_id: &AccountId) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.webhook_handles.get(account_id).cloned())
    }

    fn upsert_chat_binding(
        &self,
        account_id: &AccountId,
        chat_id: ChatId,
    ) -> Result<(), StoreError> {
        self.lock()?.bind_chat(account_id, chat_id);
        Ok(())
    }

    fn get_chat_binding(&self, account_id: &AccountId) -> Result<Option<ChatId>, StoreError> {
        Ok(self.lock()?.chat_bindings.get(account_id).copied())
    }
}

impl ConnectCodeStore for MemoryStore {
    fn replace_connect_codes(&self, code: &ConnectCode) -> Result<usize, StoreError> {
        let mut inner = self.lock()?;
        let before = inner.connect_codes.len();
        inner.connect_codes.retain(|c| {
            c.chat_id != code.chat_id && c.account_id.is_none() && !c.is_expired_at(code.issued_at)
        });
        let removed = before - inner.connect_codes.len();
        inner.connect_codes.push(code.clone());
        Ok(removed)
    }

    fn get_connect_code(&self, code: &str) -> Result<Option<ConnectCode>, StoreError> {
        Ok(self
            .lock()?
            .connect_codes
            .iter()
            .find(|c| c.code == code)
            .cloned())
    }

    fn bind_connect_code(&self, code: &str, account_id: &AccountId) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let Some(entry) = inner
            .connect_codes
            .iter_mut()
            .find(|c| c.code == code && c.account_id.is_none())
        else {
            return Ok(false);
        };
        entry.account_id = Some(account_id.clone());
        let chat_id = entry.chat_id;
        inner.bind_chat(account_id, chat_id);
        Ok(true)
    }
}
