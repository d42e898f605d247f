//! Persistence contracts the chore engine depends on.
//!
//! Sub-modules:
//! - `types`: identifiers and records shared by every backend.
//! - `memory`: mutex-guarded in-memory backend (tests, ephemeral runs).
//! - `schema` / `sqlite`: SQLite backend.
//!
//! The engine treats the store as the only shared mutable resource and
//! relies on nothing stronger than per-row atomicity from it.

pub mod memory;
pub(crate) mod schema;
pub mod sqlite;
pub mod types;

use chrono::{DateTime, Utc};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::{
    Account, AccountId, CONNECT_CODE_TTL_HOURS, ChatId, ConnectCode, Group, GroupId, GroupWebhook,
    IntervalUnit, Task, TaskId,
};

/// Errors from a persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("lock poisoned: {0}")]
    Lock(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Accounts, groups, and group membership.
pub trait AccountStore: Send + Sync {
    fn insert_account(&self, account: &Account) -> Result<(), StoreError>;

    fn get_account(&self, id: &AccountId) -> Result<Option<Account>, StoreError>;

    fn insert_group(&self, group: &Group) -> Result<(), StoreError>;

    fn get_group(&self, id: &GroupId) -> Result<Option<Group>, StoreError>;

    /// All groups, oldest first.
    fn list_groups(&self) -> Result<Vec<Group>, StoreError>;

    /// Add `account_id` to `group_id`, moving it out of any previous group.
    fn add_group_member(
        &self,
        group_id: &GroupId,
        account_id: &AccountId,
        joined_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Members in join order (ties broken by insertion order).
    ///
    /// Rotation depends on this order being stable.
    fn list_group_members(&self, group_id: &GroupId) -> Result<Vec<Account>, StoreError>;
}

/// Task persistence. Deleted tasks are invisible to every read.
pub trait TaskStore: Send + Sync {
    fn insert_task(&self, task: &Task) -> Result<(), StoreError>;

    /// Replace the mutable fields of an existing task. Returns `false` when
    /// no live task matched.
    fn update_task(&self, task: &Task) -> Result<bool, StoreError>;

    fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError>;

    /// Live tasks of a group in creation order.
    fn list_tasks_for_group(&self, group_id: &GroupId) -> Result<Vec<Task>, StoreError>;

    /// Store the outcome of a completion in one row update.
    fn record_completion(
        &self,
        id: &TaskId,
        completed_at: DateTime<Utc>,
        next_due: DateTime<Utc>,
        assignee: Option<&AccountId>,
    ) -> Result<bool, StoreError>;

    /// Logically delete a task.
    fn delete_task(&self, id: &TaskId, deleted_at: DateTime<Utc>) -> Result<bool, StoreError>;
}

/// Notification targets. All writes are upserts on the natural key.
pub trait ChannelBindingStore: Send + Sync {
    fn upsert_group_webhook(&self, webhook: &GroupWebhook) -> Result<(), StoreError>;

    fn get_group_webhook(&self, group_id: &GroupId) -> Result<Option<GroupWebhook>, StoreError>;

    /// Handle mentioned in webhook posts (e.g. a Discord user id).
    fn upsert_webhook_handle(&self, account_id: &AccountId, handle: &str)
    -> Result<(), StoreError>;

    fn get_webhook_handle(&self, account_id: &AccountId) -> Result<Option<String>, StoreError>;

    /// Bind a chat identity to an account. The identity is removed from any
    /// other account first.
    fn upsert_chat_binding(&self, account_id: &AccountId, chat_id: ChatId)
    -> Result<(), StoreError>;

    fn get_chat_binding(&self, account_id: &AccountId) -> Result<Option<ChatId>, StoreError>;
}

/// Connect-code persistence.
pub trait ConnectCodeStore: Send + Sync {
    /// Insert `code`, deleting every earlier code of `code.chat_id` and any
    /// code that is redeemed or expired as of `code.issued_at`.
    /// Returns the number of codes removed.
    fn replace_connect_codes(&self, code: &ConnectCode) -> Result<usize, StoreError>;

    fn get_connect_code(&self, code: &str) -> Result<Option<ConnectCode>, StoreError>;

    /// Mark an unredeemed code as redeemed by `account_id` and bind its chat
    /// identity to the account (as [`ChannelBindingStore::upsert_chat_binding`]),
    /// all in one atomic step. Returns `false`, changing nothing, when the
    /// code is missing or was already redeemed.
    fn bind_connect_code(&self, code: &str, account_id: &AccountId) -> Result<bool, StoreError>;
}

/// Umbrella trait for a backend implementing every contract.
pub trait Store: AccountStore + TaskStore + ChannelBindingStore + ConnectCodeStore {}

impl<T> Store for T where T: AccountStore + TaskStore + ChannelBindingStore + ConnectCodeStore {}
