//! Shared test fixtures: recording transports and a seeded household.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::channels::{
    ChannelError, ChatTransport, ChatUpdate, ConnectService, NotificationDispatcher,
    NotificationSettings, WebhookTransport,
};
use crate::chores::{Calendar, TaskLifecycle};
use crate::store::{
    Account, AccountId, AccountStore, ChannelBindingStore, ChatId, Group, GroupId, GroupWebhook,
    MemoryStore,
};

/// Monday 2024-03-04 09:00 UTC shifted by `hours`.
pub fn at(hours: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap() + chrono::Duration::hours(hours)
}

/// One scripted answer to [`ChatTransport::poll`].
#[derive(Debug, Clone)]
pub enum PollStep {
    Updates(Vec<ChatUpdate>),
    Fail,
}

#[derive(Default)]
struct ChatLog {
    sent: Vec<(ChatId, String)>,
    script: VecDeque<PollStep>,
    offsets: Vec<Option<i64>>,
}

/// Chat transport recording sends and replaying a poll script.
///
/// With an empty script `poll` idles for a few milliseconds and returns no
/// updates, like a long-poll that timed out.
#[derive(Default)]
pub struct RecordingChat {
    log: Mutex<ChatLog>,
    fail_all: bool,
    fail_for: Vec<ChatId>,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send fails.
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    /// Sends to `recipients` fail.
    pub fn failing_for(recipients: &[ChatId]) -> Self {
        Self {
            fail_for: recipients.to_vec(),
            ..Self::default()
        }
    }

    pub fn script(&self, steps: Vec<PollStep>) {
        self.log.lock().unwrap().script.extend(steps);
    }

    /// Successful sends in order.
    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.log.lock().unwrap().sent.clone()
    }

    /// Offsets passed to each poll call.
    pub fn poll_offsets(&self) -> Vec<Option<i64>> {
        self.log.lock().unwrap().offsets.clone()
    }
}

#[async_trait]
impl ChatTransport for RecordingChat {
    fn id(&self) -> &'static str {
        "recording"
    }

    async fn poll(
        &self,
        offset: Option<i64>,
        _timeout_secs: u64,
    ) -> Result<Vec<ChatUpdate>, ChannelError> {
        let step = {
            let mut log = self.log.lock().unwrap();
            log.offsets.push(offset);
            log.script.pop_front()
        };
        match step {
            Some(PollStep::Updates(updates)) => Ok(updates),
            Some(PollStep::Fail) => Err(ChannelError::Status {
                channel: "recording",
                status: 502,
            }),
            None => {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn send(&self, recipient: ChatId, text: &str) -> Result<(), ChannelError> {
        if self.fail_all || self.fail_for.contains(&recipient) {
            return Err(ChannelError::Status {
                channel: "recording",
                status: 500,
            });
        }
        self.log
            .lock()
            .unwrap()
            .sent
            .push((recipient, text.to_owned()));
        Ok(())
    }
}

/// Webhook transport recording `(url, handle, message)` posts.
#[derive(Default)]
pub struct RecordingWebhook {
    posts: Mutex<Vec<(String, String, String)>>,
}

impl RecordingWebhook {
    pub fn posts(&self) -> Vec<(String, String, String)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookTransport for RecordingWebhook {
    async fn post(&self, url: &str, handle: &str, message: &str) -> Result<(), ChannelError> {
        self.posts
            .lock()
            .unwrap()
            .push((url.to_owned(), handle.to_owned(), message.to_owned()));
        Ok(())
    }
}

/// A group `g` owned by account `a`, wired to recording transports.
///
/// Accounts are created on demand; their display name is the upper-cased
/// id and each one joins one second after the previous.
pub struct Household {
    pub store: Arc<MemoryStore>,
    pub chat: Arc<RecordingChat>,
    pub webhook: Arc<RecordingWebhook>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub lifecycle: Arc<TaskLifecycle>,
    pub connect: Arc<ConnectService>,
    pub settings: NotificationSettings,
    pub group: GroupId,
    clock: AtomicI64,
}

impl Household {
    pub fn new() -> Self {
        Self::with_chat(RecordingChat::new())
    }

    pub fn with_chat(chat: RecordingChat) -> Self {
        let store = Arc::new(MemoryStore::new());
        let chat = Arc::new(chat);
        let webhook = Arc::new(RecordingWebhook::default());
        let dispatcher = Arc::new(
            NotificationDispatcher::new(store.clone(), "https://chores.example")
                .with_chat(chat.clone())
                .with_webhook(webhook.clone()),
        );
        let lifecycle = Arc::new(TaskLifecycle::new(
            store.clone(),
            dispatcher.clone(),
            Calendar::default(),
        ));
        let connect = Arc::new(ConnectService::new(store.clone(), dispatcher.clone()));
        let settings = NotificationSettings::new(store.clone(), dispatcher.clone());

        let group = GroupId::from("g");
        store
            .insert_group(&Group {
                id: group.clone(),
                name: "Home".to_owned(),
                owner_id: AccountId::from("a"),
                created_at: at(-24),
            })
            .unwrap();

        Self {
            store,
            chat,
            webhook,
            dispatcher,
            lifecycle,
            connect,
            settings,
            group,
            clock: AtomicI64::new(0),
        }
    }

    fn next_join(&self) -> DateTime<Utc> {
        let tick = self.clock.fetch_add(1, Ordering::SeqCst);
        at(-12) + chrono::Duration::seconds(tick)
    }

    fn account(&self, id: &str) -> AccountId {
        let account_id = AccountId::from(id);
        self.store
            .insert_account(&Account {
                id: account_id.clone(),
                name: id.to_uppercase(),
                email: format!("{id}@chores.example"),
                group_id: None,
                created_at: at(-24),
            })
            .unwrap();
        account_id
    }

    /// Create account `id` and add it to the household group.
    pub fn member(&self, id: &str) -> AccountId {
        let account_id = self.account(id);
        self.move_member(&account_id, &self.group);
        account_id
    }

    /// Create an account that belongs to no group.
    pub fn add_loner(&self, id: &str) -> AccountId {
        self.account(id)
    }

    /// Create another group owned by a new account `owner`.
    pub fn add_second_group(&self, owner: &str) -> GroupId {
        let group_id = GroupId::from(format!("g-{owner}"));
        let owner_id = self.account(owner);
        self.store
            .insert_group(&Group {
                id: group_id.clone(),
                name: format!("{owner}'s place"),
                owner_id: owner_id.clone(),
                created_at: at(-6),
            })
            .unwrap();
        self.move_member(&owner_id, &group_id);
        group_id
    }

    pub fn move_member(&self, account: &AccountId, group: &GroupId) {
        self.store
            .add_group_member(group, account, self.next_join())
            .unwrap();
    }

    pub fn connect_chat(&self, id: &str, chat: i64) {
        self.store
            .upsert_chat_binding(&AccountId::from(id), ChatId(chat))
            .unwrap();
    }

    pub fn set_group_webhook(&self, url: &str) {
        self.store
            .upsert_group_webhook(&GroupWebhook {
                group_id: self.group.clone(),
                url: url.to_owned(),
                created_at: at(-1),
            })
            .unwrap();
    }

    pub fn set_handle(&self, id: &str, handle: &str) {
        self.store
            .upsert_webhook_handle(&AccountId::from(id), handle)
            .unwrap();
    }
}
