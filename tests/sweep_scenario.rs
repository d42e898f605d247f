//! End-to-end chore scenarios against a mocked Telegram Bot API.
//!
//! A household of three members is seeded in a [`MemoryStore`]; tasks are
//! driven through [`TaskLifecycle`] and the daily sweep, and every outgoing
//! message is observed as a `sendMessage` request on the mock server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use chorewheel::channels::{NotificationDispatcher, TelegramClient};
use chorewheel::chores::{Calendar, TaskLifecycle, TaskSpec};
use chorewheel::scheduler::{DailySweepScheduler, TriggerTime};
use chorewheel::store::{
    Account, AccountId, AccountStore, ChannelBindingStore, ChatId, Group, GroupId, MemoryStore,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "42:sweep";
const PUBLIC_URL: &str = "https://chores.example";

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

struct Scenario {
    server: MockServer,
    store: Arc<MemoryStore>,
    lifecycle: Arc<TaskLifecycle>,
    scheduler: DailySweepScheduler,
    group: GroupId,
}

impl Scenario {
    /// Members `ann`, `bob`, `cid` joined in that order; chat ids 1, 2, 3.
    async fn start() -> Self {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/sendMessage")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"message_id": 1}
            })))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let group = GroupId::from("home");
        store
            .insert_group(&Group {
                id: group.clone(),
                name: "Home".to_owned(),
                owner_id: AccountId::from("ann"),
                created_at: at(1, 0),
            })
            .unwrap();
        for (i, name) in ["ann", "bob", "cid"].into_iter().enumerate() {
            let id = AccountId::from(name);
            store
                .insert_account(&Account {
                    id: id.clone(),
                    name: name.to_owned(),
                    email: format!("{name}@chores.example"),
                    group_id: None,
                    created_at: at(1, 0),
                })
                .unwrap();
            store
                .add_group_member(&group, &id, at(1, 1 + i as u32))
                .unwrap();
            store
                .upsert_chat_binding(&id, ChatId(1 + i as i64))
                .unwrap();
        }

        let telegram =
            TelegramClient::new(&server.uri(), TOKEN, Duration::from_secs(5)).unwrap();
        let dispatcher = Arc::new(
            NotificationDispatcher::new(store.clone(), PUBLIC_URL).with_chat(Arc::new(telegram)),
        );
        let lifecycle = Arc::new(TaskLifecycle::new(
            store.clone(),
            dispatcher.clone(),
            Calendar::default(),
        ));
        let scheduler = DailySweepScheduler::new(
            store.clone(),
            lifecycle.clone(),
            dispatcher,
            TriggerTime::new(12, 0).unwrap(),
        );

        Self {
            server,
            store,
            lifecycle,
            scheduler,
            group,
        }
    }

    /// `(chat_id, text)` of every `sendMessage` so far.
    async fn sent(&self) -> Vec<(i64, String)> {
        self.server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.url.path().ends_with("/sendMessage"))
            .map(|r| {
                let body: Value = serde_json::from_slice(&r.body).unwrap();
                (
                    body["chat_id"].as_i64().unwrap(),
                    body["text"].as_str().unwrap().to_owned(),
                )
            })
            .collect()
    }
}

#[tokio::test]
async fn rotation_cycles_through_members_in_join_order() {
    let s = Scenario::start().await;
    let ann = AccountId::from("ann");
    let bob = AccountId::from("bob");
    let cid = AccountId::from("cid");

    let task = s
        .lifecycle
        .create_at(
            &ann,
            &TaskSpec::new("Vacuum", "week", 1)
                .rotating()
                .assigned_to(ann.clone()),
            at(4, 8),
        )
        .unwrap()
        .task;

    let mut holders = Vec::new();
    for (who, day) in [(&ann, 4), (&bob, 11), (&cid, 18)] {
        let view = s
            .lifecycle
            .complete_at(who, &task.id, at(day, 9))
            .await
            .unwrap();
        holders.push(view.task.assignee.unwrap());
        assert_eq!(view.days_left, 7);
    }
    assert_eq!(holders, vec![bob, cid, ann]);

    // Each completion is broadcast to all three members.
    let sent = s.sent().await;
    assert_eq!(sent.len(), 9);
    assert!(sent[0].1.contains("ann just completed 'Vacuum'"));
    assert!(sent[8].1.contains("cid just completed 'Vacuum'"));
}

#[tokio::test]
async fn sweep_sends_shared_and_assigned_digests() {
    let s = Scenario::start().await;
    let ann = AccountId::from("ann");
    let bob = AccountId::from("bob");

    let lc = &s.lifecycle;
    lc.create_at(&ann, &TaskSpec::new("Trash", "day", 1), at(3, 8))
        .unwrap();
    lc.create_at(&ann, &TaskSpec::new("Plants", "week", 1), at(3, 8))
        .unwrap();
    lc.create_at(
        &ann,
        &TaskSpec::new("Dishes", "day", 1).assigned_to(bob.clone()),
        at(3, 8),
    )
    .unwrap();
    lc.create_at(
        &ann,
        &TaskSpec::new("Laundry", "day", 2).assigned_to(bob),
        at(3, 8),
    )
    .unwrap();

    let report = s.scheduler.sweep_at(at(4, 12)).await;
    assert_eq!(report.groups, 1);
    assert_eq!(report.broadcasts, 1);
    assert_eq!(report.direct_digests, 1);
    assert_eq!(report.failed_groups, 0);

    let sent = s.sent().await;
    // Shared digest to all three, assigned digest to bob only.
    assert_eq!(sent.len(), 4);
    let shared: Vec<&(i64, String)> = sent
        .iter()
        .filter(|(_, text)| text.starts_with("Shared tasks due today:"))
        .collect();
    assert_eq!(shared.len(), 3);
    assert!(shared[0].1.contains("• Trash"));
    assert!(!shared[0].1.contains("Plants"));
    assert!(shared[0].1.ends_with(PUBLIC_URL));

    let assigned: Vec<&(i64, String)> = sent
        .iter()
        .filter(|(_, text)| text.starts_with("You have the following assigned tasks"))
        .collect();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].0, 2);
    assert!(assigned[0].1.contains("• Dishes"));
    assert!(!assigned[0].1.contains("Laundry"));
}

#[tokio::test]
async fn failed_delivery_does_not_skip_other_members() {
    let s = Scenario::start().await;
    s.server.reset().await;
    // Chat 2 has blocked the bot; everyone else is reachable.
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .and(wiremock::matchers::body_partial_json(json!({"chat_id": 2})))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "ok": false,
            "description": "Forbidden: bot was blocked by the user"
        })))
        .mount(&s.server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{TOKEN}/sendMessage")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"message_id": 1}
        })))
        .mount(&s.server)
        .await;

    let ann = AccountId::from("ann");
    s.lifecycle
        .create_at(&ann, &TaskSpec::new("Trash", "onetime", 1), at(4, 8))
        .unwrap();
    let report = s.scheduler.sweep_at(at(4, 12)).await;
    assert_eq!(report.delivery.delivered, 2);
    assert_eq!(report.delivery.failed, 1);

    let recipients: Vec<i64> = s.sent().await.into_iter().map(|(chat, _)| chat).collect();
    assert_eq!(recipients, vec![1, 2, 3]);
}

#[tokio::test]
async fn nothing_due_sends_nothing() {
    let s = Scenario::start().await;
    let ann = AccountId::from("ann");
    s.lifecycle
        .create_at(&ann, &TaskSpec::new("Windows", "month", 1), at(4, 8))
        .unwrap();
    let report = s.scheduler.sweep_at(at(4, 12)).await;
    assert_eq!(report.broadcasts + report.direct_digests, 0);
    assert!(s.sent().await.is_empty());
    assert_eq!(s.store.list_groups().unwrap()[0].id, s.group);
}
