//! SQLite-backed store.
//!
//! Implements every store contract over a single database file. Thread-safe
//! via an internal `Mutex<Connection>`; all statements are serialized.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::schema::{apply_schema, read_schema_version};
use super::types::{
    Account, AccountId, CONNECT_CODE_TTL_HOURS, ChatId, ConnectCode, Group, GroupId, GroupWebhook,
    IntervalUnit, Task, TaskId, from_millis, to_millis,
};
use super::{AccountStore, ChannelBindingStore, ConnectCodeStore, StoreError, TaskStore};

/// An account's group comes from its `group_members` row only.
const ACCOUNT_COLUMNS: &str = "a.id, a.name, a.email, m.group_id, a.created_at";
const ACCOUNT_FROM: &str =
    "FROM accounts a LEFT JOIN group_members m ON m.account_id = a.id";

const TASK_COLUMNS: &str = "id, group_id, title, description, assignee, rotating_assignee, \
     interval_unit, interval_size, next_due, created_at, updated_at, completed_at, deleted_at";

/// SQLite implementation of [`Store`](super::Store).
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories
    /// and applying the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Idempotent schema application.
    pub fn ensure_layout(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        apply_schema(&conn)?;
        Ok(())
    }

    /// Read the current schema version from the database.
    pub fn schema_version(&self) -> Result<Option<u32>, StoreError> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }
}

impl AccountStore for SqliteStore {
    fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO accounts (id, name, email, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email",
            params![
                account.id.as_str(),
                account.name,
                account.email,
                to_millis(account.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_account(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} {ACCOUNT_FROM} WHERE a.id = ?1"),
                params![id.as_str()],
                row_to_account,
            )
            .optional()?)
    }

    fn insert_group(&self, group: &Group) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO groups (id, name, owner_id, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                owner_id = excluded.owner_id",
            params![
                group.id.as_str(),
                group.name,
                group.owner_id.as_str(),
                to_millis(group.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_group(&self, id: &GroupId) -> Result<Option<Group>, StoreError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT id, name, owner_id, created_at FROM groups WHERE id = ?1",
                params![id.as_str()],
                row_to_group,
            )
            .optional()?)
    }

    fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, owner_id, created_at FROM groups ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map([], row_to_group)?;
        let mut groups = Vec::new();
        for r in rows {
            groups.push(r?);
        }
        Ok(groups)
    }

    fn add_group_member(
        &self,
        group_id: &GroupId,
        account_id: &AccountId,
        joined_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO group_members (account_id, group_id, joined_at, seq)
             VALUES (?1, ?2, ?3, (SELECT COALESCE(MAX(seq), 0) + 1 FROM group_members))
             ON CONFLICT(account_id) DO UPDATE SET
                group_id = excluded.group_id,
                joined_at = excluded.joined_at,
                seq = excluded.seq",
            params![account_id.as_str(), group_id.as_str(), to_millis(joined_at)],
        )?;
        Ok(())
    }

    fn list_group_members(&self, group_id: &GroupId) -> Result<Vec<Account>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} {ACCOUNT_FROM}
             WHERE m.group_id = ?1
             ORDER BY m.joined_at, m.seq"
        ))?;
        let rows = stmt.query_map(params![group_id.as_str()], row_to_account)?;
        let mut members = Vec::new();
        for r in rows {
            members.push(r?);
        }
        Ok(members)
    }
}

impl TaskStore for SqliteStore {
    fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO tasks ({TASK_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ),
            params![
                task.id.as_str(),
                task.group_id.as_str(),
                task.title,
                task.description,
                task.assignee.as_ref().map(AccountId::as_str),
                task.rotating_assignee,
                task.interval_unit.as_str(),
                task.interval_size,
                to_millis(task.next_due),
                to_millis(task.created_at),
                to_millis(task.updated_at),
                task.completed_at.map(to_millis),
                task.deleted_at.map(to_millis),
            ],
        )?;
        Ok(())
    }

    fn update_task(&self, task: &Task) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE tasks SET
                group_id = ?2,
                title = ?3,
                description = ?4,
                assignee = ?5,
                rotating_assignee = ?6,
                interval_unit = ?7,
                interval_size = ?8,
                next_due = ?9,
                updated_at = ?10
             WHERE id = ?1 AND deleted_at IS NULL",
            params![
                task.id.as_str(),
                task.group_id.as_str(),
                task.title,
                task.description,
                task.assignee.as_ref().map(AccountId::as_str),
                task.rotating_assignee,
                task.interval_unit.as_str(),
                task.interval_size,
                to_millis(task.next_due),
                to_millis(task.updated_at),
            ],
        )?;
        Ok(changed > 0)
    }

    fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND deleted_at IS NULL"),
                params![id.as_str()],
                row_to_task,
            )
            .optional()?)
    }

    fn list_tasks_for_group(&self, group_id: &GroupId) -> Result<Vec<Task>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE group_id = ?1 AND deleted_at IS NULL
             ORDER BY created_at, rowid"
        ))?;
        let rows = stmt.query_map(params![group_id.as_str()], row_to_task)?;
        let mut tasks = Vec::new();
        for r in rows {
            tasks.push(r?);
        }
        Ok(tasks)
    }

    fn record_completion(
        &self,
        id: &TaskId,
        completed_at: DateTime<Utc>,
        next_due: DateTime<Utc>,
        assignee: Option<&AccountId>,
    ) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE tasks SET
                completed_at = ?2,
                updated_at = ?2,
                next_due = ?3,
                assignee = ?4
             WHERE id = ?1 AND deleted_at IS NULL",
            params![
                id.as_str(),
                to_millis(completed_at),
                to_millis(next_due),
                assignee.map(AccountId::as_str),
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_task(&self, id: &TaskId, deleted_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE tasks SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
            params![id.as_str(), to_millis(deleted_at)],
        )?;
        Ok(changed > 0)
    }
}

impl ChannelBindingStore for SqliteStore {
    fn upsert_group_webhook(&self, webhook: &GroupWebhook) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO group_webhooks (group_id, url, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(group_id) DO UPDATE SET url = excluded.url",
            params![
                webhook.group_id.as_str(),
                webhook.url,
                to_millis(webhook.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_group_webhook(&self, group_id: &GroupId) -> Result<Option<GroupWebhook>, StoreError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT group_id, url, created_at FROM group_webhooks WHERE group_id = ?1",
                params![group_id.as_str()],
                |row| {
                    Ok(GroupWebhook {
                        group_id: GroupId(row.get(0)?),
                        url: row.get(1)?,
                        created_at: millis_column(row, 2)?,
                    })
                },
            )
            .optional()?)
    }

    fn upsert_webhook_handle(
        &self,
        account_id: &AccountId,
        handle: &str,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO webhook_handles (account_id, handle)
             VALUES (?1, ?2)
             ON CONFLICT(account_id) DO UPDATE SET handle = excluded.handle",
            params![account_id.as_str(), handle],
        )?;
        Ok(())
    }

    fn get_webhook_handle(&self, account_id: &AccountId) -> Result<Option<String>, StoreError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT handle FROM webhook_handles WHERE account_id = ?1",
                params![account_id.as_str()],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn upsert_chat_binding(
        &self,
        account_id: &AccountId,
        chat_id: ChatId,
    ) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        bind_chat(&tx, account_id, chat_id)?;
        tx.commit()?;
        Ok(())
    }

    fn get_chat_binding(&self, account_id: &AccountId) -> Result<Option<ChatId>, StoreError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT chat_id FROM chat_bindings WHERE account_id = ?1",
                params![account_id.as_str()],
                |row| row.get::<_, i64>(0).map(ChatId),
            )
            .optional()?)
    }
}

impl ConnectCodeStore for SqliteStore {
    fn replace_connect_codes(&self, code: &ConnectCode) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let expired_before = code.issued_at - Duration::hours(CONNECT_CODE_TTL_HOURS);
        let removed = tx.execute(
            "DELETE FROM connect_codes
             WHERE chat_id = ?1 OR account_id IS NOT NULL OR issued_at < ?2",
            params![code.chat_id.0, to_millis(expired_before)],
        )?;
        tx.execute(
            "INSERT INTO connect_codes (code, chat_id, issued_at, account_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                code.code,
                code.chat_id.0,
                to_millis(code.issued_at),
                code.account_id.as_ref().map(AccountId::as_str),
            ],
        )?;
        tx.commit()?;
        Ok(removed)
    }

    fn get_connect_code(&self, code: &str) -> Result<Option<ConnectCode>, StoreError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT code, chat_id, issued_at, account_id FROM connect_codes WHERE code = ?1",
                params![code],
                |row| {
                    Ok(ConnectCode {
                        code: row.get(0)?,
                        chat_id: ChatId(row.get(1)?),
                        issued_at: millis_column(row, 2)?,
                        account_id: row.get::<_, Option<String>>(3)?.map(AccountId),
                    })
                },
            )
            .optional()?)
    }

    fn bind_connect_code(&self, code: &str, account_id: &AccountId) -> Result<bool, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let chat_id: Option<i64> = tx
            .query_row(
                "UPDATE connect_codes SET account_id = ?2
                 WHERE code = ?1 AND account_id IS NULL
                 RETURNING chat_id",
                params![code, account_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(chat_id) = chat_id else {
            return Ok(false);
        };
        bind_chat(&tx, account_id, ChatId(chat_id))?;
        tx.commit()?;
        Ok(true)
    }
}

/// Point `chat_id` at `account_id`, taking it from any other account.
fn bind_chat(conn: &Connection, account_id: &AccountId, chat_id: ChatId) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM chat_bindings WHERE chat_id = ?1 AND account_id != ?2",
        params![chat_id.0, account_id.as_str()],
    )?;
    conn.execute(
        "INSERT INTO chat_bindings (account_id, chat_id)
         VALUES (?1, ?2)
         ON CONFLICT(account_id) DO UPDATE SET chat_id = excluded.chat_id",
        params![account_id.as_str(), chat_id.0],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn millis_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    from_millis(millis).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
}

fn optional_millis_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(idx)? {
        Some(millis) => from_millis(millis)
            .map(Some)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis)),
        None => Ok(None),
    }
}

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: AccountId(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        group_id: row.get::<_, Option<String>>(3)?.map(GroupId),
        created_at: millis_column(row, 4)?,
    })
}

fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: GroupId(row.get(0)?),
        name: row.get(1)?,
        owner_id: AccountId(row.get(2)?),
        created_at: millis_column(row, 3)?,
    })
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let unit: String = row.get(6)?;
    Ok(Task {
        id: TaskId(row.get(0)?),
        group_id: GroupId(row.get(1)?),
        title: row.get(2)?,
        description: row.get(3)?,
        assignee: row.get::<_, Option<String>>(4)?.map(AccountId),
        rotating_assignee: row.get(5)?,
        interval_unit: IntervalUnit::parse(&unit),
        interval_size: row.get(7)?,
        next_due: millis_column(row, 8)?,
        created_at: millis_column(row, 9)?,
        updated_at: millis_column(row, 10)?,
        completed_at: optional_millis_column(row, 11)?,
        deleted_at: optional_millis_column(row, 12)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::types::CURRENT_SCHEMA_VERSION;
    use super::*;
    use chrono::{Duration, TimeZone};

    fn test_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::TempDir::new().expect("create temp dir");
        let store = SqliteStore::open(&dir.path().join("chores.db")).expect("open SqliteStore");
        (dir, store)
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn account(id: &str) -> Account {
        Account {
            id: AccountId::from(id),
            name: id.to_uppercase(),
            email: format!("{id}@example.com"),
            group_id: None,
            created_at: at(0),
        }
    }

    fn task(id: &str, group: &GroupId, created_at: DateTime<Utc>) -> Task {
        Task {
            id: TaskId::from(id),
            group_id: group.clone(),
            title: format!("task {id}"),
            description: String::new(),
            assignee: None,
            rotating_assignee: false,
            interval_unit: IntervalUnit::Week,
            interval_size: 1,
            next_due: created_at + Duration::weeks(1),
            created_at,
            updated_at: created_at,
            completed_at: None,
            deleted_at: None,
        }
    }

    #[test]
    fn sqlite_creates_schema_and_layout() {
        let (_dir, store) = test_store();
        store.ensure_layout().expect("ensure_layout");
        let version = store.schema_version().expect("schema_version");
        assert_eq!(version, Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn sqlite_reopen_keeps_data() {
        let dir = tempfile::TempDir::new().expect("create temp dir");
        let path = dir.path().join("nested").join("chores.db");
        {
            let store = SqliteStore::open(&path).expect("open");
            store.insert_account(&account("a")).expect("insert");
        }
        let store = SqliteStore::open(&path).expect("reopen");
        let loaded = store
            .get_account(&AccountId::from("a"))
            .expect("get")
            .expect("account exists");
        assert_eq!(loaded.name, "A");
    }

    #[test]
    fn sqlite_members_in_join_order() {
        let (_dir, store) = test_store();
        let group = GroupId::from("g");
        for id in ["a", "b", "c"] {
            store.insert_account(&account(id)).expect("insert");
        }
        store
            .add_group_member(&group, &AccountId::from("c"), at(3))
            .expect("add c");
        store
            .add_group_member(&group, &AccountId::from("b"), at(1))
            .expect("add b");
        store
            .add_group_member(&group, &AccountId::from("a"), at(1))
            .expect("add a");

        let ids: Vec<String> = store
            .list_group_members(&group)
            .expect("list")
            .into_iter()
            .map(|a| a.id.0)
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);

        let moved = GroupId::from("other");
        store
            .add_group_member(&moved, &AccountId::from("b"), at(4))
            .expect("move b");
        assert_eq!(store.list_group_members(&group).expect("list").len(), 2);
        assert_eq!(
            store
                .get_account(&AccountId::from("b"))
                .expect("get")
                .expect("exists")
                .group_id,
            Some(moved)
        );
    }

    #[test]
    fn sqlite_tasks_roundtrip_and_soft_delete() {
        let (_dir, store) = test_store();
        let group = GroupId::from("g");
        store.insert_task(&task("t2", &group, at(2))).expect("t2");
        store.insert_task(&task("t1", &group, at(1))).expect("t1");

        let ids: Vec<String> = store
            .list_tasks_for_group(&group)
            .expect("list")
            .into_iter()
            .map(|t| t.id.0)
            .collect();
        assert_eq!(ids, vec!["t1", "t2"]);

        let assignee = AccountId::from("a");
        assert!(
            store
                .record_completion(&TaskId::from("t1"), at(5), at(6), Some(&assignee))
                .expect("complete")
        );
        let t1 = store
            .get_task(&TaskId::from("t1"))
            .expect("get")
            .expect("exists");
        assert_eq!(t1.completed_at, Some(at(5)));
        assert_eq!(t1.next_due, at(6));
        assert_eq!(t1.assignee, Some(assignee));

        assert!(store.delete_task(&TaskId::from("t1"), at(7)).expect("delete"));
        assert!(store.get_task(&TaskId::from("t1")).expect("get").is_none());
        assert!(!store.delete_task(&TaskId::from("t1"), at(8)).expect("delete"));
        assert_eq!(store.list_tasks_for_group(&group).expect("list").len(), 1);
    }

    #[test]
    fn sqlite_upserts_replace_in_place() {
        let (_dir, store) = test_store();
        let group = GroupId::from("g");
        let account_id = AccountId::from("a");

        for url in ["https://hooks.example/1", "https://hooks.example/2"] {
            store
                .upsert_group_webhook(&GroupWebhook {
                    group_id: group.clone(),
                    url: url.to_owned(),
                    created_at: at(0),
                })
                .expect("upsert webhook");
        }
        assert_eq!(
            store
                .get_group_webhook(&group)
                .expect("get")
                .expect("exists")
                .url,
            "https://hooks.example/2"
        );

        store
            .upsert_webhook_handle(&account_id, "111")
            .expect("handle");
        store
            .upsert_webhook_handle(&account_id, "222")
            .expect("handle");
        assert_eq!(
            store.get_webhook_handle(&account_id).expect("get"),
            Some("222".to_owned())
        );

        store
            .upsert_chat_binding(&account_id, ChatId(10))
            .expect("bind");
        store
            .upsert_chat_binding(&AccountId::from("b"), ChatId(10))
            .expect("rebind");
        assert_eq!(store.get_chat_binding(&account_id).expect("get"), None);
        assert_eq!(
            store.get_chat_binding(&AccountId::from("b")).expect("get"),
            Some(ChatId(10))
        );
    }

    #[test]
    fn sqlite_renaming_an_account_keeps_its_membership() {
        let (_dir, store) = test_store();
        let group = GroupId::from("g");
        let a = AccountId::from("a");
        store.insert_account(&account("a")).expect("insert");
        store.add_group_member(&group, &a, at(1)).expect("join");

        let mut renamed = account("a");
        renamed.name = "Alice".to_owned();
        store.insert_account(&renamed).expect("rename");

        let loaded = store.get_account(&a).expect("get").expect("exists");
        assert_eq!(loaded.name, "Alice");
        assert_eq!(loaded.group_id, Some(group.clone()));
        let members = store.list_group_members(&group).expect("list");
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].group_id, Some(group));
    }

    #[test]
    fn sqlite_new_code_purges_redeemed_and_expired_ones() {
        let (_dir, store) = test_store();
        let code = |code: &str, chat: i64, issued_at| ConnectCode {
            code: code.to_owned(),
            chat_id: ChatId(chat),
            issued_at,
            account_id: None,
        };
        store.replace_connect_codes(&code("stale", 1, at(0))).expect("stale");
        store.replace_connect_codes(&code("used", 2, at(20))).expect("used");
        store.replace_connect_codes(&code("fresh", 3, at(20))).expect("fresh");
        assert!(store.bind_connect_code("used", &AccountId::from("a")).expect("bind"));

        let removed = store
            .replace_connect_codes(&code("new", 4, at(0) + Duration::hours(25)))
            .expect("new");
        assert_eq!(removed, 2);
        assert!(store.get_connect_code("stale").expect("get").is_none());
        assert!(store.get_connect_code("used").expect("get").is_none());
        assert!(store.get_connect_code("fresh").expect("get").is_some());
    }

    #[test]
    fn sqlite_failed_bind_leaves_code_unredeemed() {
        let (_dir, store) = test_store();
        let account_id = AccountId::from("a");
        store
            .upsert_chat_binding(&account_id, ChatId(1))
            .expect("old binding");
        store
            .replace_connect_codes(&ConnectCode {
                code: "abc".to_owned(),
                chat_id: ChatId(2),
                issued_at: at(1),
                account_id: None,
            })
            .expect("issue");
        store
            .lock()
            .expect("lock")
            .execute_batch(
                "CREATE TRIGGER refuse_rebind BEFORE INSERT ON chat_bindings
                 BEGIN SELECT RAISE(ABORT, 'refused'); END;",
            )
            .expect("trigger");

        assert!(store.bind_connect_code("abc", &account_id).is_err());
        let stored = store
            .get_connect_code("abc")
            .expect("get")
            .expect("exists");
        assert_eq!(stored.account_id, None);
        assert_eq!(
            store.get_chat_binding(&account_id).expect("get"),
            Some(ChatId(1))
        );
    }

    #[test]
    fn sqlite_connect_codes_replace_and_bind_once() {
        let (_dir, store) = test_store();
        let first = ConnectCode {
            code: "first".to_owned(),
            chat_id: ChatId(42),
            issued_at: at(1),
            account_id: None,
        };
        let second = ConnectCode {
            code: "second".to_owned(),
            ..first.clone()
        };

        assert_eq!(store.replace_connect_codes(&first).expect("first"), 0);
        assert_eq!(store.replace_connect_codes(&second).expect("second"), 1);
        assert!(store.get_connect_code("first").expect("get").is_none());

        let account_id = AccountId::from("a");
        assert!(store.bind_connect_code("second", &account_id).expect("bind"));
        assert_eq!(
            store.get_chat_binding(&account_id).expect("get"),
            Some(ChatId(42))
        );
        assert!(
            !store
                .bind_connect_code("second", &AccountId::from("b"))
                .expect("bind again")
        );
        let stored = store
            .get_connect_code("second")
            .expect("get")
            .expect("exists");
        assert_eq!(stored.account_id, Some(account_id));
        assert_eq!(stored.issued_at, at(1));
    }
}
