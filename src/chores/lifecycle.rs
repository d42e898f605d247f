//! Task create/update/delete/complete with group-membership checks.
//!
//! Every operation resolves the acting account to its group first. An actor
//! outside any group gets [`ChoreError::NotInGroup`]; an actor in a different
//! group than the task gets [`ChoreError::NotMemberOfGroup`].
//!
//! Each operation has an `_at` variant that takes the current instant
//! explicitly; the plain variant passes `Utc::now()`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::due::{Calendar, next_due_date, percentage_left};
use super::rotation::next_assignee;
use crate::channels::{NotificationDispatcher, messages};
use crate::error::{ChoreError, Result};
use crate::store::{Account, AccountId, GroupId, IntervalUnit, Store, Task, TaskId};

/// Caller-supplied task fields for create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Explicit assignee; must be a member of the actor's group.
    #[serde(default)]
    pub assignee: Option<AccountId>,
    #[serde(default)]
    pub rotating_assignee: bool,
    /// Raw interval unit (`onetime`, `day`, `week`, `month`).
    pub interval_unit: String,
    pub interval_size: u32,
}

impl TaskSpec {
    /// Convenience constructor for the common fields.
    #[must_use]
    pub fn new(title: impl Into<String>, interval_unit: impl Into<String>, size: u32) -> Self {
        Self {
            title: title.into(),
            interval_unit: interval_unit.into(),
            interval_size: size,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn rotating(mut self) -> Self {
        self.rotating_assignee = true;
        self
    }

    #[must_use]
    pub fn assigned_to(mut self, assignee: AccountId) -> Self {
        self.assignee = Some(assignee);
        self
    }

    fn validate(&self) -> Result<IntervalUnit> {
        if self.title.trim().is_empty() {
            return Err(ChoreError::Validation("title must not be empty".to_owned()));
        }
        if self.interval_unit.trim().is_empty() {
            return Err(ChoreError::Validation(
                "interval unit must not be empty".to_owned(),
            ));
        }
        if self.interval_size < 1 {
            return Err(ChoreError::Validation(
                "interval size must be at least 1".to_owned(),
            ));
        }
        let unit = IntervalUnit::parse(&self.interval_unit);
        if let IntervalUnit::Other(raw) = &unit {
            debug!(unit = %raw, "unrecognised interval unit, task will always be due");
        }
        Ok(unit)
    }
}

/// A task enriched for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskView {
    pub task: Task,
    /// Display name of the current assignee, if any.
    pub assignee_name: Option<String>,
    pub days_left: i64,
    pub percentage_left: f64,
    /// Locale-formatted due date.
    pub due_date: String,
}

/// Orchestrates task mutations on top of the store.
pub struct TaskLifecycle {
    store: Arc<dyn Store>,
    dispatcher: Arc<NotificationDispatcher>,
    calendar: Calendar,
}

impl TaskLifecycle {
    pub fn new(
        store: Arc<dyn Store>,
        dispatcher: Arc<NotificationDispatcher>,
        calendar: Calendar,
    ) -> Self {
        Self {
            store,
            dispatcher,
            calendar,
        }
    }

    #[must_use]
    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    pub fn create(&self, actor: &AccountId, spec: &TaskSpec) -> Result<TaskView> {
        self.create_at(actor, spec, Utc::now())
    }

    pub fn create_at(
        &self,
        actor: &AccountId,
        spec: &TaskSpec,
        now: DateTime<Utc>,
    ) -> Result<TaskView> {
        let (_, group_id) = self.actor_group(actor)?;
        let unit = spec.validate()?;
        self.check_assignee(&group_id, spec.assignee.as_ref())?;

        let task = Task {
            id: TaskId::generate(),
            group_id,
            title: spec.title.trim().to_owned(),
            description: spec.description.clone(),
            assignee: spec.assignee.clone(),
            rotating_assignee: spec.rotating_assignee,
            next_due: next_due_date(&unit, spec.interval_size, now),
            interval_unit: unit,
            interval_size: spec.interval_size,
            created_at: now,
            updated_at: now,
            completed_at: None,
            deleted_at: None,
        };
        self.store.insert_task(&task)?;
        info!(task_id = %task.id, group_id = %task.group_id, "task created");

        self.view(task, now, &mut HashMap::new())
    }

    // -----------------------------------------------------------------------
    // Read
    // -----------------------------------------------------------------------

    pub fn get(&self, actor: &AccountId, task_id: &TaskId) -> Result<TaskView> {
        self.get_at(actor, task_id, Utc::now())
    }

    pub fn get_at(
        &self,
        actor: &AccountId,
        task_id: &TaskId,
        now: DateTime<Utc>,
    ) -> Result<TaskView> {
        let task = self.authorized_task(actor, task_id)?;
        self.view(task, now, &mut HashMap::new())
    }

    /// Live tasks of a group, soonest due first.
    ///
    /// No membership check: used by the daily sweep. Member-facing callers
    /// go through [`list_for_member`](Self::list_for_member).
    pub fn list_for_group(&self, group_id: &GroupId) -> Result<Vec<TaskView>> {
        self.list_for_group_at(group_id, Utc::now())
    }

    pub fn list_for_group_at(
        &self,
        group_id: &GroupId,
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskView>> {
        if self.store.get_group(group_id)?.is_none() {
            return Err(ChoreError::not_found("group", group_id));
        }

        let tasks = self.store.list_tasks_for_group(group_id)?;
        let mut names = HashMap::new();
        let mut views = tasks
            .into_iter()
            .map(|task| self.view(task, now, &mut names))
            .collect::<Result<Vec<_>>>()?;
        // Stable: ties keep creation order.
        views.sort_by_key(|v| v.days_left);
        Ok(views)
    }

    /// [`list_for_group`](Self::list_for_group) for a member of that group.
    pub fn list_for_member(&self, actor: &AccountId, group_id: &GroupId) -> Result<Vec<TaskView>> {
        self.list_for_member_at(actor, group_id, Utc::now())
    }

    pub fn list_for_member_at(
        &self,
        actor: &AccountId,
        group_id: &GroupId,
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskView>> {
        let (_, actor_group) = self.actor_group(actor)?;
        if &actor_group != group_id {
            return Err(ChoreError::NotMemberOfGroup);
        }
        self.list_for_group_at(group_id, now)
    }

    // -----------------------------------------------------------------------
    // Update / delete
    // -----------------------------------------------------------------------

    /// Replace the task fields. The due date restarts from `now`.
    pub fn update(&self, actor: &AccountId, task_id: &TaskId, spec: &TaskSpec) -> Result<TaskView> {
        self.update_at(actor, task_id, spec, Utc::now())
    }

    pub fn update_at(
        &self,
        actor: &AccountId,
        task_id: &TaskId,
        spec: &TaskSpec,
        now: DateTime<Utc>,
    ) -> Result<TaskView> {
        let mut task = self.authorized_task(actor, task_id)?;
        let unit = spec.validate()?;
        self.check_assignee(&task.group_id, spec.assignee.as_ref())?;

        task.title = spec.title.trim().to_owned();
        task.description = spec.description.clone();
        task.assignee = spec.assignee.clone();
        task.rotating_assignee = spec.rotating_assignee;
        task.next_due = next_due_date(&unit, spec.interval_size, now);
        task.interval_unit = unit;
        task.interval_size = spec.interval_size;
        task.updated_at = now;

        if !self.store.update_task(&task)? {
            return Err(ChoreError::not_found("task", task_id));
        }
        info!(task_id = %task.id, "task updated");
        self.view(task, now, &mut HashMap::new())
    }

    pub fn delete(&self, actor: &AccountId, task_id: &TaskId) -> Result<()> {
        self.delete_at(actor, task_id, Utc::now())
    }

    pub fn delete_at(&self, actor: &AccountId, task_id: &TaskId, now: DateTime<Utc>) -> Result<()> {
        let task = self.authorized_task(actor, task_id)?;
        if !self.store.delete_task(&task.id, now)? {
            return Err(ChoreError::not_found("task", task_id));
        }
        info!(task_id = %task.id, "task deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Complete
    // -----------------------------------------------------------------------

    /// Mark a task done, rotate its assignee if it rotates, and tell the group.
    pub async fn complete(&self, actor: &AccountId, task_id: &TaskId) -> Result<TaskView> {
        self.complete_at(actor, task_id, Utc::now()).await
    }

    pub async fn complete_at(
        &self,
        actor: &AccountId,
        task_id: &TaskId,
        now: DateTime<Utc>,
    ) -> Result<TaskView> {
        let (account, group_id) = self.actor_group(actor)?;
        let mut task = self.load_task(task_id)?;
        if task.group_id != group_id {
            return Err(ChoreError::NotMemberOfGroup);
        }

        if task.rotating_assignee {
            task.assignee = self.rotate(&task, actor)?.or(task.assignee);
        }
        task.next_due = next_due_date(&task.interval_unit, task.interval_size, now);
        task.completed_at = Some(now);
        task.updated_at = now;

        if !self.store.record_completion(
            &task.id,
            now,
            task.next_due,
            task.assignee.as_ref(),
        )? {
            return Err(ChoreError::not_found("task", task_id));
        }
        info!(
            task_id = %task.id,
            completed_by = %actor,
            next_assignee = ?task.assignee.as_ref().map(AccountId::as_str),
            "task completed"
        );

        let message = messages::completion(&account.name, &task.title);
        let report = self.dispatcher.notify_group(&task.group_id, &message).await;
        debug!(task_id = %task.id, ?report, "completion broadcast sent");

        self.view(task, now, &mut HashMap::new())
    }

    fn rotate(&self, task: &Task, completed_by: &AccountId) -> Result<Option<AccountId>> {
        let members: Vec<AccountId> = self
            .store
            .list_group_members(&task.group_id)?
            .into_iter()
            .map(|m| m.id)
            .collect();

        let Some(rotation) = next_assignee(task.assignee.as_ref(), &members, completed_by) else {
            warn!(task_id = %task.id, "rotating task in a group without members");
            return Ok(None);
        };
        if !rotation.holder_was_member {
            warn!(
                task_id = %task.id,
                holder = ?task.assignee.as_ref().map(AccountId::as_str),
                "assignee left the group, rotation restarts at the first member"
            );
        }
        Ok(Some(rotation.next))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn actor_group(&self, actor: &AccountId) -> Result<(Account, GroupId)> {
        let account = self
            .store
            .get_account(actor)?
            .ok_or_else(|| ChoreError::not_found("account", actor))?;
        let group_id = account.group_id.clone().ok_or(ChoreError::NotInGroup)?;
        Ok((account, group_id))
    }

    fn load_task(&self, task_id: &TaskId) -> Result<Task> {
        self.store
            .get_task(task_id)?
            .ok_or_else(|| ChoreError::not_found("task", task_id))
    }

    fn authorized_task(&self, actor: &AccountId, task_id: &TaskId) -> Result<Task> {
        let (_, group_id) = self.actor_group(actor)?;
        let task = self.load_task(task_id)?;
        if task.group_id != group_id {
            return Err(ChoreError::NotMemberOfGroup);
        }
        Ok(task)
    }

    fn check_assignee(&self, group_id: &GroupId, assignee: Option<&AccountId>) -> Result<()> {
        let Some(assignee) = assignee else {
            return Ok(());
        };
        let is_member = self
            .store
            .list_group_members(group_id)?
            .iter()
            .any(|m| &m.id == assignee);
        if is_member {
            Ok(())
        } else {
            Err(ChoreError::Validation(format!(
                "assignee {assignee} is not a member of the group"
            )))
        }
    }

    fn view(
        &self,
        task: Task,
        now: DateTime<Utc>,
        names: &mut HashMap<AccountId, Option<String>>,
    ) -> Result<TaskView> {
        let assignee_name = match &task.assignee {
            Some(id) => match names.get(id) {
                Some(name) => name.clone(),
                None => {
                    let name = self.store.get_account(id)?.map(|a| a.name);
                    names.insert(id.clone(), name.clone());
                    name
                }
            },
            None => None,
        };

        Ok(TaskView {
            assignee_name,
            days_left: self.calendar.days_left(task.next_due, now),
            percentage_left: percentage_left(
                &task.interval_unit,
                task.interval_size,
                task.next_due,
                now,
            ),
            due_date: self.calendar.format_due_date(task.next_due),
            task,
        })
    }
}
