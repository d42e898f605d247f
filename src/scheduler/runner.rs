//! Daily due-task sweep.
//!
//! The scheduler alternates between two states. While **waiting** it sleeps
//! until the next trigger instant, recomputed from the current time on every
//! cycle. While **sweeping** it walks every group once, sends the shared
//! digest for unassigned due tasks and one digest per assignee, then returns
//! to waiting no matter how individual groups fared.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, FixedOffset, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::trigger::{TriggerTime, duration_until_next_trigger};
use crate::channels::{DeliveryReport, NotificationDispatcher};
use crate::chores::TaskLifecycle;
use crate::error::Result;
use crate::store::{AccountId, GroupId, Store};

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    /// Not started yet.
    Idle,
    /// Sleeping until `until`.
    Waiting { until: DateTime<Utc> },
    /// Walking all groups.
    Sweeping,
    /// Loop exited after cancellation.
    Stopped,
}

/// Summary of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Groups visited.
    pub groups: usize,
    /// Groups that got a shared digest.
    pub broadcasts: usize,
    /// Assignee digests sent.
    pub direct_digests: usize,
    /// Groups skipped because of an error.
    pub failed_groups: usize,
    pub delivery: DeliveryReport,
}

/// Source of the current instant.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Background task waking once a day to notify about due tasks.
pub struct DailySweepScheduler {
    store: Arc<dyn Store>,
    lifecycle: Arc<TaskLifecycle>,
    dispatcher: Arc<NotificationDispatcher>,
    trigger: TriggerTime,
    offset: FixedOffset,
    clock: Clock,
    state: Mutex<SweepState>,
}

impl DailySweepScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        lifecycle: Arc<TaskLifecycle>,
        dispatcher: Arc<NotificationDispatcher>,
        trigger: TriggerTime,
    ) -> Self {
        let offset = lifecycle.calendar().offset;
        Self {
            store,
            lifecycle,
            dispatcher,
            trigger,
            offset,
            clock: Arc::new(Utc::now),
            state: Mutex::new(SweepState::Idle),
        }
    }

    /// Replace the wall clock used to schedule and run sweeps.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn state(&self) -> SweepState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SweepState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Run until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(trigger = %self.trigger, "sweep scheduler started");

        loop {
            let now = (self.clock)();
            let until = self.trigger.next_after(now, self.offset);
            let wait = duration_until_next_trigger(now, self.trigger, self.offset);
            self.set_state(SweepState::Waiting { until });
            info!(
                until = %until,
                wait_hours = wait.as_secs_f64() / 3600.0,
                "scheduler waiting for next sweep"
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            self.set_state(SweepState::Sweeping);
            info!("scheduler sweeping due tasks");
            let report = tokio::select! {
                _ = cancel.cancelled() => break,
                report = self.sweep_at((self.clock)()) => report,
            };
            info!(
                groups = report.groups,
                broadcasts = report.broadcasts,
                direct_digests = report.direct_digests,
                failed_groups = report.failed_groups,
                delivered = report.delivery.delivered,
                delivery_failures = report.delivery.failed,
                "sweep finished"
            );
        }

        self.set_state(SweepState::Stopped);
        info!("sweep scheduler stopped");
    }

    /// One pass over every group as of `now`.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        let groups = match self.store.list_groups() {
            Ok(groups) => groups,
            Err(e) => {
                error!(error = %e, "cannot list groups, skipping sweep");
                return report;
            }
        };

        for group in groups {
            report.groups += 1;
            match self.sweep_group(&group.id, now, &mut report).await {
                Ok(()) => {}
                Err(e) => {
                    report.failed_groups += 1;
                    warn!(group_id = %group.id, error = %e, "sweep of group failed");
                }
            }
        }
        report
    }

    async fn sweep_group(
        &self,
        group_id: &GroupId,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<()> {
        let views = self.lifecycle.list_for_group_at(group_id, now)?;

        let mut shared: Vec<String> = Vec::new();
        let mut assigned: Vec<(AccountId, Vec<String>)> = Vec::new();
        for view in views.into_iter().filter(|v| v.days_left <= 0) {
            match view.task.assignee {
                None => shared.push(view.task.title),
                Some(assignee) => match assigned.iter_mut().find(|(id, _)| *id == assignee) {
                    Some((_, titles)) => titles.push(view.task.title),
                    None => assigned.push((assignee, vec![view.task.title])),
                },
            }
        }

        if !shared.is_empty() {
            report.broadcasts += 1;
            let delivery = self
                .dispatcher
                .notify_group_broadcast(group_id, &shared)
                .await;
            report.delivery.merge(delivery);
        }
        if !assigned.is_empty() {
            report.direct_digests += assigned.len();
            let delivery = self.dispatcher.notify_per_member_digest(&assigned).await;
            report.delivery.merge(delivery);
        }
        Ok(())
    }
}
