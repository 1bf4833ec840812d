//! # Task Scheduler
//!
//! Polling loop that keeps incomplete tasks moving.
//!
//! Each tick lists incomplete tasks oldest first and drives one executor
//! iteration per task, so a large task cannot starve the ones queued behind
//! it. While any task made progress the next tick starts immediately; once a
//! tick finds nothing to advance the loop waits `poll_interval`.
//!
//! A task that aborts for any reason other than `Superseded` is halted for the
//! lifetime of the scheduler and never visited again. With
//! `max_tasks_per_tick` set, each tick takes the next window after the last
//! task visited and wraps around to the oldest task.
//!
//! ```rust,no_run
//! use bulk_task_core::orchestration::TaskScheduler;
//! use tokio::sync::watch;
//!
//! # async fn example(scheduler: TaskScheduler) {
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let handle = tokio::spawn(async move { scheduler.run_until_shutdown(shutdown_rx).await });
//! // ...
//! let _ = shutdown_tx.send(true);
//! let _ = handle.await;
//! # }
//! ```

use super::task_executor::TaskExecutor;
use super::types::IterationOutcome;
use crate::error::{Result, TaskerError};
use crate::logging::log_error;
use crate::models::{AccessContext, Task, TaskQuery};
use crate::state_machine::AbortReason;
use crate::store::TaskRepository;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Counts from one scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerTickSummary {
    pub continued: usize,
    pub completed: usize,
    pub aborted: usize,
    /// Tasks whose lease is held by another loop in this process
    pub skipped: usize,
    pub failed: usize,
}

impl SchedulerTickSummary {
    pub fn made_progress(&self) -> bool {
        self.continued > 0
    }

    pub fn visited(&self) -> usize {
        self.continued + self.completed + self.aborted + self.skipped + self.failed
    }
}

pub struct TaskScheduler {
    executor: Arc<TaskExecutor>,
    repository: Arc<dyn TaskRepository>,
    context: AccessContext,
    poll_interval: Duration,
    max_tasks_per_tick: Option<usize>,
    halted: DashMap<Uuid, AbortReason>,
    /// Last task visited by a capped tick
    window_anchor: Mutex<Option<Uuid>>,
}

impl TaskScheduler {
    pub fn new(
        executor: Arc<TaskExecutor>,
        repository: Arc<dyn TaskRepository>,
        context: AccessContext,
    ) -> Self {
        let poll_interval = executor.config().poll_interval();
        Self {
            executor,
            repository,
            context,
            poll_interval,
            max_tasks_per_tick: None,
            halted: DashMap::new(),
            window_anchor: Mutex::new(None),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_max_tasks_per_tick(mut self, max: usize) -> Self {
        self.max_tasks_per_tick = Some(max.max(1));
        self
    }

    /// Reason the task was halted, if this scheduler stopped driving it.
    pub fn halted_reason(&self, task_id: Uuid) -> Option<AbortReason> {
        self.halted.get(&task_id).map(|entry| *entry.value())
    }

    pub fn halted_count(&self) -> usize {
        self.halted.len()
    }

    /// Advance every incomplete task by one iteration.
    ///
    /// Only a failure to list tasks is returned as an error; per-task failures
    /// are logged and counted.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> Result<SchedulerTickSummary> {
        let tasks = self.next_window().await?;
        let mut summary = SchedulerTickSummary::default();

        for task in tasks {
            match self.executor.execute_iteration(&self.context, task.id).await {
                Ok(IterationOutcome::Continue { .. }) => summary.continued += 1,
                Ok(IterationOutcome::Completed(_)) => summary.completed += 1,
                Ok(IterationOutcome::Aborted(reason)) => {
                    if reason != AbortReason::Superseded {
                        self.halted.insert(task.id, reason);
                    }
                    summary.aborted += 1;
                }
                Err(TaskerError::AlreadyRunning(_)) => summary.skipped += 1,
                Err(error) if error.is_retryable() => {
                    warn!(task_id = %task.id, error = %error, "Task iteration will be retried next tick");
                    summary.failed += 1;
                }
                Err(error) => {
                    log_error(
                        "task_scheduler",
                        "execute_iteration",
                        &error.to_string(),
                        Some(&task.id.to_string()),
                    );
                    summary.failed += 1;
                }
            }
        }

        debug!(?summary, "Scheduler tick finished");
        Ok(summary)
    }

    /// Incomplete, non-halted tasks to visit this tick.
    async fn next_window(&self) -> Result<Vec<Task>> {
        let Some(limit) = self.max_tasks_per_tick else {
            let tasks = self
                .repository
                .find_all(&self.context, &TaskQuery::incomplete())
                .await?;
            return Ok(tasks
                .into_iter()
                .filter(|task| !self.halted.contains_key(&task.id))
                .collect());
        };

        let mut window: Vec<Task> = Vec::with_capacity(limit);
        let mut after = *self.window_anchor.lock();
        let mut wrapped = after.is_none();
        'pages: loop {
            let query = TaskQuery {
                first: Some(limit),
                after,
                ..TaskQuery::incomplete()
            };
            let page = self.repository.find_all(&self.context, &query).await?;
            let page_len = page.len();
            after = page.last().map(|task| task.id);

            for task in page {
                if window.iter().any(|visited| visited.id == task.id) {
                    break 'pages;
                }
                if self.halted.contains_key(&task.id) {
                    continue;
                }
                window.push(task);
                if window.len() == limit {
                    break 'pages;
                }
            }

            if page_len < limit {
                if wrapped {
                    break;
                }
                wrapped = true;
                after = None;
            }
        }

        *self.window_anchor.lock() = window.last().map(|task| task.id);
        Ok(window)
    }

    /// Tick until `shutdown` becomes `true` or its sender is dropped.
    pub async fn run_until_shutdown(&self, mut shutdown: watch::Receiver<bool>) {
        info!(poll_interval_ms = self.poll_interval.as_millis() as u64, "Task scheduler started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            let made_progress = match self.tick().await {
                Ok(summary) => summary.made_progress(),
                Err(error) => {
                    warn!(error = %error, "Failed to list incomplete tasks");
                    false
                }
            };
            if made_progress {
                if shutdown.has_changed().unwrap_or(true) && *shutdown.borrow_and_update() {
                    break;
                }
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("Task scheduler stopped");
    }
}
