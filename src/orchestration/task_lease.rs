//! # Task Lease
//!
//! In-process claim that keeps a second executor loop in the same process
//! from driving a task that is already being driven. Cross-process exclusion
//! comes from the cursor guard on every progress commit.

use crate::error::{Result, TaskerError};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct TaskLeaseRegistry {
    active: Arc<DashMap<Uuid, DateTime<Utc>>>,
}

impl TaskLeaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a task; the claim is released when the returned lease drops.
    pub fn acquire(&self, task_id: Uuid) -> Result<TaskLease> {
        match self.active.entry(task_id) {
            Entry::Occupied(_) => Err(TaskerError::AlreadyRunning(task_id)),
            Entry::Vacant(vacant) => {
                vacant.insert(Utc::now());
                debug!(task_id = %task_id, "Acquired task lease");
                Ok(TaskLease {
                    task_id,
                    active: Arc::clone(&self.active),
                })
            }
        }
    }

    pub fn is_held(&self, task_id: Uuid) -> bool {
        self.active.contains_key(&task_id)
    }

    pub fn held_since(&self, task_id: Uuid) -> Option<DateTime<Utc>> {
        self.active.get(&task_id).map(|entry| *entry.value())
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

#[derive(Debug)]
pub struct TaskLease {
    task_id: Uuid,
    active: Arc<DashMap<Uuid, DateTime<Utc>>>,
}

impl TaskLease {
    pub fn task_id(&self) -> Uuid {
        self.task_id
    }
}

impl Drop for TaskLease {
    fn drop(&mut self) {
        self.active.remove(&self.task_id);
        debug!(task_id = %self.task_id, "Released task lease");
    }
}
