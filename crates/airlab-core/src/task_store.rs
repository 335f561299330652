//! Task store abstraction and in-memory implementation.
//!
//! The store replaces a bare task dictionary with an explicit interface so
//! a durable backend can be substituted without changing call sites.
//! Exactly one coroutine writes to each task record (the task that created
//! it); the status endpoint and cancel flag are the only outside touches.
//! The in-memory backend is not safe across multiple worker processes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::error::{CoreError, Result};
use crate::domain::task::{TaskRecord, TaskStatus};

/// Storage seam for pipeline task records.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create a fresh pending record. Fails if the id already exists.
    async fn create(&self, task_id: &str) -> Result<TaskRecord>;

    /// Fetch a record by id.
    async fn get(&self, task_id: &str) -> Result<TaskRecord>;

    /// Move the task to a new lifecycle status.
    async fn set_status(&self, task_id: &str, status: TaskStatus) -> Result<()>;

    /// Attach a result payload (does not change status).
    async fn set_result(&self, task_id: &str, result: serde_json::Value) -> Result<()>;

    /// Mark the task failed with a `"<Kind>: <message>"` label.
    async fn set_error(&self, task_id: &str, error: String) -> Result<()>;

    /// Flip the cancel flag. Running loops observe it on their next tick.
    async fn request_cancel(&self, task_id: &str) -> Result<()>;

    /// Whether a cancel has been requested for this task.
    async fn cancel_requested(&self, task_id: &str) -> Result<bool>;
}

/// In-memory task store backed by a `Mutex<HashMap<task_id, TaskRecord>>`.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<HashMap<String, TaskRecord>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, task_id: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut TaskRecord),
    {
        let mut tasks = self.tasks.lock().unwrap();
        let record = tasks
            .get_mut(task_id)
            .ok_or_else(|| CoreError::TaskNotFound(task_id.to_string()))?;
        apply(record);
        record.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create(&self, task_id: &str) -> Result<TaskRecord> {
        let mut tasks = self.tasks.lock().unwrap();
        if tasks.contains_key(task_id) {
            return Err(CoreError::InvalidTaskState {
                task_id: task_id.to_string(),
                status: "existing".to_string(),
                expected: "absent".to_string(),
            });
        }
        let record = TaskRecord::new(task_id);
        tasks.insert(task_id.to_string(), record.clone());
        Ok(record)
    }

    async fn get(&self, task_id: &str) -> Result<TaskRecord> {
        let tasks = self.tasks.lock().unwrap();
        tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| CoreError::TaskNotFound(task_id.to_string()))
    }

    async fn set_status(&self, task_id: &str, status: TaskStatus) -> Result<()> {
        self.update(task_id, |record| record.status = status)
    }

    async fn set_result(&self, task_id: &str, result: serde_json::Value) -> Result<()> {
        self.update(task_id, |record| record.result = Some(result))
    }

    async fn set_error(&self, task_id: &str, error: String) -> Result<()> {
        self.update(task_id, |record| {
            record.status = TaskStatus::Failed;
            record.error = Some(error);
        })
    }

    async fn request_cancel(&self, task_id: &str) -> Result<()> {
        self.update(task_id, |record| record.cancel_requested = true)
    }

    async fn cancel_requested(&self, task_id: &str) -> Result<bool> {
        let tasks = self.tasks.lock().unwrap();
        tasks
            .get(task_id)
            .map(|record| record.cancel_requested)
            .ok_or_else(|| CoreError::TaskNotFound(task_id.to_string()))
    }
}

/// Signal checked by long-running loops to exit early.
#[async_trait]
pub trait CancelSignal: Send + Sync {
    /// Whether the owning task has been asked to stop.
    async fn is_cancelled(&self) -> bool;
}

/// Cancel signal backed by a task record's cancel flag.
#[derive(Clone)]
pub struct StoreCancelSignal {
    store: Arc<dyn TaskStore>,
    task_id: String,
}

impl StoreCancelSignal {
    pub fn new(store: Arc<dyn TaskStore>, task_id: impl Into<String>) -> Self {
        Self {
            store,
            task_id: task_id.into(),
        }
    }
}

#[async_trait]
impl CancelSignal for StoreCancelSignal {
    async fn is_cancelled(&self) -> bool {
        // A missing record means the task is gone; stop polling for it.
        self.store
            .cancel_requested(&self.task_id)
            .await
            .unwrap_or(true)
    }
}
