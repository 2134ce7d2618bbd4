//! Scheduler: detached, cancellable timed tasks
//!
//! Two task shapes: deadline tasks (poll until the target time, then
//! fire) and delay-then-delete tasks (wait, then remove a transient
//! message, tolerating it already being gone). Tasks run detached from
//! the request that spawned them; failures during the fire action are
//! logged and swallowed, never propagated to the originating caller.
//!
//! Firing and cancellation are mutually exclusive terminal outcomes,
//! decided by a compare-and-swap on the task record under one lock.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::gateway::PlatformGateway;
use crate::types::{ChannelId, MessageId};

// ─────────────────────────────────────────────────────────────────
// Task State
// ─────────────────────────────────────────────────────────────────

/// Unique identifier of a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting for its deadline or delay
    Pending,
    /// Fired its completion action (terminal)
    Fired,
    /// Cancelled before firing (terminal)
    Cancelled,
}

/// Bookkeeping record for one task
struct ScheduledTask {
    state: TaskState,
    label: String,
    cancel_tx: Option<oneshot::Sender<()>>,
    created_at: Instant,
    finished_at: Option<Instant>,
}

// ─────────────────────────────────────────────────────────────────
// Scheduler
// ─────────────────────────────────────────────────────────────────

/// Supervises detached timed tasks
pub struct Scheduler {
    tasks: Arc<RwLock<HashMap<TaskId, ScheduledTask>>>,
    /// Longest single sleep for deadline tasks
    poll_interval: Duration,
}

impl Scheduler {
    /// Create a scheduler with the default 60s deadline poll interval
    pub fn new() -> Self {
        Self::with_poll_interval(Duration::from_secs(60))
    }

    /// Create a scheduler with a custom deadline poll interval
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            poll_interval,
        }
    }

    /// Schedule an action to fire once the deadline has passed
    ///
    /// The task wakes at most every poll interval to re-check the
    /// clock, then fires exactly once. Action failures are logged and
    /// swallowed.
    pub fn schedule_at<F, Fut>(
        &self,
        deadline: DateTime<Utc>,
        label: impl Into<String>,
        action: F,
    ) -> TaskId
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send,
    {
        let label = label.into();
        let (id, mut cancel_rx) = self.register(&label);
        let tasks = self.tasks.clone();
        let poll_interval = self.poll_interval;

        // Anchor the wall-clock deadline to the monotonic clock once,
        // at schedule time; a past deadline fires immediately.
        let delay = (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let target = tokio::time::Instant::now() + delay;

        tokio::spawn(async move {
            loop {
                let now = tokio::time::Instant::now();
                if now >= target {
                    break;
                }
                let sleep = (target - now).min(poll_interval);
                tokio::select! {
                    _ = &mut cancel_rx => {
                        debug!(task_id = %id, "Deadline task cancelled before firing");
                        return;
                    }
                    _ = tokio::time::sleep_until(now + sleep) => {}
                }
            }

            if !try_mark_fired(&tasks, id) {
                // Lost the race against cancellation
                return;
            }
            if let Err(e) = action().await {
                warn!(task_id = %id, error = %e, "Deadline task action failed");
            }
        });

        id
    }

    /// Wait a fixed delay, then delete a transient message
    ///
    /// Tolerates the message already being absent; any other failure
    /// is logged and swallowed.
    pub fn delete_message_after(
        &self,
        delay: Duration,
        gateway: Arc<dyn PlatformGateway>,
        channel: ChannelId,
        message: MessageId,
    ) -> TaskId {
        let label = format!("delete-message {} in {:?}", message, delay);
        let (id, mut cancel_rx) = self.register(&label);
        let tasks = self.tasks.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = &mut cancel_rx => {
                    debug!(task_id = %id, "Delete task cancelled before firing");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            if !try_mark_fired(&tasks, id) {
                return;
            }
            match gateway.delete_message(channel, message).await {
                Ok(()) => {
                    debug!(task_id = %id, message = %message, "Transient message deleted");
                }
                Err(Error::MessageNotFound { .. }) => {
                    // Already gone, nothing to do
                    debug!(task_id = %id, message = %message, "Message already gone");
                }
                Err(e) => {
                    warn!(task_id = %id, message = %message, error = %e, "Delete task failed");
                }
            }
        });

        id
    }

    /// Cancel a pending task
    ///
    /// Returns true if cancellation won; false if the task already
    /// fired, was already cancelled, or is unknown.
    pub fn cancel(&self, id: TaskId) -> bool {
        let mut tasks = self.tasks.write();
        match tasks.get_mut(&id) {
            Some(task) if task.state == TaskState::Pending => {
                task.state = TaskState::Cancelled;
                task.finished_at = Some(Instant::now());
                if let Some(tx) = task.cancel_tx.take() {
                    let _ = tx.send(());
                }
                debug!(task_id = %id, label = %task.label, "Task cancelled");
                true
            }
            _ => false,
        }
    }

    /// Current state of a task
    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        self.tasks.read().get(&id).map(|t| t.state)
    }

    /// Count of tasks still pending
    pub fn pending_count(&self) -> usize {
        self.count(TaskState::Pending)
    }

    /// Count of tasks that fired
    pub fn fired_count(&self) -> usize {
        self.count(TaskState::Fired)
    }

    /// Count of cancelled tasks
    pub fn cancelled_count(&self) -> usize {
        self.count(TaskState::Cancelled)
    }

    fn count(&self, state: TaskState) -> usize {
        self.tasks
            .read()
            .values()
            .filter(|t| t.state == state)
            .count()
    }

    /// Drop old terminal task records, keeping the most recent `keep_count`
    pub fn cleanup_finished(&self, keep_count: usize) {
        let mut tasks = self.tasks.write();

        let mut finished: Vec<_> = tasks
            .iter()
            .filter(|(_, t)| t.state != TaskState::Pending)
            .map(|(id, t)| (*id, t.finished_at.unwrap_or(t.created_at)))
            .collect();
        finished.sort_by_key(|(_, at)| *at);

        let to_remove = finished.len().saturating_sub(keep_count);
        for (id, _) in finished.into_iter().take(to_remove) {
            tasks.remove(&id);
        }
    }

    fn register(&self, label: &str) -> (TaskId, oneshot::Receiver<()>) {
        let id = TaskId::new();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.tasks.write().insert(
            id,
            ScheduledTask {
                state: TaskState::Pending,
                label: label.to_string(),
                cancel_tx: Some(cancel_tx),
                created_at: Instant::now(),
                finished_at: None,
            },
        );
        debug!(task_id = %id, label = %label, "Task scheduled");
        (id, cancel_rx)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// CAS Pending -> Fired; loses to an earlier cancellation
fn try_mark_fired(tasks: &RwLock<HashMap<TaskId, ScheduledTask>>, id: TaskId) -> bool {
    let mut tasks = tasks.write();
    match tasks.get_mut(&id) {
        Some(task) if task.state == TaskState::Pending => {
            task.state = TaskState::Fired;
            task.finished_at = Some(Instant::now());
            true
        }
        _ => false,
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
