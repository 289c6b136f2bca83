//! The dispatcher: owns the pending queue and the active-task set, runs the
//! admission loop and drives status notification.
//!
//! Queue and active set live behind a single mutex that is never held
//! across an await: every mutation runs to completion before the dispatcher
//! yields, so admission decisions always see a consistent state. Snapshots
//! are published while that lock is still held, so observers receive them
//! in transition order. Work functions run on spawned tasks and report back
//! through [`Dispatcher::finish`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use studio_common::{StatusSnapshot, TaskInfo, TaskPriority};

use super::admission::{ActiveCounts, AdmissionPolicy};
use super::broadcast::StatusBroadcaster;
use super::executor::TaskExecutor;
use super::task::{ActiveTask, QueuedTask, TaskRequest, TaskResult, TaskTicket, WorkFn};
use super::DispatchError;

pub struct Dispatcher {
    state: Mutex<DispatchState>,
    policy: AdmissionPolicy,
    executor: Arc<dyn TaskExecutor>,
    status: StatusBroadcaster,
}

#[derive(Default)]
struct DispatchState {
    queue: VecDeque<QueuedTask>,
    active: HashMap<Uuid, ActiveTask>,
}

/// An admitted task on its way to the executor. Removed from the queue and
/// already counted in the active set.
struct Launch {
    info: TaskInfo,
    work: WorkFn,
    outcome: oneshot::Sender<TaskResult>,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(policy: AdmissionPolicy, executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            state: Mutex::new(DispatchState::default()),
            policy,
            executor,
            status: StatusBroadcaster::new(),
        }
    }

    /// Subscribe to status snapshots. The receiver immediately holds the
    /// current snapshot; dropping it unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.subscribe()
    }

    /// The most recently published snapshot.
    pub fn current_snapshot(&self) -> StatusSnapshot {
        self.status.current()
    }

    /// Submit a task. Inserts it into the pending queue (high priority goes
    /// ahead of all pending low-priority work, behind earlier high-priority
    /// work), runs an admission pass and returns a ticket for the eventual
    /// outcome. Never fails synchronously; every failure arrives through
    /// the ticket.
    pub fn enqueue(self: &Arc<Self>, request: TaskRequest, work: WorkFn) -> TaskTicket {
        let (tx, rx) = oneshot::channel();
        let task = request.into_queued(tx, work);
        let id = task.info.id;

        tracing::info!(
            task_id = %id,
            owner = %task.info.owner_id,
            kind = %task.info.kind,
            module = %task.info.module,
            own_credential = task.info.own_credential,
            "task enqueued"
        );

        let launches = {
            let mut state = self.state.lock();
            Self::insert_pending(&mut state, task);
            let launches = Self::admit_pending(&self.policy, &mut state);
            self.status.publish(Self::snapshot(&state));
            launches
        };

        self.launch(launches);
        TaskTicket::new(id, rx)
    }

    /// Cancel a single task owned by `owner_id`.
    ///
    /// A pending task is removed from the queue and its outcome rejected
    /// immediately. An active task only has its cancellation token
    /// signaled; it leaves the active set when the executor returns with an
    /// abort. Unknown ids, foreign owners and already-terminal tasks are
    /// silently ignored.
    pub fn cancel_task(&self, task_id: Uuid, owner_id: &str) {
        let mut state = self.state.lock();
        let pending = state
            .queue
            .iter()
            .position(|t| t.info.id == task_id && t.info.owner_id == owner_id);
        if let Some(pos) = pending {
            if let Some(task) = state.queue.remove(pos) {
                tracing::info!(task_id = %task_id, "pending task cancelled");
                let _ = task.outcome.send(Err(DispatchError::Cancelled));
            }
        } else if let Some(active) = state.active.get(&task_id) {
            if active.info.owner_id == owner_id {
                tracing::info!(task_id = %task_id, "cancelling active task");
                active.cancel.cancel();
            }
        }
        self.status.publish(Self::snapshot(&state));
    }

    /// Cancel every task of `owner_id` carrying `tag`: pending ones are
    /// rejected and removed, active ones have their token signaled.
    pub fn cancel_by_tag(&self, tag: &str, owner_id: &str) {
        let mut state = self.state.lock();
        let drained = std::mem::take(&mut state.queue);
        for task in drained {
            if task.info.tag.as_deref() == Some(tag) && task.info.owner_id == owner_id {
                let _ = task.outcome.send(Err(DispatchError::Cancelled));
            } else {
                state.queue.push_back(task);
            }
        }
        for active in state.active.values() {
            if active.info.tag.as_deref() == Some(tag) && active.info.owner_id == owner_id {
                active.cancel.cancel();
            }
        }
        tracing::info!(tag, owner = owner_id, "cancelled tasks by tag");
        self.status.publish(Self::snapshot(&state));
    }

    /// Stop all of an owner's work. Pending tasks reject with
    /// [`DispatchError::Stopped`]; active ones are aborted. Idempotent.
    pub fn cancel_all(&self, owner_id: &str) {
        let mut state = self.state.lock();
        let drained = std::mem::take(&mut state.queue);
        for task in drained {
            if task.info.owner_id == owner_id {
                let _ = task.outcome.send(Err(DispatchError::Stopped));
            } else {
                state.queue.push_back(task);
            }
        }
        for active in state.active.values() {
            if active.info.owner_id == owner_id {
                active.cancel.cancel();
            }
        }
        tracing::info!(owner = owner_id, "stopped all tasks for owner");
        self.status.publish(Self::snapshot(&state));
    }

    /// Move a pending task to the very head of the queue, ahead of all
    /// other high-priority work. Last promoted wins the head.
    pub fn prioritize_task(&self, task_id: Uuid, owner_id: &str) {
        let mut state = self.state.lock();
        let pending = state
            .queue
            .iter()
            .position(|t| t.info.id == task_id && t.info.owner_id == owner_id);
        if let Some(pos) = pending {
            if let Some(mut task) = state.queue.remove(pos) {
                task.info.priority = TaskPriority::High;
                state.queue.push_front(task);
                tracing::info!(task_id = %task_id, "task promoted to queue head");
            }
        }
        self.status.publish(Self::snapshot(&state));
    }

    /// Update the progress of an active task. Pending and terminal tasks
    /// are a no-op; progress has no effect on scheduling.
    pub fn update_progress(&self, task_id: Uuid, progress: u8) {
        let mut state = self.state.lock();
        match state.active.get_mut(&task_id) {
            Some(active) => active.info.progress = progress.min(100),
            None => return,
        }
        self.status.publish(Self::snapshot(&state));
    }

    /// Insert a new task into the pending queue. High-priority tasks go in
    /// front of all low-priority work but keep FIFO order among themselves.
    fn insert_pending(state: &mut DispatchState, task: QueuedTask) {
        match task.info.priority {
            TaskPriority::High => {
                let pos = state
                    .queue
                    .iter()
                    .position(|t| t.info.priority == TaskPriority::Low)
                    .unwrap_or(state.queue.len());
                state.queue.insert(pos, task);
            }
            TaskPriority::Low => state.queue.push_back(task),
        }
    }

    /// One admission pass: scan the pending queue front to back and promote
    /// every task whose gates pass, counting promotions against the live
    /// totals. Blocked tasks are skipped, never waited on, so a stalled
    /// module cannot hold back work in other modules.
    fn admit_pending(policy: &AdmissionPolicy, state: &mut DispatchState) -> Vec<Launch> {
        let mut counts = ActiveCounts::from_active(state.active.values().map(|t| &t.info));
        let mut launches = Vec::new();
        let mut i = 0;

        while i < state.queue.len() {
            if policy.saturated(&counts) {
                break;
            }
            let candidate = &state.queue[i].info;
            if !policy.admits(candidate.own_credential, candidate.module, &counts) {
                i += 1;
                continue;
            }
            if let Some(task) = state.queue.remove(i) {
                counts.note_admitted(task.info.own_credential, task.info.module);
                state.active.insert(
                    task.info.id,
                    ActiveTask {
                        info: task.info.clone(),
                        cancel: task.cancel.clone(),
                    },
                );
                launches.push(Launch {
                    info: task.info,
                    work: task.work,
                    outcome: task.outcome,
                    cancel: task.cancel,
                });
            }
        }

        launches
    }

    /// Hand admitted tasks to the executor on spawned tasks; the admission
    /// pass never blocks on their completion.
    fn launch(self: &Arc<Self>, launches: Vec<Launch>) {
        for launch in launches {
            let dispatcher = Arc::clone(self);
            tokio::spawn(async move {
                tracing::debug!(task_id = %launch.info.id, label = %launch.info.label, "task started");
                let result = dispatcher
                    .executor
                    .execute(&launch.info, launch.work, launch.cancel)
                    .await;
                dispatcher.finish(launch.info.id, launch.outcome, result);
            });
        }
    }

    /// Completion path: drop the task from the active set, re-run
    /// admission so freed capacity drains pending work, broadcast the new
    /// state and resolve the outcome channel exactly once.
    fn finish(self: &Arc<Self>, task_id: Uuid, outcome: oneshot::Sender<TaskResult>, result: TaskResult) {
        match &result {
            Ok(_) => tracing::debug!(task_id = %task_id, "task completed"),
            // Caller-initiated termination was already communicated through
            // the outcome channel; not a dispatcher-level failure.
            Err(e) if e.is_cancellation() => {
                tracing::debug!(task_id = %task_id, reason = %e, "task terminated by owner")
            }
            Err(e) => tracing::warn!(task_id = %task_id, error = %e, "task failed"),
        }

        let launches = {
            let mut state = self.state.lock();
            state.active.remove(&task_id);
            let launches = Self::admit_pending(&self.policy, &mut state);
            self.status.publish(Self::snapshot(&state));
            launches
        };

        self.launch(launches);
        // The receiver may have gone away; that is not an error.
        let _ = outcome.send(result);
    }

    fn snapshot(state: &DispatchState) -> StatusSnapshot {
        let mut active: Vec<TaskInfo> = state.active.values().map(|t| t.info.clone()).collect();
        active.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        let queued: Vec<TaskInfo> = state.queue.iter().map(|t| t.info.clone()).collect();
        StatusSnapshot::from_tasks(active, queued)
    }
}
