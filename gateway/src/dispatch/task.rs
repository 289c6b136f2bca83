//! Work unit types: the submission request, the internal queued form and
//! the ticket handed back to the caller.

use chrono::Utc;
use futures_util::future::BoxFuture;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use studio_common::{TaskInfo, TaskKind, TaskModule, TaskPriority};

use super::DispatchError;

/// Result of one unit of work. The payload is an opaque JSON value; the
/// dispatcher never inspects it.
pub type TaskResult = Result<serde_json::Value, DispatchError>;

/// The unit of work itself. Given the task id and a cancellation token it
/// produces a result or fails. Long-running awaits inside the function are
/// expected to observe the token; the executor additionally races the token
/// and the kind's timeout against it.
pub type WorkFn =
    Box<dyn FnOnce(Uuid, CancellationToken) -> BoxFuture<'static, TaskResult> + Send + 'static>;

/// Caller-provided description of a task. Everything except `id` and
/// `timestamp`, which the dispatcher assigns at enqueue time.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub owner_id: String,
    pub kind: TaskKind,
    pub module: TaskModule,
    pub label: String,
    pub priority: TaskPriority,
    pub tag: Option<String>,
    pub metadata: Option<serde_json::Value>,
    /// Selects the private concurrency lane when true.
    pub own_credential: bool,
}

impl TaskRequest {
    pub fn new(
        owner_id: impl Into<String>,
        kind: TaskKind,
        module: TaskModule,
        label: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            kind,
            module,
            label: label.into(),
            priority: TaskPriority::Low,
            tag: None,
            metadata: None,
            own_credential: false,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_own_credential(mut self, own_credential: bool) -> Self {
        self.own_credential = own_credential;
        self
    }

    /// Materialize the request into a pending task, assigning id and
    /// timestamp.
    pub(crate) fn into_queued(self, outcome: oneshot::Sender<TaskResult>, work: WorkFn) -> QueuedTask {
        QueuedTask {
            info: TaskInfo {
                id: Uuid::new_v4(),
                owner_id: self.owner_id,
                kind: self.kind,
                module: self.module,
                label: self.label,
                priority: self.priority,
                tag: self.tag,
                timestamp: Utc::now(),
                progress: 0,
                own_credential: self.own_credential,
                metadata: self.metadata,
            },
            work,
            outcome,
            cancel: CancellationToken::new(),
        }
    }
}

/// A task sitting in the pending queue. Owns the work function and the
/// outcome channel until the task is either admitted or cancelled.
pub(crate) struct QueuedTask {
    pub info: TaskInfo,
    pub work: WorkFn,
    pub outcome: oneshot::Sender<TaskResult>,
    pub cancel: CancellationToken,
}

/// Bookkeeping entry for an admitted task. The work function and outcome
/// channel have moved to the runner; only the projection and the
/// cancellation handle stay behind.
pub(crate) struct ActiveTask {
    pub info: TaskInfo,
    pub cancel: CancellationToken,
}

/// Handle returned from `enqueue`: the assigned task id plus the channel
/// the eventual outcome arrives on.
pub struct TaskTicket {
    pub id: Uuid,
    outcome: oneshot::Receiver<TaskResult>,
}

impl TaskTicket {
    pub(crate) fn new(id: Uuid, outcome: oneshot::Receiver<TaskResult>) -> Self {
        Self { id, outcome }
    }

    /// Wait for the task to reach a terminal state.
    ///
    /// The outcome channel is resolved exactly once by the dispatcher. A
    /// dropped sender can only mean the dispatcher itself went away, which
    /// is reported as an abort.
    pub async fn outcome(self) -> TaskResult {
        match self.outcome.await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Aborted),
        }
    }
}
