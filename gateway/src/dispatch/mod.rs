//! Task dispatch for the studio gateway.
//!
//! This module provides:
//! - The pending queue and active-task bookkeeping
//! - Admission control (credential lanes and module serialization)
//! - A timeout- and cancellation-aware executor
//! - Live status broadcast to observers

mod admission;
mod broadcast;
mod dispatcher;
mod executor;
mod task;

pub use admission::AdmissionPolicy;
pub use dispatcher::Dispatcher;
pub use executor::{LocalExecutor, TaskExecutor};
pub use task::{TaskRequest, TaskResult, TaskTicket, WorkFn};

/// Terminal outcome kinds for a dispatched task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// Execution exceeded the timeout for the task's kind.
    #[error("task timed out: {0}")]
    Timeout(String),
    /// The cancellation token was signaled while the task was active.
    #[error("task aborted")]
    Aborted,
    /// The owner explicitly cancelled the task before it started.
    #[error("task cancelled by owner")]
    Cancelled,
    /// The owner stopped all of their work in bulk.
    #[error("task stopped")]
    Stopped,
    /// The work function itself failed; propagated to the caller verbatim.
    #[error("upstream failure: {0}")]
    Upstream(String),
}

impl DispatchError {
    /// True for outcomes that represent intentional, caller-initiated
    /// termination rather than genuine failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            DispatchError::Aborted | DispatchError::Cancelled | DispatchError::Stopped
        )
    }
}
