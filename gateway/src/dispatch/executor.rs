//! Task execution with per-kind timeouts and cooperative cancellation.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use studio_common::TaskInfo;

use super::task::{TaskResult, WorkFn};
use super::DispatchError;
use crate::config::TimeoutsConfig;

/// Runs a task's work function to completion or failure.
///
/// Implementations enforce the timeout for the task's kind and honor the
/// cancellation token; whichever of completion, timeout and cancellation
/// resolves first wins.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, info: &TaskInfo, work: WorkFn, cancel: CancellationToken)
        -> TaskResult;
}

/// In-process executor.
pub struct LocalExecutor {
    timeouts: TimeoutsConfig,
}

impl LocalExecutor {
    pub fn new(timeouts: TimeoutsConfig) -> Self {
        Self { timeouts }
    }
}

#[async_trait]
impl TaskExecutor for LocalExecutor {
    async fn execute(
        &self,
        info: &TaskInfo,
        work: WorkFn,
        cancel: CancellationToken,
    ) -> TaskResult {
        // A token signaled before execution starts means the work function
        // must never run.
        if cancel.is_cancelled() {
            return Err(DispatchError::Aborted);
        }

        let timeout = self.timeouts.for_kind(info.kind);
        let work_future = work(info.id, cancel.clone());

        // The losing select branches are dropped, which releases the timer
        // and the token listener.
        tokio::select! {
            result = work_future => result,
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(
                    task_id = %info.id,
                    kind = %info.kind,
                    timeout_ms = timeout.as_millis() as u64,
                    "task timed out"
                );
                Err(DispatchError::Timeout(info.label.clone()))
            }
            _ = cancel.cancelled() => Err(DispatchError::Aborted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use studio_common::{TaskKind, TaskModule, TaskPriority};
    use uuid::Uuid;

    fn test_info(kind: TaskKind) -> TaskInfo {
        TaskInfo {
            id: Uuid::new_v4(),
            owner_id: "owner".to_string(),
            kind,
            module: TaskModule::Script,
            label: "unit test task".to_string(),
            priority: TaskPriority::Low,
            tag: None,
            timestamp: Utc::now(),
            progress: 0,
            own_credential: false,
            metadata: None,
        }
    }

    fn short_timeouts() -> TimeoutsConfig {
        TimeoutsConfig {
            analysis_ms: 50,
            rendering_ms: 50,
            reasoning_ms: 50,
        }
    }

    #[tokio::test]
    async fn test_execute_success() {
        let executor = LocalExecutor::new(TimeoutsConfig::default());
        let info = test_info(TaskKind::Analysis);

        let work: WorkFn =
            Box::new(|_, _| Box::pin(async { Ok(serde_json::json!({"ok": true})) }));
        let result = executor
            .execute(&info, work, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result["ok"], true);
    }

    #[tokio::test]
    async fn test_execute_upstream_error_propagates() {
        let executor = LocalExecutor::new(TimeoutsConfig::default());
        let info = test_info(TaskKind::Analysis);

        let work: WorkFn = Box::new(|_, _| {
            Box::pin(async { Err(DispatchError::Upstream("provider 500".to_string())) })
        });
        let result = executor.execute(&info, work, CancellationToken::new()).await;
        assert_eq!(result, Err(DispatchError::Upstream("provider 500".to_string())));
    }

    #[tokio::test]
    async fn test_execute_timeout_includes_label() {
        let executor = LocalExecutor::new(short_timeouts());
        let info = test_info(TaskKind::Reasoning);

        let work: WorkFn = Box::new(|_, _| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(serde_json::Value::Null)
            })
        });
        let result = executor.execute(&info, work, CancellationToken::new()).await;
        assert_eq!(result, Err(DispatchError::Timeout("unit test task".to_string())));
    }

    #[tokio::test]
    async fn test_execute_aborts_on_cancellation() {
        let executor = LocalExecutor::new(TimeoutsConfig::default());
        let info = test_info(TaskKind::Rendering);
        let token = CancellationToken::new();

        let work: WorkFn = Box::new(|_, _| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(serde_json::Value::Null)
            })
        });

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let result = executor.execute(&info, work, token).await;
        assert_eq!(result, Err(DispatchError::Aborted));
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_skips_work_function() {
        let executor = LocalExecutor::new(TimeoutsConfig::default());
        let info = test_info(TaskKind::Analysis);
        let token = CancellationToken::new();
        token.cancel();

        let invoked = Arc::new(AtomicBool::new(false));
        let invoked_clone = invoked.clone();
        let work: WorkFn = Box::new(move |_, _| {
            invoked_clone.store(true, Ordering::SeqCst);
            Box::pin(async { Ok(serde_json::Value::Null) })
        });

        let result = executor.execute(&info, work, token).await;
        assert_eq!(result, Err(DispatchError::Aborted));
        assert!(!invoked.load(Ordering::SeqCst));
    }
}
