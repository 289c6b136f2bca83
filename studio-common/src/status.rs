//! Status snapshot types pushed to observers after every dispatcher
//! state transition.

use serde::{Deserialize, Serialize};

use crate::task::{TaskInfo, TaskKind};

/// Aggregate counts over the whole dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedStats {
    /// Active tasks currently performing text analysis.
    pub active_analysis: usize,
    /// Active tasks currently rendering images or video.
    pub active_rendering: usize,
    /// Active tasks currently reasoning over video prompts.
    pub active_reasoning: usize,
    /// Total number of pending tasks across all owners.
    pub total_queued: usize,
}

/// Owner-scoped view of the aggregate counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerStats {
    #[serde(flatten)]
    pub shared: SharedStats,
    /// Pending tasks attributed to the observing owner.
    pub owned_queued: usize,
}

/// Consistent snapshot of queue and active state.
///
/// Every task listed here is the sanitized [`TaskInfo`] projection; the
/// dispatcher never exposes work functions, outcome channels or
/// cancellation tokens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub shared_stats: SharedStats,
    pub owner_stats: OwnerStats,
    pub active_tasks: Vec<TaskInfo>,
    pub queued_tasks: Vec<TaskInfo>,
}

impl StatusSnapshot {
    /// Build a snapshot from the current active and pending task lists.
    pub fn from_tasks(active: Vec<TaskInfo>, queued: Vec<TaskInfo>) -> Self {
        let shared = SharedStats {
            active_analysis: count_kind(&active, TaskKind::Analysis),
            active_rendering: count_kind(&active, TaskKind::Rendering),
            active_reasoning: count_kind(&active, TaskKind::Reasoning),
            total_queued: queued.len(),
        };
        let owner_stats = OwnerStats {
            shared: shared.clone(),
            owned_queued: queued.len(),
        };
        Self {
            shared_stats: shared,
            owner_stats,
            active_tasks: active,
            queued_tasks: queued,
        }
    }

    /// Number of pending tasks submitted by `owner_id`.
    pub fn queued_for_owner(&self, owner_id: &str) -> usize {
        self.queued_tasks
            .iter()
            .filter(|t| t.owner_id == owner_id)
            .count()
    }
}

fn count_kind(tasks: &[TaskInfo], kind: TaskKind) -> usize {
    tasks.iter().filter(|t| t.kind == kind).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskModule, TaskPriority};
    use chrono::Utc;
    use uuid::Uuid;

    fn info(owner: &str, kind: TaskKind) -> TaskInfo {
        TaskInfo {
            id: Uuid::new_v4(),
            owner_id: owner.to_string(),
            kind,
            module: TaskModule::Script,
            label: "test".to_string(),
            priority: TaskPriority::Low,
            tag: None,
            timestamp: Utc::now(),
            progress: 0,
            own_credential: false,
            metadata: None,
        }
    }

    #[test]
    fn test_snapshot_counts_by_kind() {
        let active = vec![
            info("a", TaskKind::Analysis),
            info("a", TaskKind::Analysis),
            info("b", TaskKind::Rendering),
        ];
        let queued = vec![info("a", TaskKind::Reasoning)];

        let snapshot = StatusSnapshot::from_tasks(active, queued);
        assert_eq!(snapshot.shared_stats.active_analysis, 2);
        assert_eq!(snapshot.shared_stats.active_rendering, 1);
        assert_eq!(snapshot.shared_stats.active_reasoning, 0);
        assert_eq!(snapshot.shared_stats.total_queued, 1);
    }

    #[test]
    fn test_queued_for_owner() {
        let queued = vec![
            info("a", TaskKind::Analysis),
            info("b", TaskKind::Analysis),
            info("a", TaskKind::Rendering),
        ];
        let snapshot = StatusSnapshot::from_tasks(vec![], queued);
        assert_eq!(snapshot.queued_for_owner("a"), 2);
        assert_eq!(snapshot.queued_for_owner("c"), 0);
    }

    #[test]
    fn test_owner_stats_flattens_shared() {
        let snapshot = StatusSnapshot::from_tasks(vec![], vec![info("a", TaskKind::Analysis)]);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["owner_stats"]["total_queued"], 1);
        assert_eq!(json["owner_stats"]["owned_queued"], 1);
    }
}
