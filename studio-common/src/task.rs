//! Task vocabulary shared between the gateway and its observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of model work a task performs.
///
/// The kind determines the execution timeout applied by the gateway; it has
/// no influence on queue ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    /// Text analysis against a chat-completion model.
    Analysis,
    /// Image or video generation.
    Rendering,
    /// Video-prompt reasoning - shorter calls, tighter timeout.
    Reasoning,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Analysis => write!(f, "ANALYSIS"),
            TaskKind::Rendering => write!(f, "RENDERING"),
            TaskKind::Reasoning => write!(f, "REASONING"),
        }
    }
}

/// Logical resource group a task belongs to.
///
/// Modules serialize related work within the shared lane: each module has an
/// independent concurrency cap so a burst of script analysis cannot crowd out
/// storyboard rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskModule {
    Script,
    Storyboard,
    Assets,
    System,
}

impl std::fmt::Display for TaskModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskModule::Script => write!(f, "SCRIPT"),
            TaskModule::Storyboard => write!(f, "STORYBOARD"),
            TaskModule::Assets => write!(f, "ASSETS"),
            TaskModule::System => write!(f, "SYSTEM"),
        }
    }
}

/// Queue priority. High-priority tasks queue ahead of all low-priority
/// work while keeping FIFO order among themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    High,
    #[default]
    Low,
}

/// Sanitized projection of a task, safe to expose to observers.
///
/// Carries every task field except the work function, the outcome channel
/// and the cancellation token - internal execution machinery never leaves
/// the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Unique task identifier, assigned at enqueue time.
    pub id: Uuid,
    /// Identity of the submitter; scopes cancellation.
    pub owner_id: String,
    pub kind: TaskKind,
    pub module: TaskModule,
    /// Human-readable description, display only.
    pub label: String,
    pub priority: TaskPriority,
    /// Optional cohort marker enabling bulk cancellation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Creation time, used for display ordering only.
    pub timestamp: DateTime<Utc>,
    /// Completion estimate 0-100, updated by the running work function.
    pub progress: u8,
    /// Whether the task runs in the private lane (caller-supplied credential).
    pub own_credential: bool,
    /// Opaque owner-supplied annotation, passed through unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}
