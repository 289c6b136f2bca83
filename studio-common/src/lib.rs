pub mod status;
pub mod task;

pub use status::{OwnerStats, SharedStats, StatusSnapshot};
pub use task::{TaskInfo, TaskKind, TaskModule, TaskPriority};
