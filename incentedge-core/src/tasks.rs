//! Required-task gate
//!
//! Advisory, read-only input to the workflow service. The route layer
//! decides whether to block on it, with a `force` escape for admins.

use serde::{Deserialize, Serialize};

use crate::entities::Task;
use crate::enums::{TaskCategory, TaskPriority};

/// The explicit rule for which tasks gate submission: priority urgent/high
/// within the categories that feed the actual submission package.
pub fn is_required_task(task: &Task) -> bool {
    matches!(task.priority, TaskPriority::Urgent | TaskPriority::High)
        && matches!(
            task.category,
            TaskCategory::Documentation | TaskCategory::Eligibility | TaskCategory::Submission
        )
}

/// Result of evaluating the required-task gate for an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TaskGate {
    pub all_completed: bool,
    /// Titles of required tasks that are still unsatisfied
    pub pending_tasks: Vec<String>,
}

/// Evaluate the gate over an application's checklist.
///
/// A required task is satisfied when completed, skipped, or cancelled.
pub fn required_tasks_gate(tasks: &[Task]) -> TaskGate {
    let pending_tasks: Vec<String> = tasks
        .iter()
        .filter(|t| is_required_task(t) && !t.status.is_satisfied())
        .map(|t| t.title.clone())
        .collect();

    TaskGate {
        all_completed: pending_tasks.is_empty(),
        pending_tasks,
    }
}
