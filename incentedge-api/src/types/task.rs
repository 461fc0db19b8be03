//! Task DTOs, including the bulk operation payloads.

use chrono::NaiveDate;
use incentedge_core::{Task, TaskCategory, TaskGate, TaskId, TaskPriority, TaskStatus, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub category: TaskCategory,
    pub priority: TaskPriority,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub assignee: Option<UserId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date"))]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<TaskCategory>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub assignee: Option<UserId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date"))]
    pub due_date: Option<NaiveDate>,
}

/// Action applied by the bulk task endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum BulkTaskAction {
    Complete,
    Skip,
    Cancel,
    Reassign,
    Reprioritize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BulkTaskRequest {
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<String>))]
    pub task_ids: Vec<TaskId>,
    pub action: BulkTaskAction,
    /// Target user for the reassign action
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub assignee: Option<UserId>,
    /// Target priority for the reprioritize action
    pub priority: Option<TaskPriority>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BulkTaskResponse {
    pub updated: usize,
    pub tasks: Vec<Task>,
}

/// Task list with the current required-task gate result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
    pub gate: TaskGate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_action_wire_form() {
        let json = serde_json::to_string(&BulkTaskAction::Reprioritize).unwrap();
        assert_eq!(json, "\"reprioritize\"");
        let parsed: BulkTaskAction = serde_json::from_str("\"skip\"").unwrap();
        assert_eq!(parsed, BulkTaskAction::Skip);
    }
}
