//! Status change and submission DTOs.

use incentedge_core::{Application, ApplicationStatus, StatusHistoryRecord, TaskGate};
use serde::{Deserialize, Serialize};

/// Request to change an application's status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatusChangeRequest {
    pub status: ApplicationStatus,
    /// Free-text reason recorded in history and the system comment
    pub reason: Option<String>,
    /// Admin-only: bypass the adjacency check and the task gate
    #[serde(default)]
    pub force: bool,
    /// Amount approved in whole cents; required when entering approval states
    pub amount_approved: Option<i64>,
    /// Decision notes for approval/rejection states
    pub decision_notes: Option<String>,
}

/// Current status plus history and reachable statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatusResponse {
    pub status: ApplicationStatus,
    pub valid_transitions: Vec<ApplicationStatus>,
    pub history: Vec<StatusHistoryRecord>,
}

/// Result of a status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatusChangeResponse {
    pub application: Application,
    pub history: StatusHistoryRecord,
    /// Present when the transition was forced
    pub warning: Option<String>,
}

/// Request to run the submission workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SubmitRequest {
    /// Admin-only: skip the required-task gate
    #[serde(default)]
    pub force: bool,
    pub notes: Option<String>,
}

/// Readiness check result for GET /submit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReadinessResponse {
    pub ready: bool,
    /// Unsatisfied required tasks and any structural blockers
    pub blockers: Vec<String>,
    pub warnings: Vec<String>,
    /// Hop path that submission would walk, ending at submitted
    pub path: Vec<ApplicationStatus>,
    pub gate: TaskGate,
}

/// Result of running the submission workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SubmitResponse {
    pub application: Application,
    /// Hops completed, in order. On mid-path failure the error details carry
    /// this list instead so callers can retry from the right point.
    pub completed_transitions: Vec<ApplicationStatus>,
    pub warning: Option<String>,
}
