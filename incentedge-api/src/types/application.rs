//! Application DTOs.

use chrono::NaiveDate;
use incentedge_core::{Application, ApplicationStatus, ProgramId, ProjectId};
use serde::{Deserialize, Serialize};

/// Request to create an application. Status is fixed at draft; the deadline
/// defaults from the program when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateApplicationRequest {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub project_id: ProjectId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub program_id: ProgramId,
    /// Amount requested in whole cents
    pub amount_requested: Option<i64>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date"))]
    pub deadline: Option<NaiveDate>,
    pub review_notes: Option<String>,
}

/// Request to update an application's mutable fields. Status changes go
/// through the status endpoint, not here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateApplicationRequest {
    /// Amount requested in whole cents
    pub amount_requested: Option<i64>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date"))]
    pub deadline: Option<NaiveDate>,
    pub review_notes: Option<String>,
}

impl UpdateApplicationRequest {
    pub fn is_empty(&self) -> bool {
        self.amount_requested.is_none() && self.deadline.is_none() && self.review_notes.is_none()
    }
}

/// Query parameters for listing applications.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct ApplicationListQuery {
    pub status: Option<ApplicationStatus>,
    #[cfg_attr(feature = "openapi", param(value_type = Option<String>, format = "uuid"))]
    pub project_id: Option<ProjectId>,
    #[cfg_attr(feature = "openapi", param(value_type = Option<String>, format = "uuid"))]
    pub program_id: Option<ProgramId>,
    /// Case-insensitive substring match against review notes
    pub search: Option<String>,
    /// Sort order: "created_at" (default), "updated_at", "deadline"
    pub sort: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ApplicationListQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 200)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    /// Resolve the sort parameter to a whitelisted column name.
    pub fn sort_column(&self) -> &'static str {
        match self.sort.as_deref() {
            Some("updated_at") => "updated_at",
            Some("deadline") => "deadline",
            _ => "created_at",
        }
    }
}

/// Application detail with computed fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApplicationResponse {
    #[serde(flatten)]
    pub application: Application,
    /// Whole days until the deadline, negative when past
    pub days_to_deadline: Option<i64>,
    /// Fraction of tasks satisfied, 0-100; None when no tasks exist
    pub completion_pct: Option<f64>,
    /// Statuses reachable from the current status
    pub valid_transitions: Vec<ApplicationStatus>,
}

/// Paginated application list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApplicationListResponse {
    pub applications: Vec<Application>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_defaults() {
        let q = ApplicationListQuery::default();
        assert_eq!(q.limit(), 50);
        assert_eq!(q.offset(), 0);
        assert_eq!(q.sort_column(), "created_at");
    }

    #[test]
    fn test_list_query_clamps() {
        let q = ApplicationListQuery {
            limit: Some(100_000),
            offset: Some(-5),
            sort: Some("drop table".to_string()),
            ..Default::default()
        };
        assert_eq!(q.limit(), 200);
        assert_eq!(q.offset(), 0);
        // Unknown sort values fall back to the default column
        assert_eq!(q.sort_column(), "created_at");
    }

    #[test]
    fn test_update_request_emptiness() {
        assert!(UpdateApplicationRequest::default().is_empty());
        let req = UpdateApplicationRequest {
            amount_requested: Some(1_000_00),
            ..Default::default()
        };
        assert!(!req.is_empty());
    }
}
