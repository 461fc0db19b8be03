//! Entity structs for IncentEdge
//!
//! Pure data. Construction and mutation happen at the data-access boundary
//! in the API crate; nothing here touches a database.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{
    ApplicationStatus, ProgramType, TaskCategory, TaskPriority, TaskStatus,
};
use crate::identity::{
    ApplicationId, CommentId, OrgId, ProgramId, ProjectId, TaskId, Timestamp, UserId,
};

// ============================================================================
// APPLICATION
// ============================================================================

/// One submission of a project against one incentive program, tracked
/// through the status pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Application {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: ApplicationId,
    /// Owning organization (the tenant boundary)
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub org_id: OrgId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub project_id: ProjectId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub program_id: ProgramId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub created_by: UserId,
    pub status: ApplicationStatus,
    /// Amount requested in whole cents
    pub amount_requested: Option<i64>,
    /// Amount approved in whole cents; required when entering an approval state
    pub amount_approved: Option<i64>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date"))]
    pub deadline: Option<NaiveDate>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub submission_date: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub decision_date: Option<Timestamp>,
    pub decision_notes: Option<String>,
    pub review_notes: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl Application {
    /// Terminal applications are immutable except through the forced admin path.
    pub fn is_terminal(&self) -> bool {
        crate::transitions::is_terminal(self.status)
    }

    /// Whole days until the deadline, negative when the deadline has passed.
    pub fn days_to_deadline(&self, now: DateTime<Utc>) -> Option<i64> {
        self.deadline
            .map(|d| (d - now.date_naive()).num_days())
    }
}

// ============================================================================
// TASK
// ============================================================================

/// A checklist item scoped to one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Task {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: TaskId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub application_id: ApplicationId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub org_id: OrgId,
    pub title: String,
    pub description: Option<String>,
    pub category: TaskCategory,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub assignee: Option<UserId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date"))]
    pub due_date: Option<NaiveDate>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub completed_at: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

// ============================================================================
// COMMENT
// ============================================================================

/// A threaded note on an application. System comments are generated on
/// status changes. Soft-deleted, never hard-deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Comment {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: CommentId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub application_id: ApplicationId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub org_id: OrgId,
    /// None for system-generated comments
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub author: Option<UserId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub parent_comment_id: Option<CommentId>,
    pub body: String,
    /// Emoji -> reacting user ids
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub reactions: serde_json::Value,
    pub is_system: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub deleted_at: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl Comment {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

// ============================================================================
// STATUS HISTORY
// ============================================================================

/// Append-only audit row: one per recorded transition attempt (validated or
/// forced).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatusHistoryRecord {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: crate::identity::EntityId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub application_id: ApplicationId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub org_id: OrgId,
    /// None for the creation record
    pub from_status: Option<ApplicationStatus>,
    pub to_status: ApplicationStatus,
    pub reason: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub actor: UserId,
    /// True when an admin bypassed the adjacency check
    pub forced: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

// ============================================================================
// PROGRAM
// ============================================================================

/// A government/utility incentive offering that applications target.
/// Read-mostly reference data imported from the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Program {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: ProgramId,
    pub name: String,
    /// Administering body, e.g. "NYSERDA", "Department of Energy"
    pub provider: String,
    pub program_type: ProgramType,
    /// Free-text funding description as scraped ("Up to $5M", "30% credit")
    pub funding_amount: Option<String>,
    /// Fixed application deadline, when the program publishes one
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date"))]
    pub deadline: Option<NaiveDate>,
    /// Default application window in days for rolling programs
    pub default_window_days: Option<i32>,
    pub eligibility: Option<String>,
    pub source_url: Option<String>,
    pub active: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn sample_application(status: ApplicationStatus) -> Application {
        let now = Utc::now();
        Application {
            id: Uuid::now_v7(),
            org_id: Uuid::now_v7(),
            project_id: Uuid::now_v7(),
            program_id: Uuid::now_v7(),
            created_by: Uuid::now_v7(),
            status,
            amount_requested: Some(250_000_00),
            amount_approved: None,
            deadline: None,
            submission_date: None,
            decision_date: None,
            decision_notes: None,
            review_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_terminal_check_follows_status() {
        assert!(!sample_application(ApplicationStatus::Draft).is_terminal());
        assert!(sample_application(ApplicationStatus::Approved).is_terminal());
        assert!(sample_application(ApplicationStatus::Withdrawn).is_terminal());
    }

    #[test]
    fn test_days_to_deadline() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut app = sample_application(ApplicationStatus::Draft);
        assert_eq!(app.days_to_deadline(now), None);

        app.deadline = NaiveDate::from_ymd_opt(2026, 3, 31);
        assert_eq!(app.days_to_deadline(now), Some(30));

        app.deadline = NaiveDate::from_ymd_opt(2026, 2, 27);
        assert_eq!(app.days_to_deadline(now), Some(-2));
    }
}
