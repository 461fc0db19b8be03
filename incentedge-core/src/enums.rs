//! Enum types for IncentEdge entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// APPLICATION STATUS
// ============================================================================

/// Status of an incentive application in the pipeline.
///
/// Wire format is kebab-case (`"ready-for-review"`), matching the database
/// string representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "kebab-case")]
pub enum ApplicationStatus {
    /// Being drafted by the applicant; the only valid initial state
    #[default]
    Draft,
    /// Checklist generated, application actively being worked
    InProgress,
    /// Complete from the applicant's side, awaiting internal review
    ReadyForReview,
    /// Sent to the program administrator
    Submitted,
    /// Program administrator is reviewing
    UnderReview,
    /// Administrator asked for more information
    AdditionalInfoRequested,
    /// Approved at the requested amount
    Approved,
    /// Approved at a reduced amount
    PartiallyApproved,
    Rejected,
    Withdrawn,
    /// Deadline passed before submission or decision
    Expired,
}

impl ApplicationStatus {
    /// All statuses, in pipeline order.
    pub const ALL: [ApplicationStatus; 11] = [
        ApplicationStatus::Draft,
        ApplicationStatus::InProgress,
        ApplicationStatus::ReadyForReview,
        ApplicationStatus::Submitted,
        ApplicationStatus::UnderReview,
        ApplicationStatus::AdditionalInfoRequested,
        ApplicationStatus::Approved,
        ApplicationStatus::PartiallyApproved,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
        ApplicationStatus::Expired,
    ];

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::InProgress => "in-progress",
            ApplicationStatus::ReadyForReview => "ready-for-review",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under-review",
            ApplicationStatus::AdditionalInfoRequested => "additional-info-requested",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::PartiallyApproved => "partially-approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
            ApplicationStatus::Expired => "expired",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, StatusParseError> {
        match normalize_token(s).as_str() {
            "draft" => Ok(ApplicationStatus::Draft),
            "inprogress" => Ok(ApplicationStatus::InProgress),
            "readyforreview" => Ok(ApplicationStatus::ReadyForReview),
            "submitted" => Ok(ApplicationStatus::Submitted),
            "underreview" => Ok(ApplicationStatus::UnderReview),
            "additionalinforequested" => Ok(ApplicationStatus::AdditionalInfoRequested),
            "approved" => Ok(ApplicationStatus::Approved),
            "partiallyapproved" => Ok(ApplicationStatus::PartiallyApproved),
            "rejected" => Ok(ApplicationStatus::Rejected),
            "withdrawn" => Ok(ApplicationStatus::Withdrawn),
            "expired" => Ok(ApplicationStatus::Expired),
            _ => Err(StatusParseError(s.to_string())),
        }
    }

    /// Decision states carry `decision_date` and optionally `amount_approved`.
    pub fn is_decision(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Approved
                | ApplicationStatus::PartiallyApproved
                | ApplicationStatus::Rejected
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusParseError(pub String);

impl fmt::Display for StatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid application status: {}", self.0)
    }
}

impl std::error::Error for StatusParseError {}

// ============================================================================
// TASK ENUMS
// ============================================================================

/// Status of a checklist task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Blocked,
    Completed,
    Skipped,
    Cancelled,
}

impl TaskStatus {
    /// A satisfied task no longer blocks the required-task gate.
    pub fn is_satisfied(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Skipped | TaskStatus::Cancelled
        )
    }
}

/// Category of a checklist task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    /// Gathering and preparing required documents
    Documentation,
    /// Confirming the project meets program eligibility criteria
    Eligibility,
    /// Preparing and sending the actual submission
    Submission,
    /// Financial modelling, cost estimates
    Financial,
    /// Coordination, scheduling, follow-ups
    #[default]
    General,
}

/// Priority of a checklist task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

// ============================================================================
// PROGRAM / USER ENUMS
// ============================================================================

/// Type of incentive program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "kebab-case")]
pub enum ProgramType {
    TaxCredit,
    Grant,
    Loan,
    Rebate,
}

/// Role of an authenticated user within their organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Member,
    Admin,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

// ============================================================================
// STRING CONVERSIONS
// ============================================================================

fn normalize_token(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Completed => "completed",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "inprogress" => Ok(TaskStatus::InProgress),
            "blocked" => Ok(TaskStatus::Blocked),
            "completed" | "complete" | "done" => Ok(TaskStatus::Completed),
            "skipped" => Ok(TaskStatus::Skipped),
            "cancelled" | "canceled" => Ok(TaskStatus::Cancelled),
            _ => Err(format!("Invalid TaskStatus: {}", s)),
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            TaskCategory::Documentation => "documentation",
            TaskCategory::Eligibility => "eligibility",
            TaskCategory::Submission => "submission",
            TaskCategory::Financial => "financial",
            TaskCategory::General => "general",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for TaskCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "documentation" | "docs" => Ok(TaskCategory::Documentation),
            "eligibility" => Ok(TaskCategory::Eligibility),
            "submission" => Ok(TaskCategory::Submission),
            "financial" | "finance" => Ok(TaskCategory::Financial),
            "general" => Ok(TaskCategory::General),
            _ => Err(format!("Invalid TaskCategory: {}", s)),
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" | "normal" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "urgent" | "critical" => Ok(TaskPriority::Urgent),
            _ => Err(format!("Invalid TaskPriority: {}", s)),
        }
    }
}

impl fmt::Display for ProgramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ProgramType::TaxCredit => "tax-credit",
            ProgramType::Grant => "grant",
            ProgramType::Loan => "loan",
            ProgramType::Rebate => "rebate",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for ProgramType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "taxcredit" => Ok(ProgramType::TaxCredit),
            "grant" => Ok(ProgramType::Grant),
            "loan" => Ok(ProgramType::Loan),
            "rebate" => Ok(ProgramType::Rebate),
            _ => Err(format!("Invalid ProgramType: {}", s)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Role::Member => "member",
            Role::Admin => "admin",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "member" | "user" => Ok(Role::Member),
            "admin" | "administrator" => Ok(Role::Admin),
            _ => Err(format!("Invalid Role: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_db_str_round_trip() {
        for status in ApplicationStatus::ALL {
            let parsed = ApplicationStatus::from_db_str(status.as_db_str()).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_status_parse_normalizes_separators() {
        assert_eq!(
            "ready_for_review".parse::<ApplicationStatus>().unwrap(),
            ApplicationStatus::ReadyForReview
        );
        assert_eq!(
            "Under Review".parse::<ApplicationStatus>().unwrap(),
            ApplicationStatus::UnderReview
        );
        assert!("not-a-status".parse::<ApplicationStatus>().is_err());
    }

    #[test]
    fn test_status_serde_is_kebab_case() {
        let json = serde_json::to_string(&ApplicationStatus::AdditionalInfoRequested).unwrap();
        assert_eq!(json, "\"additional-info-requested\"");
        let back: ApplicationStatus = serde_json::from_str("\"partially-approved\"").unwrap();
        assert_eq!(back, ApplicationStatus::PartiallyApproved);
    }

    #[test]
    fn test_task_status_satisfied() {
        assert!(TaskStatus::Completed.is_satisfied());
        assert!(TaskStatus::Skipped.is_satisfied());
        assert!(TaskStatus::Cancelled.is_satisfied());
        assert!(!TaskStatus::Pending.is_satisfied());
        assert!(!TaskStatus::InProgress.is_satisfied());
        assert!(!TaskStatus::Blocked.is_satisfied());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::Urgent > TaskPriority::High);
        assert!(TaskPriority::High > TaskPriority::Medium);
        assert!(TaskPriority::Medium > TaskPriority::Low);
    }
}
