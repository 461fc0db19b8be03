//! Error Types for the IncentEdge API
//!
//! Defines the structured error response used by every endpoint:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.
//! Transition failures carry enough detail (current status, requested
//! status, allowed alternatives) for the caller to self-correct.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use incentedge_core::{ApplicationStatus, TransitionCheck};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authentication Errors (401, 403)
    // ========================================================================
    /// Request lacks valid authentication credentials
    Unauthorized,

    /// Request is authenticated but lacks permission for the resource
    Forbidden,

    /// Authentication token is invalid or malformed
    InvalidToken,

    /// Authentication token has expired
    TokenExpired,

    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request validation failed
    ValidationFailed,

    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    /// Field format is incorrect
    InvalidFormat,

    /// Requested status change is not in the transition table
    InvalidTransition,

    /// Application is in a terminal status and cannot be modified
    TerminalStatus,

    /// Required checklist tasks are incomplete
    RequiredTasksIncomplete,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Requested entity does not exist
    EntityNotFound,

    /// Requested application does not exist (or belongs to another org)
    ApplicationNotFound,

    /// Requested task does not exist
    TaskNotFound,

    /// Requested comment does not exist
    CommentNotFound,

    /// Requested program does not exist
    ProgramNotFound,

    /// Requested webhook does not exist
    WebhookNotFound,

    // ========================================================================
    // Conflict Errors (409)
    // ========================================================================
    /// Operation conflicts with current state
    StateConflict,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Database operation failed
    DatabaseError,

    /// Service is temporarily unavailable
    ServiceUnavailable,

    /// Database connection pool exhausted
    ConnectionPoolExhausted,

    /// Request rate limit exceeded
    TooManyRequests,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized | ErrorCode::InvalidToken | ErrorCode::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }

            ErrorCode::Forbidden => StatusCode::FORBIDDEN,

            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingField
            | ErrorCode::InvalidFormat
            | ErrorCode::InvalidTransition
            | ErrorCode::TerminalStatus
            | ErrorCode::RequiredTasksIncomplete => StatusCode::BAD_REQUEST,

            ErrorCode::EntityNotFound
            | ErrorCode::ApplicationNotFound
            | ErrorCode::TaskNotFound
            | ErrorCode::CommentNotFound
            | ErrorCode::ProgramNotFound
            | ErrorCode::WebhookNotFound => StatusCode::NOT_FOUND,

            ErrorCode::StateConflict => StatusCode::CONFLICT,

            ErrorCode::ServiceUnavailable | ErrorCode::ConnectionPoolExhausted => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,

            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::Forbidden => "Access forbidden",
            ErrorCode::InvalidToken => "Invalid authentication token",
            ErrorCode::TokenExpired => "Authentication token has expired",

            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::InvalidTransition => "Status transition not allowed",
            ErrorCode::TerminalStatus => "Application is in a terminal status",
            ErrorCode::RequiredTasksIncomplete => "Required tasks are incomplete",

            ErrorCode::EntityNotFound => "Entity not found",
            ErrorCode::ApplicationNotFound => "Application not found",
            ErrorCode::TaskNotFound => "Task not found",
            ErrorCode::CommentNotFound => "Comment not found",
            ErrorCode::ProgramNotFound => "Program not found",
            ErrorCode::WebhookNotFound => "Webhook not found",

            ErrorCode::StateConflict => "Operation conflicts with current state",

            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::ConnectionPoolExhausted => "Connection pool exhausted",
            ErrorCode::TooManyRequests => "Rate limit exceeded",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (field errors, allowed transitions, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Record the transitions already persisted before a multi-hop workflow
    /// failed, so the caller can resume from the right status.
    pub fn with_completed_transitions(
        mut self,
        completed: &[incentedge_core::ApplicationStatus],
    ) -> Self {
        let value = serde_json::json!(completed);
        match self.details.as_mut() {
            Some(serde_json::Value::Object(map)) => {
                map.insert("completed_transitions".to_string(), value);
            }
            _ => {
                self.details = Some(serde_json::json!({ "completed_transitions": value }));
            }
        }
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidToken, message)
    }

    pub fn token_expired() -> Self {
        Self::from_code(ErrorCode::TokenExpired)
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn invalid_format(field: &str, expected: &str) -> Self {
        Self::new(
            ErrorCode::InvalidFormat,
            format!("Field '{}' has invalid format, expected {}", field, expected),
        )
    }

    /// Build an InvalidTransition error from a failed `TransitionCheck`,
    /// attaching the current status, the requested status, and the full
    /// list of reachable statuses.
    pub fn invalid_transition(
        from: Option<ApplicationStatus>,
        to: ApplicationStatus,
        check: &TransitionCheck,
    ) -> Self {
        let code = match check.code {
            Some(incentedge_core::TransitionDenial::TerminalStatus) => ErrorCode::TerminalStatus,
            _ => ErrorCode::InvalidTransition,
        };
        let message = check
            .error
            .clone()
            .unwrap_or_else(|| code.default_message().to_string());

        Self::new(code, message).with_details(serde_json::json!({
            "current_status": from,
            "requested_status": to,
            "valid_transitions": check.valid_transitions,
        }))
    }

    /// Build a RequiredTasksIncomplete error listing the blocking tasks.
    pub fn required_tasks_incomplete(pending: &[String]) -> Self {
        Self::new(
            ErrorCode::RequiredTasksIncomplete,
            "Required tasks must be completed before submission",
        )
        .with_details(serde_json::json!({ "blockers": pending }))
    }

    pub fn entity_not_found(entity_type: &str, id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityNotFound,
            format!("{} with id {} not found", entity_type, id),
        )
    }

    pub fn application_not_found(id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::ApplicationNotFound,
            format!("Application {} not found", id),
        )
    }

    pub fn task_not_found(id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::TaskNotFound, format!("Task {} not found", id))
    }

    pub fn comment_not_found(id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::CommentNotFound,
            format!("Comment {} not found", id),
        )
    }

    pub fn program_not_found(id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::ProgramNotFound,
            format!("Program {} not found", id),
        )
    }

    pub fn webhook_not_found(id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::WebhookNotFound,
            format!("Webhook {} not found", id),
        )
    }

    pub fn state_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StateConflict, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn connection_pool_exhausted() -> Self {
        Self::from_code(ErrorCode::ConnectionPoolExhausted)
    }

    pub fn too_many_requests(retry_after_secs: Option<u64>) -> Self {
        let message = match retry_after_secs {
            Some(secs) => format!("Rate limit exceeded. Retry after {} seconds", secs),
            None => "Rate limit exceeded".to_string(),
        };
        Self::new(ErrorCode::TooManyRequests, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM STANDARD ERRORS
// ============================================================================

/// Convert from tokio_postgres::Error to ApiError.
impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        // Log the full error for debugging
        tracing::error!("Database error: {:?}", err);

        // Return a generic database error to avoid leaking internal details
        ApiError::database_error("Database operation failed")
    }
}

/// Convert from deadpool_postgres::PoolError to ApiError.
impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!("Connection pool error: {:?}", err);

        match err {
            deadpool_postgres::PoolError::Timeout(_) => ApiError::connection_pool_exhausted(),
            deadpool_postgres::PoolError::Closed => {
                ApiError::service_unavailable("Database connection pool is closed")
            }
            _ => ApiError::database_error("Failed to acquire database connection"),
        }
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

/// Convert from uuid::Error to ApiError.
impl From<uuid::Error> for ApiError {
    fn from(err: uuid::Error) -> Self {
        ApiError::invalid_format("id", &format!("valid UUID: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use incentedge_core::validate_transition;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::InvalidTransition.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::TerminalStatus.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::ApplicationNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::StateConflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::InternalError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorCode::TooManyRequests.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_invalid_transition_details() {
        let from = ApplicationStatus::Draft;
        let to = ApplicationStatus::Approved;
        let check = validate_transition(Some(from), to);
        assert!(!check.valid);

        let err = ApiError::invalid_transition(Some(from), to, &check);
        assert_eq!(err.code, ErrorCode::InvalidTransition);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let details = err.details.expect("details present");
        assert_eq!(details["current_status"], "draft");
        assert_eq!(details["requested_status"], "approved");
        let alternatives = details["valid_transitions"].as_array().expect("array");
        assert!(alternatives.iter().any(|v| v == "in-progress"));
    }

    #[test]
    fn test_terminal_transition_maps_to_terminal_code() {
        let from = ApplicationStatus::Rejected;
        let to = ApplicationStatus::Draft;
        let check = validate_transition(Some(from), to);
        let err = ApiError::invalid_transition(Some(from), to, &check);
        assert_eq!(err.code, ErrorCode::TerminalStatus);
    }

    #[test]
    fn test_required_tasks_error_lists_blockers() {
        let err = ApiError::required_tasks_incomplete(&["Gather W-9".to_string()]);
        assert_eq!(err.code, ErrorCode::RequiredTasksIncomplete);
        let details = err.details.expect("details present");
        assert_eq!(details["blockers"][0], "Gather W-9");
    }

    #[test]
    fn test_completed_transitions_merge_into_existing_details() {
        let err = ApiError::required_tasks_incomplete(&["Gather W-9".to_string()])
            .with_completed_transitions(&[ApplicationStatus::InProgress]);

        let details = err.details.expect("details present");
        assert_eq!(details["blockers"][0], "Gather W-9");
        assert_eq!(details["completed_transitions"][0], "in-progress");
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::unauthorized("Invalid token");
        let json = serde_json::to_string(&err)?;

        assert!(json.contains("UNAUTHORIZED"));
        assert!(json.contains("Invalid token"));

        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }
}
