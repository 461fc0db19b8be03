//! Error types for IncentEdge domain operations

use thiserror::Error;
use uuid::Uuid;

use crate::enums::ApplicationStatus;

/// Validation errors raised by the domain layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Workflow errors raised by the state machine and its callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Cannot move from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },

    #[error("Application {id} is {status} and can no longer change status")]
    TerminalStatus {
        id: Uuid,
        status: ApplicationStatus,
    },

    #[error("Required tasks incomplete: {pending:?}")]
    RequiredTasksIncomplete { pending: Vec<String> },

    #[error("Transition to {to} requires field {field}")]
    MissingTransitionField {
        to: ApplicationStatus,
        field: String,
    },

    #[error("No submission path from {from}")]
    NotSubmittable { from: ApplicationStatus },
}

/// Top-level error enum wrapping domain error categories.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IncentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}
