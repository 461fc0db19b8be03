//! Application status state machine
//!
//! The transition table is the single source of truth for which status
//! changes are legal. Validation is pure: callers (the workflow service)
//! evaluate per-transition preconditions and the forced admin path on top
//! of it.

use serde::{Deserialize, Serialize};

use crate::enums::ApplicationStatus;

// ============================================================================
// TRANSITION TABLE
// ============================================================================

/// Legal outbound transitions per status. Terminal statuses have none.
pub fn valid_transitions(from: ApplicationStatus) -> &'static [ApplicationStatus] {
    use ApplicationStatus::*;
    match from {
        Draft => &[InProgress, Withdrawn, Expired],
        InProgress => &[ReadyForReview, Withdrawn, Expired],
        ReadyForReview => &[Submitted, InProgress, Withdrawn, Expired],
        Submitted => &[UnderReview, Withdrawn],
        UnderReview => &[
            AdditionalInfoRequested,
            Approved,
            PartiallyApproved,
            Rejected,
            Withdrawn,
        ],
        AdditionalInfoRequested => &[UnderReview, Withdrawn, Expired],
        Approved | PartiallyApproved | Rejected | Withdrawn | Expired => &[],
    }
}

/// Terminal statuses have no outbound transitions except by forced admin
/// override.
pub fn is_terminal(status: ApplicationStatus) -> bool {
    valid_transitions(status).is_empty()
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Machine-readable reason a transition was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum TransitionDenial {
    /// The requested status is not reachable from the current one
    InvalidTransition,
    /// The application is in a terminal status
    TerminalStatus,
    /// `from = None` with a target other than draft
    InvalidInitialStatus,
}

/// Result of validating a single status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TransitionCheck {
    pub valid: bool,
    /// Human-readable denial reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<TransitionDenial>,
    /// Statuses that *are* reachable from the current one, so callers can
    /// present alternatives
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_transitions: Option<Vec<ApplicationStatus>>,
}

impl TransitionCheck {
    fn ok() -> Self {
        Self {
            valid: true,
            error: None,
            code: None,
            valid_transitions: None,
        }
    }

    fn denied(code: TransitionDenial, error: String, alternatives: Vec<ApplicationStatus>) -> Self {
        Self {
            valid: false,
            error: Some(error),
            code: Some(code),
            valid_transitions: Some(alternatives),
        }
    }
}

/// Validate a transition against the adjacency table.
///
/// `from = None` models application creation and is only valid when
/// `to = draft`. The forced admin path is handled by the caller; this
/// function knows nothing about roles.
pub fn validate_transition(
    from: Option<ApplicationStatus>,
    to: ApplicationStatus,
) -> TransitionCheck {
    let Some(from) = from else {
        if to == ApplicationStatus::Draft {
            return TransitionCheck::ok();
        }
        return TransitionCheck::denied(
            TransitionDenial::InvalidInitialStatus,
            format!("New applications must start in draft, not {}", to),
            vec![ApplicationStatus::Draft],
        );
    };

    let allowed = valid_transitions(from);
    if allowed.contains(&to) {
        return TransitionCheck::ok();
    }

    if is_terminal(from) {
        return TransitionCheck::denied(
            TransitionDenial::TerminalStatus,
            format!("Application is {} and can no longer change status", from),
            Vec::new(),
        );
    }

    TransitionCheck::denied(
        TransitionDenial::InvalidTransition,
        format!("Cannot move from {} to {}", from, to),
        allowed.to_vec(),
    )
}

// ============================================================================
// SUBMISSION PATH
// ============================================================================

/// The ordered hops needed to reach `submitted` from the given status.
///
/// Returns `None` when no forward path to submission exists (already past
/// submission, or terminal). An empty slice means the application is already
/// submitted.
pub fn submission_path(from: ApplicationStatus) -> Option<&'static [ApplicationStatus]> {
    use ApplicationStatus::*;
    match from {
        Draft => Some(&[InProgress, ReadyForReview, Submitted]),
        InProgress => Some(&[ReadyForReview, Submitted]),
        ReadyForReview => Some(&[Submitted]),
        Submitted => Some(&[]),
        _ => None,
    }
}
