//! Workflow Orchestrator
//!
//! Status changes split into a pure planning step and a persistence step.
//! `plan_transition` validates the request against the state machine, the
//! task gate, and the status-specific preconditions, and returns everything
//! the executor needs: field updates, the history row, the system comment,
//! and the warning for forced transitions. `WorkflowService` executes plans
//! against the DbClient and emits events.

use chrono::{Days, NaiveDate, Utc};
use serde_json::json;

use crate::auth::AuthContext;
use crate::db::{DbClient, StatusFieldUpdates};
use crate::error::{ApiError, ApiResult};
use crate::events::{DomainEvent, EventBus};
use crate::notify;
use crate::types::*;
use incentedge_core::{
    required_tasks_gate, submission_path, validate_transition, Application, ApplicationId,
    ApplicationStatus, Program, StatusHistoryRecord, TaskGate, Timestamp,
};

// ============================================================================
// PLANNING (PURE)
// ============================================================================

/// Options accompanying a transition request.
#[derive(Debug, Clone, Default)]
pub struct TransitionOptions {
    pub reason: Option<String>,
    pub force: bool,
    pub amount_approved: Option<i64>,
    pub decision_notes: Option<String>,
}

impl From<&StatusChangeRequest> for TransitionOptions {
    fn from(req: &StatusChangeRequest) -> Self {
        Self {
            reason: req.reason.clone(),
            force: req.force,
            amount_approved: req.amount_approved,
            decision_notes: req.decision_notes.clone(),
        }
    }
}

/// Everything the executor needs to persist one transition.
#[derive(Debug, Clone)]
pub struct TransitionPlan {
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
    pub forced: bool,
    pub updates: StatusFieldUpdates,
    pub warning: Option<String>,
    pub reason: Option<String>,
    pub system_comment: String,
}

/// Validate and plan a single status transition. Pure; no I/O.
///
/// The gate is only consulted when entering `submitted`. Forced transitions
/// are admin-only and bypass both the adjacency check and the gate, the one
/// escape hatch out of terminal states.
pub fn plan_transition(
    application: &Application,
    to: ApplicationStatus,
    gate: &TaskGate,
    opts: &TransitionOptions,
    is_admin: bool,
    now: Timestamp,
) -> ApiResult<TransitionPlan> {
    let from = application.status;

    if opts.force {
        if !is_admin {
            return Err(ApiError::forbidden(
                "Forced transitions require the admin role",
            ));
        }
    } else {
        let check = validate_transition(Some(from), to);
        if !check.valid {
            return Err(ApiError::invalid_transition(Some(from), to, &check));
        }

        if to == ApplicationStatus::Submitted && !gate.all_completed {
            return Err(ApiError::required_tasks_incomplete(&gate.pending_tasks));
        }
    }

    // Decision states need the decision amount in the same request
    if matches!(
        to,
        ApplicationStatus::Approved | ApplicationStatus::PartiallyApproved
    ) && opts.amount_approved.is_none()
    {
        return Err(ApiError::missing_field("amount_approved"));
    }

    let mut updates = StatusFieldUpdates::default();
    match to {
        ApplicationStatus::Submitted => {
            updates.submission_date = Some(now);
        }
        ApplicationStatus::Approved
        | ApplicationStatus::PartiallyApproved
        | ApplicationStatus::Rejected => {
            updates.decision_date = Some(now);
            updates.amount_approved = opts.amount_approved;
            updates.decision_notes = opts.decision_notes.clone();
        }
        _ => {}
    }

    let warning = opts.force.then(|| {
        format!(
            "Forced transition from {} to {} bypassed workflow validation",
            from, to
        )
    });

    let system_comment = match &opts.reason {
        Some(reason) => format!("Status changed from {} to {}: {}", from, to, reason),
        None => format!("Status changed from {} to {}", from, to),
    };

    Ok(TransitionPlan {
        from,
        to,
        forced: opts.force,
        updates,
        warning,
        reason: opts.reason.clone(),
        system_comment,
    })
}

/// Effective deadline for a new application: the program's fixed deadline,
/// else today plus the program's default window (90 days when unspecified).
pub fn calculate_deadline(program: &Program, today: NaiveDate) -> NaiveDate {
    if let Some(deadline) = program.deadline {
        return deadline;
    }
    let window = program.default_window_days.unwrap_or(90).max(0) as u64;
    today
        .checked_add_days(Days::new(window))
        .unwrap_or(NaiveDate::MAX)
}

// ============================================================================
// SERVICE (EXECUTION)
// ============================================================================

/// Executes transition plans against the database and emits domain events.
#[derive(Clone)]
pub struct WorkflowService {
    db: DbClient,
    events: EventBus,
}

impl WorkflowService {
    pub fn new(db: DbClient, events: EventBus) -> Self {
        Self { db, events }
    }

    async fn load_application(
        &self,
        id: ApplicationId,
        auth: &AuthContext,
    ) -> ApiResult<Application> {
        self.db
            .application_get(id, auth.org_id)
            .await?
            .ok_or_else(|| ApiError::application_not_found(id))
    }

    async fn load_gate(&self, id: ApplicationId, auth: &AuthContext) -> ApiResult<TaskGate> {
        let tasks = self.db.task_list(id, auth.org_id).await?;
        Ok(required_tasks_gate(&tasks))
    }

    /// Persist one planned transition: status row, history, system comment,
    /// notification, events. The comment and notification are side effects
    /// with log-and-continue semantics; history is not.
    async fn execute_plan(
        &self,
        application: &Application,
        plan: &TransitionPlan,
        auth: &AuthContext,
    ) -> ApiResult<(Application, StatusHistoryRecord)> {
        let updated = self
            .db
            .application_apply_transition(application.id, auth.org_id, plan.to, &plan.updates)
            .await?
            .ok_or_else(|| ApiError::application_not_found(application.id))?;

        let history = self
            .db
            .status_history_append(
                application.id,
                auth.org_id,
                Some(plan.from),
                plan.to,
                plan.reason.as_deref(),
                auth.user_id,
                plan.forced,
            )
            .await?;

        if let Err(e) = self
            .db
            .comment_create(application.id, auth.org_id, None, None, &plan.system_comment)
            .await
        {
            tracing::warn!(
                application_id = %application.id,
                error = %e,
                "Failed to create system comment for status change"
            );
        }

        // The creator hears about changes made by someone else
        if application.created_by != auth.user_id {
            notify::notify_user(
                &self.db,
                auth.org_id,
                application.created_by,
                application.id,
                format!("Application status changed to {}", plan.to),
            );
        }

        notify::log_activity(
            &self.db,
            auth.org_id,
            auth.user_id,
            application.id,
            "status_changed",
            json!({
                "from": plan.from,
                "to": plan.to,
                "forced": plan.forced,
            }),
        );

        self.events.publish(DomainEvent::StatusChanged {
            application_id: application.id,
            org_id: auth.org_id,
            from: Some(plan.from),
            to: plan.to,
            forced: plan.forced,
        });
        match plan.to {
            ApplicationStatus::Submitted => {
                self.events.publish(DomainEvent::ApplicationSubmitted {
                    application: updated.clone(),
                });
            }
            ApplicationStatus::Approved | ApplicationStatus::PartiallyApproved => {
                self.events.publish(DomainEvent::ApplicationApproved {
                    application: updated.clone(),
                });
            }
            ApplicationStatus::Rejected => {
                self.events.publish(DomainEvent::ApplicationRejected {
                    application: updated.clone(),
                });
            }
            _ => {}
        }

        tracing::info!(
            application_id = %application.id,
            org_id = %auth.org_id,
            actor_id = %auth.user_id,
            from = %plan.from,
            to = %plan.to,
            forced = plan.forced,
            "Application status changed"
        );

        Ok((updated, history))
    }

    /// Change an application's status.
    pub async fn change_status(
        &self,
        auth: &AuthContext,
        application_id: ApplicationId,
        req: &StatusChangeRequest,
    ) -> ApiResult<StatusChangeResponse> {
        let application = self.load_application(application_id, auth).await?;
        let gate = self.load_gate(application_id, auth).await?;

        let opts = TransitionOptions::from(req);
        let plan = plan_transition(
            &application,
            req.status,
            &gate,
            &opts,
            auth.is_admin(),
            Utc::now(),
        )?;

        let (updated, history) = self.execute_plan(&application, &plan, auth).await?;

        Ok(StatusChangeResponse {
            application: updated,
            history,
            warning: plan.warning,
        })
    }

    /// Start the workflow: draft -> in-progress, then generate the default
    /// task checklist from the linked program.
    pub async fn start_workflow(
        &self,
        auth: &AuthContext,
        application_id: ApplicationId,
    ) -> ApiResult<StatusChangeResponse> {
        let application = self.load_application(application_id, auth).await?;
        let gate = self.load_gate(application_id, auth).await?;

        let opts = TransitionOptions {
            reason: Some("Workflow started".to_string()),
            ..Default::default()
        };
        let plan = plan_transition(
            &application,
            ApplicationStatus::InProgress,
            &gate,
            &opts,
            auth.is_admin(),
            Utc::now(),
        )?;

        let (updated, history) = self.execute_plan(&application, &plan, auth).await?;

        // Seed the checklist; a failure here leaves a started workflow with
        // no tasks, which the caller can add manually
        if let Some(program) = self.db.program_get(application.program_id).await? {
            for task_req in super::checklist::default_tasks(&program) {
                if let Err(e) = self
                    .db
                    .task_create(application_id, auth.org_id, &task_req)
                    .await
                {
                    tracing::warn!(
                        application_id = %application_id,
                        title = %task_req.title,
                        error = %e,
                        "Failed to create default checklist task"
                    );
                }
            }
        }

        Ok(StatusChangeResponse {
            application: updated,
            history,
            warning: plan.warning,
        })
    }

    /// Readiness check: what POST /submit would do, without doing it.
    pub async fn readiness(
        &self,
        auth: &AuthContext,
        application_id: ApplicationId,
    ) -> ApiResult<ReadinessResponse> {
        let application = self.load_application(application_id, auth).await?;
        let gate = self.load_gate(application_id, auth).await?;

        let mut blockers = Vec::new();
        let mut warnings = Vec::new();

        let path: Vec<ApplicationStatus> = match submission_path(application.status) {
            Some(path) if path.is_empty() => {
                blockers.push("Application has already been submitted".to_string());
                Vec::new()
            }
            Some(path) => path.to_vec(),
            None => {
                blockers.push(format!(
                    "No submission path from status {}",
                    application.status
                ));
                Vec::new()
            }
        };

        blockers.extend(gate.pending_tasks.iter().cloned());

        if application.amount_requested.is_none() {
            warnings.push("No requested amount set".to_string());
        }
        if let Some(days) = application.days_to_deadline(Utc::now()) {
            if days < 0 {
                warnings.push("Program deadline has passed".to_string());
            } else if days <= 7 {
                warnings.push(format!("Deadline in {} days", days));
            }
        }

        Ok(ReadinessResponse {
            ready: blockers.is_empty(),
            blockers,
            warnings,
            path,
            gate,
        })
    }

    /// Run the submission workflow: walk the hop path to `submitted`,
    /// validating and persisting each hop. A mid-path failure reports the
    /// completed hops so the caller can retry from the right point.
    pub async fn submit(
        &self,
        auth: &AuthContext,
        application_id: ApplicationId,
        req: &SubmitRequest,
    ) -> ApiResult<SubmitResponse> {
        let application = self.load_application(application_id, auth).await?;
        let gate = self.load_gate(application_id, auth).await?;

        let path = match submission_path(application.status) {
            Some(path) if path.is_empty() => {
                return Err(ApiError::state_conflict(
                    "Application has already been submitted",
                ));
            }
            Some(path) => path,
            None => {
                let check = validate_transition(Some(application.status), ApplicationStatus::Submitted);
                return Err(ApiError::invalid_transition(
                    Some(application.status),
                    ApplicationStatus::Submitted,
                    &check,
                ));
            }
        };

        if req.force && !auth.is_admin() {
            return Err(ApiError::forbidden(
                "Skipping the task gate requires the admin role",
            ));
        }

        // The gate is checked once, up front; force skips it
        if !req.force && !gate.all_completed {
            return Err(ApiError::required_tasks_incomplete(&gate.pending_tasks));
        }

        let mut current = application;
        let mut completed: Vec<ApplicationStatus> = Vec::new();
        let mut warning = None;

        for &hop in path {
            let opts = TransitionOptions {
                reason: req.notes.clone(),
                force: req.force,
                ..Default::default()
            };
            // Hops come from the legal submission path; a forced submit
            // carries `force` into each hop so the gate stays skipped and
            // the history rows record it
            let plan = match plan_transition(&current, hop, &gate, &opts, auth.is_admin(), Utc::now())
            {
                Ok(plan) => plan,
                Err(e) => return Err(e.with_completed_transitions(&completed)),
            };

            match self.execute_plan(&current, &plan, auth).await {
                Ok((updated, _)) => {
                    completed.push(hop);
                    warning = plan.warning.or(warning);
                    current = updated;
                }
                Err(e) => return Err(e.with_completed_transitions(&completed)),
            }
        }

        if req.force {
            warning = Some("Submission forced past the required-task gate".to_string());
        }

        Ok(SubmitResponse {
            application: current,
            completed_transitions: completed,
            warning,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use incentedge_core::new_entity_id;

    fn sample_application(status: ApplicationStatus) -> Application {
        let now = Utc::now();
        Application {
            id: new_entity_id(),
            org_id: new_entity_id(),
            project_id: new_entity_id(),
            program_id: new_entity_id(),
            created_by: new_entity_id(),
            status,
            amount_requested: Some(500_000_00),
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

    fn open_gate() -> TaskGate {
        TaskGate {
            all_completed: true,
            pending_tasks: Vec::new(),
        }
    }

    fn blocked_gate() -> TaskGate {
        TaskGate {
            all_completed: false,
            pending_tasks: vec!["Gather project documentation".to_string()],
        }
    }

    #[test]
    fn test_plan_valid_transition() {
        let app = sample_application(ApplicationStatus::Draft);
        let plan = plan_transition(
            &app,
            ApplicationStatus::InProgress,
            &open_gate(),
            &TransitionOptions::default(),
            false,
            Utc::now(),
        )
        .expect("draft -> in-progress is legal");

        assert_eq!(plan.from, ApplicationStatus::Draft);
        assert_eq!(plan.to, ApplicationStatus::InProgress);
        assert!(!plan.forced);
        assert!(plan.warning.is_none());
        assert!(plan.updates.submission_date.is_none());
    }

    #[test]
    fn test_plan_rejects_invalid_transition_with_alternatives() {
        let app = sample_application(ApplicationStatus::Draft);
        let err = plan_transition(
            &app,
            ApplicationStatus::Approved,
            &open_gate(),
            &TransitionOptions::default(),
            false,
            Utc::now(),
        )
        .expect_err("draft -> approved is not legal");

        assert_eq!(err.code, crate::error::ErrorCode::InvalidTransition);
        let details = err.details.expect("transition errors carry details");
        let alternatives = details["valid_transitions"]
            .as_array()
            .expect("alternatives listed");
        assert_eq!(alternatives.len(), 3);
    }

    #[test]
    fn test_plan_blocks_submission_on_gate() {
        let app = sample_application(ApplicationStatus::ReadyForReview);
        let err = plan_transition(
            &app,
            ApplicationStatus::Submitted,
            &blocked_gate(),
            &TransitionOptions::default(),
            false,
            Utc::now(),
        )
        .expect_err("pending required task blocks submission");

        assert_eq!(err.code, crate::error::ErrorCode::RequiredTasksIncomplete);
        let details = err.details.expect("gate errors carry blockers");
        assert_eq!(details["blockers"][0], "Gather project documentation");
    }

    #[test]
    fn test_forced_submission_hop_skips_gate() {
        // The per-hop options a forced submit builds must carry `force`, or
        // the gate re-check at the final hop rejects it
        let app = sample_application(ApplicationStatus::ReadyForReview);
        let opts = TransitionOptions {
            reason: None,
            force: true,
            ..Default::default()
        };
        let plan = plan_transition(
            &app,
            ApplicationStatus::Submitted,
            &blocked_gate(),
            &opts,
            true,
            Utc::now(),
        )
        .expect("forced submit bypasses the task gate");

        assert!(plan.forced);
        assert_eq!(plan.to, ApplicationStatus::Submitted);
        assert!(plan.updates.submission_date.is_some());
    }

    #[test]
    fn test_plan_sets_submission_date() {
        let now = Utc::now();
        let app = sample_application(ApplicationStatus::ReadyForReview);
        let plan = plan_transition(
            &app,
            ApplicationStatus::Submitted,
            &open_gate(),
            &TransitionOptions::default(),
            false,
            now,
        )
        .expect("gate passes");

        assert_eq!(plan.updates.submission_date, Some(now));
        assert!(plan.updates.decision_date.is_none());
    }

    #[test]
    fn test_plan_requires_amount_for_approval() {
        let app = sample_application(ApplicationStatus::UnderReview);
        let err = plan_transition(
            &app,
            ApplicationStatus::Approved,
            &open_gate(),
            &TransitionOptions::default(),
            false,
            Utc::now(),
        )
        .expect_err("approval without amount_approved");
        assert_eq!(err.code, crate::error::ErrorCode::MissingField);

        let opts = TransitionOptions {
            amount_approved: Some(250_000_00),
            decision_notes: Some("Approved at reduced scope".to_string()),
            ..Default::default()
        };
        let plan = plan_transition(
            &app,
            ApplicationStatus::Approved,
            &open_gate(),
            &opts,
            false,
            Utc::now(),
        )
        .expect("approval with amount");
        assert_eq!(plan.updates.amount_approved, Some(250_000_00));
        assert!(plan.updates.decision_date.is_some());
    }

    #[test]
    fn test_plan_rejected_accepts_optional_notes() {
        let app = sample_application(ApplicationStatus::UnderReview);
        let plan = plan_transition(
            &app,
            ApplicationStatus::Rejected,
            &open_gate(),
            &TransitionOptions::default(),
            false,
            Utc::now(),
        )
        .expect("rejection needs no amount");
        assert!(plan.updates.decision_date.is_some());
        assert!(plan.updates.decision_notes.is_none());
    }

    #[test]
    fn test_forced_transition_admin_only() {
        let app = sample_application(ApplicationStatus::Rejected);
        let opts = TransitionOptions {
            force: true,
            ..Default::default()
        };

        let err = plan_transition(
            &app,
            ApplicationStatus::UnderReview,
            &open_gate(),
            &opts,
            false,
            Utc::now(),
        )
        .expect_err("non-admin force");
        assert_eq!(err.code, crate::error::ErrorCode::Forbidden);

        let plan = plan_transition(
            &app,
            ApplicationStatus::UnderReview,
            &open_gate(),
            &opts,
            true,
            Utc::now(),
        )
        .expect("admin force escapes a terminal state");
        assert!(plan.forced);
        assert!(plan.warning.is_some());
    }

    #[test]
    fn test_terminal_status_rejects_normal_transitions() {
        let app = sample_application(ApplicationStatus::Withdrawn);
        let err = plan_transition(
            &app,
            ApplicationStatus::Draft,
            &open_gate(),
            &TransitionOptions::default(),
            true,
            Utc::now(),
        )
        .expect_err("terminal without force");
        assert_eq!(err.code, crate::error::ErrorCode::TerminalStatus);
    }

    #[test]
    fn test_system_comment_includes_reason() {
        let app = sample_application(ApplicationStatus::Draft);
        let opts = TransitionOptions {
            reason: Some("Kickoff complete".to_string()),
            ..Default::default()
        };
        let plan = plan_transition(
            &app,
            ApplicationStatus::InProgress,
            &open_gate(),
            &opts,
            false,
            Utc::now(),
        )
        .expect("legal transition");
        assert_eq!(
            plan.system_comment,
            "Status changed from draft to in-progress: Kickoff complete"
        );
    }

    #[test]
    fn test_calculate_deadline_prefers_fixed_date() {
        let now = Utc::now();
        let fixed = NaiveDate::from_ymd_opt(2027, 6, 30).unwrap();
        let mut program = Program {
            id: new_entity_id(),
            name: "ITC".to_string(),
            provider: "IRS".to_string(),
            program_type: incentedge_core::ProgramType::TaxCredit,
            funding_amount: None,
            deadline: Some(fixed),
            default_window_days: Some(30),
            eligibility: None,
            source_url: None,
            active: true,
            created_at: now,
            updated_at: now,
        };

        let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        assert_eq!(calculate_deadline(&program, today), fixed);

        program.deadline = None;
        assert_eq!(
            calculate_deadline(&program, today),
            NaiveDate::from_ymd_opt(2026, 8, 31).unwrap()
        );

        // 90-day default window when the program specifies nothing
        program.default_window_days = None;
        assert_eq!(
            calculate_deadline(&program, today),
            NaiveDate::from_ymd_opt(2026, 10, 30).unwrap()
        );
    }
}
