//! Database-Backed Workflow Integration Tests
//!
//! These tests exercise the workflow orchestrator against a real PostgreSQL
//! instance. They are gated twice: compile them with `--features db-tests`
//! and opt in at runtime with `INCENTEDGE_DB_TESTS=1`. Connection settings
//! come from the usual `INCENTEDGE_DB_*` environment variables.
//!
//! Each test creates its own organization id, so runs are isolated even on a
//! shared database.

#![cfg(feature = "db-tests")]

use incentedge_api::{
    auth::AuthContext,
    db::{DbClient, DbConfig},
    events::EventBus,
    services::WorkflowService,
    types::{CreateApplicationRequest, CreateProgramRequest, StatusChangeRequest, SubmitRequest},
};
use incentedge_core::{
    new_entity_id, Application, ApplicationStatus, OrgId, ProgramType, Role, TaskStatus,
};

fn db_tests_enabled() -> bool {
    std::env::var("INCENTEDGE_DB_TESTS").as_deref() == Ok("1")
}

fn test_db() -> DbClient {
    DbClient::from_config(&DbConfig::from_env()).expect("pool from env")
}

fn member(org_id: OrgId) -> AuthContext {
    AuthContext::new(new_entity_id(), org_id, Role::Member)
}

fn admin(org_id: OrgId) -> AuthContext {
    AuthContext::new(new_entity_id(), org_id, Role::Admin)
}

async fn seed_application(db: &DbClient, auth: &AuthContext) -> Application {
    let program = db
        .program_create(&CreateProgramRequest {
            name: format!("Test Grant {}", new_entity_id()),
            provider: "Test Provider".to_string(),
            program_type: ProgramType::Grant,
            funding_amount: None,
            deadline: None,
            default_window_days: Some(90),
            eligibility: None,
            source_url: None,
            active: true,
        })
        .await
        .expect("program created");

    db.application_create(
        auth.org_id,
        auth.user_id,
        &CreateApplicationRequest {
            project_id: new_entity_id(),
            program_id: program.id,
            amount_requested: Some(1_000_000_00),
            deadline: None,
            review_notes: None,
        },
        None,
    )
    .await
    .expect("application created")
}

/// Complete every task that blocks the submission gate.
async fn satisfy_gate(db: &DbClient, auth: &AuthContext, application: &Application) {
    let tasks = db
        .task_list(application.id, auth.org_id)
        .await
        .expect("tasks listed");
    for task in tasks {
        db.task_update(
            task.id,
            application.id,
            auth.org_id,
            &incentedge_api::types::UpdateTaskRequest {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .expect("task completed");
    }
}

#[tokio::test]
async fn test_repeat_transition_appends_two_history_rows() {
    if !db_tests_enabled() {
        return;
    }
    let db = test_db();
    let events = EventBus::default();
    let workflow = WorkflowService::new(db.clone(), events);
    let org_id = new_entity_id();
    let auth = admin(org_id);

    let app = seed_application(&db, &auth).await;

    // draft -> in-progress, then force back, then repeat the same transition
    workflow
        .change_status(
            &auth,
            app.id,
            &StatusChangeRequest {
                status: ApplicationStatus::InProgress,
                reason: None,
                force: false,
                amount_approved: None,
                decision_notes: None,
            },
        )
        .await
        .expect("first transition");
    workflow
        .change_status(
            &auth,
            app.id,
            &StatusChangeRequest {
                status: ApplicationStatus::Draft,
                reason: Some("reset".to_string()),
                force: true,
                amount_approved: None,
                decision_notes: None,
            },
        )
        .await
        .expect("forced reset");
    workflow
        .change_status(
            &auth,
            app.id,
            &StatusChangeRequest {
                status: ApplicationStatus::InProgress,
                reason: None,
                force: false,
                amount_approved: None,
                decision_notes: None,
            },
        )
        .await
        .expect("second transition");

    let history = db
        .status_history_list(app.id, org_id)
        .await
        .expect("history listed");
    let draft_to_in_progress = history
        .iter()
        .filter(|h| {
            h.from_status == Some(ApplicationStatus::Draft)
                && h.to_status == ApplicationStatus::InProgress
        })
        .count();
    assert_eq!(draft_to_in_progress, 2);

    let forced_rows = history.iter().filter(|h| h.forced).count();
    assert_eq!(forced_rows, 1);

    let current = db
        .application_get(app.id, org_id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(current.status, ApplicationStatus::InProgress);
}

#[tokio::test]
async fn test_submit_from_ready_for_review_is_one_hop() {
    if !db_tests_enabled() {
        return;
    }
    let db = test_db();
    let events = EventBus::default();
    let workflow = WorkflowService::new(db.clone(), events);
    let org_id = new_entity_id();
    let auth = member(org_id);

    let app = seed_application(&db, &auth).await;

    // Walk to ready-for-review; start_workflow seeds the checklist
    workflow.start_workflow(&auth, app.id).await.expect("started");
    workflow
        .change_status(
            &auth,
            app.id,
            &StatusChangeRequest {
                status: ApplicationStatus::ReadyForReview,
                reason: None,
                force: false,
                amount_approved: None,
                decision_notes: None,
            },
        )
        .await
        .expect("ready for review");
    satisfy_gate(&db, &auth, &app).await;

    let result = workflow
        .submit(
            &auth,
            app.id,
            &SubmitRequest {
                force: false,
                notes: None,
            },
        )
        .await
        .expect("submitted");

    assert_eq!(
        result.completed_transitions,
        vec![ApplicationStatus::Submitted]
    );
    assert_eq!(result.application.status, ApplicationStatus::Submitted);
    assert!(result.application.submission_date.is_some());
}

#[tokio::test]
async fn test_submit_with_pending_required_task_reports_blockers() {
    if !db_tests_enabled() {
        return;
    }
    let db = test_db();
    let events = EventBus::default();
    let workflow = WorkflowService::new(db.clone(), events);
    let org_id = new_entity_id();
    let auth = member(org_id);

    let app = seed_application(&db, &auth).await;
    workflow.start_workflow(&auth, app.id).await.expect("started");

    // The generated checklist has unsatisfied required tasks
    let err = workflow
        .submit(
            &auth,
            app.id,
            &SubmitRequest {
                force: false,
                notes: None,
            },
        )
        .await
        .expect_err("gate should block");
    assert_eq!(
        err.code,
        incentedge_api::error::ErrorCode::RequiredTasksIncomplete
    );
    let details = err.details.expect("blockers listed");
    assert!(!details["blockers"].as_array().unwrap().is_empty());

    // Completing the checklist unblocks the same call
    satisfy_gate(&db, &auth, &app).await;
    let result = workflow
        .submit(
            &auth,
            app.id,
            &SubmitRequest {
                force: false,
                notes: None,
            },
        )
        .await
        .expect("submitted after completing tasks");
    assert_eq!(result.application.status, ApplicationStatus::Submitted);
    assert!(result.application.submission_date.is_some());

    // One history row per hop: in-progress -> ready-for-review -> submitted
    let history = db
        .status_history_list(app.id, org_id)
        .await
        .expect("history");
    assert_eq!(
        history
            .iter()
            .filter(|h| h.to_status == ApplicationStatus::Submitted)
            .count(),
        1
    );
}

#[tokio::test]
async fn test_forced_submit_bypasses_blocked_gate() {
    if !db_tests_enabled() {
        return;
    }
    let db = test_db();
    let events = EventBus::default();
    let workflow = WorkflowService::new(db.clone(), events);
    let org_id = new_entity_id();
    let auth = admin(org_id);

    let app = seed_application(&db, &auth).await;
    workflow.start_workflow(&auth, app.id).await.expect("started");

    // The seeded checklist still blocks the gate; force walks every hop
    // anyway and lands on submitted
    let result = workflow
        .submit(
            &auth,
            app.id,
            &SubmitRequest {
                force: true,
                notes: None,
            },
        )
        .await
        .expect("forced submit skips the task gate");

    assert_eq!(result.application.status, ApplicationStatus::Submitted);
    assert!(result.application.submission_date.is_some());
    assert_eq!(
        result.completed_transitions,
        vec![
            ApplicationStatus::ReadyForReview,
            ApplicationStatus::Submitted
        ]
    );
    assert!(result.warning.is_some());

    // Every hop of a forced submit is recorded as forced
    let history = db
        .status_history_list(app.id, org_id)
        .await
        .expect("history listed");
    let forced_hops: Vec<_> = history.iter().filter(|h| h.forced).collect();
    assert_eq!(forced_hops.len(), 2);
    assert!(forced_hops
        .iter()
        .any(|h| h.to_status == ApplicationStatus::Submitted));
}

#[tokio::test]
async fn test_org_isolation_hides_foreign_applications() {
    if !db_tests_enabled() {
        return;
    }
    let db = test_db();
    let events = EventBus::default();
    let workflow = WorkflowService::new(db.clone(), events);

    let owner = member(new_entity_id());
    let stranger = member(new_entity_id());

    let app = seed_application(&db, &owner).await;

    // Cross-tenant reads and writes both resolve to not-found
    assert!(db
        .application_get(app.id, stranger.org_id)
        .await
        .expect("query ok")
        .is_none());

    let err = workflow
        .change_status(
            &stranger,
            app.id,
            &StatusChangeRequest {
                status: ApplicationStatus::InProgress,
                reason: None,
                force: false,
                amount_approved: None,
                decision_notes: None,
            },
        )
        .await
        .expect_err("foreign org must not see the application");
    assert_eq!(
        err.code,
        incentedge_api::error::ErrorCode::ApplicationNotFound
    );
}

#[tokio::test]
async fn test_bulk_status_moves_stamp_and_clear_completed_at() {
    if !db_tests_enabled() {
        return;
    }
    let db = test_db();
    let events = EventBus::default();
    let workflow = WorkflowService::new(db.clone(), events);
    let org_id = new_entity_id();
    let auth = member(org_id);

    let app = seed_application(&db, &auth).await;
    workflow.start_workflow(&auth, app.id).await.expect("started");

    let tasks = db.task_list(app.id, org_id).await.expect("tasks listed");
    let ids: Vec<_> = tasks.iter().map(|t| t.id).collect();

    let completed = db
        .task_bulk_update(
            app.id,
            org_id,
            &ids,
            Some(TaskStatus::Completed),
            None,
            None,
        )
        .await
        .expect("bulk complete");
    assert!(completed.iter().all(|t| t.completed_at.is_some()));

    // Moving away from completed clears the stamp
    let cancelled = db
        .task_bulk_update(
            app.id,
            org_id,
            &ids,
            Some(TaskStatus::Cancelled),
            None,
            None,
        )
        .await
        .expect("bulk cancel");
    assert!(cancelled.iter().all(|t| t.completed_at.is_none()));
}

#[tokio::test]
async fn test_decision_requires_and_records_amount() {
    if !db_tests_enabled() {
        return;
    }
    let db = test_db();
    let events = EventBus::default();
    let workflow = WorkflowService::new(db.clone(), events);
    let org_id = new_entity_id();
    let auth = admin(org_id);

    let app = seed_application(&db, &auth).await;
    workflow.start_workflow(&auth, app.id).await.expect("started");
    satisfy_gate(&db, &auth, &app).await;
    workflow
        .submit(
            &auth,
            app.id,
            &SubmitRequest {
                force: false,
                notes: None,
            },
        )
        .await
        .expect("submitted");
    workflow
        .change_status(
            &auth,
            app.id,
            &StatusChangeRequest {
                status: ApplicationStatus::UnderReview,
                reason: None,
                force: false,
                amount_approved: None,
                decision_notes: None,
            },
        )
        .await
        .expect("under review");

    let err = workflow
        .change_status(
            &auth,
            app.id,
            &StatusChangeRequest {
                status: ApplicationStatus::Approved,
                reason: None,
                force: false,
                amount_approved: None,
                decision_notes: None,
            },
        )
        .await
        .expect_err("approval without an amount");
    assert_eq!(err.code, incentedge_api::error::ErrorCode::MissingField);

    let result = workflow
        .change_status(
            &auth,
            app.id,
            &StatusChangeRequest {
                status: ApplicationStatus::Approved,
                reason: Some("Full award".to_string()),
                force: false,
                amount_approved: Some(750_000_00),
                decision_notes: Some("Approved as requested".to_string()),
            },
        )
        .await
        .expect("approved with amount");

    assert_eq!(result.application.status, ApplicationStatus::Approved);
    assert_eq!(result.application.amount_approved, Some(750_000_00));
    assert!(result.application.decision_date.is_some());
}
