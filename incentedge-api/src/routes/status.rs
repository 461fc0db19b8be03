//! Status and Submission Routes
//!
//! The status endpoint exposes the state machine: current status, reachable
//! transitions, and the audit history. PATCH runs one transition through the
//! workflow orchestrator; a draft application moving to in-progress goes
//! through start_workflow so the default checklist gets generated. The
//! submit endpoint pairs a dry-run readiness check (GET) with the multi-hop
//! submission workflow (POST).

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    db::DbClient,
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    services::WorkflowService,
    types::{
        ReadinessResponse, StatusChangeRequest, StatusChangeResponse, StatusResponse,
        SubmitRequest, SubmitResponse,
    },
};
use incentedge_core::{valid_transitions, ApplicationId, ApplicationStatus};

// ============================================================================
// SHARED STATE
// ============================================================================

/// Shared state for status and submission routes.
#[derive(Clone)]
pub struct StatusState {
    pub db: DbClient,
    pub workflow: WorkflowService,
}

impl StatusState {
    pub fn new(db: DbClient, workflow: WorkflowService) -> Self {
        Self { db, workflow }
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/applications/{id}/status - Current status, transitions, history
#[utoipa::path(
    get,
    path = "/api/v1/applications/{id}/status",
    tag = "Status",
    params(("id" = Uuid, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Status detail", body = StatusResponse),
        (status = 404, description = "Application not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_status(
    State(state): State<Arc<StatusState>>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<ApplicationId>,
) -> ApiResult<impl IntoResponse> {
    let application = state
        .db
        .application_get(id, auth.org_id)
        .await?
        .ok_or_else(|| ApiError::application_not_found(id))?;
    let history = state.db.status_history_list(id, auth.org_id).await?;

    Ok(Json(StatusResponse {
        status: application.status,
        valid_transitions: valid_transitions(application.status).to_vec(),
        history,
    }))
}

/// PATCH /api/v1/applications/{id}/status - Change application status
#[utoipa::path(
    patch,
    path = "/api/v1/applications/{id}/status",
    tag = "Status",
    params(("id" = Uuid, Path, description = "Application ID")),
    request_body = StatusChangeRequest,
    responses(
        (status = 200, description = "Status changed", body = StatusChangeResponse),
        (status = 400, description = "Invalid transition or incomplete tasks", body = ApiError),
        (status = 403, description = "Forced transition without admin role", body = ApiError),
        (status = 404, description = "Application not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_status(
    State(state): State<Arc<StatusState>>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<ApplicationId>,
    Json(req): Json<StatusChangeRequest>,
) -> ApiResult<impl IntoResponse> {
    if let Some(amount) = req.amount_approved {
        if amount < 0 {
            return Err(ApiError::invalid_input("amount_approved cannot be negative"));
        }
    }

    // Leaving draft for in-progress is the workflow kickoff: the default
    // checklist gets generated alongside the transition
    let current = state
        .db
        .application_get(id, auth.org_id)
        .await?
        .ok_or_else(|| ApiError::application_not_found(id))?;

    let response = if current.status == ApplicationStatus::Draft
        && req.status == ApplicationStatus::InProgress
        && !req.force
    {
        state.workflow.start_workflow(&auth, id).await?
    } else {
        state.workflow.change_status(&auth, id, &req).await?
    };

    Ok(Json(response))
}

/// GET /api/v1/applications/{id}/submit - Submission readiness check
#[utoipa::path(
    get,
    path = "/api/v1/applications/{id}/submit",
    tag = "Status",
    params(("id" = Uuid, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Readiness report", body = ReadinessResponse),
        (status = 404, description = "Application not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn check_readiness(
    State(state): State<Arc<StatusState>>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<ApplicationId>,
) -> ApiResult<impl IntoResponse> {
    let response = state.workflow.readiness(&auth, id).await?;
    Ok(Json(response))
}

/// POST /api/v1/applications/{id}/submit - Run the submission workflow
#[utoipa::path(
    post,
    path = "/api/v1/applications/{id}/submit",
    tag = "Status",
    params(("id" = Uuid, Path, description = "Application ID")),
    request_body = SubmitRequest,
    responses(
        (status = 200, description = "Application submitted", body = SubmitResponse),
        (status = 400, description = "Incomplete tasks or invalid path", body = ApiError),
        (status = 403, description = "Force without admin role", body = ApiError),
        (status = 404, description = "Application not found", body = ApiError),
        (status = 409, description = "Already submitted", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn submit_application(
    State(state): State<Arc<StatusState>>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<ApplicationId>,
    Json(req): Json<SubmitRequest>,
) -> ApiResult<impl IntoResponse> {
    let response = state.workflow.submit(&auth, id, &req).await?;
    Ok(Json(response))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the status routes router, nested under /applications.
pub fn create_router(db: DbClient, workflow: WorkflowService) -> axum::Router {
    let state = Arc::new(StatusState::new(db, workflow));

    axum::Router::new()
        .route("/:id/status", axum::routing::get(get_status))
        .route("/:id/status", axum::routing::patch(change_status))
        .route("/:id/submit", axum::routing::get(check_readiness))
        .route("/:id/submit", axum::routing::post(submit_application))
        .with_state(state)
}
