//! Application REST API Routes
//!
//! CRUD for incentive applications. Status changes and submission live in
//! their own route modules; this one covers create, list, detail, field
//! updates, and delete. Everything is org-scoped through the AuthExtractor.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    db::DbClient,
    error::{ApiError, ApiResult},
    events::{DomainEvent, EventBus},
    middleware::AuthExtractor,
    notify,
    types::{
        ApplicationListQuery, ApplicationListResponse, ApplicationResponse,
        CreateApplicationRequest, UpdateApplicationRequest,
    },
};
use incentedge_core::{
    valid_transitions, Application, ApplicationId, ApplicationStatus, Task,
};

// ============================================================================
// SHARED STATE
// ============================================================================

/// Shared application state for application routes.
#[derive(Clone)]
pub struct ApplicationState {
    pub db: DbClient,
    pub events: EventBus,
}

impl ApplicationState {
    pub fn new(db: DbClient, events: EventBus) -> Self {
        Self { db, events }
    }
}

// ============================================================================
// RESPONSE ASSEMBLY
// ============================================================================

/// Share of tasks in a satisfied state, 0-100. None when there are no tasks.
fn completion_pct(tasks: &[Task]) -> Option<f64> {
    if tasks.is_empty() {
        return None;
    }
    let satisfied = tasks.iter().filter(|t| t.status.is_satisfied()).count();
    Some(satisfied as f64 * 100.0 / tasks.len() as f64)
}

fn to_response(application: Application, tasks: &[Task]) -> ApplicationResponse {
    let days = application.days_to_deadline(Utc::now());
    let transitions = valid_transitions(application.status).to_vec();
    ApplicationResponse {
        days_to_deadline: days,
        completion_pct: completion_pct(tasks),
        valid_transitions: transitions,
        application,
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/v1/applications - Create a new application (status: draft)
#[utoipa::path(
    post,
    path = "/api/v1/applications",
    tag = "Applications",
    request_body = CreateApplicationRequest,
    responses(
        (status = 201, description = "Application created", body = ApplicationResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Program not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_application(
    State(state): State<Arc<ApplicationState>>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<CreateApplicationRequest>,
) -> ApiResult<impl IntoResponse> {
    if let Some(amount) = req.amount_requested {
        if amount < 0 {
            return Err(ApiError::invalid_input("amount_requested cannot be negative"));
        }
    }

    let program = state
        .db
        .program_get(req.program_id)
        .await?
        .ok_or_else(|| ApiError::program_not_found(req.program_id))?;

    let deadline = req.deadline.unwrap_or_else(|| {
        crate::services::workflow::calculate_deadline(&program, Utc::now().date_naive())
    });

    let application = state
        .db
        .application_create(auth.org_id, auth.user_id, &req, Some(deadline))
        .await?;

    state.events.publish(DomainEvent::ApplicationCreated {
        application: application.clone(),
    });
    notify::log_activity(
        &state.db,
        auth.org_id,
        auth.user_id,
        application.id,
        "application_created",
        json!({ "program_id": req.program_id }),
    );

    Ok((StatusCode::CREATED, Json(to_response(application, &[]))))
}

/// GET /api/v1/applications - List applications with filters
#[utoipa::path(
    get,
    path = "/api/v1/applications",
    tag = "Applications",
    params(ApplicationListQuery),
    responses(
        (status = 200, description = "Paginated application list", body = ApplicationListResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_applications(
    State(state): State<Arc<ApplicationState>>,
    AuthExtractor(auth): AuthExtractor,
    Query(query): Query<ApplicationListQuery>,
) -> ApiResult<impl IntoResponse> {
    let (applications, total) = state.db.application_list(auth.org_id, &query).await?;

    Ok(Json(ApplicationListResponse {
        applications,
        total,
        limit: query.limit(),
        offset: query.offset(),
    }))
}

/// GET /api/v1/applications/{id} - Application detail with computed fields
#[utoipa::path(
    get,
    path = "/api/v1/applications/{id}",
    tag = "Applications",
    params(("id" = Uuid, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Application detail", body = ApplicationResponse),
        (status = 404, description = "Application not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_application(
    State(state): State<Arc<ApplicationState>>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<ApplicationId>,
) -> ApiResult<impl IntoResponse> {
    let application = state
        .db
        .application_get(id, auth.org_id)
        .await?
        .ok_or_else(|| ApiError::application_not_found(id))?;
    let tasks = state.db.task_list(id, auth.org_id).await?;

    Ok(Json(to_response(application, &tasks)))
}

/// PATCH /api/v1/applications/{id} - Update mutable fields
#[utoipa::path(
    patch,
    path = "/api/v1/applications/{id}",
    tag = "Applications",
    params(("id" = Uuid, Path, description = "Application ID")),
    request_body = UpdateApplicationRequest,
    responses(
        (status = 200, description = "Application updated", body = ApplicationResponse),
        (status = 400, description = "Invalid request or terminal application", body = ApiError),
        (status = 404, description = "Application not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_application(
    State(state): State<Arc<ApplicationState>>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<ApplicationId>,
    Json(req): Json<UpdateApplicationRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.is_empty() {
        return Err(ApiError::invalid_input(
            "At least one field must be provided for update",
        ));
    }
    if let Some(amount) = req.amount_requested {
        if amount < 0 {
            return Err(ApiError::invalid_input("amount_requested cannot be negative"));
        }
    }

    let current = state
        .db
        .application_get(id, auth.org_id)
        .await?
        .ok_or_else(|| ApiError::application_not_found(id))?;
    if current.is_terminal() {
        return Err(ApiError::validation_failed(format!(
            "Application in terminal status {} cannot be updated",
            current.status
        )));
    }

    let application = state
        .db
        .application_update_fields(id, auth.org_id, &req)
        .await?
        .ok_or_else(|| ApiError::application_not_found(id))?;

    notify::log_activity(
        &state.db,
        auth.org_id,
        auth.user_id,
        id,
        "application_updated",
        json!({}),
    );

    let tasks = state.db.task_list(id, auth.org_id).await?;
    Ok(Json(to_response(application, &tasks)))
}

/// DELETE /api/v1/applications/{id} - Delete an application (cascades)
#[utoipa::path(
    delete,
    path = "/api/v1/applications/{id}",
    tag = "Applications",
    params(("id" = Uuid, Path, description = "Application ID")),
    responses(
        (status = 204, description = "Application deleted"),
        (status = 400, description = "Only drafts may be deleted without admin", body = ApiError),
        (status = 404, description = "Application not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_application(
    State(state): State<Arc<ApplicationState>>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<ApplicationId>,
) -> ApiResult<StatusCode> {
    let application = state
        .db
        .application_get(id, auth.org_id)
        .await?
        .ok_or_else(|| ApiError::application_not_found(id))?;

    if application.status != ApplicationStatus::Draft && !auth.is_admin() {
        return Err(ApiError::validation_failed(format!(
            "Only draft applications can be deleted without the admin role (status is {})",
            application.status
        )));
    }

    state.db.application_delete(id, auth.org_id).await?;
    notify::log_activity(
        &state.db,
        auth.org_id,
        auth.user_id,
        id,
        "application_deleted",
        json!({ "status": application.status }),
    );

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the application routes router.
pub fn create_router(db: DbClient, events: EventBus) -> axum::Router {
    let state = Arc::new(ApplicationState::new(db, events));

    axum::Router::new()
        .route("/", axum::routing::post(create_application))
        .route("/", axum::routing::get(list_applications))
        .route("/:id", axum::routing::get(get_application))
        .route("/:id", axum::routing::patch(update_application))
        .route("/:id", axum::routing::delete(delete_application))
        .with_state(state)
}
