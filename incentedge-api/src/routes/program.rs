//! Program Catalog Routes
//!
//! The program catalog is shared across organizations: any authenticated
//! user can browse it, but only admins can add to it. Programs normally
//! arrive through the ingestion pipeline; the create endpoint covers manual
//! additions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    auth::require_admin,
    db::DbClient,
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    types::{CreateProgramRequest, ProgramListQuery, ProgramListResponse},
};
use incentedge_core::{Program, ProgramId};

// ============================================================================
// SHARED STATE
// ============================================================================

/// Shared state for program routes.
#[derive(Clone)]
pub struct ProgramState {
    pub db: DbClient,
}

impl ProgramState {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/v1/programs - Add a program to the catalog (admin only)
#[utoipa::path(
    post,
    path = "/api/v1/programs",
    tag = "Programs",
    request_body = CreateProgramRequest,
    responses(
        (status = 201, description = "Program created", body = Program),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 403, description = "Admin role required", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_program(
    State(state): State<Arc<ProgramState>>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<CreateProgramRequest>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&auth)?;

    if req.name.trim().is_empty() {
        return Err(ApiError::missing_field("name"));
    }
    if req.provider.trim().is_empty() {
        return Err(ApiError::missing_field("provider"));
    }
    if let Some(window) = req.default_window_days {
        if window < 0 {
            return Err(ApiError::invalid_input(
                "default_window_days cannot be negative",
            ));
        }
    }

    let program = state.db.program_create(&req).await?;

    Ok((StatusCode::CREATED, Json(program)))
}

/// GET /api/v1/programs - Browse the program catalog
#[utoipa::path(
    get,
    path = "/api/v1/programs",
    tag = "Programs",
    params(ProgramListQuery),
    responses(
        (status = 200, description = "Paginated program list", body = ProgramListResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_programs(
    State(state): State<Arc<ProgramState>>,
    AuthExtractor(_auth): AuthExtractor,
    Query(query): Query<ProgramListQuery>,
) -> ApiResult<impl IntoResponse> {
    let (programs, total) = state.db.program_list(&query).await?;

    Ok(Json(ProgramListResponse {
        programs,
        total,
        limit: query.limit(),
        offset: query.offset(),
    }))
}

/// GET /api/v1/programs/{id} - Program detail
#[utoipa::path(
    get,
    path = "/api/v1/programs/{id}",
    tag = "Programs",
    params(("id" = Uuid, Path, description = "Program ID")),
    responses(
        (status = 200, description = "Program detail", body = Program),
        (status = 404, description = "Program not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_program(
    State(state): State<Arc<ProgramState>>,
    AuthExtractor(_auth): AuthExtractor,
    Path(id): Path<ProgramId>,
) -> ApiResult<impl IntoResponse> {
    let program = state
        .db
        .program_get(id)
        .await?
        .ok_or_else(|| ApiError::program_not_found(id))?;

    Ok(Json(program))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the program routes router.
pub fn create_router(db: DbClient) -> axum::Router {
    let state = Arc::new(ProgramState::new(db));

    axum::Router::new()
        .route("/", axum::routing::post(create_program))
        .route("/", axum::routing::get(list_programs))
        .route("/:id", axum::routing::get(get_program))
        .with_state(state)
}
