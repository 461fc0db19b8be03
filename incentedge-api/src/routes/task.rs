//! Task REST API Routes
//!
//! Checklist tasks nested under an application, plus the bulk endpoint for
//! applying one action across many tasks. Task updates that complete the
//! required-task gate publish the all-tasks-completed event.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    db::DbClient,
    error::{ApiError, ApiResult},
    events::{DomainEvent, EventBus},
    middleware::AuthExtractor,
    types::{
        BulkTaskAction, BulkTaskRequest, BulkTaskResponse, CreateTaskRequest, TaskListResponse,
        UpdateTaskRequest,
    },
};
use incentedge_core::{
    required_tasks_gate, ApplicationId, TaskId, TaskStatus,
};

// ============================================================================
// SHARED STATE
// ============================================================================

/// Shared state for task routes.
#[derive(Clone)]
pub struct TaskState {
    pub db: DbClient,
    pub events: EventBus,
}

impl TaskState {
    pub fn new(db: DbClient, events: EventBus) -> Self {
        Self { db, events }
    }
}

impl TaskState {
    /// Verify the application exists in the caller's org before touching its
    /// tasks, so cross-tenant probes always see the same 404.
    async fn require_application(
        &self,
        application_id: ApplicationId,
        org_id: incentedge_core::OrgId,
    ) -> ApiResult<()> {
        self.db
            .application_get(application_id, org_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| ApiError::application_not_found(application_id))
    }

    /// Publish the gate-completion event when a mutation just closed the gate.
    async fn check_gate_completion(
        &self,
        application_id: ApplicationId,
        org_id: incentedge_core::OrgId,
        was_complete: bool,
    ) -> ApiResult<()> {
        if was_complete {
            return Ok(());
        }
        let tasks = self.db.task_list(application_id, org_id).await?;
        let gate = required_tasks_gate(&tasks);
        if gate.all_completed && !tasks.is_empty() {
            self.events.publish(DomainEvent::AllTasksCompleted {
                application_id,
                org_id,
            });
        }
        Ok(())
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/v1/applications/{id}/tasks - Create a task
#[utoipa::path(
    post,
    path = "/api/v1/applications/{id}/tasks",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Application ID")),
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = incentedge_core::Task),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Application not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_task(
    State(state): State<Arc<TaskState>>,
    AuthExtractor(auth): AuthExtractor,
    Path(application_id): Path<ApplicationId>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.title.trim().is_empty() {
        return Err(ApiError::missing_field("title"));
    }

    state.require_application(application_id, auth.org_id).await?;
    let task = state.db.task_create(application_id, auth.org_id, &req).await?;

    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /api/v1/applications/{id}/tasks - List tasks with the gate result
#[utoipa::path(
    get,
    path = "/api/v1/applications/{id}/tasks",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Task list", body = TaskListResponse),
        (status = 404, description = "Application not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_tasks(
    State(state): State<Arc<TaskState>>,
    AuthExtractor(auth): AuthExtractor,
    Path(application_id): Path<ApplicationId>,
) -> ApiResult<impl IntoResponse> {
    state.require_application(application_id, auth.org_id).await?;
    let tasks = state.db.task_list(application_id, auth.org_id).await?;
    let gate = required_tasks_gate(&tasks);

    Ok(Json(TaskListResponse { tasks, gate }))
}

/// GET /api/v1/applications/{id}/tasks/{task_id} - Task detail
#[utoipa::path(
    get,
    path = "/api/v1/applications/{id}/tasks/{task_id}",
    tag = "Tasks",
    params(
        ("id" = Uuid, Path, description = "Application ID"),
        ("task_id" = Uuid, Path, description = "Task ID"),
    ),
    responses(
        (status = 200, description = "Task detail", body = incentedge_core::Task),
        (status = 404, description = "Task not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_task(
    State(state): State<Arc<TaskState>>,
    AuthExtractor(auth): AuthExtractor,
    Path((application_id, task_id)): Path<(ApplicationId, TaskId)>,
) -> ApiResult<impl IntoResponse> {
    let task = state
        .db
        .task_get(task_id, application_id, auth.org_id)
        .await?
        .ok_or_else(|| ApiError::task_not_found(task_id))?;

    Ok(Json(task))
}

/// PATCH /api/v1/applications/{id}/tasks/{task_id} - Update a task
#[utoipa::path(
    patch,
    path = "/api/v1/applications/{id}/tasks/{task_id}",
    tag = "Tasks",
    params(
        ("id" = Uuid, Path, description = "Application ID"),
        ("task_id" = Uuid, Path, description = "Task ID"),
    ),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated", body = incentedge_core::Task),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Task not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_task(
    State(state): State<Arc<TaskState>>,
    AuthExtractor(auth): AuthExtractor,
    Path((application_id, task_id)): Path<(ApplicationId, TaskId)>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    if let Some(ref title) = req.title {
        if title.trim().is_empty() {
            return Err(ApiError::invalid_input("title cannot be empty"));
        }
    }

    let tasks = state.db.task_list(application_id, auth.org_id).await?;
    if tasks.is_empty() {
        // Either no tasks or no such application; resolve which
        state.require_application(application_id, auth.org_id).await?;
    }
    let was_complete = required_tasks_gate(&tasks).all_completed;

    let task = state
        .db
        .task_update(task_id, application_id, auth.org_id, &req)
        .await?
        .ok_or_else(|| ApiError::task_not_found(task_id))?;

    state
        .check_gate_completion(application_id, auth.org_id, was_complete)
        .await?;

    Ok(Json(task))
}

/// DELETE /api/v1/applications/{id}/tasks/{task_id} - Delete a task
#[utoipa::path(
    delete,
    path = "/api/v1/applications/{id}/tasks/{task_id}",
    tag = "Tasks",
    params(
        ("id" = Uuid, Path, description = "Application ID"),
        ("task_id" = Uuid, Path, description = "Task ID"),
    ),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Task not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_task(
    State(state): State<Arc<TaskState>>,
    AuthExtractor(auth): AuthExtractor,
    Path((application_id, task_id)): Path<(ApplicationId, TaskId)>,
) -> ApiResult<StatusCode> {
    let deleted = state
        .db
        .task_delete(task_id, application_id, auth.org_id)
        .await?;
    if !deleted {
        return Err(ApiError::task_not_found(task_id));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/applications/{id}/tasks/bulk - Apply one action to many tasks
#[utoipa::path(
    post,
    path = "/api/v1/applications/{id}/tasks/bulk",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Application ID")),
    request_body = BulkTaskRequest,
    responses(
        (status = 200, description = "Tasks updated", body = BulkTaskResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Application not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn bulk_update_tasks(
    State(state): State<Arc<TaskState>>,
    AuthExtractor(auth): AuthExtractor,
    Path(application_id): Path<ApplicationId>,
    Json(req): Json<BulkTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.task_ids.is_empty() {
        return Err(ApiError::missing_field("task_ids"));
    }

    let (new_status, assignee, priority) = match req.action {
        BulkTaskAction::Complete => (Some(TaskStatus::Completed), None, None),
        BulkTaskAction::Skip => (Some(TaskStatus::Skipped), None, None),
        BulkTaskAction::Cancel => (Some(TaskStatus::Cancelled), None, None),
        BulkTaskAction::Reassign => {
            let assignee = req
                .assignee
                .ok_or_else(|| ApiError::missing_field("assignee"))?;
            (None, Some(assignee), None)
        }
        BulkTaskAction::Reprioritize => {
            let priority = req
                .priority
                .ok_or_else(|| ApiError::missing_field("priority"))?;
            (None, None, Some(priority))
        }
    };

    state.require_application(application_id, auth.org_id).await?;

    let before = state.db.task_list(application_id, auth.org_id).await?;
    let was_complete = required_tasks_gate(&before).all_completed;

    let tasks = state
        .db
        .task_bulk_update(
            application_id,
            auth.org_id,
            &req.task_ids,
            new_status,
            assignee,
            priority,
        )
        .await?;

    state
        .check_gate_completion(application_id, auth.org_id, was_complete)
        .await?;

    Ok(Json(BulkTaskResponse {
        updated: tasks.len(),
        tasks,
    }))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the task routes router, nested under /applications.
pub fn create_router(db: DbClient, events: EventBus) -> axum::Router {
    let state = Arc::new(TaskState::new(db, events));

    axum::Router::new()
        .route("/:id/tasks", axum::routing::post(create_task))
        .route("/:id/tasks", axum::routing::get(list_tasks))
        .route("/:id/tasks/bulk", axum::routing::post(bulk_update_tasks))
        .route("/:id/tasks/:task_id", axum::routing::get(get_task))
        .route("/:id/tasks/:task_id", axum::routing::patch(update_task))
        .route("/:id/tasks/:task_id", axum::routing::delete(delete_task))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_reassign_requires_assignee() {
        let req = BulkTaskRequest {
            task_ids: vec![incentedge_core::new_entity_id()],
            action: BulkTaskAction::Reassign,
            assignee: None,
            priority: None,
        };
        assert!(req.assignee.is_none());
        assert_eq!(req.action, BulkTaskAction::Reassign);
    }

    #[test]
    fn test_bulk_status_action_mapping() {
        for (action, expected) in [
            (BulkTaskAction::Complete, TaskStatus::Completed),
            (BulkTaskAction::Skip, TaskStatus::Skipped),
            (BulkTaskAction::Cancel, TaskStatus::Cancelled),
        ] {
            let status = match action {
                BulkTaskAction::Complete => Some(TaskStatus::Completed),
                BulkTaskAction::Skip => Some(TaskStatus::Skipped),
                BulkTaskAction::Cancel => Some(TaskStatus::Cancelled),
                _ => None,
            };
            assert_eq!(status, Some(expected));
        }
    }
}
