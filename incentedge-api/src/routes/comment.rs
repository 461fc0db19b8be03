//! Comment REST API Routes
//!
//! Threaded comments on an application, with emoji reactions and soft
//! deletion. System comments are machine-authored (status changes) and
//! cannot be edited or deleted. Edits and deletes are restricted to the
//! comment author, or an admin.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    db::DbClient,
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    types::{CommentListResponse, CreateCommentRequest, ReactionRequest, UpdateCommentRequest},
};
use incentedge_core::{ApplicationId, Comment, CommentId, UserId};

// ============================================================================
// SHARED STATE
// ============================================================================

/// Shared state for comment routes.
#[derive(Clone)]
pub struct CommentState {
    pub db: DbClient,
}

impl CommentState {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }

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
}

/// Only the author or an admin may mutate a comment; system comments are
/// immutable audit records.
fn check_mutable(comment: &Comment, user_id: UserId, is_admin: bool) -> ApiResult<()> {
    if comment.is_system {
        return Err(ApiError::forbidden("System comments cannot be modified"));
    }
    if comment.is_deleted() {
        return Err(ApiError::state_conflict("Comment has been deleted"));
    }
    if comment.author != Some(user_id) && !is_admin {
        return Err(ApiError::forbidden(
            "Only the comment author or an admin may modify a comment",
        ));
    }
    Ok(())
}

/// Toggle `user_id` under `emoji` in the reactions map.
fn toggle_reaction(reactions: &JsonValue, emoji: &str, user_id: UserId) -> JsonValue {
    let mut map = reactions
        .as_object()
        .cloned()
        .unwrap_or_default();

    let user_token = json!(user_id);
    let mut users: Vec<JsonValue> = map
        .get(emoji)
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    if let Some(pos) = users.iter().position(|u| *u == user_token) {
        users.remove(pos);
    } else {
        users.push(user_token);
    }

    if users.is_empty() {
        map.remove(emoji);
    } else {
        map.insert(emoji.to_string(), JsonValue::Array(users));
    }

    JsonValue::Object(map)
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/v1/applications/{id}/comments - Create a comment
#[utoipa::path(
    post,
    path = "/api/v1/applications/{id}/comments",
    tag = "Comments",
    params(("id" = Uuid, Path, description = "Application ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = Comment),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Application not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_comment(
    State(state): State<Arc<CommentState>>,
    AuthExtractor(auth): AuthExtractor,
    Path(application_id): Path<ApplicationId>,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.body.trim().is_empty() {
        return Err(ApiError::missing_field("body"));
    }

    state.require_application(application_id, auth.org_id).await?;

    // A reply must point at a live comment on the same application
    if let Some(parent_id) = req.parent_comment_id {
        let parent = state
            .db
            .comment_get(parent_id, application_id, auth.org_id)
            .await?
            .ok_or_else(|| ApiError::comment_not_found(parent_id))?;
        if parent.is_deleted() {
            return Err(ApiError::state_conflict("Cannot reply to a deleted comment"));
        }
    }

    let comment = state
        .db
        .comment_create(
            application_id,
            auth.org_id,
            Some(auth.user_id),
            req.parent_comment_id,
            &req.body,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /api/v1/applications/{id}/comments - List comments (thread order)
#[utoipa::path(
    get,
    path = "/api/v1/applications/{id}/comments",
    tag = "Comments",
    params(("id" = Uuid, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Comment list", body = CommentListResponse),
        (status = 404, description = "Application not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_comments(
    State(state): State<Arc<CommentState>>,
    AuthExtractor(auth): AuthExtractor,
    Path(application_id): Path<ApplicationId>,
) -> ApiResult<impl IntoResponse> {
    state.require_application(application_id, auth.org_id).await?;
    let comments = state.db.comment_list(application_id, auth.org_id).await?;

    Ok(Json(CommentListResponse { comments }))
}

/// PATCH /api/v1/applications/{id}/comments/{comment_id} - Edit comment body
#[utoipa::path(
    patch,
    path = "/api/v1/applications/{id}/comments/{comment_id}",
    tag = "Comments",
    params(
        ("id" = Uuid, Path, description = "Application ID"),
        ("comment_id" = Uuid, Path, description = "Comment ID"),
    ),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Comment updated", body = Comment),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 403, description = "Not the author", body = ApiError),
        (status = 404, description = "Comment not found", body = ApiError),
        (status = 409, description = "Comment deleted", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_comment(
    State(state): State<Arc<CommentState>>,
    AuthExtractor(auth): AuthExtractor,
    Path((application_id, comment_id)): Path<(ApplicationId, CommentId)>,
    Json(req): Json<UpdateCommentRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.body.trim().is_empty() {
        return Err(ApiError::missing_field("body"));
    }

    let comment = state
        .db
        .comment_get(comment_id, application_id, auth.org_id)
        .await?
        .ok_or_else(|| ApiError::comment_not_found(comment_id))?;
    check_mutable(&comment, auth.user_id, auth.is_admin())?;

    let updated = state
        .db
        .comment_update_body(comment_id, application_id, auth.org_id, &req.body)
        .await?
        .ok_or_else(|| ApiError::comment_not_found(comment_id))?;

    Ok(Json(updated))
}

/// DELETE /api/v1/applications/{id}/comments/{comment_id} - Soft delete
#[utoipa::path(
    delete,
    path = "/api/v1/applications/{id}/comments/{comment_id}",
    tag = "Comments",
    params(
        ("id" = Uuid, Path, description = "Application ID"),
        ("comment_id" = Uuid, Path, description = "Comment ID"),
    ),
    responses(
        (status = 204, description = "Comment soft-deleted"),
        (status = 403, description = "Not the author", body = ApiError),
        (status = 404, description = "Comment not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_comment(
    State(state): State<Arc<CommentState>>,
    AuthExtractor(auth): AuthExtractor,
    Path((application_id, comment_id)): Path<(ApplicationId, CommentId)>,
) -> ApiResult<StatusCode> {
    let comment = state
        .db
        .comment_get(comment_id, application_id, auth.org_id)
        .await?
        .ok_or_else(|| ApiError::comment_not_found(comment_id))?;
    check_mutable(&comment, auth.user_id, auth.is_admin())?;

    state
        .db
        .comment_soft_delete(comment_id, application_id, auth.org_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/applications/{id}/comments/{comment_id}/reactions - Toggle
#[utoipa::path(
    post,
    path = "/api/v1/applications/{id}/comments/{comment_id}/reactions",
    tag = "Comments",
    params(
        ("id" = Uuid, Path, description = "Application ID"),
        ("comment_id" = Uuid, Path, description = "Comment ID"),
    ),
    request_body = ReactionRequest,
    responses(
        (status = 200, description = "Reaction toggled", body = Comment),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Comment not found", body = ApiError),
        (status = 409, description = "Comment deleted", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn toggle_comment_reaction(
    State(state): State<Arc<CommentState>>,
    AuthExtractor(auth): AuthExtractor,
    Path((application_id, comment_id)): Path<(ApplicationId, CommentId)>,
    Json(req): Json<ReactionRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.emoji.trim().is_empty() {
        return Err(ApiError::missing_field("emoji"));
    }

    let comment = state
        .db
        .comment_get(comment_id, application_id, auth.org_id)
        .await?
        .ok_or_else(|| ApiError::comment_not_found(comment_id))?;
    if comment.is_deleted() {
        return Err(ApiError::state_conflict("Comment has been deleted"));
    }

    let reactions = toggle_reaction(&comment.reactions, req.emoji.trim(), auth.user_id);
    let updated = state
        .db
        .comment_set_reactions(comment_id, application_id, auth.org_id, &reactions)
        .await?
        .ok_or_else(|| ApiError::comment_not_found(comment_id))?;

    Ok(Json(updated))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the comment routes router, nested under /applications.
pub fn create_router(db: DbClient) -> axum::Router {
    let state = Arc::new(CommentState::new(db));

    axum::Router::new()
        .route("/:id/comments", axum::routing::post(create_comment))
        .route("/:id/comments", axum::routing::get(list_comments))
        .route(
            "/:id/comments/:comment_id",
            axum::routing::patch(update_comment),
        )
        .route(
            "/:id/comments/:comment_id",
            axum::routing::delete(delete_comment),
        )
        .route(
            "/:id/comments/:comment_id/reactions",
            axum::routing::post(toggle_comment_reaction),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use incentedge_core::new_entity_id;

    fn sample_comment(author: Option<UserId>, is_system: bool) -> Comment {
        let now = Utc::now();
        Comment {
            id: new_entity_id(),
            application_id: new_entity_id(),
            org_id: new_entity_id(),
            author,
            parent_comment_id: None,
            body: "Looks ready to me".to_string(),
            reactions: json!({}),
            is_system,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_toggle_reaction_adds_then_removes() {
        let user = new_entity_id();
        let empty = json!({});

        let added = toggle_reaction(&empty, "👍", user);
        assert_eq!(added["👍"].as_array().unwrap().len(), 1);

        let removed = toggle_reaction(&added, "👍", user);
        assert!(removed.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_toggle_reaction_keeps_other_users() {
        let alice = new_entity_id();
        let bob = new_entity_id();
        let both = toggle_reaction(&toggle_reaction(&json!({}), "🎉", alice), "🎉", bob);
        assert_eq!(both["🎉"].as_array().unwrap().len(), 2);

        let after = toggle_reaction(&both, "🎉", alice);
        assert_eq!(after["🎉"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_system_comments_are_immutable() {
        let user = new_entity_id();
        let comment = sample_comment(None, true);
        let err = check_mutable(&comment, user, true).expect_err("system comment");
        assert_eq!(err.code, crate::error::ErrorCode::Forbidden);
    }

    #[test]
    fn test_only_author_or_admin_may_mutate() {
        let author = new_entity_id();
        let other = new_entity_id();
        let comment = sample_comment(Some(author), false);

        assert!(check_mutable(&comment, author, false).is_ok());
        assert!(check_mutable(&comment, other, true).is_ok());
        assert!(check_mutable(&comment, other, false).is_err());
    }
}
