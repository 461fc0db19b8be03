//! OpenAPI Specification for the IncentEdge API
//!
//! Generates the OpenAPI document from the route annotations and type
//! schemas via utoipa.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::types::*;

// Import route modules for path references
use crate::routes::{application, comment, health, program, status, task, webhooks};

use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::webhooks::{
    CreateWebhookRequest, ListWebhooksResponse, Webhook, WebhookEventType, WebhookResponse,
};

// Domain types from incentedge-core
use incentedge_core::{
    Application, ApplicationStatus, Comment, Program, ProgramType, Role, StatusHistoryRecord,
    Task, TaskCategory, TaskGate, TaskPriority, TaskStatus, TransitionCheck, TransitionDenial,
};

/// OpenAPI document for the IncentEdge API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "IncentEdge API",
        version = "0.1.0",
        description = "Multi-tenant incentive application tracking: program catalog, \
                       application workflow state machine, task checklists, comments, \
                       and outbound webhooks",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Applications", description = "Incentive application CRUD"),
        (name = "Status", description = "Workflow state machine: transitions, history, submission"),
        (name = "Tasks", description = "Checklist tasks and bulk operations"),
        (name = "Comments", description = "Threaded comments with reactions"),
        (name = "Programs", description = "Incentive program catalog"),
        (name = "Webhooks", description = "Outbound webhook registration"),
        (name = "Health", description = "Liveness and readiness probes")
    ),
    paths(
        // === Application Routes ===
        application::create_application,
        application::list_applications,
        application::get_application,
        application::update_application,
        application::delete_application,

        // === Status & Submission Routes ===
        status::get_status,
        status::change_status,
        status::check_readiness,
        status::submit_application,

        // === Task Routes ===
        task::create_task,
        task::list_tasks,
        task::get_task,
        task::update_task,
        task::delete_task,
        task::bulk_update_tasks,

        // === Comment Routes ===
        comment::create_comment,
        comment::list_comments,
        comment::update_comment,
        comment::delete_comment,
        comment::toggle_comment_reaction,

        // === Program Routes ===
        program::create_program,
        program::list_programs,
        program::get_program,

        // === Webhook Routes ===
        webhooks::create_webhook,
        webhooks::list_webhooks,
        webhooks::get_webhook,
        webhooks::delete_webhook,

        // === Health Routes ===
        health::liveness,
        health::readiness,
    ),
    components(
        schemas(
            // === Error Types ===
            ApiError, ErrorCode,

            // === Application Types ===
            CreateApplicationRequest, UpdateApplicationRequest,
            ApplicationResponse, ApplicationListResponse,

            // === Status Types ===
            StatusChangeRequest, StatusResponse, StatusChangeResponse,
            SubmitRequest, SubmitResponse, ReadinessResponse,

            // === Task Types ===
            CreateTaskRequest, UpdateTaskRequest, TaskListResponse,
            BulkTaskAction, BulkTaskRequest, BulkTaskResponse,

            // === Comment Types ===
            CreateCommentRequest, UpdateCommentRequest, ReactionRequest,
            CommentListResponse,

            // === Program Types ===
            CreateProgramRequest, ProgramListResponse,

            // === Webhook Types ===
            CreateWebhookRequest, WebhookResponse, ListWebhooksResponse,
            Webhook, WebhookEventType,

            // === Health Types ===
            HealthResponse, HealthStatus, HealthDetails, ComponentHealth,

            // === Core Domain Types ===
            Application, Task, Comment, Program, StatusHistoryRecord,
            ApplicationStatus, TaskStatus, TaskCategory, TaskPriority,
            ProgramType, Role, TaskGate, TransitionCheck, TransitionDenial,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security scheme modifier for the OpenAPI document.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT Bearer token with org_id and role claims"))
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    /// Generate the OpenAPI spec as a JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
