//! REST API Routes Module
//!
//! Route handlers organized by resource:
//! - Application CRUD, status transitions, and the submission workflow
//! - Tasks (including bulk operations) and comments nested under applications
//! - Program catalog
//! - Outbound webhook registration and delivery
//! - Health check endpoints (Kubernetes-compatible)
//! - CORS support for browser-based clients

pub mod application;
pub mod comment;
pub mod health;
pub mod program;
pub mod status;
pub mod task;
pub mod webhooks;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::auth::AuthConfig;
use crate::config::ApiConfig;
use crate::db::DbClient;
use crate::error::{ApiError, ApiResult};
use crate::events::EventBus;
use crate::middleware::{
    auth_middleware, rate_limit_middleware, AuthMiddlewareState, RateLimitState,
};
use crate::openapi::ApiDoc;
use crate::services::WorkflowService;

// Re-export route creation functions for convenience
pub use application::create_router as application_router;
pub use comment::create_router as comment_router;
pub use health::create_router as health_router;
pub use program::create_router as program_router;
pub use status::create_router as status_router;
pub use task::create_router as task_router;
pub use webhooks::create_router as webhooks_router;

// ============================================================================
// OPENAPI ENDPOINTS
// ============================================================================

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// PRODUCTION VALIDATION
// ============================================================================

/// Check if running in a production environment.
fn is_production_environment() -> bool {
    std::env::var("INCENTEDGE_ENVIRONMENT")
        .map(|e| matches!(e.to_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false)
}

/// Validate API configuration for production use.
fn validate_api_config_for_production(config: &ApiConfig) -> ApiResult<()> {
    if config.cors_origins.is_empty() {
        return Err(ApiError::invalid_input(
            "CORS origins not configured for production. Set INCENTEDGE_CORS_ORIGINS.",
        ));
    }
    if !config.rate_limit_enabled {
        tracing::warn!(
            "Rate limiting is disabled in production - this is not recommended.\n\
             Set INCENTEDGE_RATE_LIMIT_ENABLED=true to enable rate limiting."
        );
    }
    Ok(())
}

// ============================================================================
// SECURE ROUTER BUILDER
// ============================================================================

/// Builder for the API router with auth + rate limiting by default.
///
/// All /api/v1 routes are protected by:
/// 1. Authentication middleware (JWT bearer)
/// 2. Rate limiting middleware
/// 3. Request tracing
/// 4. CORS layer
///
/// Health endpoints are exempt from authentication but still rate-limited.
pub struct SecureRouterBuilder {
    db: DbClient,
    events: EventBus,
    api_config: ApiConfig,
    auth_state: AuthMiddlewareState,
    rate_limit_state: RateLimitState,
}

impl SecureRouterBuilder {
    /// Create a new SecureRouterBuilder.
    ///
    /// In production environments, this validates that security configuration
    /// is properly set up and returns an error if critical settings are
    /// missing.
    pub fn new(
        db: DbClient,
        events: EventBus,
        api_config: ApiConfig,
        auth_config: AuthConfig,
    ) -> ApiResult<Self> {
        if is_production_environment() {
            auth_config.validate_for_production()?;
            validate_api_config_for_production(&api_config)?;
        }

        let auth_state = AuthMiddlewareState::new(auth_config);
        let rate_limit_state = RateLimitState::new(api_config.clone());

        Ok(Self {
            db,
            events,
            api_config,
            auth_state,
            rate_limit_state,
        })
    }

    /// Build the resource routes (require authentication).
    fn build_resource_routes(&self) -> ApiResult<Router> {
        let workflow = WorkflowService::new(self.db.clone(), self.events.clone());

        // Status, submit, task, and comment routes all hang off /applications
        let applications = application::create_router(self.db.clone(), self.events.clone())
            .merge(status::create_router(self.db.clone(), workflow))
            .merge(task::create_router(self.db.clone(), self.events.clone()))
            .merge(comment::create_router(self.db.clone()));

        Ok(Router::new()
            .nest("/applications", applications)
            .nest("/programs", program::create_router(self.db.clone()))
            .nest("/webhooks", webhooks::create_router(self.events.clone())?))
    }

    /// Build the complete router with the full security stack.
    ///
    /// # Middleware Order (outer to inner)
    /// 1. CORS (outermost) - handles preflight requests
    /// 2. Tracing - request spans
    /// 3. Rate Limiting - rejects floods before expensive auth
    /// 4. Auth (innermost, only on /api/v1/*) - validates credentials
    pub fn build(self) -> ApiResult<Router> {
        let api_routes = self
            .build_resource_routes()?
            .layer(from_fn_with_state(self.auth_state.clone(), auth_middleware));

        let mut router = Router::new()
            .nest("/api/v1", api_routes)
            // Health checks (no auth required)
            .nest("/health", health::create_router(self.db.clone()))
            // OpenAPI spec
            .route("/openapi.json", get(openapi_json));

        #[cfg(feature = "swagger-ui")]
        {
            use utoipa_swagger_ui::SwaggerUi;
            router = router
                .merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", ApiDoc::openapi()));
        }

        let cors = build_cors_layer(&self.api_config);

        Ok(router
            .layer(from_fn_with_state(self.rate_limit_state, rate_limit_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(cors))
    }
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-org-id"),
        ])
        .expose_headers([
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("retry-after"),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any).allow_headers(Any).expose_headers(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}

/// Create the complete API router with all routes, authentication, and rate
/// limiting.
///
/// - REST routes under /api/v1/* (JWT required, org-scoped)
/// - Webhook management under /api/v1/webhooks
/// - Health checks at /health/* (public)
/// - OpenAPI spec at /openapi.json
/// - Swagger UI at /swagger-ui (when the swagger-ui feature is enabled)
pub fn create_api_router(
    db: DbClient,
    events: EventBus,
    api_config: &ApiConfig,
    auth_config: AuthConfig,
) -> ApiResult<Router> {
    SecureRouterBuilder::new(db, events, api_config.clone(), auth_config)
        .and_then(|builder| builder.build())
}

/// Create an API router without authentication middleware.
///
/// **WARNING**: Testing and development only. Production deployments MUST use
/// `create_api_router` with a proper `AuthConfig`.
#[cfg(any(test, feature = "dev"))]
pub fn create_api_router_unauthenticated(
    db: DbClient,
    events: EventBus,
    api_config: &ApiConfig,
) -> ApiResult<Router> {
    let workflow = WorkflowService::new(db.clone(), events.clone());

    let applications = application::create_router(db.clone(), events.clone())
        .merge(status::create_router(db.clone(), workflow))
        .merge(task::create_router(db.clone(), events.clone()))
        .merge(comment::create_router(db.clone()));

    let api_routes = Router::new()
        .nest("/applications", applications)
        .nest("/programs", program::create_router(db.clone()))
        .nest("/webhooks", webhooks::create_router(events.clone())?);

    let router = Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health::create_router(db))
        .route("/openapi.json", get(openapi_json));

    let cors = build_cors_layer(api_config);

    Ok(router.layer(TraceLayer::new_for_http()).layer(cors))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_environment_detection() {
        // Relies on INCENTEDGE_ENVIRONMENT being unset in the test runner
        if std::env::var("INCENTEDGE_ENVIRONMENT").is_err() {
            assert!(!is_production_environment());
        }
    }

    #[test]
    fn test_production_requires_cors_origins() {
        let config = ApiConfig::default();
        assert!(validate_api_config_for_production(&config).is_err());

        let config = ApiConfig {
            cors_origins: vec!["https://app.incentedge.example".to_string()],
            ..ApiConfig::default()
        };
        assert!(validate_api_config_for_production(&config).is_ok());
    }
}
