//! IncentEdge API - REST API Layer
//!
//! This crate provides the HTTP layer for the IncentEdge incentive
//! application tracker. It exposes REST endpoints (Axum) for applications,
//! the workflow state machine, checklist tasks, comments, the program
//! catalog, and outbound webhooks. All resource routes are JWT-protected
//! and scoped to the caller's organization.
//!
//! The domain rules live in incentedge-core; this crate wires them to
//! PostgreSQL and the wire format.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod middleware;
pub mod notify;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod types;

// Re-export commonly used types
pub use auth::{
    authenticate, generate_jwt_token, require_admin, validate_jwt_token, validate_org_ownership,
    AuthConfig, AuthContext, Claims, JwtSecret,
};
pub use config::ApiConfig;
pub use db::{DbClient, DbConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use events::{DomainEvent, EventBus};
pub use middleware::{auth_middleware, AuthExtractor, AuthMiddlewareState, RateLimitState};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use services::WorkflowService;
pub use types::*;
