//! Axum middleware for the IncentEdge API.

pub mod auth;

pub use auth::{
    auth_middleware, extract_auth_context, rate_limit_middleware, AuthExtractor,
    AuthMiddlewareError, AuthMiddlewareState, RateLimitKey, RateLimitState,
};
