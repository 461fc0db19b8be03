//! Axum Middleware for Authentication and Rate Limiting
//!
//! The auth middleware validates the Bearer token on every request, injects
//! an `AuthContext` into request extensions, and rejects unauthenticated
//! requests with 401. The rate limit middleware keys limits on the
//! organization for authenticated requests and on the client IP otherwise.

use crate::auth::{authenticate, AuthConfig, AuthContext};
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

/// Shared state for authentication middleware.
#[derive(Debug, Clone)]
pub struct AuthMiddlewareState {
    pub auth_config: Arc<AuthConfig>,
}

impl AuthMiddlewareState {
    pub fn new(auth_config: AuthConfig) -> Self {
        Self {
            auth_config: Arc::new(auth_config),
        }
    }
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

/// Axum middleware for authentication.
///
/// 1. Extracts the Authorization and X-Org-ID headers
/// 2. Validates the Bearer token
/// 3. Returns 401 Unauthorized if authentication fails
/// 4. Returns 403 Forbidden if the org header disagrees with the token
/// 5. Injects AuthContext into request extensions on success
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok());

    let org_id_header = request
        .headers()
        .get("x-org-id")
        .and_then(|h| h.to_str().ok());

    let auth_context = authenticate(&state.auth_config, auth_header, org_id_header)
        .map_err(AuthMiddlewareError)?;

    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Error wrapper for middleware that implements IntoResponse.
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

/// Typed Axum extractor for authentication context.
///
/// Implements `FromRequestParts` so handlers can require auth by signature.
/// The `auth_middleware` must be applied to the route for this extractor to
/// work; without it the extractor returns 500.
#[derive(Debug, Clone)]
pub struct AuthExtractor(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthExtractor)
            .ok_or_else(|| {
                AuthMiddlewareError(ApiError::internal_error(
                    "AuthContext not found in request extensions. \
                     Ensure auth_middleware is applied to this route.",
                ))
            })
    }
}

impl std::ops::Deref for AuthExtractor {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Extract AuthContext from request extensions.
pub fn extract_auth_context(request: &Request) -> ApiResult<&AuthContext> {
    request
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::unauthorized("Auth context missing from request"))
}

// ============================================================================
// RATE LIMITING MIDDLEWARE
// ============================================================================

use crate::config::ApiConfig;
use axum::http::StatusCode;
use dashmap::DashMap;
use governor::{clock::DefaultClock, Quota, RateLimiter};
use std::net::IpAddr;
use std::num::NonZeroU32;

/// Type alias for the rate limiter we use.
type DirectRateLimiter =
    RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, DefaultClock>;

/// Key for rate limiting - either IP address or organization ID.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum RateLimitKey {
    /// Unauthenticated request - keyed by IP address
    Ip(IpAddr),
    /// Authenticated request - keyed by organization ID
    Org(String),
}

/// State for rate limiting middleware.
#[derive(Clone)]
pub struct RateLimitState {
    config: Arc<ApiConfig>,
    /// Per-key rate limiters - DashMap for lock-free concurrent access
    limiters: Arc<DashMap<RateLimitKey, Arc<DirectRateLimiter>>>,
}

impl RateLimitState {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config: Arc::new(config),
            limiters: Arc::new(DashMap::new()),
        }
    }

    /// Get or create a rate limiter for the given key.
    fn get_or_create_limiter(&self, key: &RateLimitKey) -> Arc<DirectRateLimiter> {
        let limiter = self.limiters.entry(key.clone()).or_insert_with(|| {
            let requests_per_minute = match key {
                RateLimitKey::Ip(_) => self.config.rate_limit_unauthenticated,
                RateLimitKey::Org(_) => self.config.rate_limit_authenticated,
            };

            let quota =
                Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN))
                    .allow_burst(
                        NonZeroU32::new(self.config.rate_limit_burst).unwrap_or(NonZeroU32::MIN),
                    );

            Arc::new(RateLimiter::direct(quota))
        });

        limiter.clone()
    }
}

/// Error type for rate limit middleware.
pub struct RateLimitError {
    /// Seconds until rate limit resets
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        use axum::http::HeaderValue;

        let error = ApiError::too_many_requests(Some(self.retry_after));
        let status = StatusCode::TOO_MANY_REQUESTS;

        let mut response = (status, axum::Json(error)).into_response();
        let headers = response.headers_mut();
        headers.insert(
            axum::http::header::HeaderName::from_static("retry-after"),
            HeaderValue::from_str(&self.retry_after.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("60")),
        );

        response
    }
}

/// Extract client IP from request, considering proxy headers.
fn extract_client_ip(request: &Request, fallback: Option<std::net::SocketAddr>) -> IpAddr {
    // X-Forwarded-For can contain multiple IPs, take the first one
    if let Some(forwarded_for) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
    {
        if let Some(first_ip) = forwarded_for.split(',').next() {
            if let Ok(ip) = first_ip.trim().parse() {
                return ip;
            }
        }
    }

    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
    {
        if let Ok(ip) = real_ip.trim().parse() {
            return ip;
        }
    }

    // Unroutable placeholder when serving without connect info (tests)
    fallback
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED))
}

/// Rate limiting middleware.
///
/// Enforces limits per IP for unauthenticated requests and per organization
/// for authenticated ones. When limited, returns 429 Too Many Requests with a
/// Retry-After header.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    connect_info: Option<axum::extract::ConnectInfo<std::net::SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    use axum::http::HeaderValue;

    if !state.config.rate_limit_enabled {
        return Ok(next.run(request).await);
    }

    let addr = connect_info.map(|axum::extract::ConnectInfo(addr)| addr);
    let key = if let Some(auth) = request.extensions().get::<AuthContext>() {
        RateLimitKey::Org(auth.org_id.to_string())
    } else {
        RateLimitKey::Ip(extract_client_ip(&request, addr))
    };

    let limiter = state.get_or_create_limiter(&key);

    match limiter.check() {
        Ok(_) => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();

            let limit = match &key {
                RateLimitKey::Ip(_) => state.config.rate_limit_unauthenticated,
                RateLimitKey::Org(_) => state.config.rate_limit_authenticated,
            };
            headers.insert(
                axum::http::header::HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from_str(&limit.to_string())
                    .unwrap_or_else(|_| HeaderValue::from_static("100")),
            );

            Ok(response)
        }
        Err(not_until) => {
            let retry_after = not_until
                .wait_time_from(governor::clock::Clock::now(&DefaultClock::default()))
                .as_secs()
                .max(1); // Minimum 1 second

            Err(RateLimitError { retry_after })
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{generate_jwt_token, JwtSecret};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use incentedge_core::{new_entity_id, Role};
    use tower::ServiceExt; // for `oneshot`

    fn test_auth_config() -> AuthConfig {
        let mut config = AuthConfig::default();
        config.jwt_secret =
            JwtSecret::new("test_secret".to_string()).expect("test secret should be valid");
        config
    }

    fn test_app() -> Router {
        let auth_state = AuthMiddlewareState::new(test_auth_config());

        Router::new()
            .route("/protected", get(|| async { "Protected resource" }))
            .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
    }

    #[tokio::test]
    async fn test_middleware_with_valid_jwt() -> Result<(), String> {
        let auth_config = test_auth_config();
        let token = generate_jwt_token(
            &auth_config,
            new_entity_id(),
            new_entity_id(),
            Role::Member,
        )
        .map_err(|e| e.message)?;

        let app = test_app();
        let request = Request::builder()
            .uri("/protected")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = app
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn test_middleware_without_authentication() -> Result<(), String> {
        let app = test_app();

        let request = Request::builder()
            .uri("/protected")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = app
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_middleware_with_invalid_jwt() -> Result<(), String> {
        let app = test_app();

        let request = Request::builder()
            .uri("/protected")
            .header("authorization", "Bearer invalid.jwt.token")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = app
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_middleware_with_malformed_auth_header() -> Result<(), String> {
        let app = test_app();

        let request = Request::builder()
            .uri("/protected")
            .header("authorization", "NotBearer token")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = app
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_middleware_rejects_mismatched_org_header() -> Result<(), String> {
        let auth_config = test_auth_config();
        let token = generate_jwt_token(
            &auth_config,
            new_entity_id(),
            new_entity_id(),
            Role::Member,
        )
        .map_err(|e| e.message)?;

        let app = test_app();
        let request = Request::builder()
            .uri("/protected")
            .header("authorization", format!("Bearer {}", token))
            .header("x-org-id", new_entity_id().to_string())
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = app
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn test_auth_extractor_with_valid_auth() -> Result<(), String> {
        let auth_config = test_auth_config();
        let org_id = new_entity_id();
        let token = generate_jwt_token(&auth_config, new_entity_id(), org_id, Role::Admin)
            .map_err(|e| e.message)?;

        async fn handler(AuthExtractor(auth): AuthExtractor) -> String {
            format!("Org: {}, Admin: {}", auth.org_id, auth.is_admin())
        }

        let auth_state = AuthMiddlewareState::new(auth_config);
        let app = Router::new()
            .route("/protected", get(handler))
            .layer(middleware::from_fn_with_state(auth_state, auth_middleware));

        let request = Request::builder()
            .uri("/protected")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = app
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| format!("Failed to read body: {:?}", e))?;
        let body_str = String::from_utf8(body.to_vec())
            .map_err(|e| format!("Invalid UTF-8 body: {}", e))?;

        assert!(body_str.contains(&format!("Org: {}", org_id)));
        assert!(body_str.contains("Admin: true"));
        Ok(())
    }

    #[tokio::test]
    async fn test_auth_extractor_without_middleware() -> Result<(), String> {
        async fn handler(AuthExtractor(_auth): AuthExtractor) -> String {
            "Should not reach here".to_string()
        }

        // Router WITHOUT auth middleware
        let app = Router::new().route("/unprotected", get(handler));

        let request = Request::builder()
            .uri("/unprotected")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = app
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        Ok(())
    }
}
