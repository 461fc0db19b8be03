//! Property-Based Tests for Authentication Enforcement
//!
//! For any request to a protected route:
//! - Missing or invalid bearer credentials yield 401 Unauthorized.
//! - A valid token with an X-Org-ID header that disagrees with the token's
//!   org claim yields 403 Forbidden.
//! - A valid token (with a matching or absent X-Org-ID header) reaches the
//!   handler.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware,
    routing::get,
    Router,
};
use incentedge_api::{
    auth::{generate_jwt_token, AuthConfig, JwtSecret},
    middleware::{auth_middleware, AuthMiddlewareState},
};
use incentedge_core::Role;
use proptest::prelude::*;
use tower::ServiceExt;
use uuid::Uuid;

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: JwtSecret::new("a_test_secret_long_enough_for_hs256_use".to_string())
            .expect("non-empty secret"),
        ..AuthConfig::default()
    }
}

fn test_app() -> Router {
    let auth_state = AuthMiddlewareState::new(test_auth_config());

    Router::new()
        .route("/api/v1/probe", get(|| async { "ok" }))
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
}

// ============================================================================
// STRATEGIES
// ============================================================================

#[derive(Debug, Clone)]
enum AuthHeader {
    ValidJwt { org_id: Uuid },
    InvalidJwt(String),
    MalformedAuth(String),
    None,
}

fn auth_header_strategy() -> impl Strategy<Value = AuthHeader> {
    prop_oneof![
        any::<[u8; 16]>().prop_map(|bytes| AuthHeader::ValidJwt {
            org_id: Uuid::from_bytes(bytes),
        }),
        "[A-Za-z0-9_-]{20,60}\\.[A-Za-z0-9_-]{20,60}\\.[A-Za-z0-9_-]{20,60}"
            .prop_map(AuthHeader::InvalidJwt),
        "Basic [A-Za-z0-9+/=]{10,40}".prop_map(AuthHeader::MalformedAuth),
        Just(AuthHeader::None),
    ]
}

#[derive(Debug, Clone)]
enum OrgHeader {
    Matching,
    Mismatched(Uuid),
    Garbage(String),
    None,
}

fn org_header_strategy() -> impl Strategy<Value = OrgHeader> {
    prop_oneof![
        Just(OrgHeader::Matching),
        any::<[u8; 16]>().prop_map(|bytes| OrgHeader::Mismatched(Uuid::from_bytes(bytes))),
        "[a-z0-9-]{8,30}".prop_map(OrgHeader::Garbage),
        Just(OrgHeader::None),
    ]
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_authentication_enforcement(
        auth_header in auth_header_strategy(),
        org_header in org_header_strategy(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let app = test_app();
            let config = test_auth_config();

            let mut builder = Request::builder().uri("/api/v1/probe");

            let (has_valid_auth, token_org) = match &auth_header {
                AuthHeader::ValidJwt { org_id } => {
                    let token = generate_jwt_token(
                        &config,
                        Uuid::now_v7(),
                        *org_id,
                        Role::Member,
                    )
                    .unwrap();
                    builder = builder.header("authorization", format!("Bearer {}", token));
                    (true, Some(*org_id))
                }
                AuthHeader::InvalidJwt(token) => {
                    builder = builder.header("authorization", format!("Bearer {}", token));
                    (false, None)
                }
                AuthHeader::MalformedAuth(value) => {
                    builder = builder.header("authorization", value);
                    (false, None)
                }
                AuthHeader::None => (false, None),
            };

            // Expected status once authentication itself has succeeded
            let (header_unparseable, header_mismatched) = match (&org_header, token_org) {
                (OrgHeader::Matching, Some(org_id)) => {
                    builder = builder.header("x-org-id", org_id.to_string());
                    (false, false)
                }
                (OrgHeader::Matching, None) => (false, false), // nothing to attach
                (OrgHeader::Mismatched(other), _) => {
                    builder = builder.header("x-org-id", other.to_string());
                    // A random UUID matching the token org is vanishingly
                    // unlikely but handle it for correctness
                    (false, token_org != Some(*other))
                }
                (OrgHeader::Garbage(value), _) => {
                    builder = builder.header("x-org-id", value);
                    (true, false)
                }
                (OrgHeader::None, _) => (false, false),
            };

            let request = builder.body(Body::empty()).unwrap();
            let response = app.oneshot(request).await.unwrap();
            let status = response.status();

            if !has_valid_auth {
                prop_assert_eq!(
                    status,
                    StatusCode::UNAUTHORIZED,
                    "expected 401 for {:?}",
                    auth_header
                );
            } else if header_unparseable {
                prop_assert_eq!(
                    status,
                    StatusCode::BAD_REQUEST,
                    "expected 400 for org header {:?}",
                    org_header
                );
            } else if header_mismatched {
                prop_assert_eq!(
                    status,
                    StatusCode::FORBIDDEN,
                    "expected 403 for org header {:?}",
                    org_header
                );
            } else {
                prop_assert_eq!(status, StatusCode::OK);
            }

            Ok(())
        })?;
    }
}
