//! Router Smoke Tests
//!
//! Build the full secured router and poke the endpoints that work without a
//! database: health liveness, the OpenAPI document, and the auth wall in
//! front of /api/v1.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use incentedge_api::{
    auth::{generate_jwt_token, AuthConfig, JwtSecret},
    create_api_router, ApiConfig, DbClient, DbConfig, EventBus,
};
use incentedge_core::Role;
use tower::ServiceExt;

fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: JwtSecret::new("a_smoke_test_secret_long_enough_for_hs256".to_string())
            .expect("non-empty secret"),
        ..AuthConfig::default()
    }
}

fn test_router() -> axum::Router {
    let db = DbClient::from_config(&DbConfig::from_env()).expect("pool config");
    let events = EventBus::default();
    create_api_router(db, events, &ApiConfig::default(), test_auth_config())
        .expect("router builds")
}

#[tokio::test]
async fn test_liveness_needs_no_auth() {
    let app = test_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health/live")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = test_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_api_routes_reject_unauthenticated_requests() {
    let app = test_router();

    for uri in ["/api/v1/applications", "/api/v1/programs", "/api/v1/webhooks"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "expected 401 for {}",
            uri
        );
    }
}

#[tokio::test]
async fn test_webhook_listing_works_with_valid_token() {
    // Webhooks live in process memory, so this route works without a
    // database behind the pool
    let app = test_router();
    let config = test_auth_config();

    let token = generate_jwt_token(
        &config,
        incentedge_core::new_entity_id(),
        incentedge_core::new_entity_id(),
        Role::Member,
    )
    .expect("token");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/webhooks")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = test_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v2/applications")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
