//! Webhook REST API Routes
//!
//! Outbound webhook registration and delivery. External systems register a
//! URL plus an event filter; matching domain events are delivered as
//! HMAC-SHA256-signed JSON payloads with exponential-backoff retry.
//!
//! Webhooks are org-scoped: registration records the caller's org, and a
//! delivery never crosses the org boundary.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use hmac::{Hmac, Mac};
use incentedge_core::{new_entity_id, OrgId};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    events::{DomainEvent, EventBus},
    middleware::AuthExtractor,
};

// ============================================================================
// TYPES
// ============================================================================

/// Supported webhook event types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    /// All events (wildcard)
    #[serde(rename = "*")]
    All,
    ApplicationCreated,
    StatusChanged,
    ApplicationSubmitted,
    ApplicationApproved,
    ApplicationRejected,
    AllTasksCompleted,
}

impl WebhookEventType {
    /// Check if this filter matches a domain event.
    pub fn matches(&self, event: &DomainEvent) -> bool {
        match self {
            WebhookEventType::All => true,
            WebhookEventType::ApplicationCreated => {
                matches!(event, DomainEvent::ApplicationCreated { .. })
            }
            WebhookEventType::StatusChanged => {
                matches!(event, DomainEvent::StatusChanged { .. })
            }
            WebhookEventType::ApplicationSubmitted => {
                matches!(event, DomainEvent::ApplicationSubmitted { .. })
            }
            WebhookEventType::ApplicationApproved => {
                matches!(event, DomainEvent::ApplicationApproved { .. })
            }
            WebhookEventType::ApplicationRejected => {
                matches!(event, DomainEvent::ApplicationRejected { .. })
            }
            WebhookEventType::AllTasksCompleted => {
                matches!(event, DomainEvent::AllTasksCompleted { .. })
            }
        }
    }
}

/// A registered webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Webhook {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: Uuid,
    /// Owning organization
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub org_id: OrgId,
    /// Target URL for webhook delivery
    pub url: String,
    /// Event types this webhook subscribes to
    pub events: Vec<WebhookEventType>,
    pub description: Option<String>,
    pub active: bool,
    /// Secret for HMAC signature (not exposed in responses)
    #[serde(skip_serializing)]
    pub secret: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub success_count: u64,
    pub failure_count: u64,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub last_delivery_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Request to register a new webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateWebhookRequest {
    /// Target URL for webhook delivery (must be HTTPS in production)
    pub url: String,
    /// Event types to subscribe to (use ["*"] for all events)
    pub events: Vec<WebhookEventType>,
    pub description: Option<String>,
    /// Secret for HMAC signature generation
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WebhookResponse {
    pub webhook: Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ListWebhooksResponse {
    pub webhooks: Vec<Webhook>,
    pub total: i32,
}

/// Webhook delivery payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub delivery_id: Uuid,
    pub event_type: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub data: serde_json::Value,
}

// ============================================================================
// SHARED STATE
// ============================================================================

/// In-memory webhook registry, the one piece of cross-request state the
/// service carries besides the rate-limiter map.
pub struct WebhookStore {
    webhooks: RwLock<HashMap<Uuid, Webhook>>,
}

impl WebhookStore {
    pub fn new() -> Self {
        Self {
            webhooks: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, webhook: Webhook) {
        let mut webhooks = self.webhooks.write().await;
        webhooks.insert(webhook.id, webhook);
    }

    /// Get a webhook, scoped to the caller's org.
    pub async fn get(&self, id: Uuid, org_id: OrgId) -> Option<Webhook> {
        let webhooks = self.webhooks.read().await;
        webhooks
            .get(&id)
            .filter(|w| w.org_id == org_id)
            .cloned()
    }

    pub async fn list_for_org(&self, org_id: OrgId) -> Vec<Webhook> {
        let webhooks = self.webhooks.read().await;
        webhooks
            .values()
            .filter(|w| w.org_id == org_id)
            .cloned()
            .collect()
    }

    /// Every webhook, for the delivery task. Org filtering happens against
    /// the event there.
    pub async fn list_all(&self) -> Vec<Webhook> {
        let webhooks = self.webhooks.read().await;
        webhooks.values().cloned().collect()
    }

    pub async fn remove(&self, id: Uuid, org_id: OrgId) -> Option<Webhook> {
        let mut webhooks = self.webhooks.write().await;
        match webhooks.get(&id) {
            Some(w) if w.org_id == org_id => webhooks.remove(&id),
            _ => None,
        }
    }

    pub async fn update_stats(&self, id: Uuid, success: bool) {
        let mut webhooks = self.webhooks.write().await;
        if let Some(webhook) = webhooks.get_mut(&id) {
            webhook.last_delivery_at = Some(chrono::Utc::now());
            if success {
                webhook.success_count += 1;
            } else {
                webhook.failure_count += 1;
            }
        }
    }
}

impl Default for WebhookStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared application state for webhook routes.
#[derive(Clone)]
pub struct WebhookState {
    pub events: EventBus,
    pub store: Arc<WebhookStore>,
    pub http_client: reqwest::Client,
}

impl WebhookState {
    pub fn new(events: EventBus) -> Result<Self, String> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            events,
            store: Arc::new(WebhookStore::new()),
            http_client,
        })
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/v1/webhooks - Register a new webhook
#[utoipa::path(
    post,
    path = "/api/v1/webhooks",
    tag = "Webhooks",
    request_body = CreateWebhookRequest,
    responses(
        (status = 201, description = "Webhook registered successfully", body = WebhookResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_webhook(
    State(state): State<Arc<WebhookState>>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<CreateWebhookRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.url.trim().is_empty() {
        return Err(ApiError::missing_field("url"));
    }

    let url =
        reqwest::Url::parse(&req.url).map_err(|_| ApiError::invalid_input("Invalid URL format"))?;

    if req.events.is_empty() {
        return Err(ApiError::missing_field("events"));
    }

    if req.secret.len() < 16 {
        return Err(ApiError::invalid_input(
            "Secret must be at least 16 characters",
        ));
    }

    let webhook = Webhook {
        id: new_entity_id(),
        org_id: auth.org_id,
        url: url.to_string(),
        events: req.events,
        description: req.description,
        active: true,
        secret: req.secret,
        created_at: chrono::Utc::now(),
        success_count: 0,
        failure_count: 0,
        last_delivery_at: None,
    };

    state.store.insert(webhook.clone()).await;

    tracing::info!(webhook_id = %webhook.id, org_id = %auth.org_id, url = %webhook.url, "Webhook registered");

    Ok((StatusCode::CREATED, Json(WebhookResponse { webhook })))
}

/// GET /api/v1/webhooks - List the caller's org webhooks
#[utoipa::path(
    get,
    path = "/api/v1/webhooks",
    tag = "Webhooks",
    responses(
        (status = 200, description = "List of webhooks", body = ListWebhooksResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_webhooks(
    State(state): State<Arc<WebhookState>>,
    AuthExtractor(auth): AuthExtractor,
) -> impl IntoResponse {
    let webhooks = state.store.list_for_org(auth.org_id).await;
    let total = webhooks.len() as i32;

    Json(ListWebhooksResponse { webhooks, total })
}

/// GET /api/v1/webhooks/{id} - Get a specific webhook
#[utoipa::path(
    get,
    path = "/api/v1/webhooks/{id}",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Webhook ID")),
    responses(
        (status = 200, description = "Webhook details", body = WebhookResponse),
        (status = 404, description = "Webhook not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_webhook(
    State(state): State<Arc<WebhookState>>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let webhook = state
        .store
        .get(id, auth.org_id)
        .await
        .ok_or_else(|| ApiError::webhook_not_found(id))?;

    Ok(Json(WebhookResponse { webhook }))
}

/// DELETE /api/v1/webhooks/{id} - Remove a webhook
#[utoipa::path(
    delete,
    path = "/api/v1/webhooks/{id}",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Webhook ID")),
    responses(
        (status = 204, description = "Webhook removed successfully"),
        (status = 404, description = "Webhook not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_webhook(
    State(state): State<Arc<WebhookState>>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let removed = state.store.remove(id, auth.org_id).await;

    if removed.is_none() {
        return Err(ApiError::webhook_not_found(id));
    }

    tracing::info!(webhook_id = %id, org_id = %auth.org_id, "Webhook removed");

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// WEBHOOK DELIVERY
// ============================================================================

/// Generate HMAC-SHA256 signature for a webhook payload.
fn sign_payload(payload: &[u8], secret: &str) -> Result<String, String> {
    type HmacSha256 = Hmac<Sha256>;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| format!("Failed to initialize HMAC: {}", e))?;
    mac.update(payload);
    let result = mac.finalize();

    Ok(hex::encode(result.into_bytes()))
}

/// Deliver one event to one webhook with retry.
pub async fn deliver_webhook(
    client: &reqwest::Client,
    webhook: &Webhook,
    event: &DomainEvent,
    store: &WebhookStore,
) {
    let delivery_id = new_entity_id();

    let event_data = serde_json::to_value(event).unwrap_or_else(|e| {
        tracing::warn!(
            webhook_id = %webhook.id,
            delivery_id = %delivery_id,
            error = %e,
            "Failed to serialize event data, using empty object"
        );
        serde_json::json!({})
    });

    let payload = WebhookPayload {
        delivery_id,
        event_type: event.event_type().to_string(),
        timestamp: chrono::Utc::now(),
        data: event_data,
    };

    let payload_bytes = match serde_json::to_vec(&payload) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize webhook payload");
            return;
        }
    };

    let signature = match sign_payload(&payload_bytes, &webhook.secret) {
        Ok(sig) => sig,
        Err(e) => {
            tracing::error!(error = %e, webhook_id = %webhook.id, "Failed to sign webhook payload");
            return;
        }
    };

    // Retry with exponential backoff: 1s, 2s, 4s (3 attempts)
    let mut delay = Duration::from_secs(1);
    let max_attempts = 3;

    for attempt in 1..=max_attempts {
        let result = client
            .post(&webhook.url)
            .header("Content-Type", "application/json")
            .header("X-Webhook-Signature", format!("sha256={}", signature))
            .header("X-Webhook-Delivery-ID", delivery_id.to_string())
            .header("X-Webhook-Event", event.event_type())
            .header("User-Agent", "IncentEdge-Webhook/1.0")
            .body(payload_bytes.clone())
            .send()
            .await;

        match result {
            Ok(response) => {
                if response.status().is_success() {
                    store.update_stats(webhook.id, true).await;
                    tracing::debug!(
                        webhook_id = %webhook.id,
                        delivery_id = %delivery_id,
                        status = %response.status(),
                        "Webhook delivered successfully"
                    );
                    return;
                } else {
                    tracing::warn!(
                        webhook_id = %webhook.id,
                        delivery_id = %delivery_id,
                        status = %response.status(),
                        attempt = attempt,
                        "Webhook delivery failed with non-2xx status"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    webhook_id = %webhook.id,
                    delivery_id = %delivery_id,
                    error = %e,
                    attempt = attempt,
                    "Webhook delivery failed"
                );
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }

    store.update_stats(webhook.id, false).await;
    tracing::error!(
        webhook_id = %webhook.id,
        delivery_id = %delivery_id,
        "Webhook delivery failed after {} attempts", max_attempts
    );
}

/// Start the webhook delivery background task: subscribe to the event bus
/// and fan deliveries out to matching webhooks in the event's org.
pub fn start_webhook_delivery_task(state: Arc<WebhookState>) {
    tokio::spawn(async move {
        let mut rx = state.events.subscribe();

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let webhooks = state.store.list_all().await;

                    for webhook in webhooks {
                        if !webhook.active || webhook.org_id != event.org_id() {
                            continue;
                        }

                        let matches = webhook.events.iter().any(|e| e.matches(&event));

                        if matches {
                            let client = state.http_client.clone();
                            let webhook = webhook.clone();
                            let event = event.clone();
                            let store = state.store.clone();

                            tokio::spawn(async move {
                                deliver_webhook(&client, &webhook, &event, &store).await;
                            });
                        }
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "Webhook delivery lagged behind");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    tracing::info!("Webhook delivery channel closed, stopping task");
                    break;
                }
            }
        }
    });
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the webhook routes router and start the delivery task.
///
/// Fails when the HTTP client cannot be created, which only happens when the
/// system TLS configuration is invalid. That is fatal at startup.
pub fn create_router(events: EventBus) -> crate::error::ApiResult<Router> {
    let state = Arc::new(
        WebhookState::new(events).map_err(crate::error::ApiError::internal_error)?,
    );

    start_webhook_delivery_task(state.clone());

    Ok(Router::new()
        .route("/", post(create_webhook))
        .route("/", get(list_webhooks))
        .route("/:id", get(get_webhook))
        .route("/:id", delete(delete_webhook))
        .with_state(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use incentedge_core::{new_entity_id, ApplicationStatus};

    fn status_event(org_id: OrgId) -> DomainEvent {
        DomainEvent::StatusChanged {
            application_id: new_entity_id(),
            org_id,
            from: Some(ApplicationStatus::UnderReview),
            to: ApplicationStatus::Approved,
            forced: false,
        }
    }

    #[test]
    fn test_webhook_event_type_matching() {
        let event = status_event(new_entity_id());

        assert!(WebhookEventType::All.matches(&event));
        assert!(WebhookEventType::StatusChanged.matches(&event));
        assert!(!WebhookEventType::ApplicationRejected.matches(&event));
    }

    #[test]
    fn test_sign_payload() {
        let payload = b"test payload";
        let secret = "supersecretkey123";

        let signature = sign_payload(payload, secret).expect("Failed to sign payload");

        assert!(!signature.is_empty());
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_webhook_serialization_hides_secret() {
        let webhook = Webhook {
            id: new_entity_id(),
            org_id: new_entity_id(),
            url: "https://example.com/webhook".to_string(),
            events: vec![WebhookEventType::All],
            description: Some("Test webhook".to_string()),
            active: true,
            secret: "supersecretkey123".to_string(),
            created_at: chrono::Utc::now(),
            success_count: 0,
            failure_count: 0,
            last_delivery_at: None,
        };

        let json = serde_json::to_string(&webhook).expect("Failed to serialize");

        assert!(!json.contains("supersecret"));
        assert!(json.contains("https://example.com/webhook"));
    }

    #[test]
    fn test_webhook_event_type_wire_forms() {
        let json = serde_json::to_string(&WebhookEventType::All).expect("Failed to serialize");
        assert_eq!(json, "\"*\"");

        let json = serde_json::to_string(&WebhookEventType::ApplicationApproved)
            .expect("Failed to serialize");
        assert_eq!(json, "\"application_approved\"");
    }

    #[tokio::test]
    async fn test_store_is_org_scoped() {
        let store = WebhookStore::new();
        let org_a = new_entity_id();
        let org_b = new_entity_id();

        let webhook = Webhook {
            id: new_entity_id(),
            org_id: org_a,
            url: "https://example.com/hook".to_string(),
            events: vec![WebhookEventType::All],
            description: None,
            active: true,
            secret: "supersecretkey123".to_string(),
            created_at: chrono::Utc::now(),
            success_count: 0,
            failure_count: 0,
            last_delivery_at: None,
        };
        let id = webhook.id;
        store.insert(webhook).await;

        assert!(store.get(id, org_a).await.is_some());
        assert!(store.get(id, org_b).await.is_none());
        assert_eq!(store.list_for_org(org_a).await.len(), 1);
        assert!(store.list_for_org(org_b).await.is_empty());

        // Cross-org removal must not delete the webhook
        assert!(store.remove(id, org_b).await.is_none());
        assert!(store.remove(id, org_a).await.is_some());
    }
}
