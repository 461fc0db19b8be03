//! Authentication Module
//!
//! JWT bearer authentication for the IncentEdge API. Every token carries the
//! user's id, their organization id, and their role; the organization id is
//! the tenant boundary enforced by every query in the data layer.
//!
//! The `X-Org-ID` header may narrow the org for multi-org users, but it must
//! agree with the token's claim or be rejected.

use crate::error::{ApiError, ApiResult};
use incentedge_core::{OrgId, Role, UserId};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// CLOCK ABSTRACTION (FOR DETERMINISTIC TESTS + CI ROBUSTNESS)
// ============================================================================

/// Clock abstraction for JWT time validation.
///
/// Owning time validation ourselves (instead of letting `jsonwebtoken` do it)
/// avoids the `SystemTime::now().duration_since(UNIX_EPOCH).expect()` panic
/// path and makes tests fully deterministic.
pub trait JwtClock: Send + Sync {
    /// Get current time as Unix epoch seconds.
    fn now_epoch_secs(&self) -> i64;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl JwtClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}

/// Test clock helpers for common scenarios.
#[cfg(test)]
pub mod test_clocks {
    use super::FixedClock;

    /// 2024-01-01 00:00:00 UTC - always valid for tests
    pub fn valid() -> FixedClock {
        FixedClock(1704067200)
    }

    /// 2030-01-01 00:00:00 UTC - far future for expiry tests
    pub fn future() -> FixedClock {
        FixedClock(1893456000)
    }
}

// ============================================================================
// JWT SECRET (TYPE-SAFE)
// ============================================================================

/// Type-safe JWT secret that prevents accidental logging.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    /// Create a new JWT secret with validation.
    ///
    /// # Errors
    /// Returns error if the secret is empty.
    pub fn new(secret: String) -> ApiResult<Self> {
        if secret.is_empty() {
            return Err(ApiError::missing_field("jwt_secret"));
        }
        Ok(Self(SecretString::new(secret.into())))
    }

    /// Expose the secret value (use sparingly, only for cryptographic operations).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Get the length of the secret without exposing it.
    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    /// Check if the secret is empty without exposing it.
    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    /// Check if the secret is the insecure default.
    pub fn is_insecure_default(&self) -> bool {
        self.0.expose_secret() == "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION"
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JwtSecret([REDACTED, {} chars])", self.len())
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// JWT secret key for signing and verification
    pub jwt_secret: JwtSecret,

    /// JWT algorithm (default: HS256)
    pub jwt_algorithm: Algorithm,

    /// JWT token expiration in seconds (default: 1 hour)
    pub jwt_expiration_secs: i64,

    /// JWT clock skew tolerance in seconds (default: 60).
    /// Allows tokens to be slightly in the future/past to handle clock drift.
    pub jwt_clock_skew_secs: i64,

    /// Clock for JWT time validation (injected for testing)
    pub clock: Arc<dyn JwtClock>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret)
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("jwt_expiration_secs", &self.jwt_expiration_secs)
            .field("jwt_clock_skew_secs", &self.jwt_clock_skew_secs)
            .field("clock", &"<JwtClock>")
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        let secret_str = std::env::var("INCENTEDGE_JWT_SECRET")
            .unwrap_or_else(|_| "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION".to_string());

        Self {
            jwt_secret: build_jwt_secret(secret_str),
            jwt_algorithm: Algorithm::HS256,
            jwt_expiration_secs: 3600,
            jwt_clock_skew_secs: 60,
            clock: Arc::new(SystemClock),
        }
    }
}

impl AuthConfig {
    /// Create authentication configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `INCENTEDGE_JWT_SECRET`: JWT signing secret
    /// - `INCENTEDGE_JWT_EXPIRATION_SECS`: JWT token expiration (default: 3600)
    /// - `INCENTEDGE_JWT_CLOCK_SKEW_SECS`: JWT clock skew tolerance (default: 60)
    pub fn from_env() -> Self {
        let secret_str = std::env::var("INCENTEDGE_JWT_SECRET")
            .unwrap_or_else(|_| "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION".to_string());

        Self {
            jwt_secret: build_jwt_secret(secret_str),
            jwt_algorithm: Algorithm::HS256,
            jwt_expiration_secs: std::env::var("INCENTEDGE_JWT_EXPIRATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),
            jwt_clock_skew_secs: std::env::var("INCENTEDGE_JWT_CLOCK_SKEW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            clock: Arc::new(SystemClock),
        }
    }

    /// Validate the authentication configuration for production use.
    ///
    /// Called at server startup. In development mode, warnings are logged but
    /// the server continues.
    pub fn validate_for_production(&self) -> ApiResult<()> {
        let environment = std::env::var("INCENTEDGE_ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase();

        let is_production = environment == "production" || environment == "prod";

        if self.jwt_secret.is_insecure_default() {
            if is_production {
                return Err(ApiError::invalid_input(format!(
                    "Cannot start server in production with insecure JWT secret. \
                     Set INCENTEDGE_JWT_SECRET to a secure value. \
                     INCENTEDGE_ENVIRONMENT={}",
                    environment
                )));
            } else {
                tracing::warn!(
                    "Using insecure default JWT secret. This is acceptable for local \
                     development but MUST be changed before deploying. Set the \
                     INCENTEDGE_JWT_SECRET environment variable to a secure random \
                     value (minimum 32 characters)."
                );
            }
        }

        if self.jwt_secret.len() < 32 {
            if is_production {
                return Err(ApiError::invalid_input(format!(
                    "JWT secret is too short for production use ({} chars). \
                     It must be at least 32 characters long.",
                    self.jwt_secret.len()
                )));
            } else if !self.jwt_secret.is_insecure_default() {
                tracing::warn!(
                    "JWT secret is short ({} chars). For production, use at least \
                     32 characters.",
                    self.jwt_secret.len()
                );
            }
        }

        Ok(())
    }
}

fn build_jwt_secret(secret_str: String) -> JwtSecret {
    let normalized = if secret_str.trim().is_empty() {
        "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION".to_string()
    } else {
        secret_str
    };

    match JwtSecret::new(normalized) {
        Ok(secret) => secret,
        Err(_) => JwtSecret(SecretString::new(
            "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION"
                .to_string()
                .into(),
        )),
    }
}

// ============================================================================
// JWT CLAIMS
// ============================================================================

/// JWT claims structure: standard claims plus the org and role claims that
/// drive tenant isolation and authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID, UUID string)
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Organization the user belongs to (UUID string)
    pub org_id: String,

    /// User role within the organization ("member" | "admin")
    #[serde(default)]
    pub role: String,
}

impl Claims {
    /// Create new claims for a user using a clock.
    pub fn new(user_id: UserId, org_id: OrgId, role: Role, expiration_secs: i64, clock: &dyn JwtClock) -> Self {
        let now = clock.now_epoch_secs();

        Self {
            sub: user_id.to_string(),
            iat: now,
            exp: now + expiration_secs,
            org_id: org_id.to_string(),
            role: role.to_string(),
        }
    }

    /// Check if the token has expired according to a clock.
    pub fn is_expired(&self, clock: &dyn JwtClock) -> bool {
        self.exp < clock.now_epoch_secs()
    }

    /// Parse the subject as a user id.
    pub fn user_id(&self) -> ApiResult<UserId> {
        Uuid::parse_str(&self.sub).map_err(|_| ApiError::invalid_token("sub claim is not a UUID"))
    }

    /// Parse the org claim.
    pub fn org_id(&self) -> ApiResult<OrgId> {
        Uuid::parse_str(&self.org_id)
            .map_err(|_| ApiError::invalid_token("org_id claim is not a UUID"))
    }

    /// Parse the role claim, defaulting to member for unknown values.
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::Member)
    }
}

// ============================================================================
// AUTHENTICATION CONTEXT
// ============================================================================

/// Authentication context extracted from a request.
///
/// Injected into Axum request extensions after successful authentication.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID (from JWT sub claim)
    pub user_id: UserId,

    /// Organization ID (tenant boundary, from JWT org_id claim)
    pub org_id: OrgId,

    /// Role within the organization
    pub role: Role,
}

impl AuthContext {
    pub fn new(user_id: UserId, org_id: OrgId, role: Role) -> Self {
        Self {
            user_id,
            org_id,
            role,
        }
    }

    /// Check whether the user may perform admin-only operations
    /// (forced transitions, hard overrides).
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

// ============================================================================
// AUTHENTICATION FUNCTIONS
// ============================================================================

/// Validate JWT claim times using our own clock logic.
///
/// Separated from signature validation so broken CI clocks are handled
/// gracefully and tests are fully deterministic with injected clocks.
fn validate_claim_times(now: i64, exp: i64, leeway_secs: i64) -> ApiResult<()> {
    // Allow slightly-in-the-past expiry within leeway
    if exp < now - leeway_secs {
        return Err(ApiError::token_expired());
    }
    Ok(())
}

/// Validate a JWT token and extract claims.
///
/// This performs signature validation ONLY (no time validation) to avoid the
/// panic path in `jsonwebtoken`; time validation uses the injected clock.
pub fn validate_jwt_token(config: &AuthConfig, token: &str) -> ApiResult<Claims> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.expose().as_bytes());

    let mut validation = Validation::new(config.jwt_algorithm);
    validation.validate_exp = false; // We'll do this ourselves with our clock
    validation.validate_nbf = false;
    validation.required_spec_claims = std::collections::HashSet::from(["exp".to_string()]);

    let token_data =
        decode::<Claims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidToken => {
                ApiError::invalid_token("Token is invalid")
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ApiError::invalid_token("Token signature is invalid")
            }
            _ => ApiError::invalid_token(format!("Token validation failed: {}", e)),
        })?;

    let claims = token_data.claims;

    let now = config.clock.now_epoch_secs();

    // Fail loud if the production clock returns pre-epoch time
    if now < 0 {
        tracing::error!(
            timestamp = now,
            "System clock returned pre-epoch time - server time is broken"
        );
        return Err(ApiError::internal_error(
            "Server time configuration error - please contact support",
        ));
    }

    validate_claim_times(now, claims.exp, config.jwt_clock_skew_secs)?;

    Ok(claims)
}

/// Generate a JWT token for a user.
pub fn generate_jwt_token(
    config: &AuthConfig,
    user_id: UserId,
    org_id: OrgId,
    role: Role,
) -> ApiResult<String> {
    let claims = Claims::new(
        user_id,
        org_id,
        role,
        config.jwt_expiration_secs,
        &*config.clock,
    );

    let encoding_key = EncodingKey::from_secret(config.jwt_secret.expose().as_bytes());
    let header = Header::new(config.jwt_algorithm);

    encode(&header, &claims, &encoding_key)
        .map_err(|e| ApiError::internal_error(format!("Failed to generate token: {}", e)))
}

/// Authenticate a request from its headers.
///
/// Extracts the Bearer token from the Authorization header, validates it, and
/// cross-checks the optional X-Org-ID header against the token's org claim.
pub fn authenticate(
    config: &AuthConfig,
    auth_header: Option<&str>,
    org_id_header: Option<&str>,
) -> ApiResult<AuthContext> {
    let auth_value = auth_header.ok_or_else(|| {
        ApiError::unauthorized("Authentication required: provide Authorization header")
    })?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::invalid_token("Authorization header must use Bearer scheme"))?;

    let claims = validate_jwt_token(config, token)?;

    let user_id = claims.user_id()?;
    let org_id = claims.org_id()?;
    let role = claims.role();

    // The header may not widen access beyond the token's org claim
    if let Some(header_value) = org_id_header {
        let requested = Uuid::parse_str(header_value)
            .map_err(|_| ApiError::invalid_format("X-Org-ID", "valid UUID"))?;
        if requested != org_id {
            return Err(ApiError::forbidden(format!(
                "Access denied to organization {}",
                requested
            )));
        }
    }

    Ok(AuthContext::new(user_id, org_id, role))
}

/// Validate that a resource belongs to the authenticated user's organization.
///
/// Used by handlers to enforce tenant isolation on read/update/delete paths.
pub fn validate_org_ownership(auth: &AuthContext, resource_org_id: OrgId) -> ApiResult<()> {
    if resource_org_id == auth.org_id {
        Ok(())
    } else {
        tracing::warn!(
            user_id = %auth.user_id,
            org_id = %auth.org_id,
            resource_org_id = %resource_org_id,
            "Attempted cross-organization access"
        );
        Err(ApiError::forbidden(
            "Access denied: resource belongs to a different organization",
        ))
    }
}

/// Require the admin role for privileged operations.
pub fn require_admin(auth: &AuthContext) -> ApiResult<()> {
    if auth.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("This operation requires the admin role"))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use incentedge_core::new_entity_id;

    fn test_config() -> AuthConfig {
        let mut config = AuthConfig::default();
        config.jwt_secret =
            JwtSecret::new("test_secret".to_string()).expect("Test secret should be valid");
        config.clock = Arc::new(test_clocks::valid());
        config
    }

    #[test]
    fn test_jwt_generation_and_validation() -> ApiResult<()> {
        let config = test_config();
        let user_id = new_entity_id();
        let org_id = new_entity_id();

        let token = generate_jwt_token(&config, user_id, org_id, Role::Admin)?;
        let claims = validate_jwt_token(&config, &token)?;

        assert_eq!(claims.user_id()?, user_id);
        assert_eq!(claims.org_id()?, org_id);
        assert_eq!(claims.role(), Role::Admin);
        assert!(!claims.is_expired(&test_clocks::valid()));
        Ok(())
    }

    #[test]
    fn test_expired_token() -> ApiResult<()> {
        let mut config = test_config();
        config.jwt_expiration_secs = -1; // Already expired

        let token = generate_jwt_token(&config, new_entity_id(), new_entity_id(), Role::Member)?;

        config.clock = Arc::new(test_clocks::future());

        let result = validate_jwt_token(&config, &token);
        assert!(result.is_err());

        if let Err(e) = result {
            assert_eq!(e.code, crate::error::ErrorCode::TokenExpired);
        }
        Ok(())
    }

    #[test]
    fn test_authenticate_with_bearer_token() -> ApiResult<()> {
        let config = test_config();
        let user_id = new_entity_id();
        let org_id = new_entity_id();

        let token = generate_jwt_token(&config, user_id, org_id, Role::Member)?;
        let auth_header = format!("Bearer {}", token);

        let auth = authenticate(&config, Some(&auth_header), None)?;

        assert_eq!(auth.user_id, user_id);
        assert_eq!(auth.org_id, org_id);
        assert!(!auth.is_admin());
        Ok(())
    }

    #[test]
    fn test_authenticate_org_header_must_match_claim() -> ApiResult<()> {
        let config = test_config();
        let org_id = new_entity_id();

        let token = generate_jwt_token(&config, new_entity_id(), org_id, Role::Member)?;
        let auth_header = format!("Bearer {}", token);

        // Matching header is accepted
        let auth = authenticate(&config, Some(&auth_header), Some(&org_id.to_string()))?;
        assert_eq!(auth.org_id, org_id);

        // Mismatched header is rejected
        let other_org = new_entity_id();
        let result = authenticate(&config, Some(&auth_header), Some(&other_org.to_string()));
        assert!(result.is_err());
        if let Err(e) = result {
            assert_eq!(e.code, crate::error::ErrorCode::Forbidden);
        }
        Ok(())
    }

    #[test]
    fn test_authenticate_no_credentials() {
        let config = test_config();

        let result = authenticate(&config, None, None);
        assert!(result.is_err());

        if let Err(e) = result {
            assert_eq!(e.code, crate::error::ErrorCode::Unauthorized);
        }
    }

    #[test]
    fn test_authenticate_malformed_scheme() {
        let config = test_config();

        let result = authenticate(&config, Some("Basic abc123"), None);
        assert!(result.is_err());

        if let Err(e) = result {
            assert_eq!(e.code, crate::error::ErrorCode::InvalidToken);
        }
    }

    #[test]
    fn test_validate_org_ownership() {
        let org_id = new_entity_id();
        let auth = AuthContext::new(new_entity_id(), org_id, Role::Member);

        assert!(validate_org_ownership(&auth, org_id).is_ok());

        let other_org = new_entity_id();
        let result = validate_org_ownership(&auth, other_org);
        assert!(result.is_err());
        if let Err(e) = result {
            assert_eq!(e.code, crate::error::ErrorCode::Forbidden);
        }
    }

    #[test]
    fn test_require_admin() {
        let admin = AuthContext::new(new_entity_id(), new_entity_id(), Role::Admin);
        assert!(require_admin(&admin).is_ok());

        let member = AuthContext::new(new_entity_id(), new_entity_id(), Role::Member);
        assert!(require_admin(&member).is_err());
    }

    #[test]
    fn test_clock_skew_tolerance() -> ApiResult<()> {
        let mut config = test_config();
        config.jwt_clock_skew_secs = 60;
        config.jwt_expiration_secs = 0; // Expires immediately

        let token = generate_jwt_token(&config, new_entity_id(), new_entity_id(), Role::Member)?;

        // Move clock 30 seconds forward (within leeway)
        let future_clock = FixedClock(config.clock.now_epoch_secs() + 30);
        config.clock = Arc::new(future_clock);

        assert!(validate_jwt_token(&config, &token).is_ok());
        Ok(())
    }

    #[test]
    fn test_clock_skew_beyond_tolerance() -> ApiResult<()> {
        let mut config = test_config();
        config.jwt_clock_skew_secs = 60;
        config.jwt_expiration_secs = 100;

        let token = generate_jwt_token(&config, new_entity_id(), new_entity_id(), Role::Member)?;

        let far_future_clock = FixedClock(config.clock.now_epoch_secs() + 200);
        config.clock = Arc::new(far_future_clock);

        let result = validate_jwt_token(&config, &token);
        assert!(result.is_err());
        if let Err(e) = result {
            assert_eq!(e.code, crate::error::ErrorCode::TokenExpired);
        }
        Ok(())
    }

    #[test]
    fn test_pre_epoch_clock_fails_loud() -> ApiResult<()> {
        let mut config = test_config();

        let token = generate_jwt_token(&config, new_entity_id(), new_entity_id(), Role::Member)?;

        config.clock = Arc::new(FixedClock(-1000));

        let result = validate_jwt_token(&config, &token);
        assert!(result.is_err());
        if let Err(e) = result {
            assert_eq!(e.code, crate::error::ErrorCode::InternalError);
        }
        Ok(())
    }
}
