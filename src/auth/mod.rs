/*!
 * # Authentication and Authorization Module
 *
 * Bearer JWTs (HS256) identify the caller and carry a single role. The
 * router-level gate resolves the caller into an [`Actor`] and checks it
 * against the policy table in [`rbac`] before any workflow runs.
 *
 * Token issuance exists for operators and tests; login and credential
 * storage live outside this service.
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

use crate::errors::ServiceError;

mod permissions;
mod rbac;

pub use permissions::*;
pub use rbac::*;

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // Subject (user ID)
    pub role: String, // One of Admin, Warehouse, Sale
    pub iat: i64,     // Issued at time
    pub exp: i64,     // Expiration time
}

/// Authenticated caller resolved from the bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, access_token_expiration: Duration) -> Self {
        Self {
            jwt_secret,
            access_token_expiration,
        }
    }
}

/// Token validation and issuance
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Signs a token for `user_id` acting as `role`.
    pub fn issue_token(&self, user_id: &str, role: Role) -> Result<String, AuthError> {
        let now = Utc::now();
        let ttl = ChronoDuration::from_std(self.config.access_token_expiration)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        let claims = Claims {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "failed to sign token");
            AuthError::TokenCreation(e.to_string())
        })
    }

    /// Verifies signature and expiry, then resolves the role.
    pub fn validate_token(&self, token: &str) -> Result<Actor, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            debug!(error = %e, "token rejected");
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            }
        })?;

        let role = Role::from_str(&data.claims.role).map_err(|_| AuthError::UnknownRole)?;

        Ok(Actor {
            user_id: data.claims.sub,
            role,
        })
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token carries an unknown role")]
    UnknownRole,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Authentication service not available")]
    ServiceUnavailable,
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InsufficientPermissions => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(_) | AuthError::ServiceUnavailable => {
                ServiceError::InternalError(err.to_string())
            }
            _ => ServiceError::Unauthorized(err.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Permission middleware to check if the actor may use the required permission
pub async fn permission_middleware(
    State(required_permission): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let actor = match request.extensions().get::<Actor>() {
        Some(actor) => actor.clone(),
        None => return Err(AuthError::MissingAuth),
    };

    check_privilege(&actor, &required_permission)?;

    Ok(next.run(request).await)
}

/// Authentication middleware that extracts and validates bearer tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            error!("auth service missing from request extensions");
            return AuthError::ServiceUnavailable.into_response();
        }
    };

    match extract_actor_from_headers(request.headers(), &auth_service) {
        Ok(actor) => {
            request.extensions_mut().insert(actor);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

fn extract_actor_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<Actor, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingAuth)?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(AuthError::MissingAuth)?;

    auth_service.validate_token(token)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_permission(self, permission: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            permission.to_string(),
            permission_middleware,
        ))
        .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn service() -> AuthService {
        AuthService::new(AuthConfig::new(
            "a-test-secret-that-is-long-enough-123".into(),
            Duration::from_secs(600),
        ))
    }

    #[test]
    fn issued_token_round_trips_to_actor() {
        let auth = service();
        let token = auth.issue_token("42", Role::Warehouse).unwrap();
        let actor = auth.validate_token(&token).unwrap();
        assert_eq!(actor.user_id, "42");
        assert_eq!(actor.role, Role::Warehouse);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let other = AuthService::new(AuthConfig::new(
            "another-secret-entirely-different-xyz".into(),
            Duration::from_secs(600),
        ));
        let token = other.issue_token("1", Role::Admin).unwrap();
        assert!(matches!(
            service().validate_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = service();
        let claims = Claims {
            sub: "1".into(),
            role: "Admin".into(),
            iat: Utc::now().timestamp() - 7200,
            exp: Utc::now().timestamp() - 3600,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &auth.encoding_key).unwrap();
        assert!(matches!(
            auth.validate_token(&token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let auth = service();
        let claims = Claims {
            sub: "1".into(),
            role: "Driver".into(),
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 600,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &auth.encoding_key).unwrap();
        assert!(matches!(
            auth.validate_token(&token),
            Err(AuthError::UnknownRole)
        ));
    }

    #[test]
    fn header_without_bearer_prefix_is_missing_auth() {
        let auth = service();
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(
            extract_actor_from_headers(&headers, &auth),
            Err(AuthError::MissingAuth)
        ));
    }

    #[test]
    fn auth_errors_map_to_401_and_403() {
        use axum::http::StatusCode;
        assert_eq!(
            ServiceError::from(AuthError::InvalidToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::from(AuthError::InsufficientPermissions).status_code(),
            StatusCode::FORBIDDEN
        );
    }
}
