//! Caller identity and admin authentication.
//!
//! Participants are identified by the `X-Participant-Id` header, set by the
//! gateway in front of this service after it has authenticated the user.
//! Snapshot endpoints are additionally guarded by HTTP Basic auth.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request, Response, StatusCode},
    middleware::Next,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;

use crate::error::AttemptError;
use crate::types::ParticipantId;

/// Header carrying the authenticated participant ID
pub const PARTICIPANT_HEADER: &str = "x-participant-id";

const MAX_PARTICIPANT_ID_LEN: usize = 128;

/// Authenticated caller of a participant or creator route
#[derive(Debug, Clone, PartialEq)]
pub struct Caller(pub ParticipantId);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AttemptError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(PARTICIPANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty() && s.len() <= MAX_PARTICIPANT_ID_LEN)
            .ok_or(AttemptError::Unauthenticated)?;

        Ok(Caller(id.to_string()))
    }
}

/// Authentication configuration for admin routes
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Username for admin routes (None = auth disabled)
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AuthConfig {
    /// Load auth config from environment variables.
    /// ADMIN_USERNAME and ADMIN_PASSWORD must both be set to enable auth.
    pub fn from_env() -> Self {
        let username = std::env::var("ADMIN_USERNAME")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let password = std::env::var("ADMIN_PASSWORD")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if username.is_some() && password.is_some() {
            tracing::info!("Admin authentication enabled");
            Self { username, password }
        } else {
            if username.is_some() || password.is_some() {
                tracing::warn!(
                    "ADMIN_USERNAME and ADMIN_PASSWORD must both be set to enable authentication"
                );
            }
            tracing::warn!("Admin authentication DISABLED - anyone can export or import state!");
            Self::disabled()
        }
    }

    pub fn disabled() -> Self {
        Self {
            username: None,
            password: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Validate credentials
    pub fn validate(&self, username: &str, password: &str) -> bool {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => {
                constant_time_eq(u.as_bytes(), username.as_bytes())
                    && constant_time_eq(p.as_bytes(), password.as_bytes())
            }
            _ => true, // Auth disabled, allow all
        }
    }
}

/// Constant-time byte comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Extract `(username, password)` from a Basic Authorization header value
fn parse_basic(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Middleware for HTTP Basic Authentication on admin routes
pub async fn admin_auth_middleware(
    State(auth_config): State<Arc<AuthConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if !auth_config.is_enabled() {
        return next.run(request).await;
    }

    let credentials = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic);

    if let Some((username, password)) = credentials {
        if auth_config.validate(&username, &password) {
            return next.run(request).await;
        }
    }

    tracing::warn!("Rejected admin request to {}", request.uri().path());
    let mut response = Response::new(Body::from("Unauthorized"));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        header::HeaderValue::from_static("Basic realm=\"Quizwindow Admin\""),
    );
    response
}
