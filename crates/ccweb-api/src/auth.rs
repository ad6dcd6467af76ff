//! # Authentication Middleware
//!
//! Resolves the calling principal from a bearer token and injects a
//! [`Session`] into request extensions. Handlers call
//! [`require_principal`] before touching the ingestion core; there is no
//! ambient "current user".
//!
//! ## Token Format
//!
//! ```text
//! Bearer {principal_uuid}:{secret}   — secret checked against AUTH_TOKEN
//! Bearer {principal_uuid}            — accepted only when no token is configured
//! ```
//!
//! A request without an `Authorization` header gets an anonymous session,
//! which the guard rejects with 401. A header that is present but
//! malformed is rejected by the middleware itself.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use ccweb_core::PrincipalId;
use subtle::ConstantTimeEq;

use crate::error::AppError;

// ── Session ─────────────────────────────────────────────────────────────────

/// Who is calling, as resolved by [`auth_middleware`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    /// The authenticated principal, or `None` for anonymous requests.
    pub principal: Option<PrincipalId>,
}

impl Session {
    /// An anonymous session.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A session for `principal`.
    pub fn authenticated(principal: PrincipalId) -> Self {
        Self {
            principal: Some(principal),
        }
    }
}

impl<S: Send + Sync> axum::extract::FromRequestParts<S> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Session>().copied().unwrap_or_default())
    }
}

/// Login guard: the session's principal, or 401.
pub fn require_principal(session: &Session) -> Result<PrincipalId, AppError> {
    session
        .principal
        .ok_or_else(|| AppError::Unauthorized("authentication required".into()))
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the token value to prevent credential leakage in logs.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of bearer secrets.
///
/// When lengths differ, performs a dummy comparison so the mismatch costs
/// the same as a full compare.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse a bearer credential into a principal.
///
/// `expected_secret` is the configured `AUTH_TOKEN`; `None` means
/// development mode, where the secret part is optional and ignored.
pub fn parse_bearer_token(provided: &str, expected_secret: Option<&str>) -> Result<PrincipalId, String> {
    let (principal, secret) = match provided.split_once(':') {
        Some((p, s)) => (p, Some(s)),
        None => (provided, None),
    };

    if let Some(expected) = expected_secret {
        match secret {
            Some(s) if constant_time_token_eq(s, expected) => {}
            Some(_) => return Err("invalid bearer token".into()),
            None => return Err("bearer token must be {principal}:{secret}".into()),
        }
    }

    PrincipalId::parse(principal).map_err(|e| e.to_string())
}

// ── Middleware ──────────────────────────────────────────────────────────────

/// Resolve the `Authorization` header into a [`Session`].
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let config = request.extensions().get::<AuthConfig>().cloned().unwrap_or_default();

    let session = match request.headers().typed_try_get::<Authorization<Bearer>>() {
        Ok(Some(Authorization(bearer))) => match parse_bearer_token(bearer.token(), config.token.as_deref()) {
            Ok(principal) => Session::authenticated(principal),
            Err(msg) => {
                tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                return AppError::Unauthorized(msg).into_response();
            }
        },
        Ok(None) => Session::anonymous(),
        Err(_) => {
            tracing::warn!("authentication failed: malformed authorization header");
            return AppError::Unauthorized("authorization header must use Bearer scheme".into()).into_response();
        }
    };

    request.extensions_mut().insert(session);
    next.run(request).await
}
