//! # Authentication
//!
//! Bearer token middleware that attaches an explicit [`CallerIdentity`] to
//! every authenticated request.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {role}:{company_id}:{user_id}:{secret}
//! ```
//!
//! `company_id` is empty for `super_admin`. The secret is compared in
//! constant time against `AUTH_TOKEN`. Handlers extract the identity via
//! the `FromRequestParts` impl and pass it into the lifecycle engine as an
//! argument; nothing downstream reads identity from ambient state.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use utoipa::ToSchema;
use zeroize::Zeroizing;

use seatrace_core::{CompanyId, UserId};

use crate::error::AppError;
use crate::response::Envelope;

// ── Role ────────────────────────────────────────────────────────────────────

/// User roles.
///
/// The role alone does not decide which lifecycle stage a user may run;
/// that is the company type's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform operator. Belongs to no company and cannot run stages.
    SuperAdmin,
    /// Administers one company; may run that company's stage.
    CompanyAdmin,
    /// Runs that company's stage.
    Operator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::CompanyAdmin => "company_admin",
            Self::Operator => "operator",
        }
    }

    /// Whether this role may invoke lifecycle operations at all.
    pub fn can_operate(&self) -> bool {
        matches!(self, Self::CompanyAdmin | Self::Operator)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Self::SuperAdmin),
            "company_admin" => Ok(Self::CompanyAdmin),
            "operator" => Ok(Self::Operator),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// Identity of the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub role: Role,
    /// `None` only when auth is disabled.
    pub user_id: Option<UserId>,
    /// `None` for `super_admin`.
    pub company_id: Option<CompanyId>,
}

impl CallerIdentity {
    /// Identity used when auth is disabled.
    pub fn development() -> Self {
        Self {
            role: Role::SuperAdmin,
            user_id: None,
            company_id: None,
        }
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}

/// Extracts the identity the auth middleware injected into extensions.
/// Returns 401 when none is present.
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the token value.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub token: Option<Zeroizing<String>>,
}

impl AuthConfig {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()).map(Zeroizing::new),
        }
    }
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
/// On a length mismatch a dummy comparison keeps timing independent of
/// where the inputs differ.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse `{role}:{company_id}:{user_id}:{secret}`.
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<CallerIdentity, String> {
    let parts: Vec<&str> = provided.splitn(4, ':').collect();
    let [role_str, company_str, user_str, secret] = parts.as_slice() else {
        return Err("invalid token format, expected {role}:{company_id}:{user_id}:{secret}".into());
    };

    if !constant_time_token_eq(secret, expected_secret) {
        return Err("invalid bearer token".into());
    }

    let role: Role = role_str.parse()?;

    let company_id = if company_str.is_empty() {
        None
    } else {
        Some(CompanyId(
            company_str
                .parse::<i64>()
                .map_err(|e| format!("invalid company_id: {e}"))?,
        ))
    };

    let user_id = UserId(
        user_str
            .parse::<i64>()
            .map_err(|e| format!("invalid user_id: {e}"))?,
    );

    match (role, company_id) {
        (Role::SuperAdmin, Some(_)) => Err("super_admin tokens carry no company_id".into()),
        (Role::CompanyAdmin | Role::Operator, None) => {
            Err(format!("{role} tokens require a company_id"))
        }
        _ => Ok(CallerIdentity {
            role,
            user_id: Some(user_id),
            company_id,
        }),
    }
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Validate the bearer token and inject the parsed [`CallerIdentity`].
///
/// When `AuthConfig.token` is `None` every request runs as `super_admin`
/// (development mode).
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected_token = request.extensions().get::<AuthConfig>().cloned();

    match expected_token {
        Some(AuthConfig {
            token: Some(ref expected),
        }) => {
            let auth_header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());

            match auth_header.and_then(|v| v.strip_prefix("Bearer ")) {
                Some(provided) => match parse_bearer_token(provided, expected) {
                    Ok(identity) => {
                        request.extensions_mut().insert(identity);
                        next.run(request).await
                    }
                    Err(msg) => {
                        tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                        unauthorized_response(&msg)
                    }
                },
                None if auth_header.is_some() => {
                    tracing::warn!("authentication failed: non-Bearer authorization scheme");
                    unauthorized_response("authorization header must use Bearer scheme")
                }
                None => {
                    tracing::warn!("authentication failed: missing authorization header");
                    unauthorized_response("missing authorization header")
                }
            }
        }
        _ => {
            request
                .extensions_mut()
                .insert(CallerIdentity::development());
            next.run(request).await
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Envelope::failure(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message),
    )
        .into_response()
}
