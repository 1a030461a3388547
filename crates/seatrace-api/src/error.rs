//! # API Error Types
//!
//! [`AppError`] implements `IntoResponse` and renders the uniform
//! envelope (see [`crate::response`]). Domain errors from the core, state,
//! chain client, persistence and lifecycle layers map onto it here.
//! Internal error details are logged and never returned to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use seatrace_chain_client::ChainError;
use seatrace_state::LifecycleError;

use crate::lifecycle::EngineError;
use crate::repository::RepoError;
use crate::response::Envelope;

/// Application-level error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Business-rule validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body or query could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid credentials (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller may not perform this operation (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Conflict with the current state of the good (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged but not returned.
    #[error("internal error: {0}")]
    Internal(String),

    /// Chain gateway unreachable or rejected a read (502).
    #[error("chain gateway error: {0}")]
    BadGateway(String),
}

impl AppError {
    /// HTTP status and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::BadGateway(_) => (StatusCode::BAD_GATEWAY, "CHAIN_GATEWAY_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::BadGateway(_) => tracing::warn!(error = %self, "chain gateway error"),
            _ => {}
        }

        (status, Envelope::failure(status, code, message)).into_response()
    }
}

impl From<seatrace_core::ValidationError> for AppError {
    fn from(err: seatrace_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match &err {
            LifecycleError::WrongCompanyType { .. } => Self::Forbidden(err.to_string()),
            LifecycleError::InvalidTransition { .. }
            | LifecycleError::AlreadyTerminal { .. }
            | LifecycleError::AlreadyRegistered { .. }
            | LifecycleError::PredecessorUnconfirmed { .. } => Self::Conflict(err.to_string()),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(what) => Self::NotFound(what),
            RepoError::DuplicateGoodId(id) => Self::Conflict(format!("good {id} already exists")),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ChainError> for AppError {
    fn from(err: ChainError) -> Self {
        match &err {
            ChainError::Config(_) => Self::Internal(err.to_string()),
            _ => Self::BadGateway(err.to_string()),
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Lifecycle(e) => e.into(),
            EngineError::Repo(e) => e.into(),
            EngineError::Validation(msg) => Self::Validation(msg),
            EngineError::NotFound(msg) => Self::NotFound(msg),
            EngineError::Forbidden(msg) => Self::Forbidden(msg),
            EngineError::Unauthorized(msg) => Self::Unauthorized(msg),
            e @ (EngineError::InFlight { .. }
            | EngineError::StatusConflict { .. }
            | EngineError::NothingToResubmit(_)) => Self::Conflict(e.to_string()),
        }
    }
}
