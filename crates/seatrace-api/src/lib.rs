//! # seatrace-api -- Axum API Service for Goods Traceability
//!
//! Companies record the lifecycle of a good (production, shipment,
//! inspection, delivery). Each stage is stored in Postgres and attested on
//! chain through the chain gateway; anyone can read a good's trace.
//!
//! ## API Surface
//!
//! | Prefix                 | Module               | Auth   |
//! |------------------------|----------------------|--------|
//! | `/api/goods/*`         | [`routes::goods`]    | bearer |
//! | `/api/goods/trace`     | [`routes::public`]   | none   |
//! | `/api/chain/*`         | [`routes::chain`]    | bearer |
//! | `/health/*`            | [`routes::health`]   | none   |
//! | `/metrics`             | [`middleware::metrics`] | none |
//! | `/openapi.json`        | [`openapi`]          | bearer |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → BodyLimit → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! ## Background work
//!
//! [`reconcile`] re-drives stage records whose chain write has not been
//! confirmed.

pub mod auth;
pub mod commands;
pub mod db;
pub mod error;
pub mod extractors;
pub mod lifecycle;
pub mod middleware;
pub mod model;
pub mod openapi;
pub mod reconcile;
pub mod repository;
pub mod response;
pub mod routes;
pub mod state;
pub mod trace;
pub mod views;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Maximum accepted request body.
const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes, metrics and the public trace are mounted outside the
/// auth middleware so they remain accessible without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    // Authenticated API routes.
    let api = Router::new()
        .merge(routes::goods::router())
        .merge(routes::chain::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(axum::Extension(auth_config));

    // Unauthenticated routes.
    let open = Router::new()
        .merge(routes::health::router())
        .merge(routes::public::router())
        .route("/metrics", get(middleware::metrics::render));

    Router::new()
        .merge(open)
        .merge(api)
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
