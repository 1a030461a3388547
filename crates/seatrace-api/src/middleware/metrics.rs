//! # Request Metrics
//!
//! Records `seatrace_http_requests_total{status}` and the
//! `seatrace_http_request_duration_seconds` histogram through the
//! `metrics` facade. Without an installed recorder (tests) both are
//! no-ops. `main` installs the Prometheus recorder and `/metrics` renders it.

use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

/// Middleware that counts requests by status and times them.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!("seatrace_http_requests_total", "status" => status).increment(1);
    metrics::histogram!("seatrace_http_request_duration_seconds")
        .record(started.elapsed().as_secs_f64());

    response
}

/// `GET /metrics`: Prometheus text exposition.
pub async fn render(State(state): State<AppState>) -> Response {
    match &state.metrics_handle {
        Some(handle) => (
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
