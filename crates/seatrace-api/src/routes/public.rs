//! # Public Trace API
//!
//! `GET /api/goods/trace?good_id=...` is mounted outside the auth
//! middleware: anyone holding a good's identifier (for example from a
//! label) may read its trace.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::AppError;
use crate::extractors::{extract_validated_query, require_non_empty, Validate};
use crate::response::{ApiResponse, Envelope};
use crate::state::AppState;
use crate::trace::{TraceAudience, TraceView};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TraceQuery {
    /// Business identifier of the good.
    #[serde(default)]
    pub good_id: String,
}

impl Validate for TraceQuery {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("good_id", &self.good_id)
    }
}

/// Build the public router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/goods/trace", get(public_trace))
}

/// GET /api/goods/trace
#[utoipa::path(
    get,
    path = "/api/goods/trace",
    params(TraceQuery),
    responses(
        (status = 200, description = "Trace of the good", body = TraceView),
        (status = 404, description = "Unknown good", body = Envelope),
        (status = 422, description = "Missing good_id", body = Envelope),
    ),
    tag = "public"
)]
pub async fn public_trace(
    State(state): State<AppState>,
    query: Result<Query<TraceQuery>, QueryRejection>,
) -> Result<ApiResponse, AppError> {
    let query = extract_validated_query(query)?;
    let view = state.tracer.trace(&query.good_id, TraceAudience::Public).await?;
    Ok(ApiResponse::ok(&view))
}
