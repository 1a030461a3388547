//! # Goods API
//!
//! Lifecycle operations, resubmission, the goods list and the
//! authenticated trace. Every handler passes the caller's identity
//! explicitly into the lifecycle engine.
//!
//! A stage whose chain write failed answers 202 with
//! `data.chain_status = "pending"`; the stage record is stored and will be
//! re-driven by the reconciler or an explicit resubmit.

use std::collections::HashMap;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use seatrace_core::{GoodStatus, Stage};

use crate::auth::CallerIdentity;
use crate::commands::{DeliverGood, InspectGood, RegisterGood, ResubmitStage, ShipGood};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, extract_validated_query, Validate};
use crate::lifecycle::StageOutcome;
use crate::model::GoodsQuery;
use crate::response::{ApiResponse, Envelope};
use crate::state::AppState;
use crate::trace::{TraceAudience, TraceView};
use crate::views::{company_name, GoodSummary};

/// Largest accepted `page_size`.
pub const MAX_PAGE_SIZE: i64 = 100;

/// `data` of a 202 response.
#[derive(Debug, Serialize, ToSchema)]
pub struct PendingConfirmation {
    pub summary: GoodSummary,
    #[schema(value_type = String)]
    pub stage: Stage,
    /// Always `pending`.
    pub chain_status: String,
}

/// Query parameters of the goods list.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    /// Case-insensitive match on id, name, batch number or description.
    #[serde(default)]
    pub search: Option<String>,
    /// Status code, 1..=4.
    #[serde(default)]
    pub status: Option<i64>,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    10
}

impl Validate for ListQuery {
    fn validate(&self) -> Result<(), String> {
        if self.page < 1 {
            return Err("page must be at least 1".into());
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(format!("page_size must be between 1 and {MAX_PAGE_SIZE}"));
        }
        if let Some(code) = self.status {
            GoodStatus::from_code(code).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

/// One page of goods.
#[derive(Debug, Serialize, ToSchema)]
pub struct GoodsPage {
    pub total: i64,
    pub list: Vec<GoodSummary>,
}

/// Build the goods router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/goods", get(list_goods))
        .route("/api/goods/register", post(register_good))
        .route("/api/goods/ship", post(ship_good))
        .route("/api/goods/inspect", post(inspect_good))
        .route("/api/goods/deliver", post(deliver_good))
        .route("/api/goods/resubmit", post(resubmit_stage))
        .route("/api/goods/{good_id}/trace", get(trace_good))
}

/// Render a lifecycle outcome: 200 when confirmed, 202 while pending.
fn outcome_response(outcome: StageOutcome) -> ApiResponse {
    match outcome {
        StageOutcome::Confirmed(summary) => ApiResponse::ok(&summary),
        StageOutcome::PendingConfirmation {
            summary,
            stage,
            reason,
        } => ApiResponse::with_status(
            StatusCode::ACCEPTED,
            format!("{stage} recorded, chain confirmation pending: {reason}"),
            &PendingConfirmation {
                summary,
                stage,
                chain_status: "pending".to_string(),
            },
        ),
    }
}

/// POST /api/goods/register
#[utoipa::path(
    post,
    path = "/api/goods/register",
    request_body = RegisterGood,
    responses(
        (status = 200, description = "Registered and confirmed on chain", body = Envelope),
        (status = 202, description = "Registered, chain confirmation pending", body = Envelope),
        (status = 403, description = "Caller's company is not a producer", body = Envelope),
        (status = 422, description = "Invalid request", body = Envelope),
    ),
    tag = "goods"
)]
pub async fn register_good(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<RegisterGood>, JsonRejection>,
) -> Result<ApiResponse, AppError> {
    let cmd = extract_validated_json(body)?;
    let outcome = state.engine.register(&caller, cmd).await?;
    Ok(outcome_response(outcome))
}

/// POST /api/goods/ship
#[utoipa::path(
    post,
    path = "/api/goods/ship",
    request_body = ShipGood,
    responses(
        (status = 200, description = "Shipped and confirmed on chain", body = Envelope),
        (status = 202, description = "Shipment recorded, chain confirmation pending", body = Envelope),
        (status = 404, description = "Unknown good", body = Envelope),
        (status = 409, description = "Good is not in status produced", body = Envelope),
    ),
    tag = "goods"
)]
pub async fn ship_good(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ShipGood>, JsonRejection>,
) -> Result<ApiResponse, AppError> {
    let cmd = extract_validated_json(body)?;
    let outcome = state.engine.ship(&caller, cmd).await?;
    Ok(outcome_response(outcome))
}

/// POST /api/goods/inspect
#[utoipa::path(
    post,
    path = "/api/goods/inspect",
    request_body = InspectGood,
    responses(
        (status = 200, description = "Inspected and confirmed on chain", body = Envelope),
        (status = 202, description = "Inspection recorded, chain confirmation pending", body = Envelope),
        (status = 404, description = "Unknown good", body = Envelope),
        (status = 409, description = "Good is not in status shipped", body = Envelope),
    ),
    tag = "goods"
)]
pub async fn inspect_good(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<InspectGood>, JsonRejection>,
) -> Result<ApiResponse, AppError> {
    let cmd = extract_validated_json(body)?;
    let outcome = state.engine.inspect(&caller, cmd).await?;
    Ok(outcome_response(outcome))
}

/// POST /api/goods/deliver
#[utoipa::path(
    post,
    path = "/api/goods/deliver",
    request_body = DeliverGood,
    responses(
        (status = 200, description = "Delivered and confirmed on chain", body = Envelope),
        (status = 202, description = "Delivery recorded, chain confirmation pending", body = Envelope),
        (status = 404, description = "Unknown good", body = Envelope),
        (status = 409, description = "Good is not in status inspected", body = Envelope),
    ),
    tag = "goods"
)]
pub async fn deliver_good(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<DeliverGood>, JsonRejection>,
) -> Result<ApiResponse, AppError> {
    let cmd = extract_validated_json(body)?;
    let outcome = state.engine.deliver(&caller, cmd).await?;
    Ok(outcome_response(outcome))
}

/// POST /api/goods/resubmit
#[utoipa::path(
    post,
    path = "/api/goods/resubmit",
    request_body = ResubmitStage,
    responses(
        (status = 200, description = "Pending stage confirmed on chain", body = Envelope),
        (status = 202, description = "Chain still unavailable", body = Envelope),
        (status = 403, description = "Stage belongs to another company", body = Envelope),
        (status = 409, description = "Nothing to resubmit, or a submission is in flight", body = Envelope),
    ),
    tag = "goods"
)]
pub async fn resubmit_stage(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ResubmitStage>, JsonRejection>,
) -> Result<ApiResponse, AppError> {
    let cmd = extract_validated_json(body)?;
    let outcome = state.engine.resubmit(&caller, &cmd.good_id).await?;
    Ok(outcome_response(outcome))
}

/// GET /api/goods
#[utoipa::path(
    get,
    path = "/api/goods",
    params(ListQuery),
    responses(
        (status = 200, description = "One page of goods, newest first", body = Envelope),
    ),
    tag = "goods"
)]
pub async fn list_goods(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<ApiResponse, AppError> {
    let query = extract_validated_query(query)?;

    let owner_company_id = if caller.is_super_admin() {
        None
    } else {
        Some(caller.company_id.ok_or_else(|| {
            AppError::Forbidden("caller is not attached to a company".into())
        })?)
    };
    let status = query.status.map(GoodStatus::from_code).transpose()?;

    let (total, goods) = state
        .repo
        .list_goods(&GoodsQuery {
            owner_company_id,
            status,
            search: query.search,
            limit: query.page_size,
            offset: (query.page - 1) * query.page_size,
        })
        .await?;

    let mut names: HashMap<_, String> = HashMap::new();
    let mut list = Vec::with_capacity(goods.len());
    for good in &goods {
        let owner = match names.get(&good.owner_company_id) {
            Some(name) => name.clone(),
            None => {
                let name = company_name(state.repo.as_ref(), good.owner_company_id).await;
                names.insert(good.owner_company_id, name.clone());
                name
            }
        };
        list.push(GoodSummary::new(good, owner));
    }

    Ok(ApiResponse::ok(&GoodsPage { total, list }))
}

/// GET /api/goods/{good_id}/trace
#[utoipa::path(
    get,
    path = "/api/goods/{good_id}/trace",
    params(("good_id" = String, Path, description = "Business identifier of the good")),
    responses(
        (status = 200, description = "Trace of the good", body = TraceView),
        (status = 404, description = "Unknown good", body = Envelope),
    ),
    tag = "goods"
)]
pub async fn trace_good(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    Path(good_id): Path<String>,
) -> Result<ApiResponse, AppError> {
    let view = state.tracer.trace(&good_id, TraceAudience::Member).await?;
    Ok(ApiResponse::ok(&view))
}
