//! # Chain Query API
//!
//! Read-only passthroughs to the chain gateway, bounded by the configured
//! chain timeout. A gateway failure answers 502.

use std::future::Future;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use utoipa::ToSchema;

use seatrace_chain_client::ChainError;
use seatrace_core::GoodId;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::response::{ApiResponse, Envelope};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct BlockNumber {
    pub block_number: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChainGoodStatus {
    pub good_id: String,
    pub status: u8,
    pub status_text: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/chain/block-number", get(block_number))
        .route("/api/chain/transactions/{hash}", get(transaction))
        .route("/api/chain/trace/{good_id}", get(chain_trace))
        .route("/api/chain/goods/{good_id}/status", get(chain_good_status))
}

/// Await a gateway read, turning a timeout into a 502.
async fn bounded<T>(
    state: &AppState,
    call: impl Future<Output = Result<T, ChainError>>,
) -> Result<T, AppError> {
    match tokio::time::timeout(state.config.chain_timeout, call).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => Err(AppError::BadGateway(format!(
            "chain gateway did not answer within {}s",
            state.config.chain_timeout.as_secs()
        ))),
    }
}

/// `0x` followed by 64 hex digits.
fn is_tx_hash(hash: &str) -> bool {
    hash.len() == 66
        && hash.starts_with("0x")
        && hash[2..].chars().all(|c| c.is_ascii_hexdigit())
}

fn parse_good_id(raw: &str) -> Result<GoodId, AppError> {
    Ok(GoodId::new(raw.trim())?)
}

/// GET /api/chain/block-number
#[utoipa::path(
    get,
    path = "/api/chain/block-number",
    responses(
        (status = 200, description = "Current block height", body = BlockNumber),
        (status = 502, description = "Chain gateway unavailable", body = Envelope),
    ),
    tag = "chain"
)]
pub async fn block_number(
    State(state): State<AppState>,
    _caller: CallerIdentity,
) -> Result<ApiResponse, AppError> {
    let block_number = bounded(&state, state.gateway.block_number()).await?;
    Ok(ApiResponse::ok(&BlockNumber { block_number }))
}

/// GET /api/chain/transactions/{hash}
#[utoipa::path(
    get,
    path = "/api/chain/transactions/{hash}",
    params(("hash" = String, Path, description = "Transaction hash, 0x-prefixed")),
    responses(
        (status = 200, description = "Transaction as reported by the node", body = Envelope),
        (status = 422, description = "Malformed hash", body = Envelope),
        (status = 502, description = "Chain gateway unavailable", body = Envelope),
    ),
    tag = "chain"
)]
pub async fn transaction(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    Path(hash): Path<String>,
) -> Result<ApiResponse, AppError> {
    if !is_tx_hash(&hash) {
        return Err(AppError::Validation(format!(
            "{hash:?} is not a transaction hash (0x followed by 64 hex digits)"
        )));
    }
    let tx = bounded(&state, state.gateway.transaction(&hash)).await?;
    if tx.is_null() {
        return Err(AppError::NotFound(format!("transaction {hash}")));
    }
    Ok(ApiResponse::ok(&tx))
}

/// GET /api/chain/trace/{good_id}
#[utoipa::path(
    get,
    path = "/api/chain/trace/{good_id}",
    params(("good_id" = String, Path, description = "Business identifier of the good")),
    responses(
        (status = 200, description = "The contract's record of the good", body = Envelope),
        (status = 502, description = "Chain gateway unavailable", body = Envelope),
    ),
    tag = "chain"
)]
pub async fn chain_trace(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    Path(good_id): Path<String>,
) -> Result<ApiResponse, AppError> {
    let good_id = parse_good_id(&good_id)?;
    let trace = bounded(&state, state.gateway.full_trace(&good_id)).await?;
    Ok(ApiResponse::ok(&trace))
}

/// GET /api/chain/goods/{good_id}/status
#[utoipa::path(
    get,
    path = "/api/chain/goods/{good_id}/status",
    params(("good_id" = String, Path, description = "Business identifier of the good")),
    responses(
        (status = 200, description = "Status recorded by the contract", body = ChainGoodStatus),
        (status = 502, description = "Chain gateway unavailable", body = Envelope),
    ),
    tag = "chain"
)]
pub async fn chain_good_status(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    Path(good_id): Path<String>,
) -> Result<ApiResponse, AppError> {
    let good_id = parse_good_id(&good_id)?;
    let status = bounded(&state, state.gateway.good_status(&good_id)).await?;
    Ok(ApiResponse::ok(&ChainGoodStatus {
        good_id: good_id.to_string(),
        status: status.code(),
        status_text: status.status_text().to_string(),
    }))
}
