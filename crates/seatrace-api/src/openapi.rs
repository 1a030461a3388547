//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "seatrace API",
        version = "0.1.0",
        description = "Goods traceability: register, ship, inspect and deliver goods with each stage attested on chain, plus a public trace lookup.",
        license(name = "AGPL-3.0-or-later")
    ),
    paths(
        // Goods lifecycle
        crate::routes::goods::register_good,
        crate::routes::goods::ship_good,
        crate::routes::goods::inspect_good,
        crate::routes::goods::deliver_good,
        crate::routes::goods::resubmit_stage,
        crate::routes::goods::list_goods,
        crate::routes::goods::trace_good,
        // Public
        crate::routes::public::public_trace,
        // Chain
        crate::routes::chain::block_number,
        crate::routes::chain::transaction,
        crate::routes::chain::chain_trace,
        crate::routes::chain::chain_good_status,
    ),
    components(schemas(
        crate::response::Envelope,
        crate::views::GoodSummary,
        crate::trace::TraceView,
        crate::auth::Role,
        crate::commands::RegisterGood,
        crate::commands::ShipGood,
        crate::commands::InspectGood,
        crate::commands::DeliverGood,
        crate::commands::ResubmitStage,
        crate::routes::goods::PendingConfirmation,
        crate::routes::goods::GoodsPage,
        crate::routes::chain::BlockNumber,
        crate::routes::chain::ChainGoodStatus,
    )),
    tags(
        (name = "goods", description = "Goods lifecycle"),
        (name = "public", description = "Unauthenticated trace lookup"),
        (name = "chain", description = "Chain gateway queries"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_lifecycle_paths() {
        let spec = ApiDoc::openapi();
        for path in [
            "/api/goods/register",
            "/api/goods/ship",
            "/api/goods/inspect",
            "/api/goods/deliver",
            "/api/goods/trace",
            "/api/chain/block-number",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
