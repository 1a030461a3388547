//! # Chain Queries
//!
//! Read-only commands against the chain gateway. Each handler returns the
//! JSON document the binary prints.

use anyhow::{bail, Context};
use clap::Args;
use serde_json::{json, Value};

use seatrace_chain_client::ChainGateway;
use seatrace_core::GoodId;

/// Arguments naming a good.
#[derive(Args, Debug)]
pub struct GoodArgs {
    /// Business identifier of the good, e.g. `G1202405151a2b3c4d`.
    pub good_id: String,
}

/// Arguments naming a transaction.
#[derive(Args, Debug)]
pub struct TxArgs {
    /// Transaction hash, `0x` followed by 64 hex digits.
    pub hash: String,
}

fn parse_good_id(raw: &str) -> anyhow::Result<GoodId> {
    GoodId::new(raw.trim()).with_context(|| format!("invalid good id {raw:?}"))
}

pub async fn block_number(gateway: &dyn ChainGateway) -> anyhow::Result<Value> {
    let height = gateway.block_number().await.context("querying block number")?;
    Ok(json!({ "block_number": height }))
}

pub async fn trace(gateway: &dyn ChainGateway, args: &GoodArgs) -> anyhow::Result<Value> {
    let good_id = parse_good_id(&args.good_id)?;
    let trace = gateway
        .full_trace(&good_id)
        .await
        .with_context(|| format!("fetching chain trace of {good_id}"))?;
    Ok(serde_json::to_value(trace)?)
}

pub async fn status(gateway: &dyn ChainGateway, args: &GoodArgs) -> anyhow::Result<Value> {
    let good_id = parse_good_id(&args.good_id)?;
    let status = gateway
        .good_status(&good_id)
        .await
        .with_context(|| format!("fetching chain status of {good_id}"))?;
    Ok(json!({
        "good_id": good_id.as_str(),
        "status": status.code(),
        "status_text": status.status_text(),
    }))
}

pub async fn transaction(gateway: &dyn ChainGateway, args: &TxArgs) -> anyhow::Result<Value> {
    let hash = args.hash.trim();
    if hash.len() != 66 || !hash.starts_with("0x") || !hash[2..].chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("{hash:?} is not a transaction hash (0x followed by 64 hex digits)");
    }
    let tx = gateway
        .transaction(hash)
        .await
        .with_context(|| format!("fetching transaction {hash}"))?;
    if tx.is_null() {
        bail!("transaction {hash} not found");
    }
    Ok(tx)
}
