//! Request and response types for the WeBASE-Front gateway.
//!
//! Wire shapes follow the gateway's camelCase JSON. The domain-facing
//! types ([`ContractCall`], [`TxReceipt`], [`ChainTrace`]) hide the wire
//! details from the rest of the workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use seatrace_core::{GoodId, GoodStatus};

/// Contract name registered on the gateway.
pub const CONTRACT_NAME: &str = "Traceability";

/// Identity used for read-only contract calls.
pub const PUBLIC_USER: &str = "public_user";

/// Message the gateway returns for a successful transaction.
pub const SUCCESS_MESSAGE: &str = "Success";

// -- Contract functions -------------------------------------------------------

/// Functions of the traceability contract used by this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractFunction {
    RegisterGood,
    ShipGood,
    InspectGood,
    DeliverGood,
    GetFullTrace,
    GetGoodStatus,
}

impl ContractFunction {
    /// Name as declared in the contract ABI.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RegisterGood => "registerGood",
            Self::ShipGood => "shipGood",
            Self::InspectGood => "inspectGood",
            Self::DeliverGood => "deliverGood",
            Self::GetFullTrace => "getFullTrace",
            Self::GetGoodStatus => "getGoodStatus",
        }
    }

    /// Whether the function only reads contract state.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::GetFullTrace | Self::GetGoodStatus)
    }
}

impl std::fmt::Display for ContractFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One state-changing contract invocation on behalf of a company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub function: ContractFunction,
    pub params: Vec<String>,
    /// Blockchain address of the originating company.
    pub user: String,
}

impl ContractCall {
    /// `registerGood(goodId, goodName)`.
    pub fn register_good(good_id: &GoodId, good_name: &str, user: &str) -> Self {
        Self::new(ContractFunction::RegisterGood, good_id, good_name, user)
    }

    /// `shipGood(goodId, transportInfo)`.
    pub fn ship_good(good_id: &GoodId, transport_info: &str, user: &str) -> Self {
        Self::new(ContractFunction::ShipGood, good_id, transport_info, user)
    }

    /// `inspectGood(goodId, inspectionInfo)`.
    pub fn inspect_good(good_id: &GoodId, inspection_info: &str, user: &str) -> Self {
        Self::new(ContractFunction::InspectGood, good_id, inspection_info, user)
    }

    /// `deliverGood(goodId, deliveryInfo)`.
    pub fn deliver_good(good_id: &GoodId, delivery_info: &str, user: &str) -> Self {
        Self::new(ContractFunction::DeliverGood, good_id, delivery_info, user)
    }

    fn new(function: ContractFunction, good_id: &GoodId, arg: &str, user: &str) -> Self {
        Self {
            function,
            params: vec![good_id.to_string(), arg.to_string()],
            user: user.to_string(),
        }
    }
}

/// Outcome of a write the gateway accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    pub transaction_hash: String,
    /// Gateway status message; `"Success"` when the transaction executed.
    pub message: String,
}

impl TxReceipt {
    pub fn is_success(&self) -> bool {
        self.message == SUCCESS_MESSAGE
    }
}

// -- Wire types ---------------------------------------------------------------

/// Body of `POST /WeBASE-Front/trans/handle` and `/trans/call`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest<'a> {
    pub group_id: i64,
    pub contract_abi: &'a serde_json::Value,
    pub contract_address: &'a str,
    pub func_name: &'a str,
    pub func_param: &'a [String],
    pub user: &'a str,
    pub contract_name: &'static str,
    pub use_cns: bool,
}

/// Response envelope of the transaction endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

// -- Chain-side trace ---------------------------------------------------------

/// One post-registration stage as recorded on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainStageEntry {
    pub company_id: String,
    pub operator_address: String,
    pub info: String,
    pub time: Option<DateTime<Utc>>,
}

/// The contract's own record of a good, from `getFullTrace`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainTrace {
    pub good_id: String,
    pub owner_company_id: String,
    pub good_name: String,
    pub register_time: Option<DateTime<Utc>>,
    pub shipment: Option<ChainStageEntry>,
    pub inspection: Option<ChainStageEntry>,
    pub delivery: Option<ChainStageEntry>,
    pub completed_stages: usize,
}

impl ChainTrace {
    /// Registration plus each later stage present on chain.
    pub fn completed_stages(&self) -> usize {
        1 + [&self.shipment, &self.inspection, &self.delivery]
            .iter()
            .filter(|s| s.is_some())
            .count()
    }
}

/// `data.result` of `getFullTrace`. Every scalar arrives as a string.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RawTrace {
    #[serde(deserialize_with = "lenient_string")]
    good_id: String,
    #[serde(deserialize_with = "lenient_string")]
    owner_company_id: String,
    #[serde(deserialize_with = "lenient_string")]
    good_name: String,
    #[serde(deserialize_with = "lenient_string")]
    register_time: String,

    #[serde(deserialize_with = "lenient_string")]
    ship_company_id: String,
    #[serde(deserialize_with = "lenient_string")]
    ship_operator_addr: String,
    #[serde(deserialize_with = "lenient_string")]
    transport_info: String,
    #[serde(deserialize_with = "lenient_string")]
    ship_time: String,
    ship_exists: bool,

    #[serde(deserialize_with = "lenient_string")]
    port_company_id: String,
    #[serde(deserialize_with = "lenient_string")]
    inspect_operator_addr: String,
    #[serde(deserialize_with = "lenient_string")]
    inspection_info: String,
    #[serde(deserialize_with = "lenient_string")]
    inspect_time: String,
    inspect_exists: bool,

    #[serde(deserialize_with = "lenient_string")]
    dealer_company_id: String,
    #[serde(deserialize_with = "lenient_string")]
    delivery_operator_addr: String,
    #[serde(deserialize_with = "lenient_string")]
    delivery_info: String,
    #[serde(deserialize_with = "lenient_string")]
    delivery_time: String,
    delivery_exists: bool,
}

impl From<RawTrace> for ChainTrace {
    fn from(raw: RawTrace) -> Self {
        let stage = |exists: bool, company_id, operator_address, info, time: &str| {
            exists.then(|| ChainStageEntry {
                company_id,
                operator_address,
                info,
                time: unix_seconds(time),
            })
        };
        let mut trace = ChainTrace {
            register_time: unix_seconds(&raw.register_time),
            shipment: stage(
                raw.ship_exists,
                raw.ship_company_id,
                raw.ship_operator_addr,
                raw.transport_info,
                &raw.ship_time,
            ),
            inspection: stage(
                raw.inspect_exists,
                raw.port_company_id,
                raw.inspect_operator_addr,
                raw.inspection_info,
                &raw.inspect_time,
            ),
            delivery: stage(
                raw.delivery_exists,
                raw.dealer_company_id,
                raw.delivery_operator_addr,
                raw.delivery_info,
                &raw.delivery_time,
            ),
            good_id: raw.good_id,
            owner_company_id: raw.owner_company_id,
            good_name: raw.good_name,
            completed_stages: 0,
        };
        trace.completed_stages = trace.completed_stages();
        trace
    }
}

/// Decode the `getGoodStatus` result (a decimal string).
pub(crate) fn parse_status(raw: &serde_json::Value) -> Option<GoodStatus> {
    let code = match raw {
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok()?,
        serde_json::Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    GoodStatus::from_code(code).ok()
}

/// Decode a block number answered either as `0x…` hex or as decimal.
pub(crate) fn parse_block_number(body: &str) -> Option<u64> {
    let s = body.trim().trim_matches('"');
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn unix_seconds(raw: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = raw.trim().parse().ok()?;
    if secs <= 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}

fn lenient_string<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(de)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}
