//! Typed client for the gateway's contract transaction endpoints.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/WeBASE-Front/trans/handle` | Send a state-changing transaction |
//! | POST   | `/WeBASE-Front/trans/call`   | Evaluate a read-only function |

use std::sync::Arc;

use seatrace_core::{GoodId, GoodStatus};

use crate::error::ChainError;
use crate::retry::ReadRetry;
use crate::types::{
    parse_status, ChainTrace, ContractCall, ContractFunction, RawTrace, TransactionRequest,
    TransactionResponse, TxReceipt, CONTRACT_NAME, PUBLIC_USER,
};

const HANDLE_PATH: &str = "WeBASE-Front/trans/handle";
const CALL_PATH: &str = "WeBASE-Front/trans/call";

/// Client for contract transactions on one group and contract.
#[derive(Debug, Clone)]
pub struct TransactionClient {
    http: reqwest::Client,
    base_url: String,
    group_id: i64,
    contract_address: String,
    contract_abi: Arc<serde_json::Value>,
    retry: ReadRetry,
}

impl TransactionClient {
    pub(crate) fn new(
        http: reqwest::Client,
        base_url: String,
        group_id: i64,
        contract_address: String,
        contract_abi: Arc<serde_json::Value>,
        retry: ReadRetry,
    ) -> Self {
        Self {
            http,
            base_url,
            group_id,
            contract_address,
            contract_abi,
            retry,
        }
    }

    fn request<'a>(
        &'a self,
        function: ContractFunction,
        params: &'a [String],
        user: &'a str,
    ) -> TransactionRequest<'a> {
        TransactionRequest {
            group_id: self.group_id,
            contract_abi: &self.contract_abi,
            contract_address: &self.contract_address,
            func_name: function.name(),
            func_param: params,
            user,
            contract_name: CONTRACT_NAME,
            use_cns: false,
        }
    }

    /// Send a state-changing transaction.
    ///
    /// Calls `POST {base_url}/WeBASE-Front/trans/handle` exactly once.
    /// Success here only means the gateway answered with `code == 0` and a
    /// transaction hash; callers must still check [`TxReceipt::is_success`].
    pub async fn handle(&self, call: &ContractCall) -> Result<TxReceipt, ChainError> {
        let endpoint = format!("POST /trans/handle {}", call.function);
        let url = format!("{}/{}", self.base_url, HANDLE_PATH);
        let body = self.request(call.function, &call.params, &call.user);

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        let result = read_response(resp, &endpoint, call.function).await?;
        match result.transaction_hash.filter(|h| !h.is_empty()) {
            Some(transaction_hash) => {
                tracing::info!(
                    function = %call.function,
                    tx_hash = %transaction_hash,
                    "chain transaction accepted"
                );
                Ok(TxReceipt {
                    transaction_hash,
                    message: result.message,
                })
            }
            None => Err(ChainError::MissingTransactionHash {
                function: call.function.name().into(),
            }),
        }
    }

    /// Evaluate a read-only contract function and return its `data` payload.
    ///
    /// Calls `POST {base_url}/WeBASE-Front/trans/call` under the client's
    /// [`ReadRetry`] policy.
    pub async fn call(
        &self,
        function: ContractFunction,
        params: &[String],
    ) -> Result<serde_json::Value, ChainError> {
        let endpoint = format!("POST /trans/call {function}");
        let url = format!("{}/{}", self.base_url, CALL_PATH);
        let body = self.request(function, params, PUBLIC_USER);

        let resp = self
            .retry
            .send(&endpoint, || self.http.post(&url).json(&body).send())
            .await?;

        Ok(read_response(resp, &endpoint, function).await?.data)
    }

    /// The contract's own trace of a good (`getFullTrace`).
    pub async fn full_trace(&self, good_id: &GoodId) -> Result<ChainTrace, ChainError> {
        let data = self
            .call(ContractFunction::GetFullTrace, &[good_id.to_string()])
            .await?;
        let result = data
            .get("result")
            .filter(|r| r.is_object())
            .cloned()
            .ok_or_else(|| ChainError::Decode {
                endpoint: "getFullTrace".into(),
                detail: "data.result is not an object".into(),
            })?;
        let raw: RawTrace = serde_json::from_value(result).map_err(|e| ChainError::Decode {
            endpoint: "getFullTrace".into(),
            detail: e.to_string(),
        })?;
        Ok(ChainTrace::from(raw))
    }

    /// The contract's status of a good (`getGoodStatus`).
    pub async fn good_status(&self, good_id: &GoodId) -> Result<GoodStatus, ChainError> {
        let data = self
            .call(ContractFunction::GetGoodStatus, &[good_id.to_string()])
            .await?;
        let result = data.get("result").unwrap_or(&serde_json::Value::Null);
        parse_status(result).ok_or_else(|| ChainError::Decode {
            endpoint: "getGoodStatus".into(),
            detail: format!("unexpected status result {result}"),
        })
    }
}

/// Check HTTP status, decode the envelope, and reject `code != 0`.
async fn read_response(
    resp: reqwest::Response,
    endpoint: &str,
    function: ContractFunction,
) -> Result<TransactionResponse, ChainError> {
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(ChainError::Status {
            endpoint: endpoint.into(),
            status,
            body,
        });
    }

    let result: TransactionResponse =
        resp.json().await.map_err(|e| ChainError::Deserialization {
            endpoint: endpoint.into(),
            source: e,
        })?;

    if result.code != 0 {
        tracing::error!(
            function = %function,
            code = result.code,
            message = %result.message,
            "chain gateway rejected call"
        );
        return Err(ChainError::Rejected {
            function: function.name().into(),
            code: result.code,
            message: result.message,
        });
    }
    Ok(result)
}
