//! Typed client for the gateway's web3 query endpoints.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET    | `/WeBASE-Front/{group}/web3/blockNumber` | Current block height |
//! | GET    | `/WeBASE-Front/{group}/web3/transaction/{hash}` | Transaction by hash |

use crate::error::ChainError;
use crate::retry::ReadRetry;
use crate::types::parse_block_number;

#[derive(Debug, Clone)]
pub struct Web3Client {
    http: reqwest::Client,
    base_url: String,
    group_id: i64,
    retry: ReadRetry,
}

impl Web3Client {
    pub(crate) fn new(
        http: reqwest::Client,
        base_url: String,
        group_id: i64,
        retry: ReadRetry,
    ) -> Self {
        Self {
            http,
            base_url,
            group_id,
            retry,
        }
    }

    /// Current block height.
    ///
    /// The gateway answers either `0x…` hex or a decimal number.
    pub async fn block_number(&self) -> Result<u64, ChainError> {
        let endpoint = "GET /web3/blockNumber";
        let url = format!(
            "{}/WeBASE-Front/{}/web3/blockNumber",
            self.base_url, self.group_id
        );

        let resp = self
            .retry
            .send(endpoint, || self.http.get(&url).send())
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChainError::Status {
                endpoint: endpoint.into(),
                status,
                body,
            });
        }

        let body = resp.text().await.map_err(|e| ChainError::Deserialization {
            endpoint: endpoint.into(),
            source: e,
        })?;
        parse_block_number(&body).ok_or_else(|| ChainError::Decode {
            endpoint: endpoint.into(),
            detail: format!("unparseable block number {body:?}"),
        })
    }

    /// Raw transaction object for `hash`, as the node reports it.
    pub async fn transaction(&self, hash: &str) -> Result<serde_json::Value, ChainError> {
        let endpoint = format!("GET /web3/transaction/{hash}");
        let url = format!(
            "{}/WeBASE-Front/{}/web3/transaction/{hash}",
            self.base_url, self.group_id
        );

        let resp = self
            .retry
            .send(&endpoint, || self.http.get(&url).send())
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChainError::Status {
                endpoint,
                status,
                body,
            });
        }

        resp.json().await.map_err(|e| ChainError::Deserialization {
            endpoint,
            source: e,
        })
    }
}
