//! # seatrace-chain-client -- Typed Rust client for the chain gateway
//!
//! Talks to a WeBASE-Front node that fronts the deployed `Traceability`
//! contract:
//! - **Transactions** via `/WeBASE-Front/trans/handle` (writes) and
//!   `/WeBASE-Front/trans/call` (reads)
//! - **Web3 queries** via `/WeBASE-Front/{group}/web3/...`
//!
//! ## Retry policy
//!
//! Reads retry transport failures and 5xx answers with exponential backoff
//! (see [`ReadRetry`]). Writes are sent exactly once: a lost response may hide a delivered transaction,
//! and the caller's persisted pending state is what makes a re-drive safe.
//!
//! ## Seam
//!
//! Consumers depend on the [`ChainGateway`] trait; [`ChainClient`] is its
//! HTTP implementation.

pub mod config;
pub mod error;
pub mod gateway;
pub mod retry;
pub mod transactions;
pub mod types;
pub mod web3;

pub use config::{ChainConfig, ConfigError};
pub use error::ChainError;
pub use gateway::ChainGateway;
pub use retry::ReadRetry;
pub use types::{ChainStageEntry, ChainTrace, ContractCall, ContractFunction, TxReceipt};

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

/// Top-level gateway client. Holds the transaction and web3 sub-clients.
#[derive(Debug, Clone)]
pub struct ChainClient {
    transactions: transactions::TransactionClient,
    web3: web3::Web3Client,
}

impl ChainClient {
    /// Create a new gateway client from configuration with the default
    /// [`ReadRetry`] policy.
    ///
    /// `App-Key` / `App-Secret` headers are attached only when both are set.
    pub fn new(config: ChainConfig) -> Result<Self, ChainError> {
        Self::with_read_retry(config, ReadRetry::default())
    }

    /// Like [`ChainClient::new`] with an explicit policy for reads.
    pub fn with_read_retry(config: ChainConfig, retry: ReadRetry) -> Result<Self, ChainError> {
        let mut headers = HeaderMap::new();
        if let Some((key, secret)) = config.app_credentials() {
            headers.insert(
                "App-Key",
                HeaderValue::from_str(key).map_err(|_| ConfigError::InvalidCredentials)?,
            );
            let mut secret =
                HeaderValue::from_str(secret).map_err(|_| ConfigError::InvalidCredentials)?;
            secret.set_sensitive(true);
            headers.insert("App-Secret", secret);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ChainError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        let base = config.base().to_string();
        Ok(Self {
            transactions: transactions::TransactionClient::new(
                http.clone(),
                base.clone(),
                config.group_id,
                config.contract_address.clone(),
                Arc::new(config.contract_abi),
                retry,
            ),
            web3: web3::Web3Client::new(http, base, config.group_id, retry),
        })
    }

    /// Access the contract transaction client.
    pub fn transactions(&self) -> &transactions::TransactionClient {
        &self.transactions
    }

    /// Access the web3 query client.
    pub fn web3(&self) -> &web3::Web3Client {
        &self.web3
    }
}
