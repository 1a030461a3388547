//! The chain gateway seam.
//!
//! The lifecycle engine and the trace assembler depend on this trait, not
//! on [`ChainClient`](crate::ChainClient), so tests can script gateway
//! behaviour without a network.

use async_trait::async_trait;

use seatrace_core::{GoodId, GoodStatus};

use crate::error::ChainError;
use crate::types::{ChainTrace, ContractCall, TxReceipt};

/// Point-to-point contract with the external chain.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Submit one state-changing contract call.
    ///
    /// `Ok` means the gateway answered with a transaction hash; the
    /// receipt's message must still equal `"Success"` for the call to
    /// count as executed.
    async fn invoke(&self, call: &ContractCall) -> Result<TxReceipt, ChainError>;

    /// The contract's own trace of a good.
    async fn full_trace(&self, good_id: &GoodId) -> Result<ChainTrace, ChainError>;

    /// The contract's status of a good.
    async fn good_status(&self, good_id: &GoodId) -> Result<GoodStatus, ChainError>;

    /// Current block height.
    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Raw transaction object by hash.
    async fn transaction(&self, hash: &str) -> Result<serde_json::Value, ChainError>;
}

#[async_trait]
impl ChainGateway for crate::ChainClient {
    async fn invoke(&self, call: &ContractCall) -> Result<TxReceipt, ChainError> {
        self.transactions().handle(call).await
    }

    async fn full_trace(&self, good_id: &GoodId) -> Result<ChainTrace, ChainError> {
        self.transactions().full_trace(good_id).await
    }

    async fn good_status(&self, good_id: &GoodId) -> Result<GoodStatus, ChainError> {
        self.transactions().good_status(good_id).await
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.web3().block_number().await
    }

    async fn transaction(&self, hash: &str) -> Result<serde_json::Value, ChainError> {
        self.web3().transaction(hash).await
    }
}
