//! Chain confirmation state of a persisted stage record.
//!
//! ```text
//! (insert) ──▶ Submitting ──▶ Confirmed
//!                 │   ▲
//!                 ▼   │ (re-claim)
//!               Pending ──▶ Failed (attempts exhausted; still re-claimable by hand)
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    /// Recorded locally; the chain write has not succeeded yet.
    Pending,
    /// A request currently holds the claim and is calling the gateway.
    Submitting,
    /// The chain accepted the transaction; the hash is recorded.
    Confirmed,
    /// The reconciler gave up after its attempt budget.
    Failed,
}

impl ChainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitting => "submitting",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

impl std::fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChainStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "submitting" => Ok(Self::Submitting),
            "confirmed" => Ok(Self::Confirmed),
            "failed" => Ok(Self::Failed),
            other => Err(ValidationError::UnknownChainStatus(other.to_string())),
        }
    }
}
