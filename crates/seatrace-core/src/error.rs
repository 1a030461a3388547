//! # Error Types
//!
//! Validation failures for the core vocabularies. Every variant carries the
//! offending value so callers can report it verbatim.

use thiserror::Error;

/// A value could not be turned into one of the core domain types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Goods business identifier is empty, too long, or malformed.
    #[error("invalid good id {0:?}: expected 'G' followed by up to 63 alphanumeric characters")]
    InvalidGoodId(String),

    /// Integer code outside the goods status range 1..=4.
    #[error("invalid goods status code {0}: expected 1..=4")]
    InvalidStatusCode(i64),

    /// Integer code outside the company type range 0..=3.
    #[error("invalid company type code {0}: expected 0..=3")]
    InvalidCompanyType(i64),

    /// Blockchain address is not a 0x-prefixed 20-byte hex string.
    #[error("invalid blockchain address {0:?}: expected 0x followed by 40 hex digits")]
    InvalidAddress(String),

    /// Unknown stage name.
    #[error("unknown lifecycle stage: {0:?}")]
    UnknownStage(String),

    /// Unknown chain confirmation status.
    #[error("unknown chain status: {0:?}")]
    UnknownChainStatus(String),
}
