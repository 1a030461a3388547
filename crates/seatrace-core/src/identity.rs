//! # Domain Identity Newtypes
//!
//! Newtype wrappers for the identifiers that cross component boundaries.
//! A `CompanyId` cannot be passed where a `UserId` is expected, and a
//! [`GoodId`] is only constructed through validation or generation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Maximum length of a goods business identifier (matches the store column).
pub const GOOD_ID_MAX_LEN: usize = 64;

/// Surrogate key of a company row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub i64);

/// Surrogate key of a user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl CompanyId {
    /// Access the inner key.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl UserId {
    /// Access the inner key.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for CompanyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "company:{}", self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

/// Business identifier of a good, shared by the relational store and the chain.
///
/// Generated identifiers have the form `G{company}{YYYYMMDD}{8 hex chars}`:
/// the owning company, the registration date, and the first eight characters
/// of a random v4 UUID. Collisions are improbable but not impossible, so the
/// store enforces uniqueness and registration retries with a fresh id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GoodId(String);

impl GoodId {
    /// Validate an externally supplied identifier.
    ///
    /// Accepts `G` followed by ASCII alphanumerics, `-` or `_`, at most
    /// [`GOOD_ID_MAX_LEN`] characters in total.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        let valid = raw.len() > 1
            && raw.len() <= GOOD_ID_MAX_LEN
            && raw.starts_with('G')
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(raw))
        } else {
            Err(ValidationError::InvalidGoodId(raw))
        }
    }

    /// Mint a fresh identifier for `company` registered on `date`.
    pub fn generate(company: CompanyId, date: NaiveDate) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!(
            "G{}{}{}",
            company.0,
            date.format("%Y%m%d"),
            &suffix[..8]
        ))
    }

    /// Mint a fresh identifier dated today (UTC).
    pub fn generate_now(company: CompanyId) -> Self {
        Self::generate(company, chrono::Utc::now().date_naive())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for GoodId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GoodId> for String {
    fn from(id: GoodId) -> Self {
        id.0
    }
}

impl std::str::FromStr for GoodId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for GoodId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GoodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
