//! # Company Types and Blockchain Addresses
//!
//! A company's type decides which lifecycle stage its users may perform;
//! its blockchain address is the identity presented to the chain gateway
//! for every transaction its operators originate.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Role a company plays in the supply chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum CompanyType {
    /// Registers goods.
    Producer = 0,
    /// Ships goods.
    Shipper = 1,
    /// Inspects goods at a port.
    Port = 2,
    /// Takes delivery of goods.
    Dealer = 3,
}

impl CompanyType {
    /// Storage code (0..=3).
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Decode a storage code.
    pub fn from_code(code: i64) -> Result<Self, ValidationError> {
        match code {
            0 => Ok(Self::Producer),
            1 => Ok(Self::Shipper),
            2 => Ok(Self::Port),
            3 => Ok(Self::Dealer),
            other => Err(ValidationError::InvalidCompanyType(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Producer => "producer",
            Self::Shipper => "shipper",
            Self::Port => "port",
            Self::Dealer => "dealer",
        }
    }
}

impl std::fmt::Display for CompanyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for CompanyType {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_code(i64::from(value))
    }
}

impl From<CompanyType> for u8 {
    fn from(t: CompanyType) -> Self {
        t.code()
    }
}

/// A `0x`-prefixed, 20-byte hex account address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlockchainAddress(String);

impl BlockchainAddress {
    /// Length of a textual address including the `0x` prefix.
    pub const LEN: usize = 42;

    /// Validate an address string.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if Self::is_valid(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ValidationError::InvalidAddress(raw.to_string()))
        }
    }

    /// Whether `raw` is a well-formed address.
    pub fn is_valid(raw: &str) -> bool {
        raw.len() == Self::LEN
            && raw.starts_with("0x")
            && raw[2..].chars().all(|c| c.is_ascii_hexdigit())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BlockchainAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BlockchainAddress> for String {
    fn from(a: BlockchainAddress) -> Self {
        a.0
    }
}

impl std::fmt::Display for BlockchainAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x8f2a55949038a9610f50fb23b5883af3b4ecb3c3";

    #[test]
    fn company_type_codes() {
        assert_eq!(CompanyType::Producer.code(), 0);
        assert_eq!(CompanyType::Dealer.code(), 3);
        assert_eq!(CompanyType::from_code(2).unwrap(), CompanyType::Port);
        assert!(CompanyType::from_code(4).is_err());
        assert!(CompanyType::from_code(-1).is_err());
    }

    #[test]
    fn company_type_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&CompanyType::Shipper).unwrap(), "1");
    }

    #[test]
    fn address_validation() {
        assert!(BlockchainAddress::is_valid(ADDR));
        assert!(BlockchainAddress::parse(ADDR).is_ok());
        assert!(!BlockchainAddress::is_valid(""));
        assert!(!BlockchainAddress::is_valid("8f2a55949038a9610f50fb23b5883af3b4ecb3c3aa"));
        assert!(!BlockchainAddress::is_valid("0x8f2a"));
        assert!(!BlockchainAddress::is_valid("0xZZ2a55949038a9610f50fb23b5883af3b4ecb3c3"));
    }
}
