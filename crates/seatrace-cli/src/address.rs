//! # Address Check
//!
//! Offline validation of a company chain address, so operators can vet a
//! value before it is stored on the company record.

use clap::Args;
use serde::Serialize;

use seatrace_core::BlockchainAddress;

/// Arguments for `check-address`.
#[derive(Args, Debug)]
pub struct CheckAddressArgs {
    /// Address to check, `0x` followed by 40 hex digits.
    pub address: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AddressReport {
    pub address: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub fn check_address(raw: &str) -> AddressReport {
    let trimmed = raw.trim();
    let reason = match BlockchainAddress::parse(trimmed) {
        Ok(_) => None,
        Err(_) if !trimmed.starts_with("0x") => Some("missing 0x prefix".to_string()),
        Err(_) if trimmed.len() != BlockchainAddress::LEN => Some(format!(
            "expected {} characters, got {}",
            BlockchainAddress::LEN,
            trimmed.len()
        )),
        Err(e) => Some(e.to_string()),
    };
    AddressReport {
        address: trimmed.to_string(),
        valid: reason.is_none(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_address_passes() {
        let report = check_address(" 0x8f2a55949038a9610f50fb23b5883af3b4ecb3c3 ");
        assert!(report.valid);
        assert_eq!(report.address, "0x8f2a55949038a9610f50fb23b5883af3b4ecb3c3");
        assert!(report.reason.is_none());
    }

    #[test]
    fn reasons_are_specific() {
        assert_eq!(
            check_address("8f2a55949038a9610f50fb23b5883af3b4ecb3c3").reason.as_deref(),
            Some("missing 0x prefix")
        );
        assert_eq!(
            check_address("0x1234").reason.as_deref(),
            Some("expected 42 characters, got 6")
        );
        let not_hex = format!("0x{}", "zz".repeat(20));
        let report = check_address(&not_hex);
        assert!(!report.valid);
        assert!(report.reason.is_some());
    }

    #[test]
    fn valid_report_omits_reason() {
        let json = serde_json::to_value(check_address(&format!("0x{}", "ab".repeat(20)))).unwrap();
        assert!(json.get("reason").is_none());
        assert_eq!(json["valid"], true);
    }
}
