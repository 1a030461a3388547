//! Chain gateway client configuration.
//!
//! Points the client at a WeBASE-Front node and names the deployed
//! traceability contract. Override via environment variables or explicit
//! construction for testing.

use url::Url;
use zeroize::Zeroizing;

/// Default gateway base URL (a WeBASE-Front node on the local host).
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:5002";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration for connecting to the chain gateway.
///
/// Custom `Debug` implementation redacts `app_secret` to prevent
/// credential leakage in log output.
#[derive(Clone)]
pub struct ChainConfig {
    /// Base URL of the WeBASE-Front node.
    pub base_url: Url,
    /// Address of the deployed traceability contract.
    pub contract_address: String,
    /// Parsed contract ABI (a JSON array).
    pub contract_abi: serde_json::Value,
    /// Chain group id; always >= 1.
    pub group_id: i64,
    /// Application key, sent only together with `app_secret`.
    pub app_key: Option<String>,
    /// Application secret.
    pub app_secret: Option<Zeroizing<String>>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainConfig")
            .field("base_url", &self.base_url)
            .field("contract_address", &self.contract_address)
            .field("group_id", &self.group_id)
            .field("app_key", &self.app_key)
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl ChainConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `CHAIN_GATEWAY_URL` (default: `http://127.0.0.1:5002`)
    /// - `CHAIN_CONTRACT_ADDRESS` (required)
    /// - `CHAIN_CONTRACT_ABI` (required; inline JSON, or a file path starting with `.` or `/`)
    /// - `CHAIN_GROUP_ID` (default: 1)
    /// - `CHAIN_APP_KEY` / `CHAIN_APP_SECRET` (optional)
    /// - `CHAIN_TIMEOUT_SECS` (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        let contract_address = std::env::var("CHAIN_CONTRACT_ADDRESS")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingContractAddress)?;
        let abi_raw = std::env::var("CHAIN_CONTRACT_ABI")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingAbi)?;

        Ok(Self {
            base_url: env_url("CHAIN_GATEWAY_URL", DEFAULT_GATEWAY_URL)?,
            contract_address,
            contract_abi: load_abi(&abi_raw)?,
            group_id: normalize_group_id(
                std::env::var("CHAIN_GROUP_ID")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1),
            ),
            app_key: std::env::var("CHAIN_APP_KEY").ok().filter(|s| !s.is_empty()),
            app_secret: std::env::var("CHAIN_APP_SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .map(Zeroizing::new),
            timeout_secs: std::env::var("CHAIN_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Create a configuration pointing at a local mock gateway (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if `base_url` cannot be parsed.
    pub fn local_mock(base_url: &str, contract_address: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: Url::parse(base_url)
                .map_err(|e| ConfigError::InvalidUrl(base_url.to_string(), e.to_string()))?,
            contract_address: contract_address.to_string(),
            contract_abi: serde_json::Value::Array(Vec::new()),
            group_id: 1,
            app_key: None,
            app_secret: None,
            timeout_secs: 5,
        })
    }

    /// Both application credentials, when both are configured.
    pub fn app_credentials(&self) -> Option<(&str, &str)> {
        match (&self.app_key, &self.app_secret) {
            (Some(key), Some(secret)) => Some((key.as_str(), secret.as_str())),
            _ => None,
        }
    }

    /// Gateway base URL with any trailing slash removed.
    pub(crate) fn base(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }
}

/// Group ids below 1 are not valid on the gateway.
fn normalize_group_id(raw: i64) -> i64 {
    if raw <= 0 {
        1
    } else {
        raw
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Parse the contract ABI from inline JSON or from a file.
///
/// A value starting with `.` or `/` is read as a path.
pub fn load_abi(raw: &str) -> Result<serde_json::Value, ConfigError> {
    let raw = raw.trim();
    let text = if raw.starts_with('.') || raw.starts_with('/') {
        std::fs::read_to_string(raw).map_err(|e| ConfigError::AbiUnreadable {
            path: raw.to_string(),
            source: e,
        })?
    } else {
        raw.to_string()
    };
    let abi: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| ConfigError::InvalidAbi(e.to_string()))?;
    if !abi.is_array() {
        return Err(ConfigError::InvalidAbi("expected a JSON array".into()));
    }
    Ok(abi)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("CHAIN_CONTRACT_ADDRESS environment variable is required")]
    MissingContractAddress,
    #[error("CHAIN_CONTRACT_ABI environment variable is required")]
    MissingAbi,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("cannot read contract ABI from {path}: {source}")]
    AbiUnreadable {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid contract ABI: {0}")]
    InvalidAbi(String),
    #[error("application credentials contain characters not allowed in a header")]
    InvalidCredentials,
}
