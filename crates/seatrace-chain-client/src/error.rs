//! Chain gateway client error types.

/// Errors from chain gateway calls.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// HTTP transport error (unreachable, timed out, connection reset).
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The gateway answered with a non-2xx HTTP status.
    #[error("chain gateway {endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// The gateway answered 2xx but rejected the call (`code != 0`).
    #[error("chain gateway rejected {function}: code {code}, {message}")]
    Rejected {
        function: String,
        code: i64,
        message: String,
    },
    /// A write was accepted but no transaction hash came back.
    #[error("chain gateway returned no transaction hash for {function}")]
    MissingTransactionHash { function: String },
    /// Response body could not be deserialized.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// Response deserialized but its payload has an unexpected shape.
    #[error("unexpected payload from {endpoint}: {detail}")]
    Decode { endpoint: String, detail: String },
    /// A read kept failing until the retry policy gave up.
    #[error("chain gateway {endpoint} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        endpoint: String,
        attempts: u32,
        source: Box<ChainError>,
    },
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl ChainError {
    /// Whether the failure happened before the gateway produced an answer.
    ///
    /// A transport failure on a write may still have delivered the
    /// transaction; callers must not assume it was dropped.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            Self::RetriesExhausted { source, .. } => source.is_transport(),
            _ => false,
        }
    }

    /// How many requests were sent before this error was returned.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::RetriesExhausted { attempts, .. } => *attempts,
            _ => 1,
        }
    }
}
