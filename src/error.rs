use serde::Serialize;
use thiserror::Error;

use crate::dns::ParseError;
use crate::dnssec::DnssecStatus;

/// Failure of a single DNS exchange
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Query timed out")]
    Timeout,

    #[error("IO error: {0}")]
    Io(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Response does not match the query: {0}")]
    Mismatch(String),

    #[error("Invalid query name: {0}")]
    InvalidName(String),

    #[error("Upstream answered {0}")]
    ServerFailure(String),

    #[error("Upstream rejected the query: {0}")]
    Rejected(String),

    #[error("No upstream servers configured")]
    NoUpstream,
}

impl TransportError {
    /// Whether repeating the same query may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout
                | TransportError::Io(_)
                | TransportError::Malformed(_)
                | TransportError::Mismatch(_)
                | TransportError::ServerFailure(_)
        )
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

impl From<ParseError> for TransportError {
    fn from(err: ParseError) -> Self {
        TransportError::Malformed(err.to_string())
    }
}

/// Failure of a whole alias resolution
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolveError {
    #[error("TXT lookup for {name} failed after {attempts} attempt(s): {reason}")]
    LookupFailed {
        name: String,
        attempts: u32,
        reason: String,
    },

    #[error("DNSSEC trust not established for {name} (status: {status})")]
    TrustNotEstablished { name: String, status: DnssecStatus },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid upstream server: {0}")]
    InvalidUpstreamServer(String),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid attempt count: {0}")]
    InvalidAttempts(String),

    #[error("Invalid trust policy: {0}")]
    InvalidTrustPolicy(String),

    #[error("Invalid EDNS payload size: {0}")]
    InvalidPayloadSize(String),

    #[error("Trust anchor file {path}: {reason}")]
    TrustAnchorFile { path: String, reason: String },

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, ResolveError>;
