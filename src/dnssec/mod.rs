pub mod algorithm;
pub mod denial;
pub mod digest;
pub mod errors;
pub mod key_tag;
pub mod records;
pub mod trust_anchor;
pub mod validator;
pub mod verifier;

use serde::Serialize;
use std::fmt;

pub use algorithm::DnsSecAlgorithm;
pub use denial::{DenialOfExistenceValidator, DenialProof};
pub use digest::DigestType;
pub use errors::DnsSecError;
pub use key_tag::calculate_key_tag;
pub use trust_anchor::{TrustAnchor, TrustAnchorStore};
pub use validator::DnsSecValidator;
pub use verifier::{ChainVerdict, DnssecVerifier};

/// NSEC3 proofs with more iterations are treated as insecure (RFC 9276 §3.2)
pub const MAX_NSEC3_ITERATIONS: u16 = 150;

/// Outcome of validating the chain of trust for one name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DnssecStatus {
    /// Every link from a trust anchor to the answer validated
    Secure,
    /// Provably unsigned below an authenticated delegation
    Insecure,
    /// Signatures or proofs are missing, expired or do not verify
    Bogus,
    /// Validation could not complete (network failure, no trust anchor)
    Indeterminate,
}

impl DnssecStatus {
    pub fn is_secure(self) -> bool {
        self == DnssecStatus::Secure
    }
}

impl fmt::Display for DnssecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secure => write!(f, "secure"),
            Self::Insecure => write!(f, "insecure"),
            Self::Bogus => write!(f, "bogus"),
            Self::Indeterminate => write!(f, "indeterminate"),
        }
    }
}
