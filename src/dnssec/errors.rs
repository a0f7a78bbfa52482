use thiserror::Error;

/// DNSSEC validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsSecError {
    #[error("No DNSKEY record found for validation")]
    NoDnsKey,

    #[error("No RRSIG record found for RRset")]
    NoRrsig,

    #[error("DNSSEC signature has expired")]
    SignatureExpired,

    #[error("DNSSEC signature is not yet valid")]
    SignatureNotYetValid,

    #[error("Unsupported DNSSEC algorithm: {0}")]
    UnsupportedAlgorithm(u8),

    #[error("Unsupported digest type: {0}")]
    UnsupportedDigestType(u8),

    /// Every DS/anchor for the zone uses an algorithm or digest we cannot
    /// check; the zone is treated as unsigned (RFC 4035 §5.2)
    #[error("No DS record with a supported algorithm and digest")]
    NoSupportedDs,

    #[error("DNSSEC signature verification failed")]
    SignatureVerificationFailed,

    #[error("DS record digest does not match any DNSKEY")]
    DsDigestMismatch,

    #[error("Invalid DNSKEY public key format")]
    InvalidPublicKey,

    #[error("Invalid RRSIG signature format")]
    InvalidSignature,

    #[error("RRSIG signer {found} is not the expected zone {expected}")]
    UnexpectedSigner { expected: String, found: String },

    #[error("NSEC/NSEC3 denial of existence validation failed: {0}")]
    DenialOfExistenceFailed(String),

    #[error("Invalid NSEC3 parameters")]
    InvalidNsec3Parameters,

    #[error("Malformed {0} record")]
    MalformedRecord(&'static str),
}

pub type Result<T> = std::result::Result<T, DnsSecError>;
