use std::fmt;

use ring::signature::{self, RsaPublicKeyComponents, UnparsedPublicKey};

use super::DnsSecError;

/// DNSSEC Algorithm numbers (RFC 4034, 5155, 5702, 6605, 8080, 8624)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DnsSecAlgorithm {
    /// RSA/MD5 (deprecated)
    RsaMd5 = 1,
    /// DSA/SHA1 (RFC 2536)
    DSA = 3,
    /// RSA/SHA-1 (RFC 3110)
    RsaSha1 = 5,
    /// DSA-NSEC3-SHA1 (RFC 5155)
    DsaNsec3Sha1 = 6,
    /// RSASHA1-NSEC3-SHA1 (RFC 5155)
    RsaSha1Nsec3Sha1 = 7,
    /// RSA/SHA-256 (RFC 5702)
    RsaSha256 = 8,
    /// RSA/SHA-512 (RFC 5702)
    RsaSha512 = 10,
    /// GOST R 34.10-2001 (RFC 5933)
    EccGost = 12,
    /// ECDSA Curve P-256 with SHA-256 (RFC 6605)
    EcdsaP256Sha256 = 13,
    /// ECDSA Curve P-384 with SHA-384 (RFC 6605)
    EcdsaP384Sha384 = 14,
    /// Ed25519 (RFC 8080)
    Ed25519 = 15,
    /// Ed448 (RFC 8080)
    Ed448 = 16,
}

impl DnsSecAlgorithm {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::RsaMd5),
            3 => Some(Self::DSA),
            5 => Some(Self::RsaSha1),
            6 => Some(Self::DsaNsec3Sha1),
            7 => Some(Self::RsaSha1Nsec3Sha1),
            8 => Some(Self::RsaSha256),
            10 => Some(Self::RsaSha512),
            12 => Some(Self::EccGost),
            13 => Some(Self::EcdsaP256Sha256),
            14 => Some(Self::EcdsaP384Sha384),
            15 => Some(Self::Ed25519),
            16 => Some(Self::Ed448),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Check if algorithm is supported for validation
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            Self::RsaSha1
                | Self::RsaSha1Nsec3Sha1
                | Self::RsaSha256
                | Self::RsaSha512
                | Self::EcdsaP256Sha256
                | Self::EcdsaP384Sha384
                | Self::Ed25519
        )
    }

    /// Check if algorithm is recommended (RFC 8624)
    pub fn is_recommended(&self) -> bool {
        matches!(
            self,
            Self::RsaSha256 | Self::EcdsaP256Sha256 | Self::Ed25519
        )
    }

    /// Verify `signature` over `message` with a DNSKEY public key in its
    /// DNSSEC wire encoding
    pub fn verify(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), DnsSecError> {
        match self {
            Self::RsaSha1 | Self::RsaSha1Nsec3Sha1 => verify_rsa(
                &signature::RSA_PKCS1_1024_8192_SHA1_FOR_LEGACY_USE_ONLY,
                public_key,
                message,
                signature,
            ),
            Self::RsaSha256 => verify_rsa(
                &signature::RSA_PKCS1_1024_8192_SHA256_FOR_LEGACY_USE_ONLY,
                public_key,
                message,
                signature,
            ),
            Self::RsaSha512 => verify_rsa(
                &signature::RSA_PKCS1_1024_8192_SHA512_FOR_LEGACY_USE_ONLY,
                public_key,
                message,
                signature,
            ),
            Self::EcdsaP256Sha256 => verify_ecdsa(
                &signature::ECDSA_P256_SHA256_FIXED,
                64,
                public_key,
                message,
                signature,
            ),
            Self::EcdsaP384Sha384 => verify_ecdsa(
                &signature::ECDSA_P384_SHA384_FIXED,
                96,
                public_key,
                message,
                signature,
            ),
            Self::Ed25519 => {
                if public_key.len() != 32 {
                    return Err(DnsSecError::InvalidPublicKey);
                }
                UnparsedPublicKey::new(&signature::ED25519, public_key)
                    .verify(message, signature)
                    .map_err(|_| DnsSecError::SignatureVerificationFailed)
            }
            other => Err(DnsSecError::UnsupportedAlgorithm(other.to_u8())),
        }
    }
}

/// RSA keys are exponent length, exponent, modulus (RFC 3110 §2)
fn verify_rsa(
    params: &'static signature::RsaParameters,
    public_key: &[u8],
    message: &[u8],
    sig: &[u8],
) -> Result<(), DnsSecError> {
    let (exponent_len, rest) = match public_key {
        [0, hi, lo, rest @ ..] => (usize::from(u16::from_be_bytes([*hi, *lo])), rest),
        [len, rest @ ..] if *len != 0 => (usize::from(*len), rest),
        _ => return Err(DnsSecError::InvalidPublicKey),
    };
    if rest.len() <= exponent_len {
        return Err(DnsSecError::InvalidPublicKey);
    }
    let (e, n) = rest.split_at(exponent_len);

    RsaPublicKeyComponents { n, e }
        .verify(params, message, sig)
        .map_err(|_| DnsSecError::SignatureVerificationFailed)
}

/// ECDSA keys are the bare point coordinates (RFC 6605 §4)
fn verify_ecdsa(
    alg: &'static signature::EcdsaVerificationAlgorithm,
    point_len: usize,
    public_key: &[u8],
    message: &[u8],
    sig: &[u8],
) -> Result<(), DnsSecError> {
    if public_key.len() != point_len {
        return Err(DnsSecError::InvalidPublicKey);
    }
    let mut uncompressed = Vec::with_capacity(point_len + 1);
    uncompressed.push(0x04);
    uncompressed.extend_from_slice(public_key);

    UnparsedPublicKey::new(alg, &uncompressed)
        .verify(message, sig)
        .map_err(|_| DnsSecError::SignatureVerificationFailed)
}

impl fmt::Display for DnsSecAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RsaMd5 => write!(f, "RSAMD5"),
            Self::DSA => write!(f, "DSA"),
            Self::RsaSha1 => write!(f, "RSASHA1"),
            Self::DsaNsec3Sha1 => write!(f, "DSA-NSEC3-SHA1"),
            Self::RsaSha1Nsec3Sha1 => write!(f, "RSASHA1-NSEC3-SHA1"),
            Self::RsaSha256 => write!(f, "RSASHA256"),
            Self::RsaSha512 => write!(f, "RSASHA512"),
            Self::EccGost => write!(f, "ECC-GOST"),
            Self::EcdsaP256Sha256 => write!(f, "ECDSAP256SHA256"),
            Self::EcdsaP384Sha384 => write!(f, "ECDSAP384SHA384"),
            Self::Ed25519 => write!(f, "ED25519"),
            Self::Ed448 => write!(f, "ED448"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring::rand::SystemRandom;
    use ring::signature::{EcdsaKeyPair, Ed25519KeyPair, KeyPair};

    #[test]
    fn test_ed25519_verify() {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        let sig = pair.sign(b"signed data");

        let alg = DnsSecAlgorithm::Ed25519;
        let public_key = pair.public_key().as_ref();
        assert!(alg.verify(public_key, b"signed data", sig.as_ref()).is_ok());
        assert_eq!(
            alg.verify(public_key, b"tampered data", sig.as_ref()),
            Err(DnsSecError::SignatureVerificationFailed)
        );
    }

    #[test]
    fn test_ecdsa_p256_uses_bare_point() {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&signature::ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
            .unwrap();
        let pair = EcdsaKeyPair::from_pkcs8(
            &signature::ECDSA_P256_SHA256_FIXED_SIGNING,
            pkcs8.as_ref(),
            &rng,
        )
        .unwrap();
        let sig = pair.sign(&rng, b"zone data").unwrap();

        // DNSKEY carries the point without the 0x04 prefix
        let dnskey = &pair.public_key().as_ref()[1..];
        let alg = DnsSecAlgorithm::EcdsaP256Sha256;
        assert!(alg.verify(dnskey, b"zone data", sig.as_ref()).is_ok());
        assert_eq!(
            alg.verify(&dnskey[1..], b"zone data", sig.as_ref()),
            Err(DnsSecError::InvalidPublicKey)
        );
    }

    #[test]
    fn test_rsa_key_encoding_errors() {
        let alg = DnsSecAlgorithm::RsaSha256;
        assert_eq!(
            alg.verify(&[], b"x", b"y"),
            Err(DnsSecError::InvalidPublicKey)
        );
        assert_eq!(
            alg.verify(&[3, 1, 0, 1], b"x", b"y"),
            Err(DnsSecError::InvalidPublicKey)
        );
    }

    #[test]
    fn test_unsupported_algorithms() {
        let alg = DnsSecAlgorithm::from_u8(16).unwrap();
        assert!(!alg.is_supported());
        assert_eq!(
            alg.verify(&[0; 57], b"x", b"y"),
            Err(DnsSecError::UnsupportedAlgorithm(16))
        );
        assert!(DnsSecAlgorithm::from_u8(200).is_none());
        assert_eq!(DnsSecAlgorithm::RsaSha256.to_string(), "RSASHA256");
    }
}
