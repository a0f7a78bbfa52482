use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

use super::records::{DnsKey, Ds, Rrsig};
use super::{DigestType, DnsSecAlgorithm, DnsSecError, digest::ds_matches_key, errors::Result};
use crate::dns::enums::DNSResourceType;
use crate::dns::name;
use crate::dns::resource::DNSResource;

/// Records of one RRset (owner and type) from a response section
pub fn rrset<'a>(
    section: &'a [DNSResource],
    owner: &str,
    rtype: DNSResourceType,
) -> Vec<&'a DNSResource> {
    section
        .iter()
        .filter(|rr| rr.rtype == rtype && rr.is_owned_by(owner))
        .collect()
}

/// RRSIGs in a section covering the RRset `owner`/`rtype`
pub fn signatures(section: &[DNSResource], owner: &str, rtype: DNSResourceType) -> Vec<Rrsig> {
    section
        .iter()
        .filter(|rr| rr.rtype == DNSResourceType::RRSIG && rr.is_owned_by(owner))
        .filter_map(|rr| match Rrsig::parse(&rr.rdata) {
            Ok(sig) => Some(sig),
            Err(e) => {
                debug!("Skipping unparsable RRSIG at {}: {}", owner, e);
                None
            }
        })
        .filter(|sig| sig.type_covered == rtype)
        .collect()
}

/// Outcome of a successful RRset verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedRrset {
    /// Closest encloser of a wildcard the RRset was synthesized from
    pub wildcard_encloser: Option<String>,
}

/// Verifies RRsets against the keys of their zone
pub struct DnsSecValidator {
    /// Current time for signature validation (for testing)
    current_time: Option<u32>,
}

impl Default for DnsSecValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl DnsSecValidator {
    pub fn new() -> Self {
        Self { current_time: None }
    }

    /// Set current time for testing
    pub fn set_current_time(&mut self, time: u32) {
        self.current_time = Some(time);
    }

    fn get_current_time(&self) -> u32 {
        self.current_time.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as u32)
                .unwrap_or(0)
        })
    }

    /// Verify one RRset using the keys of `zone`. Succeeds when any RRSIG
    /// from the zone validates under a matching key.
    pub fn verify_rrset(
        &self,
        owner: &str,
        rtype: DNSResourceType,
        records: &[&DNSResource],
        rrsigs: &[Rrsig],
        keys: &[DnsKey],
        zone: &str,
    ) -> Result<VerifiedRrset> {
        if records.is_empty() {
            return Err(DnsSecError::MalformedRecord("empty RRset"));
        }
        let candidates: Vec<&Rrsig> = rrsigs.iter().filter(|s| s.type_covered == rtype).collect();
        if candidates.is_empty() {
            return Err(DnsSecError::NoRrsig);
        }

        let mut last_error = DnsSecError::NoRrsig;
        for rrsig in candidates {
            match self.verify_signature(owner, records, rrsig, keys, zone) {
                Ok(verified) => {
                    trace!(
                        "Verified {} {} with key tag {}",
                        owner, rtype, rrsig.key_tag
                    );
                    return Ok(verified);
                }
                Err(e) => {
                    debug!("RRSIG for {} {} rejected: {}", owner, rtype, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    fn verify_signature(
        &self,
        owner: &str,
        records: &[&DNSResource],
        rrsig: &Rrsig,
        keys: &[DnsKey],
        zone: &str,
    ) -> Result<VerifiedRrset> {
        if !name::eq(&rrsig.signer, zone) {
            return Err(DnsSecError::UnexpectedSigner {
                expected: zone.to_string(),
                found: rrsig.signer.clone(),
            });
        }
        if !name::is_subdomain(owner, zone) {
            return Err(DnsSecError::UnexpectedSigner {
                expected: owner.to_string(),
                found: rrsig.signer.clone(),
            });
        }

        let now = self.get_current_time();
        if serial_lt(now, rrsig.inception) {
            return Err(DnsSecError::SignatureNotYetValid);
        }
        if serial_lt(rrsig.expiration, now) {
            return Err(DnsSecError::SignatureExpired);
        }

        let algorithm = DnsSecAlgorithm::from_u8(rrsig.algorithm)
            .filter(DnsSecAlgorithm::is_supported)
            .ok_or(DnsSecError::UnsupportedAlgorithm(rrsig.algorithm))?;
        if !algorithm.is_recommended() {
            debug!("{} is signed with non-recommended algorithm {}", owner, algorithm);
        }

        let signed_data = rrsig.signed_data(owner, records)?;
        let mut matched_key = false;
        for key in keys.iter().filter(|k| {
            k.is_usable_zone_key() && k.algorithm == rrsig.algorithm && k.key_tag() == rrsig.key_tag
        }) {
            matched_key = true;
            if algorithm
                .verify(&key.public_key, &signed_data, &rrsig.signature)
                .is_ok()
            {
                let owner_labels = name::label_count(owner);
                let wildcard_encloser = (usize::from(rrsig.labels) < owner_labels)
                    .then(|| name::suffix(owner, usize::from(rrsig.labels)));
                return Ok(VerifiedRrset { wildcard_encloser });
            }
        }

        if matched_key {
            Err(DnsSecError::SignatureVerificationFailed)
        } else {
            Err(DnsSecError::NoDnsKey)
        }
    }

    /// Authenticate the DNSKEY RRset of `zone` from DS records or trusted
    /// keys, and return the zone's keys.
    ///
    /// A key is an entry point when a DS digest or trust anchor matches it.
    /// The DNSKEY RRset must then be self-signed by an entry point.
    pub fn validate_dnskey_rrset(
        &self,
        zone: &str,
        records: &[&DNSResource],
        rrsigs: &[Rrsig],
        ds_set: &[Ds],
        trusted_keys: &[DnsKey],
    ) -> Result<Vec<DnsKey>> {
        let keys: Vec<DnsKey> = records
            .iter()
            .filter_map(|rr| DnsKey::parse(&rr.rdata).ok())
            .collect();
        if keys.is_empty() {
            return Err(DnsSecError::NoDnsKey);
        }

        let usable_ds: Vec<&Ds> = usable_ds_records(ds_set);
        let usable_anchors: Vec<&DnsKey> = trusted_keys
            .iter()
            .filter(|k| DnsSecAlgorithm::from_u8(k.algorithm).is_some_and(|a| a.is_supported()))
            .collect();
        if usable_ds.is_empty() && usable_anchors.is_empty() {
            return Err(DnsSecError::NoSupportedDs);
        }

        let entry_points: Vec<DnsKey> = keys
            .iter()
            .filter(|key| key.is_usable_zone_key())
            .filter(|key| {
                usable_ds.iter().any(|ds| ds_matches_key(zone, ds, key))
                    || usable_anchors.iter().any(|anchor| {
                        anchor.algorithm == key.algorithm && anchor.public_key == key.public_key
                    })
            })
            .cloned()
            .collect();
        if entry_points.is_empty() {
            debug!("No DNSKEY of {} matches its DS set or trust anchors", zone);
            return Err(DnsSecError::DsDigestMismatch);
        }

        self.verify_rrset(
            zone,
            DNSResourceType::DNSKEY,
            records,
            rrsigs,
            &entry_points,
            zone,
        )?;
        debug!(
            "Authenticated {} DNSKEY(s) for {} via {} entry point(s)",
            keys.len(),
            zone,
            entry_points.len()
        );
        Ok(keys)
    }
}

/// DS records we can check. SHA-1 digests are ignored when a SHA-256 or
/// SHA-384 digest is present (RFC 4509 §3).
fn usable_ds_records(ds_set: &[Ds]) -> Vec<&Ds> {
    let supported: Vec<&Ds> = ds_set
        .iter()
        .filter(|ds| DnsSecAlgorithm::from_u8(ds.algorithm).is_some_and(|a| a.is_supported()))
        .filter(|ds| DigestType::from_u8(ds.digest_type).is_some_and(|d| d.is_supported()))
        .collect();
    let has_strong = supported
        .iter()
        .any(|ds| DigestType::from_u8(ds.digest_type).is_some_and(|d| d.is_strong()));
    supported
        .into_iter()
        .filter(|ds| {
            !has_strong || DigestType::from_u8(ds.digest_type).is_some_and(|d| d.is_strong())
        })
        .collect()
}

/// Serial number arithmetic (RFC 1982) for signature timestamps
fn serial_lt(a: u32, b: u32) -> bool {
    a != b && (b.wrapping_sub(a) as i32) > 0
}
