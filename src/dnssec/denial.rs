use std::cmp::Ordering;

use base32::Alphabet;
use ring::digest;
use tracing::{debug, trace};

use super::records::{DnsKey, Nsec, Nsec3};
use super::validator::{DnsSecValidator, rrset, signatures};
use super::{DnsSecError, MAX_NSEC3_ITERATIONS, errors::Result};
use crate::dns::DNSPacket;
use crate::dns::enums::DNSResourceType;
use crate::dns::name;

const NSEC3_BASE32: Alphabet = Alphabet::Rfc4648Hex { padding: false };

/// What an authenticated negative response proves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialProof {
    /// The name exists without the queried type. `types` is the type bitmap
    /// at the name (empty for an empty non-terminal).
    NoData { types: Vec<DNSResourceType> },
    /// The name does not exist
    NameError,
    /// The proof lands in an NSEC3 opt-out span or uses parameters too costly
    /// to evaluate; the name may sit below an unsigned delegation
    Insecure,
}

/// NSEC/NSEC3 denial of existence validator for one zone
pub struct DenialOfExistenceValidator<'a> {
    validator: &'a DnsSecValidator,
    zone: &'a str,
    keys: &'a [DnsKey],
}

impl<'a> DenialOfExistenceValidator<'a> {
    pub fn new(validator: &'a DnsSecValidator, zone: &'a str, keys: &'a [DnsKey]) -> Self {
        Self {
            validator,
            zone,
            keys,
        }
    }

    /// Prove from the authority section of `packet` that `qname`/`qtype`
    /// has no data, or that `qname` does not exist
    pub fn prove(
        &self,
        packet: &DNSPacket,
        qname: &str,
        qtype: DNSResourceType,
    ) -> Result<DenialProof> {
        debug!("Validating denial of existence for {} {}", qname, qtype);

        let nsec3 = self.authenticated_nsec3(packet)?;
        if !nsec3.is_empty() {
            return self.prove_nsec3(&nsec3, qname, qtype);
        }
        let nsec = self.authenticated_nsec(packet)?;
        if !nsec.is_empty() {
            return prove_nsec(&nsec, qname, qtype);
        }

        Err(DnsSecError::DenialOfExistenceFailed(
            "no NSEC or NSEC3 records in response".to_string(),
        ))
    }

    /// Prove that no name closer than the wildcard's encloser matches
    /// `qname`, as required for a wildcard-expanded answer (RFC 4035 §5.3.4)
    pub fn prove_wildcard_answer(
        &self,
        packet: &DNSPacket,
        qname: &str,
        encloser: &str,
    ) -> Result<()> {
        let nsec3 = self.authenticated_nsec3(packet)?;
        if !nsec3.is_empty() {
            let next_closer = name::suffix(qname, name::label_count(encloser) + 1);
            let hash = nsec3_find_covering(&nsec3, &next_closer)?;
            return match hash {
                Some(_) => Ok(()),
                None => Err(DnsSecError::DenialOfExistenceFailed(format!(
                    "no NSEC3 covers {} for wildcard answer",
                    next_closer
                ))),
            };
        }

        let nsec = self.authenticated_nsec(packet)?;
        if nsec
            .iter()
            .any(|(owner, record)| nsec_covers(owner, &record.next, qname))
        {
            Ok(())
        } else {
            Err(DnsSecError::DenialOfExistenceFailed(format!(
                "no NSEC covers {} for wildcard answer",
                qname
            )))
        }
    }

    fn authenticated_nsec(&self, packet: &DNSPacket) -> Result<Vec<(String, Nsec)>> {
        let mut out: Vec<(String, Nsec)> = Vec::new();
        for owner in owners_of(packet, DNSResourceType::NSEC) {
            let records = rrset(&packet.authorities, &owner, DNSResourceType::NSEC);
            let sigs = signatures(&packet.authorities, &owner, DNSResourceType::NSEC);
            self.validator.verify_rrset(
                &owner,
                DNSResourceType::NSEC,
                &records,
                &sigs,
                self.keys,
                self.zone,
            )?;
            for rr in records {
                out.push((owner.clone(), Nsec::parse(&rr.rdata)?));
            }
        }
        Ok(out)
    }

    fn authenticated_nsec3(&self, packet: &DNSPacket) -> Result<Vec<HashedNsec3>> {
        let mut out = Vec::new();
        for owner in owners_of(packet, DNSResourceType::NSEC3) {
            // NSEC3 owners are a hash label directly below the zone apex
            if !name::parent(&owner).is_some_and(|p| name::eq(&p, self.zone)) {
                debug!("Ignoring NSEC3 {} outside zone {}", owner, self.zone);
                continue;
            }
            let records = rrset(&packet.authorities, &owner, DNSResourceType::NSEC3);
            let sigs = signatures(&packet.authorities, &owner, DNSResourceType::NSEC3);
            self.validator.verify_rrset(
                &owner,
                DNSResourceType::NSEC3,
                &records,
                &sigs,
                self.keys,
                self.zone,
            )?;

            let label = name::labels(&owner)
                .first()
                .map(|l| l.to_ascii_uppercase())
                .ok_or(DnsSecError::MalformedRecord("NSEC3"))?;
            let owner_hash =
                base32::decode(NSEC3_BASE32, &label).ok_or(DnsSecError::MalformedRecord("NSEC3"))?;
            for rr in records {
                out.push(HashedNsec3 {
                    owner_hash: owner_hash.clone(),
                    zone: self.zone.to_string(),
                    record: Nsec3::parse(&rr.rdata)?,
                });
            }
        }
        Ok(out)
    }

    /// RFC 5155 §8.4 to §8.7
    fn prove_nsec3(
        &self,
        records: &[HashedNsec3],
        qname: &str,
        qtype: DNSResourceType,
    ) -> Result<DenialProof> {
        if records
            .iter()
            .any(|r| r.record.iterations > MAX_NSEC3_ITERATIONS)
        {
            debug!(
                "NSEC3 iterations above {} for {}, treating as insecure",
                MAX_NSEC3_ITERATIONS, self.zone
            );
            return Ok(DenialProof::Insecure);
        }
        if records.iter().any(|r| r.record.hash_algorithm != 1) {
            return Err(DnsSecError::InvalidNsec3Parameters);
        }

        if let Some(matching) = nsec3_find_matching(records, qname)? {
            return nodata_from_types(&matching.record.types, qtype);
        }

        // Closest encloser: the longest existing ancestor of qname
        let mut encloser = None;
        let mut candidate = name::parent(qname);
        while let Some(current) = candidate {
            if !name::is_subdomain(&current, self.zone) {
                break;
            }
            if nsec3_find_matching(records, &current)?.is_some() {
                encloser = Some(current);
                break;
            }
            candidate = name::parent(&current);
        }
        let encloser = encloser.ok_or_else(|| {
            DnsSecError::DenialOfExistenceFailed(format!("no closest encloser for {}", qname))
        })?;

        let next_closer = name::suffix(qname, name::label_count(&encloser) + 1);
        let covering = nsec3_find_covering(records, &next_closer)?.ok_or_else(|| {
            DnsSecError::DenialOfExistenceFailed(format!("no NSEC3 covers {}", next_closer))
        })?;
        if covering.record.opt_out() {
            trace!("{} falls in an opt-out span", next_closer);
            return Ok(DenialProof::Insecure);
        }

        let wildcard = wildcard_at(&encloser);
        if let Some(matching) = nsec3_find_matching(records, &wildcard)? {
            return nodata_from_types(&matching.record.types, qtype);
        }
        if nsec3_find_covering(records, &wildcard)?.is_some() {
            return Ok(DenialProof::NameError);
        }

        Err(DnsSecError::DenialOfExistenceFailed(format!(
            "wildcard {} neither matched nor covered",
            wildcard
        )))
    }
}

struct HashedNsec3 {
    owner_hash: Vec<u8>,
    zone: String,
    record: Nsec3,
}

/// Distinct owner names of `rtype` records in the authority section
fn owners_of(packet: &DNSPacket, rtype: DNSResourceType) -> Vec<String> {
    let mut owners: Vec<String> = Vec::new();
    for rr in DNSPacket::records_of(&packet.authorities, rtype) {
        let owner = rr.name();
        if !owners.iter().any(|o| name::eq(o, &owner)) {
            owners.push(owner);
        }
    }
    owners
}

fn wildcard_at(encloser: &str) -> String {
    if encloser == "." {
        "*".to_string()
    } else {
        format!("*.{}", encloser.trim_end_matches('.'))
    }
}

/// Type bitmap at an existing name proves NODATA unless it lists the type
fn nodata_from_types(types: &[DNSResourceType], qtype: DNSResourceType) -> Result<DenialProof> {
    if types.contains(&qtype) || types.contains(&DNSResourceType::CNAME) {
        return Err(DnsSecError::DenialOfExistenceFailed(format!(
            "bitmap asserts {} exists",
            qtype
        )));
    }
    // A parent-side delegation record only proves the absence of DS
    if qtype != DNSResourceType::DS
        && types.contains(&DNSResourceType::NS)
        && !types.contains(&DNSResourceType::SOA)
    {
        return Err(DnsSecError::DenialOfExistenceFailed(
            "delegation NSEC cannot deny child data".to_string(),
        ));
    }
    Ok(DenialProof::NoData {
        types: types.to_vec(),
    })
}

/// NSEC proofs (RFC 4035 §5.4)
fn prove_nsec(
    records: &[(String, Nsec)],
    qname: &str,
    qtype: DNSResourceType,
) -> Result<DenialProof> {
    if let Some((_, exact)) = records.iter().find(|(owner, _)| name::eq(owner, qname)) {
        return nodata_from_types(&exact.types, qtype);
    }

    let (owner, covering) = records
        .iter()
        .find(|(owner, nsec)| nsec_covers(owner, &nsec.next, qname))
        .ok_or_else(|| {
            DnsSecError::DenialOfExistenceFailed(format!("no NSEC covers {}", qname))
        })?;

    // qname sorts between owner and next, and next is below qname: the name
    // is an empty non-terminal
    if name::is_subdomain(&covering.next, qname) {
        return Ok(DenialProof::NoData { types: Vec::new() });
    }

    let encloser = longest_common_ancestor(qname, owner, &covering.next);
    let wildcard = wildcard_at(&encloser);
    if let Some((_, exact)) = records.iter().find(|(o, _)| name::eq(o, &wildcard)) {
        return nodata_from_types(&exact.types, qtype);
    }
    if records
        .iter()
        .any(|(o, nsec)| nsec_covers(o, &nsec.next, &wildcard))
    {
        return Ok(DenialProof::NameError);
    }

    Err(DnsSecError::DenialOfExistenceFailed(format!(
        "wildcard {} not denied",
        wildcard
    )))
}

/// Whether `qname` sorts strictly between an NSEC owner and its next name
fn nsec_covers(owner: &str, next: &str, qname: &str) -> bool {
    let after_owner = name::canonical_cmp(owner, qname) == Ordering::Less;
    let before_next = name::canonical_cmp(qname, next) == Ordering::Less;
    if name::canonical_cmp(owner, next) == Ordering::Less {
        after_owner && before_next
    } else {
        // Last NSEC in the zone wraps around to the apex
        after_owner || before_next
    }
}

fn common_suffix_len(a: &str, b: &str) -> usize {
    let a = name::labels(a);
    let b = name::labels(b);
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x.eq_ignore_ascii_case(y))
        .count()
}

fn longest_common_ancestor(qname: &str, owner: &str, next: &str) -> String {
    let depth = common_suffix_len(qname, owner).max(common_suffix_len(qname, next));
    name::suffix(qname, depth)
}

/// NSEC3 hash of a name (RFC 5155 §5)
pub fn nsec3_hash(owner: &str, salt: &[u8], iterations: u16) -> Result<Vec<u8>> {
    let wire = name::to_wire(owner, true).map_err(|_| DnsSecError::InvalidNsec3Parameters)?;

    let mut input = wire;
    input.extend_from_slice(salt);
    let mut hash = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, &input)
        .as_ref()
        .to_vec();

    for _ in 0..iterations {
        let mut next = hash;
        next.extend_from_slice(salt);
        hash = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, &next)
            .as_ref()
            .to_vec();
    }
    Ok(hash)
}

/// NSEC3 owner label for a name, as it appears in the zone
pub fn nsec3_label(owner: &str, salt: &[u8], iterations: u16) -> Result<String> {
    Ok(base32::encode(NSEC3_BASE32, &nsec3_hash(owner, salt, iterations)?).to_ascii_lowercase())
}

fn nsec3_find_matching<'r>(
    records: &'r [HashedNsec3],
    target: &str,
) -> Result<Option<&'r HashedNsec3>> {
    for r in records {
        if !name::is_subdomain(target, &r.zone) {
            continue;
        }
        let hash = nsec3_hash(target, &r.record.salt, r.record.iterations)?;
        if hash == r.owner_hash {
            return Ok(Some(r));
        }
    }
    Ok(None)
}

fn nsec3_find_covering<'r>(
    records: &'r [HashedNsec3],
    target: &str,
) -> Result<Option<&'r HashedNsec3>> {
    for r in records {
        if !name::is_subdomain(target, &r.zone) {
            continue;
        }
        let hash = nsec3_hash(target, &r.record.salt, r.record.iterations)?;
        let owner = r.owner_hash.as_slice();
        let next = r.record.next_hashed.as_slice();
        let covers = if owner < next {
            owner < hash.as_slice() && hash.as_slice() < next
        } else {
            owner < hash.as_slice() || hash.as_slice() < next
        };
        if covers {
            return Ok(Some(r));
        }
    }
    Ok(None)
}
