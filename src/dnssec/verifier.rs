//! Chain-of-trust walk from a trust anchor down to a TXT RRset

use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use super::denial::{DenialOfExistenceValidator, DenialProof};
use super::records::{DnsKey, Ds};
use super::trust_anchor::{AnchorData, TrustAnchorStore};
use super::validator::{DnsSecValidator, rrset, signatures};
use super::{DnsSecError, DnssecStatus};
use crate::alias::CanonicalName;
use crate::dns::DNSPacket;
use crate::dns::enums::{DNSResourceType, ResponseCode};
use crate::dns::name;
use crate::lookup::{QueryClient, RawTxtAnswer};

/// Status of a verification, plus the TXT answers it authenticated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainVerdict {
    pub status: DnssecStatus,
    /// Set only when `status` is Secure. Empty when the name or its TXT
    /// RRset is proven not to exist.
    pub authenticated: Option<Vec<RawTxtAnswer>>,
}

impl ChainVerdict {
    fn secure(answers: Vec<RawTxtAnswer>) -> Self {
        Self {
            status: DnssecStatus::Secure,
            authenticated: Some(answers),
        }
    }

    fn unauthenticated(status: DnssecStatus) -> Self {
        Self {
            status,
            authenticated: None,
        }
    }
}

/// Why a walk stopped short of Secure
enum Halt {
    Insecure(String),
    Bogus(DnsSecError),
    Indeterminate(String),
}

impl From<DnsSecError> for Halt {
    fn from(err: DnsSecError) -> Self {
        Halt::Bogus(err)
    }
}

/// Zone whose DNSKEY RRset has been authenticated
struct SecureZone {
    name: String,
    keys: Vec<DnsKey>,
}

pub struct DnssecVerifier {
    client: QueryClient,
    anchors: Arc<TrustAnchorStore>,
    validator: DnsSecValidator,
}

impl DnssecVerifier {
    pub fn new(client: QueryClient, anchors: Arc<TrustAnchorStore>) -> Self {
        Self {
            client,
            anchors,
            validator: DnsSecValidator::new(),
        }
    }

    /// Pin the clock used for signature validity windows
    pub fn set_current_time(&mut self, time: u32) {
        self.validator.set_current_time(time);
    }

    pub async fn verify(&self, name: &CanonicalName) -> DnssecStatus {
        self.verify_detailed(name).await.status
    }

    pub async fn verify_detailed(&self, name: &CanonicalName) -> ChainVerdict {
        let target = name.as_str();
        match self.walk(target).await {
            Ok(verdict) => {
                info!("DNSSEC chain for {} is secure", target);
                verdict
            }
            Err(Halt::Insecure(reason)) => {
                info!("{} is insecure: {}", target, reason);
                ChainVerdict::unauthenticated(DnssecStatus::Insecure)
            }
            Err(Halt::Bogus(err)) => {
                warn!("DNSSEC validation of {} failed: {}", target, err);
                ChainVerdict::unauthenticated(DnssecStatus::Bogus)
            }
            Err(Halt::Indeterminate(reason)) => {
                warn!("DNSSEC status of {} is indeterminate: {}", target, reason);
                ChainVerdict::unauthenticated(DnssecStatus::Indeterminate)
            }
        }
    }

    async fn walk(&self, target: &str) -> Result<ChainVerdict, Halt> {
        let (anchor_zone, anchors) = self
            .anchors
            .closest(target)
            .ok_or_else(|| Halt::Indeterminate("no trust anchor covers the name".to_string()))?;

        let mut anchor_ds = Vec::new();
        let mut anchor_keys = Vec::new();
        for anchor in anchors {
            match anchor.data {
                AnchorData::Ds(ds) => anchor_ds.push(ds),
                AnchorData::DnsKey(key) => anchor_keys.push(key),
            }
        }

        let mut zone = self
            .authenticate_zone(&anchor_zone, &anchor_ds, &anchor_keys)
            .await?;

        for child in name::descendants_between(target, &anchor_zone) {
            let response = self.fetch(&child, DNSResourceType::DS).await?;
            let ds_records = rrset(&response.answers, &child, DNSResourceType::DS);

            if response.response_code() == ResponseCode::NoError && !ds_records.is_empty() {
                let sigs = signatures(&response.answers, &child, DNSResourceType::DS);
                self.validator.verify_rrset(
                    &child,
                    DNSResourceType::DS,
                    &ds_records,
                    &sigs,
                    &zone.keys,
                    &zone.name,
                )?;
                let ds_set = ds_records
                    .iter()
                    .map(|rr| Ds::parse(&rr.rdata))
                    .collect::<Result<Vec<_>, _>>()?;
                trace!("{} has {} authenticated DS record(s)", child, ds_set.len());
                zone = self.authenticate_zone(&child, &ds_set, &[]).await?;
                continue;
            }

            let proof = self.deny(&response, &zone, &child, DNSResourceType::DS)?;
            match proof {
                DenialProof::NoData { types } => {
                    if types.contains(&DNSResourceType::NS) && !types.contains(&DNSResourceType::SOA)
                    {
                        return Err(Halt::Insecure(format!("{} is an unsigned delegation", child)));
                    }
                    trace!("{} is not a zone cut", child);
                }
                DenialProof::NameError => {
                    debug!("{} provably does not exist", child);
                    return Ok(ChainVerdict::secure(Vec::new()));
                }
                DenialProof::Insecure => {
                    return Err(Halt::Insecure(format!(
                        "{} is covered by an opt-out or unverifiable NSEC3",
                        child
                    )));
                }
            }
        }

        self.verify_txt(target, &zone).await
    }

    async fn verify_txt(&self, target: &str, zone: &SecureZone) -> Result<ChainVerdict, Halt> {
        let response = self.fetch(target, DNSResourceType::TXT).await?;
        let txt = rrset(&response.answers, target, DNSResourceType::TXT);

        if response.response_code() == ResponseCode::NoError && !txt.is_empty() {
            let sigs = signatures(&response.answers, target, DNSResourceType::TXT);
            let verified = self.validator.verify_rrset(
                target,
                DNSResourceType::TXT,
                &txt,
                &sigs,
                &zone.keys,
                &zone.name,
            )?;
            if let Some(encloser) = verified.wildcard_encloser {
                debug!("TXT for {} was expanded from *.{}", target, encloser);
                DenialOfExistenceValidator::new(&self.validator, &zone.name, &zone.keys)
                    .prove_wildcard_answer(&response, target, &encloser)?;
            }

            let answers = txt
                .iter()
                .map(|rr| RawTxtAnswer::from_rdata(&rr.rdata))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| DnsSecError::MalformedRecord("TXT"))?;
            return Ok(ChainVerdict::secure(answers));
        }

        if DNSPacket::records_of(&response.answers, DNSResourceType::CNAME)
            .any(|rr| rr.is_owned_by(target))
        {
            return Err(Halt::Indeterminate(
                "TXT answer is a CNAME redirection".to_string(),
            ));
        }

        match self.deny(&response, zone, target, DNSResourceType::TXT)? {
            DenialProof::NoData { .. } if response.response_code() == ResponseCode::NoError => {
                debug!("{} provably has no TXT records", target);
                Ok(ChainVerdict::secure(Vec::new()))
            }
            DenialProof::NameError if response.response_code() == ResponseCode::NameError => {
                debug!("{} provably does not exist", target);
                Ok(ChainVerdict::secure(Vec::new()))
            }
            DenialProof::Insecure => Err(Halt::Insecure(format!(
                "{} is covered by an opt-out or unverifiable NSEC3",
                target
            ))),
            proof => Err(Halt::Bogus(DnsSecError::DenialOfExistenceFailed(format!(
                "{:?} contradicts response code {}",
                proof,
                response.response_code()
            )))),
        }
    }

    fn deny(
        &self,
        response: &DNSPacket,
        zone: &SecureZone,
        qname: &str,
        qtype: DNSResourceType,
    ) -> Result<DenialProof, Halt> {
        match response.response_code() {
            ResponseCode::NoError | ResponseCode::NameError => {}
            other => {
                return Err(Halt::Indeterminate(format!(
                    "{} {} answered {}",
                    qname, qtype, other
                )));
            }
        }
        Ok(DenialOfExistenceValidator::new(&self.validator, &zone.name, &zone.keys)
            .prove(response, qname, qtype)?)
    }

    /// Fetch and authenticate the DNSKEY RRset of `zone`
    async fn authenticate_zone(
        &self,
        zone: &str,
        ds_set: &[Ds],
        trusted_keys: &[DnsKey],
    ) -> Result<SecureZone, Halt> {
        let response = self.fetch(zone, DNSResourceType::DNSKEY).await?;
        let records = rrset(&response.answers, zone, DNSResourceType::DNSKEY);
        if response.response_code() != ResponseCode::NoError || records.is_empty() {
            return Err(Halt::Bogus(DnsSecError::NoDnsKey));
        }
        let sigs = signatures(&response.answers, zone, DNSResourceType::DNSKEY);

        match self
            .validator
            .validate_dnskey_rrset(zone, &records, &sigs, ds_set, trusted_keys)
        {
            Ok(keys) => Ok(SecureZone {
                name: zone.to_string(),
                keys,
            }),
            Err(DnsSecError::NoSupportedDs) => Err(Halt::Insecure(format!(
                "{} is signed only with unsupported algorithms",
                zone
            ))),
            Err(e) => Err(Halt::Bogus(e)),
        }
    }

    async fn fetch(&self, qname: &str, qtype: DNSResourceType) -> Result<DNSPacket, Halt> {
        let response = self
            .client
            .query(qname, qtype)
            .await
            .map_err(|failure| Halt::Indeterminate(failure.to_string()))?;
        if response.header.ad {
            trace!("Upstream set AD for {} {}, validating locally", qname, qtype);
        }
        Ok(response)
    }
}
