use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::alias::{CanonicalName, Normalized, normalize};
use crate::config::ResolverConfig;
use crate::dnssec::{ChainVerdict, DnssecStatus, DnssecVerifier, TrustAnchorStore};
use crate::error::{ConfigError, ResolveError, Result};
use crate::lookup::{QueryClient, RawTxtAnswer, RetryPolicy, TxtResolver};
use crate::record::{self, MalformedRecord, ParsedAliasRecord};
use crate::transport::{DnsTransport, UdpTransport};

/// How much DNSSEC assurance a resolution requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustPolicy {
    /// Only data under a validated chain of trust is returned
    #[default]
    Strict,
    /// Data is returned with the observed status for the caller to judge
    Lenient,
}

impl FromStr for TrustPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(TrustPolicy::Strict),
            "lenient" => Ok(TrustPolicy::Lenient),
            other => Err(ConfigError::InvalidTrustPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for TrustPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustPolicy::Strict => write!(f, "strict"),
            TrustPolicy::Lenient => write!(f, "lenient"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAlias {
    pub name: CanonicalName,
    pub dnssec: DnssecStatus,
    /// Parsed records in DNS answer order
    pub records: Vec<ParsedAliasRecord>,
    /// `oa1:` answers that failed to parse
    pub malformed: Vec<MalformedRecord>,
}

impl ResolvedAlias {
    pub fn is_trusted(&self) -> bool {
        self.dnssec.is_secure()
    }

    /// Caller-facing warning for results without a validated chain
    pub fn warning(&self) -> Option<String> {
        match self.dnssec {
            DnssecStatus::Secure => None,
            DnssecStatus::Insecure => Some(format!(
                "{} is not signed with DNSSEC; these records are unauthenticated",
                self.name
            )),
            DnssecStatus::Bogus => Some(format!(
                "DNSSEC validation of {} FAILED; these records may be forged",
                self.name
            )),
            DnssecStatus::Indeterminate => Some(format!(
                "DNSSEC status of {} could not be determined; these records are unauthenticated",
                self.name
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    /// The input was a payment address, not an alias
    BareAddress { address: String },
    Resolved(ResolvedAlias),
}

/// Resolves aliases to OpenAlias records under a trust policy
pub struct AliasResolver {
    verifier: DnssecVerifier,
    txt: TxtResolver,
    allow_insecure: bool,
}

impl AliasResolver {
    pub fn new(
        transport: Arc<dyn DnsTransport>,
        anchors: Arc<TrustAnchorStore>,
        policy: RetryPolicy,
    ) -> Self {
        let client = QueryClient::new(transport, policy);
        Self {
            verifier: DnssecVerifier::new(client.clone(), anchors),
            txt: TxtResolver::new(client),
            allow_insecure: false,
        }
    }

    /// Build a resolver speaking to the configured upstreams
    pub fn from_config(config: &ResolverConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let anchors = match &config.trust_anchor_file {
            Some(path) => TrustAnchorStore::from_file(path)?,
            None => TrustAnchorStore::new(),
        };
        let transport = UdpTransport::new(
            config.upstream_servers.clone(),
            config.edns_payload_size,
        );
        Ok(Self::new(
            Arc::new(transport),
            Arc::new(anchors),
            RetryPolicy::from_config(config),
        )
        .with_allow_insecure(config.allow_insecure))
    }

    /// Accept provably unsigned zones under the strict policy
    pub fn with_allow_insecure(mut self, allow_insecure: bool) -> Self {
        self.allow_insecure = allow_insecure;
        self
    }

    /// Pin the clock used for signature validity windows
    pub fn set_current_time(&mut self, time: u32) {
        self.verifier.set_current_time(time);
    }

    pub async fn resolve(&self, input: &str, policy: TrustPolicy) -> Result<Resolution> {
        let name = match normalize(input) {
            Normalized::BareAddress(address) => {
                debug!("Input is a bare address, nothing to resolve");
                return Ok(Resolution::BareAddress { address });
            }
            Normalized::Alias(name) => name,
        };
        info!("Resolving {} under {} policy", name, policy);

        let (verdict, answers) = match policy {
            TrustPolicy::Strict => {
                let verdict = self.verifier.verify_detailed(&name).await;
                if !self.strict_accepts(verdict.status) {
                    return Err(ResolveError::TrustNotEstablished {
                        name: name.to_string(),
                        status: verdict.status,
                    });
                }
                let answers = self.txt.resolve_txt(&name).await;
                (verdict, answers)
            }
            TrustPolicy::Lenient => {
                tokio::join!(
                    self.verifier.verify_detailed(&name),
                    self.txt.resolve_txt(&name)
                )
            }
        };
        let answers = keep_authenticated(&name, answers?, &verdict);

        let mut records = Vec::new();
        let mut malformed = Vec::new();
        for answer in &answers {
            match record::parse(answer, &name) {
                Ok(Some(parsed)) => records.push(parsed),
                Ok(None) => debug!("Ignoring non-OpenAlias TXT record at {}", name),
                Err(diagnostic) => {
                    warn!("{}", diagnostic);
                    malformed.push(diagnostic);
                }
            }
        }
        info!(
            "{}: {} record(s), {} malformed, DNSSEC {}",
            name,
            records.len(),
            malformed.len(),
            verdict.status
        );

        Ok(Resolution::Resolved(ResolvedAlias {
            name,
            dnssec: verdict.status,
            records,
            malformed,
        }))
    }

    fn strict_accepts(&self, status: DnssecStatus) -> bool {
        match status {
            DnssecStatus::Secure => true,
            DnssecStatus::Insecure => self.allow_insecure,
            DnssecStatus::Bogus | DnssecStatus::Indeterminate => false,
        }
    }
}

/// Under a secure verdict, drop TXT answers the chain did not authenticate
fn keep_authenticated(
    name: &CanonicalName,
    mut answers: Vec<RawTxtAnswer>,
    verdict: &ChainVerdict,
) -> Vec<RawTxtAnswer> {
    if let Some(authenticated) = &verdict.authenticated {
        answers.retain(|answer| {
            let known = authenticated.contains(answer);
            if !known {
                warn!(
                    "Discarding TXT answer at {} absent from the authenticated RRset: {}",
                    name, answer
                );
            }
            known
        });
    }
    answers
}
