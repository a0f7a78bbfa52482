//! Retrying DNS queries and the TXT lookup built on them

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};

use crate::alias::CanonicalName;
use crate::config::ResolverConfig;
use crate::dns::enums::{DNSResourceType, ResponseCode};
use crate::dns::rdata::txt_strings;
use crate::dns::{DNSPacket, ParseError};
use crate::error::{ResolveError, TransportError};
use crate::transport::DnsTransport;

/// How often and how patiently a query is repeated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub query_timeout: Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            query_timeout: config.query_timeout,
            base_delay: config.retry_base_delay,
            max_delay: config.retry_max_delay,
        }
    }

    /// Delays between attempts: base·2, base·4, ... capped at `max_delay`,
    /// each scaled by a random jitter factor
    pub fn strategy(&self) -> impl Iterator<Item = Duration> {
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        ExponentialBackoff::from_millis(2)
            .factor(base_ms.max(1))
            .max_delay(self.max_delay)
            .map(jitter)
            .take(self.max_attempts.saturating_sub(1) as usize)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ResolverConfig::default())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{error} (after {attempts} attempt(s))")]
pub struct QueryFailure {
    pub attempts: u32,
    pub error: TransportError,
}

/// Shared query path: every DNS request goes through the per-attempt
/// timeout and the retry budget
#[derive(Clone)]
pub struct QueryClient {
    transport: Arc<dyn DnsTransport>,
    policy: RetryPolicy,
}

impl QueryClient {
    pub fn new(transport: Arc<dyn DnsTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Query until an authoritative outcome arrives. NOERROR and NXDOMAIN
    /// responses are returned as they are; only transient failures repeat.
    pub async fn query(
        &self,
        name: &str,
        rtype: DNSResourceType,
    ) -> Result<DNSPacket, QueryFailure> {
        self.query_counted(name, rtype).await.0
    }

    async fn query_counted(
        &self,
        name: &str,
        rtype: DNSResourceType,
    ) -> (Result<DNSPacket, QueryFailure>, u32) {
        let attempt_count = AtomicU32::new(0);

        let result = RetryIf::spawn(
            self.policy.strategy(),
            || {
                let attempt = attempt_count.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    let outcome = self.attempt(name, rtype).await;
                    if let Err(e) = &outcome {
                        debug!("{} {} attempt {} failed: {}", name, rtype, attempt, e);
                    }
                    outcome
                }
            },
            |e: &TransportError| e.is_transient(),
        )
        .await;

        let attempts = attempt_count.load(Ordering::SeqCst);
        let result = result.map_err(|error| {
            warn!(
                "{} {} failed after {} attempt(s): {}",
                name, rtype, attempts, error
            );
            QueryFailure { attempts, error }
        });
        (result, attempts)
    }

    async fn attempt(&self, name: &str, rtype: DNSResourceType) -> Result<DNSPacket, TransportError> {
        let response = timeout(self.policy.query_timeout, self.transport.query(name, rtype))
            .await
            .map_err(|_| TransportError::Timeout)??;

        match response.response_code() {
            ResponseCode::NoError | ResponseCode::NameError => Ok(response),
            code @ (ResponseCode::ServerFailure | ResponseCode::Refused) => {
                Err(TransportError::ServerFailure(code.to_string()))
            }
            code => Err(TransportError::Rejected(code.to_string())),
        }
    }
}

/// The text of one TXT record, character-strings concatenated
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RawTxtAnswer(String);

impl RawTxtAnswer {
    /// Surrounding double quotes from presentation format are dropped
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        match text
            .strip_prefix('"')
            .and_then(|inner| inner.strip_suffix('"'))
        {
            Some(inner) => Self(inner.to_string()),
            None => Self(text),
        }
    }

    /// Text that is not valid UTF-8 is rejected rather than repaired
    pub fn from_rdata(rdata: &[u8]) -> Result<Self, ParseError> {
        let joined = txt_strings(rdata)?.concat();
        String::from_utf8(joined)
            .map(Self)
            .map_err(|e| ParseError::InvalidRdata(format!("TXT is not UTF-8: {}", e)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RawTxtAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct TxtResolver {
    client: QueryClient,
}

impl TxtResolver {
    pub fn new(client: QueryClient) -> Self {
        Self { client }
    }

    /// All TXT answers for `name` in answer order. A negative answer is an
    /// empty list; exhausted retries or a permanent failure is an error.
    pub async fn resolve_txt(&self, name: &CanonicalName) -> Result<Vec<RawTxtAnswer>, ResolveError> {
        let (result, attempts) = self
            .client
            .query_counted(name.as_str(), DNSResourceType::TXT)
            .await;
        let response = result.map_err(|failure| ResolveError::LookupFailed {
            name: name.to_string(),
            attempts: failure.attempts,
            reason: failure.error.to_string(),
        })?;

        if response.response_code() == ResponseCode::NameError {
            debug!("{} does not exist", name);
            return Ok(Vec::new());
        }

        let answers = DNSPacket::records_of(&response.answers, DNSResourceType::TXT)
            .map(|rr| RawTxtAnswer::from_rdata(&rr.rdata))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ResolveError::LookupFailed {
                name: name.to_string(),
                attempts,
                reason: e.to_string(),
            })?;
        debug!("{} has {} TXT record(s)", name, answers.len());
        Ok(answers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_length_and_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            query_timeout: Duration::from_millis(100),
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
        };
        let delays: Vec<Duration> = policy.strategy().collect();
        assert_eq!(delays.len(), 4);
        assert!(delays.iter().all(|d| *d <= Duration::from_millis(300)));
    }

    #[test]
    fn test_raw_answer_strips_quotes() {
        assert_eq!(RawTxtAnswer::new("\"oa1:xmr x=y\"").as_str(), "oa1:xmr x=y");
        assert_eq!(RawTxtAnswer::new("\"").as_str(), "\"");
        assert_eq!(RawTxtAnswer::new("plain").as_str(), "plain");
    }

    #[test]
    fn test_raw_answer_joins_strings() {
        let answer = RawTxtAnswer::from_rdata(b"\x04oa1:\x03xmr").unwrap();
        assert_eq!(answer.as_str(), "oa1:xmr");
    }

    #[test]
    fn test_raw_answer_rejects_invalid_utf8() {
        let text = b"oa1:xmr recipient_address=4A\xffB; recipient_name=A; tx_description=B;";
        let mut rdata = vec![text.len() as u8];
        rdata.extend_from_slice(text);

        assert!(matches!(
            RawTxtAnswer::from_rdata(&rdata),
            Err(ParseError::InvalidRdata(_))
        ));
    }
}
