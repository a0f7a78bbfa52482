//! OpenAlias version 1 TXT record parsing
//!
//! `oa1:<namespace> key=value; key=value; ...`

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::alias::CanonicalName;
use crate::lookup::RawTxtAnswer;

pub const OA1_PREFIX: &str = "oa1:";

const RECIPIENT_ADDRESS: &str = "recipient_address";
const RECIPIENT_NAME: &str = "recipient_name";
const TX_DESCRIPTION: &str = "tx_description";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedAliasRecord {
    pub source: CanonicalName,
    /// Currency or application tag, e.g. `xmr`
    pub namespace: String,
    pub recipient_address: String,
    pub recipient_name: String,
    pub tx_description: String,
    /// Attributes other than the three required keys, e.g. `tx_amount`
    pub extensions: BTreeMap<String, String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum MalformedKind {
    #[error("empty namespace after oa1:")]
    EmptyNamespace,

    #[error("namespace must be followed by exactly one space")]
    MissingSpace,

    #[error("segment {0:?} has no '='")]
    MissingEquals(String),

    #[error("segment {0:?} has an empty key")]
    EmptyKey(String),

    #[error("key {0} appears more than once")]
    DuplicateKey(String),

    #[error("required key {0} is missing")]
    MissingRequiredKey(&'static str),

    #[error("recipient_address is empty")]
    EmptyRecipientAddress,
}

/// An `oa1:` answer that does not follow the record grammar
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("malformed OpenAlias record at {source_name}: {kind}")]
pub struct MalformedRecord {
    #[serde(rename = "source")]
    pub source_name: CanonicalName,
    pub answer: RawTxtAnswer,
    pub kind: MalformedKind,
}

/// Parse one TXT answer.
///
/// Answers without the `oa1:` prefix are not OpenAlias records and yield
/// `Ok(None)`.
pub fn parse(
    answer: &RawTxtAnswer,
    source: &CanonicalName,
) -> Result<Option<ParsedAliasRecord>, MalformedRecord> {
    let Some(body) = answer.as_str().strip_prefix(OA1_PREFIX) else {
        return Ok(None);
    };
    let malformed = |kind: MalformedKind| MalformedRecord {
        source_name: source.clone(),
        answer: answer.clone(),
        kind,
    };

    let (namespace, attributes) = match body.split_once(' ') {
        Some((namespace, attributes)) => (namespace, attributes),
        None if body.is_empty() => return Err(malformed(MalformedKind::EmptyNamespace)),
        None => return Err(malformed(MalformedKind::MissingSpace)),
    };
    if namespace.is_empty() {
        return Err(malformed(MalformedKind::EmptyNamespace));
    }
    if attributes.starts_with(' ') {
        return Err(malformed(MalformedKind::MissingSpace));
    }

    let mut segments: Vec<&str> = attributes.split(';').collect();
    if segments.last().is_some_and(|s| s.trim().is_empty()) {
        segments.pop();
    }

    let mut fields: BTreeMap<String, String> = BTreeMap::new();
    for segment in segments {
        let (key, value) = segment
            .split_once('=')
            .ok_or_else(|| malformed(MalformedKind::MissingEquals(segment.trim().to_string())))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(malformed(MalformedKind::EmptyKey(segment.trim().to_string())));
        }
        if fields
            .insert(key.to_string(), value.trim().to_string())
            .is_some()
        {
            return Err(malformed(MalformedKind::DuplicateKey(key.to_string())));
        }
    }

    let mut take = |key: &'static str| {
        fields
            .remove(key)
            .ok_or_else(|| malformed(MalformedKind::MissingRequiredKey(key)))
    };
    let recipient_address = take(RECIPIENT_ADDRESS)?;
    let recipient_name = take(RECIPIENT_NAME)?;
    let tx_description = take(TX_DESCRIPTION)?;
    if recipient_address.is_empty() {
        return Err(malformed(MalformedKind::EmptyRecipientAddress));
    }

    Ok(Some(ParsedAliasRecord {
        source: source.clone(),
        namespace: namespace.to_string(),
        recipient_address,
        recipient_name,
        tx_description,
        extensions: fields,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> CanonicalName {
        CanonicalName::new("pay.example.com")
    }

    fn parse_text(text: &str) -> Result<Option<ParsedAliasRecord>, MalformedRecord> {
        parse(&RawTxtAnswer::new(text), &source())
    }

    fn kind_of(text: &str) -> MalformedKind {
        parse_text(text).unwrap_err().kind
    }

    #[test]
    fn test_full_record() {
        let record = parse_text(
            "oa1:xmr recipient_address=4AbC; recipient_name=Alice; tx_description=Donation; tx_amount=1.5;",
        )
        .unwrap()
        .unwrap();

        assert_eq!(record.source, source());
        assert_eq!(record.namespace, "xmr");
        assert_eq!(record.recipient_address, "4AbC");
        assert_eq!(record.recipient_name, "Alice");
        assert_eq!(record.tx_description, "Donation");
        assert_eq!(record.extensions.get("tx_amount").map(String::as_str), Some("1.5"));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let answer = RawTxtAnswer::new(
            "oa1:btc recipient_address=bc1q; recipient_name=Bob; tx_description=Tip",
        );
        let first = parse(&answer, &source());
        let second = parse(&answer, &source());
        assert_eq!(first, second);
        assert!(first.unwrap().is_some());
    }

    #[test]
    fn test_values_keep_inner_equals() {
        let record = parse_text(
            "oa1:xmr recipient_address=a=b; recipient_name=; tx_description=x==y;",
        )
        .unwrap()
        .unwrap();
        assert_eq!(record.recipient_address, "a=b");
        assert_eq!(record.recipient_name, "");
        assert_eq!(record.tx_description, "x==y");
    }

    #[test]
    fn test_not_an_openalias_record() {
        assert_eq!(parse_text("v=spf1 -all").unwrap(), None);
        assert_eq!(parse_text("OA1:xmr recipient_address=x").unwrap(), None);
        assert_eq!(parse_text("").unwrap(), None);
    }

    #[test]
    fn test_malformed_kinds() {
        assert_eq!(kind_of("oa1:"), MalformedKind::EmptyNamespace);
        assert_eq!(
            kind_of("oa1: recipient_address=x"),
            MalformedKind::EmptyNamespace
        );
        assert_eq!(kind_of("oa1:xmr"), MalformedKind::MissingSpace);
        assert_eq!(
            kind_of("oa1:xmr  recipient_address=x"),
            MalformedKind::MissingSpace
        );
        assert_eq!(
            kind_of("oa1:xmr recipient_address=x; garbage; recipient_name=a"),
            MalformedKind::MissingEquals("garbage".to_string())
        );
        assert_eq!(
            kind_of("oa1:xmr =x; recipient_name=a"),
            MalformedKind::EmptyKey("=x".to_string())
        );
        assert_eq!(
            kind_of("oa1:xmr recipient_address=x; recipient_address=y;"),
            MalformedKind::DuplicateKey("recipient_address".to_string())
        );
        assert_eq!(
            kind_of("oa1:xmr recipient_name=Alice; tx_description=Donation;"),
            MalformedKind::MissingRequiredKey("recipient_address")
        );
        assert_eq!(
            kind_of("oa1:xmr recipient_address= ; recipient_name=A; tx_description=B"),
            MalformedKind::EmptyRecipientAddress
        );
    }

    #[test]
    fn test_malformed_serializes_for_reports() {
        let err = parse_text("oa1:xmr recipient_name=Alice;").unwrap_err();
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["source"], "pay.example.com");
        assert_eq!(json["kind"]["kind"], "missing_required_key");
        assert_eq!(json["kind"]["detail"], "recipient_address");
    }
}
