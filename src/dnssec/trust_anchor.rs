use base64::{Engine as _, engine::general_purpose::STANDARD};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::records::{DnsKey, Ds};
use crate::dns::name;
use crate::error::ConfigError;

/// IANA root zone KSK DS records (root-anchors.xml)
const ROOT_DS_ANCHORS: &[(u16, u8, u8, &str)] = &[
    // KSK-2017
    (
        20326,
        8,
        2,
        "E06D44B80B8F1D39A95C0B0D7C65D08458E880409BBC683457104237C7F8EC8D",
    ),
    // KSK-2024
    (
        38696,
        8,
        2,
        "683D2D0ACB8C9B712A1948B27F741219298D0A450D612C483AF444A4C0FB2B16",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorData {
    Ds(Ds),
    DnsKey(DnsKey),
}

/// A DNSSEC trust anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchor {
    /// Zone this anchor authenticates
    pub domain: String,
    pub data: AnchorData,
}

impl TrustAnchor {
    pub fn ds(domain: &str, ds: Ds) -> Self {
        Self {
            domain: zone_key(domain),
            data: AnchorData::Ds(ds),
        }
    }

    pub fn dnskey(domain: &str, key: DnsKey) -> Self {
        Self {
            domain: zone_key(domain),
            data: AnchorData::DnsKey(key),
        }
    }

    pub fn key_tag(&self) -> u16 {
        match &self.data {
            AnchorData::Ds(ds) => ds.key_tag,
            AnchorData::DnsKey(key) => key.key_tag(),
        }
    }

    /// Parse one presentation-format line, e.g.
    /// `. IN DS 20326 8 2 E06D...` or `example. 3600 IN DNSKEY 257 3 15 <base64>`
    pub fn parse_line(line: &str) -> Result<Self, String> {
        let mut tokens = line.split_whitespace();
        let owner = tokens.next().ok_or("missing owner name")?;

        let mut rtype = tokens.next().ok_or("missing record type")?;
        if rtype.chars().all(|c| c.is_ascii_digit()) {
            rtype = tokens.next().ok_or("missing record type")?;
        }
        if rtype.eq_ignore_ascii_case("IN") {
            rtype = tokens.next().ok_or("missing record type")?;
        }

        let mut number = |field: &str| -> Result<u32, String> {
            tokens
                .next()
                .ok_or_else(|| format!("missing {field}"))?
                .parse::<u32>()
                .map_err(|e| format!("invalid {field}: {e}"))
        };

        match rtype.to_ascii_uppercase().as_str() {
            "DS" => {
                let key_tag = narrow(number("key tag")?, "key tag")?;
                let algorithm = narrow(number("algorithm")?, "algorithm")?;
                let digest_type = narrow(number("digest type")?, "digest type")?;
                let digest_hex: String = tokens.collect();
                let digest = hex::decode(&digest_hex).map_err(|e| format!("invalid digest: {e}"))?;
                if digest.is_empty() {
                    return Err("missing digest".to_string());
                }
                Ok(Self::ds(
                    owner,
                    Ds {
                        key_tag,
                        algorithm,
                        digest_type,
                        digest,
                    },
                ))
            }
            "DNSKEY" => {
                let flags = narrow(number("flags")?, "flags")?;
                let protocol = narrow(number("protocol")?, "protocol")?;
                let algorithm = narrow(number("algorithm")?, "algorithm")?;
                let key_b64: String = tokens.collect();
                let public_key = STANDARD
                    .decode(key_b64.as_bytes())
                    .map_err(|e| format!("invalid public key: {e}"))?;
                if public_key.is_empty() {
                    return Err("missing public key".to_string());
                }
                Ok(Self::dnskey(
                    owner,
                    DnsKey {
                        flags,
                        protocol,
                        algorithm,
                        public_key,
                    },
                ))
            }
            other => Err(format!("unsupported record type {other}")),
        }
    }
}

fn narrow<T: TryFrom<u32>>(value: u32, field: &str) -> Result<T, String> {
    T::try_from(value).map_err(|_| format!("{field} out of range: {value}"))
}

/// Store key for a zone: lower-case, no trailing dot, root as "."
fn zone_key(domain: &str) -> String {
    name::from_labels(&name::labels(domain)).to_ascii_lowercase()
}

/// Trust anchor store for managing DNSSEC trust anchors
#[derive(Debug)]
pub struct TrustAnchorStore {
    anchors: Arc<RwLock<HashMap<String, Vec<TrustAnchor>>>>,
}

impl TrustAnchorStore {
    /// Create a store holding the built-in root anchors
    pub fn new() -> Self {
        let store = Self::empty();
        for (key_tag, algorithm, digest_type, digest) in ROOT_DS_ANCHORS {
            let digest = hex::decode(digest).expect("built-in root anchor digest is valid hex");
            store.add_anchor(TrustAnchor::ds(
                ".",
                Ds {
                    key_tag: *key_tag,
                    algorithm: *algorithm,
                    digest_type: *digest_type,
                    digest,
                },
            ));
        }
        store
    }

    pub fn empty() -> Self {
        Self {
            anchors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Parse anchors from presentation-format text. Blank lines and `;`
    /// comments are skipped.
    pub fn from_text(text: &str) -> Result<Self, ConfigError> {
        let store = Self::empty();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.split(';').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let anchor = TrustAnchor::parse_line(line)
                .map_err(|e| ConfigError::ParseError(format!("line {}: {}", index + 1, e)))?;
            store.add_anchor(anchor);
        }
        if store.domain_count() == 0 {
            return Err(ConfigError::ParseError("no trust anchors found".to_string()));
        }
        Ok(store)
    }

    /// Load anchors from a file, replacing the built-in ones
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file_error = |reason: String| ConfigError::TrustAnchorFile {
            path: path.display().to_string(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
        let store = Self::from_text(&text).map_err(|e| file_error(e.to_string()))?;
        info!(
            "Loaded trust anchors for {} zone(s) from {}",
            store.domain_count(),
            path.display()
        );
        Ok(store)
    }

    pub fn add_anchor(&self, anchor: TrustAnchor) {
        let mut anchors = self.anchors.write();
        anchors
            .entry(anchor.domain.clone())
            .or_default()
            .push(anchor);
    }

    /// Anchors of the closest zone at or above `domain`, with that zone
    pub fn closest(&self, domain: &str) -> Option<(String, Vec<TrustAnchor>)> {
        let anchors = self.anchors.read();
        let mut current = Some(zone_key(domain));
        while let Some(zone) = current {
            if let Some(found) = anchors.get(&zone) {
                debug!("Closest trust anchor for {} is {}", domain, zone);
                return Some((zone, found.clone()));
            }
            current = name::parent(&zone);
        }
        None
    }

    /// Clear all trust anchors (useful for testing)
    pub fn clear(&self) {
        self.anchors.write().clear();
    }

    /// Get the number of domains with trust anchors
    pub fn domain_count(&self) -> usize {
        self.anchors.read().len()
    }
}

impl Default for TrustAnchorStore {
    fn default() -> Self {
        Self::new()
    }
}
