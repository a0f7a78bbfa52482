//! Alias input normalization

use serde::Serialize;
use std::fmt;

/// A domain name derived from an alias: lower-case, trimmed, without the
/// trailing root dot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CanonicalName(String);

impl CanonicalName {
    pub fn new(name: &str) -> Self {
        let trimmed = name.trim().trim_end_matches('.').to_ascii_lowercase();
        if trimmed.is_empty() {
            Self(".".to_string())
        } else {
            Self(trimmed)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Alias(CanonicalName),
    /// No separator at all: the input is a payment address, not an alias
    BareAddress(String),
}

/// Classify raw input. `alice@example.com` becomes `alice.example.com`;
/// input that does not yield at least two labels (`addr`, `alice.`, `@`)
/// is a bare address.
pub fn normalize(input: &str) -> Normalized {
    let input = input.trim();
    if !input.contains(['.', '@']) {
        return Normalized::BareAddress(input.to_string());
    }
    let name = CanonicalName::new(&input.replacen('@', ".", 1));
    if name.as_str().split('.').filter(|label| !label.is_empty()).count() < 2 {
        return Normalized::BareAddress(input.to_string());
    }
    Normalized::Alias(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_address() {
        let address = "44AFFq5kSiGBoZ4NMDwYtN18obc8AemS33DBLWs3H7otXft3XjrpDtQGv7SqSsaBYBb98uNbr2VBBEt7f2wfn3RVGQBEP3A";
        assert_eq!(
            normalize(address),
            Normalized::BareAddress(address.to_string())
        );
    }

    #[test]
    fn test_email_form_equals_dotted_form() {
        assert_eq!(normalize("alice@example.com"), normalize("alice.example.com"));
        assert_eq!(
            normalize("Alice@Example.COM."),
            Normalized::Alias(CanonicalName::new("alice.example.com"))
        );
    }

    #[test]
    fn test_only_first_at_is_replaced() {
        assert_eq!(
            normalize("a@b@example.com"),
            Normalized::Alias(CanonicalName::new("a.b@example.com"))
        );
    }

    #[test]
    fn test_single_label_is_not_an_alias() {
        for input in ["alice.", "@", ".", " . ", "alice@", "@com"] {
            assert_eq!(
                normalize(input),
                Normalized::BareAddress(input.trim().to_string()),
                "{:?}",
                input
            );
        }
    }

    #[test]
    fn test_canonical_name_forms() {
        assert_eq!(CanonicalName::new(" pay.example.com. ").as_str(), "pay.example.com");
        assert_eq!(CanonicalName::new(".").as_str(), ".");
    }
}
