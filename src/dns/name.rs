//! Domain name helpers shared by the wire codec and the DNSSEC code.
//!
//! Names are handled as dotted strings. The root is `"."`; a trailing dot on
//! any other name is accepted and ignored. Comparisons are ASCII
//! case-insensitive.

use std::cmp::Ordering;

use super::ParseError;

/// Maximum length of a single label (RFC 1035 §2.3.4)
pub const MAX_LABEL_LEN: usize = 63;
/// Maximum length of a name in wire format
pub const MAX_NAME_LEN: usize = 255;

/// Labels of a name, left to right, root excluded
pub fn labels(name: &str) -> Vec<&str> {
    name.trim_end_matches('.')
        .split('.')
        .filter(|l| !l.is_empty())
        .collect()
}

pub fn label_count(name: &str) -> usize {
    labels(name).len()
}

/// Build a name from labels; no labels yields the root
pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> String {
    let joined = labels
        .iter()
        .map(|l| l.as_ref())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(".");
    if joined.is_empty() { ".".to_string() } else { joined }
}

pub fn eq(a: &str, b: &str) -> bool {
    let (a, b) = (labels(a), labels(b));
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.eq_ignore_ascii_case(y))
}

/// True if `name` equals `ancestor` or sits below it
pub fn is_subdomain(name: &str, ancestor: &str) -> bool {
    let name = labels(name);
    let ancestor = labels(ancestor);
    if ancestor.len() > name.len() {
        return false;
    }
    name.iter()
        .rev()
        .zip(ancestor.iter().rev())
        .all(|(x, y)| x.eq_ignore_ascii_case(y))
}

/// Parent of a name, `None` for the root
pub fn parent(name: &str) -> Option<String> {
    let l = labels(name);
    if l.is_empty() { None } else { Some(from_labels(&l[1..])) }
}

/// The `count` rightmost labels of `name`
pub fn suffix(name: &str, count: usize) -> String {
    let l = labels(name);
    let start = l.len().saturating_sub(count);
    from_labels(&l[start..])
}

/// Every name from just below `ancestor` down to `name` inclusive.
///
/// `descendants_between("a.b.example.com", "example.com")` yields
/// `["b.example.com", "a.b.example.com"]`.
pub fn descendants_between(name: &str, ancestor: &str) -> Vec<String> {
    let total = label_count(name);
    let start = label_count(ancestor);
    (start + 1..=total).map(|n| suffix(name, n)).collect()
}

/// Wire format; lower-cased when `canonical` (RFC 4034 §6.2)
pub fn to_wire(name: &str, canonical: bool) -> Result<Vec<u8>, ParseError> {
    let mut out = Vec::with_capacity(name.len() + 2);
    for label in labels(name) {
        if label.len() > MAX_LABEL_LEN {
            return Err(ParseError::InvalidLabel);
        }
        out.push(label.len() as u8);
        if canonical {
            out.extend(label.bytes().map(|b| b.to_ascii_lowercase()));
        } else {
            out.extend_from_slice(label.as_bytes());
        }
    }
    out.push(0);
    if out.len() > MAX_NAME_LEN {
        return Err(ParseError::NameTooLong);
    }
    Ok(out)
}

/// Read an uncompressed wire name from the start of `data`.
///
/// Returns the dotted name and the number of bytes consumed. Used for names
/// inside RDATA (RRSIG signer, NSEC next name), which are never compressed.
pub fn from_wire(data: &[u8]) -> Result<(String, usize), ParseError> {
    let mut labels = Vec::new();
    let mut pos = 0;
    loop {
        let len = *data.get(pos).ok_or(ParseError::InvalidLabel)? as usize;
        pos += 1;
        if len == 0 {
            break;
        }
        if len > MAX_LABEL_LEN {
            return Err(ParseError::InvalidLabel);
        }
        let label = data.get(pos..pos + len).ok_or(ParseError::InvalidLabel)?;
        labels.push(String::from_utf8_lossy(label).into_owned());
        pos += len;
        if pos > MAX_NAME_LEN {
            return Err(ParseError::NameTooLong);
        }
    }
    Ok((from_labels(&labels), pos))
}

/// Canonical DNS name order (RFC 4034 §6.1): compare label by label from the
/// right, each label as lower-cased bytes, absent labels sorting first.
pub fn canonical_cmp(a: &str, b: &str) -> Ordering {
    let a = labels(a);
    let b = labels(b);
    for (x, y) in a.iter().rev().zip(b.iter().rev()) {
        let ord = x
            .bytes()
            .map(|c| c.to_ascii_lowercase())
            .cmp(y.bytes().map(|c| c.to_ascii_lowercase()));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}
