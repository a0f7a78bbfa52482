//! TXT RDATA: a sequence of length-prefixed character-strings (RFC 1035 §3.3.14)

use super::ParseError;

pub fn txt_strings(rdata: &[u8]) -> Result<Vec<&[u8]>, ParseError> {
    let mut strings = Vec::new();
    let mut pos = 0;
    while pos < rdata.len() {
        let len = rdata[pos] as usize;
        pos += 1;
        let chunk = rdata
            .get(pos..pos + len)
            .ok_or_else(|| ParseError::InvalidRdata("TXT string overruns RDATA".to_string()))?;
        strings.push(chunk);
        pos += len;
    }
    Ok(strings)
}

/// Encode text as TXT RDATA, splitting into 255-byte character-strings
pub fn encode_txt(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() + bytes.len() / 255 + 1);
    if bytes.is_empty() {
        out.push(0);
        return out;
    }
    for chunk in bytes.chunks(255) {
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
    out
}
