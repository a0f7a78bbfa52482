//! RDATA of the DNSSEC record types (RFC 4034, RFC 5155)

use super::{DnsSecError, calculate_key_tag, errors::Result};
use crate::dns::enums::DNSResourceType;
use crate::dns::name;
use crate::dns::resource::DNSResource;

/// DNSKEY flag: zone key
pub const ZONE_KEY_FLAG: u16 = 0x0100;
/// DNSKEY flag: revoked (RFC 5011)
pub const REVOKE_FLAG: u16 = 0x0080;
/// DNSKEY flag: secure entry point
pub const SEP_FLAG: u16 = 0x0001;
/// NSEC3 flag: opt-out
pub const OPT_OUT_FLAG: u8 = 0x01;

fn be_u16(data: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes([*data.get(at)?, *data.get(at + 1)?]))
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    let b = data.get(at..at + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rrsig {
    pub type_covered: DNSResourceType,
    pub algorithm: u8,
    pub labels: u8,
    pub original_ttl: u32,
    pub expiration: u32,
    pub inception: u32,
    pub key_tag: u16,
    pub signer: String,
    pub signature: Vec<u8>,
}

impl Rrsig {
    pub fn parse(rdata: &[u8]) -> Result<Self> {
        let malformed = || DnsSecError::MalformedRecord("RRSIG");
        if rdata.len() < 18 {
            return Err(malformed());
        }
        let (signer, used) = name::from_wire(&rdata[18..]).map_err(|_| malformed())?;
        let signature = rdata[18 + used..].to_vec();
        if signature.is_empty() {
            return Err(DnsSecError::InvalidSignature);
        }

        Ok(Self {
            type_covered: be_u16(rdata, 0).ok_or_else(malformed)?.into(),
            algorithm: rdata[2],
            labels: rdata[3],
            original_ttl: be_u32(rdata, 4).ok_or_else(malformed)?,
            expiration: be_u32(rdata, 8).ok_or_else(malformed)?,
            inception: be_u32(rdata, 12).ok_or_else(malformed)?,
            key_tag: be_u16(rdata, 16).ok_or_else(malformed)?,
            signer,
            signature,
        })
    }

    /// RDATA without the signature, signer name in canonical form
    fn unsigned_rdata(&self) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(64);
        data.extend_from_slice(&u16::from(self.type_covered).to_be_bytes());
        data.push(self.algorithm);
        data.push(self.labels);
        data.extend_from_slice(&self.original_ttl.to_be_bytes());
        data.extend_from_slice(&self.expiration.to_be_bytes());
        data.extend_from_slice(&self.inception.to_be_bytes());
        data.extend_from_slice(&self.key_tag.to_be_bytes());
        let signer = name::to_wire(&self.signer, true)
            .map_err(|_| DnsSecError::MalformedRecord("RRSIG"))?;
        data.extend_from_slice(&signer);
        Ok(data)
    }

    pub fn to_rdata(&self) -> Result<Vec<u8>> {
        let mut data = self.unsigned_rdata()?;
        data.extend_from_slice(&self.signature);
        Ok(data)
    }

    /// The owner name the signature was computed over: the owner itself, or
    /// the wildcard it was expanded from when the RRSIG label count is lower
    pub fn signed_owner(&self, owner: &str) -> Result<String> {
        let owner_labels = name::label_count(owner);
        let sig_labels = usize::from(self.labels);
        if sig_labels > owner_labels {
            return Err(DnsSecError::MalformedRecord("RRSIG"));
        }
        if sig_labels == owner_labels {
            Ok(owner.to_string())
        } else {
            Ok(format!("*.{}", name::suffix(owner, sig_labels).trim_end_matches('.')))
        }
    }

    /// Data covered by the signature (RFC 4034 §3.1.8.1, §6.2, §6.3)
    pub fn signed_data(&self, owner: &str, records: &[&DNSResource]) -> Result<Vec<u8>> {
        let mut data = self.unsigned_rdata()?;

        let signed_owner = self.signed_owner(owner)?;
        let owner_wire = name::to_wire(&signed_owner, true)
            .map_err(|_| DnsSecError::MalformedRecord("RRSIG"))?;

        let mut rdatas: Vec<&[u8]> = records.iter().map(|rr| rr.rdata.as_slice()).collect();
        rdatas.sort_unstable();
        rdatas.dedup();

        for rdata in rdatas {
            let rdlength =
                u16::try_from(rdata.len()).map_err(|_| DnsSecError::MalformedRecord("RRset"))?;
            data.extend_from_slice(&owner_wire);
            data.extend_from_slice(&u16::from(self.type_covered).to_be_bytes());
            data.extend_from_slice(&1u16.to_be_bytes());
            data.extend_from_slice(&self.original_ttl.to_be_bytes());
            data.extend_from_slice(&rdlength.to_be_bytes());
            data.extend_from_slice(rdata);
        }

        Ok(data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsKey {
    pub flags: u16,
    pub protocol: u8,
    pub algorithm: u8,
    pub public_key: Vec<u8>,
}

impl DnsKey {
    pub fn parse(rdata: &[u8]) -> Result<Self> {
        if rdata.len() < 5 {
            return Err(DnsSecError::InvalidPublicKey);
        }
        Ok(Self {
            flags: u16::from_be_bytes([rdata[0], rdata[1]]),
            protocol: rdata[2],
            algorithm: rdata[3],
            public_key: rdata[4..].to_vec(),
        })
    }

    pub fn to_rdata(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(4 + self.public_key.len());
        data.extend_from_slice(&self.flags.to_be_bytes());
        data.push(self.protocol);
        data.push(self.algorithm);
        data.extend_from_slice(&self.public_key);
        data
    }

    pub fn key_tag(&self) -> u16 {
        calculate_key_tag(self.flags, self.protocol, self.algorithm, &self.public_key)
    }

    /// Usable for verifying zone data: protocol 3, zone flag set, not revoked
    pub fn is_usable_zone_key(&self) -> bool {
        self.protocol == 3 && self.flags & ZONE_KEY_FLAG != 0 && self.flags & REVOKE_FLAG == 0
    }

    pub fn is_sep(&self) -> bool {
        self.flags & SEP_FLAG != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ds {
    pub key_tag: u16,
    pub algorithm: u8,
    pub digest_type: u8,
    pub digest: Vec<u8>,
}

impl Ds {
    pub fn parse(rdata: &[u8]) -> Result<Self> {
        if rdata.len() < 5 {
            return Err(DnsSecError::MalformedRecord("DS"));
        }
        Ok(Self {
            key_tag: u16::from_be_bytes([rdata[0], rdata[1]]),
            algorithm: rdata[2],
            digest_type: rdata[3],
            digest: rdata[4..].to_vec(),
        })
    }

    pub fn to_rdata(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(4 + self.digest.len());
        data.extend_from_slice(&self.key_tag.to_be_bytes());
        data.push(self.algorithm);
        data.push(self.digest_type);
        data.extend_from_slice(&self.digest);
        data
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nsec {
    pub next: String,
    pub types: Vec<DNSResourceType>,
}

impl Nsec {
    pub fn parse(rdata: &[u8]) -> Result<Self> {
        let (next, used) =
            name::from_wire(rdata).map_err(|_| DnsSecError::MalformedRecord("NSEC"))?;
        Ok(Self {
            next,
            types: decode_type_bitmap(&rdata[used..])?,
        })
    }

    pub fn to_rdata(&self) -> Result<Vec<u8>> {
        let mut data =
            name::to_wire(&self.next, false).map_err(|_| DnsSecError::MalformedRecord("NSEC"))?;
        data.extend_from_slice(&encode_type_bitmap(&self.types));
        Ok(data)
    }

    pub fn has_type(&self, rtype: DNSResourceType) -> bool {
        self.types.contains(&rtype)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nsec3 {
    pub hash_algorithm: u8,
    pub flags: u8,
    pub iterations: u16,
    pub salt: Vec<u8>,
    pub next_hashed: Vec<u8>,
    pub types: Vec<DNSResourceType>,
}

impl Nsec3 {
    pub fn parse(rdata: &[u8]) -> Result<Self> {
        let malformed = || DnsSecError::MalformedRecord("NSEC3");
        let salt_len = usize::from(*rdata.get(4).ok_or_else(malformed)?);
        let salt = rdata.get(5..5 + salt_len).ok_or_else(malformed)?.to_vec();
        let hash_len = usize::from(*rdata.get(5 + salt_len).ok_or_else(malformed)?);
        let hash_start = 6 + salt_len;
        let next_hashed = rdata
            .get(hash_start..hash_start + hash_len)
            .ok_or_else(malformed)?
            .to_vec();

        Ok(Self {
            hash_algorithm: rdata[0],
            flags: rdata[1],
            iterations: be_u16(rdata, 2).ok_or_else(malformed)?,
            salt,
            next_hashed,
            types: decode_type_bitmap(&rdata[hash_start + hash_len..])?,
        })
    }

    pub fn to_rdata(&self) -> Vec<u8> {
        let mut data = vec![self.hash_algorithm, self.flags];
        data.extend_from_slice(&self.iterations.to_be_bytes());
        data.push(self.salt.len() as u8);
        data.extend_from_slice(&self.salt);
        data.push(self.next_hashed.len() as u8);
        data.extend_from_slice(&self.next_hashed);
        data.extend_from_slice(&encode_type_bitmap(&self.types));
        data
    }

    pub fn opt_out(&self) -> bool {
        self.flags & OPT_OUT_FLAG != 0
    }

    pub fn has_type(&self, rtype: DNSResourceType) -> bool {
        self.types.contains(&rtype)
    }
}

/// Decode an NSEC/NSEC3 type bitmap (RFC 4034 §4.1.2)
pub fn decode_type_bitmap(mut data: &[u8]) -> Result<Vec<DNSResourceType>> {
    let mut types = Vec::new();
    while !data.is_empty() {
        if data.len() < 2 {
            return Err(DnsSecError::MalformedRecord("type bitmap"));
        }
        let window = u16::from(data[0]);
        let len = usize::from(data[1]);
        if len == 0 || len > 32 {
            return Err(DnsSecError::MalformedRecord("type bitmap"));
        }
        let bitmap = data
            .get(2..2 + len)
            .ok_or(DnsSecError::MalformedRecord("type bitmap"))?;
        for (byte_index, byte) in bitmap.iter().enumerate() {
            for bit in 0..8u16 {
                if byte & (0x80 >> bit) != 0 {
                    let code = window * 256 + byte_index as u16 * 8 + bit;
                    types.push(DNSResourceType::from(code));
                }
            }
        }
        data = &data[2 + len..];
    }
    Ok(types)
}

pub fn encode_type_bitmap(types: &[DNSResourceType]) -> Vec<u8> {
    let mut codes: Vec<u16> = types.iter().map(|t| u16::from(*t)).collect();
    codes.sort_unstable();
    codes.dedup();

    let mut out = Vec::new();
    let mut index = 0;
    while index < codes.len() {
        let window = codes[index] >> 8;
        let mut bitmap = [0u8; 32];
        let mut used = 0;
        while index < codes.len() && codes[index] >> 8 == window {
            let low = usize::from(codes[index] & 0xFF);
            bitmap[low / 8] |= 0x80 >> (low % 8);
            used = low / 8 + 1;
            index += 1;
        }
        out.push(window as u8);
        out.push(used as u8);
        out.extend_from_slice(&bitmap[..used]);
    }
    out
}
