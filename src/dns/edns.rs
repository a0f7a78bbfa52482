use super::ParseError;

/// DNSSEC OK flag in the EDNS flags word (RFC 3225)
pub const DO_FLAG: u16 = 0x8000;

/// EDNS0 OPT pseudo-record
/// RFC 6891: https://tools.ietf.org/html/rfc6891
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdnsOpt {
    /// UDP payload size that can be handled by the requestor
    pub udp_payload_size: u16,
    /// Extended RCODE (high 8 bits)
    pub extended_rcode: u8,
    /// EDNS version (currently 0)
    pub version: u8,
    /// EDNS flags (16 bits)
    pub flags: u16,
    /// Variable length RDATA containing EDNS options
    pub options: Vec<EdnsOption>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdnsOption {
    pub code: u16,
    pub data: Vec<u8>,
}

impl EdnsOpt {
    /// Create an EDNS OPT record with specified UDP payload size
    pub fn with_payload_size(payload_size: u16) -> Self {
        Self {
            udp_payload_size: payload_size,
            ..Self::default()
        }
    }

    /// Check if DNSSEC OK (DO) flag is set
    pub fn do_flag(&self) -> bool {
        (self.flags & DO_FLAG) != 0
    }

    pub fn set_do_flag(&mut self, value: bool) {
        if value {
            self.flags |= DO_FLAG;
        } else {
            self.flags &= !DO_FLAG;
        }
    }

    /// Parse from the class, TTL and RDATA fields of an OPT record
    pub fn parse_from_resource(
        udp_payload_size: u16,
        ttl: u32,
        rdata: &[u8],
    ) -> Result<Self, ParseError> {
        let extended_rcode = (ttl >> 24) as u8;
        let version = (ttl >> 16) as u8;
        let flags = ttl as u16;

        let mut options = Vec::new();
        let mut pos = 0;
        while pos < rdata.len() {
            let header = rdata
                .get(pos..pos + 4)
                .ok_or(ParseError::InvalidAdditionalSection)?;
            let code = u16::from_be_bytes([header[0], header[1]]);
            let length = u16::from_be_bytes([header[2], header[3]]) as usize;
            pos += 4;
            let data = rdata
                .get(pos..pos + length)
                .ok_or(ParseError::InvalidAdditionalSection)?;
            options.push(EdnsOption {
                code,
                data: data.to_vec(),
            });
            pos += length;
        }

        Ok(Self {
            udp_payload_size,
            extended_rcode,
            version,
            flags,
            options,
        })
    }

    /// The (class, TTL, RDATA) triple of the OPT record
    pub fn to_resource_format(&self) -> (u16, u32, Vec<u8>) {
        let ttl = (u32::from(self.extended_rcode) << 24)
            | (u32::from(self.version) << 16)
            | u32::from(self.flags);

        let mut rdata = Vec::new();
        for option in &self.options {
            rdata.extend_from_slice(&option.code.to_be_bytes());
            rdata.extend_from_slice(&(option.data.len() as u16).to_be_bytes());
            rdata.extend_from_slice(&option.data);
        }

        (self.udp_payload_size, ttl, rdata)
    }
}
