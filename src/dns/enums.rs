#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DNSResourceType {
    #[default]
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    MX,
    TXT,
    AAAA,
    SRV,
    OPT,
    DS,
    RRSIG,
    NSEC,
    DNSKEY,
    NSEC3,
    NSEC3PARAM,
    /// Any type code this crate has no name for
    Unknown(u16),
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DNSResourceClass {
    #[default]
    IN,
    CH,
    HS,
    /// Raw class value; OPT records carry the UDP payload size here
    Unknown(u16),
}

impl From<u16> for DNSResourceClass {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceClass::IN,
            3 => DNSResourceClass::CH,
            4 => DNSResourceClass::HS,
            x => DNSResourceClass::Unknown(x),
        }
    }
}

impl From<DNSResourceClass> for u16 {
    fn from(class: DNSResourceClass) -> Self {
        match class {
            DNSResourceClass::IN => 1,
            DNSResourceClass::CH => 3,
            DNSResourceClass::HS => 4,
            DNSResourceClass::Unknown(x) => x,
        }
    }
}

impl From<u16> for DNSResourceType {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceType::A,
            2 => DNSResourceType::NS,
            5 => DNSResourceType::CNAME,
            6 => DNSResourceType::SOA,
            12 => DNSResourceType::PTR,
            15 => DNSResourceType::MX,
            16 => DNSResourceType::TXT,
            28 => DNSResourceType::AAAA,
            33 => DNSResourceType::SRV,
            41 => DNSResourceType::OPT,
            43 => DNSResourceType::DS,
            46 => DNSResourceType::RRSIG,
            47 => DNSResourceType::NSEC,
            48 => DNSResourceType::DNSKEY,
            50 => DNSResourceType::NSEC3,
            51 => DNSResourceType::NSEC3PARAM,
            x => DNSResourceType::Unknown(x),
        }
    }
}

impl From<DNSResourceType> for u16 {
    fn from(rtype: DNSResourceType) -> Self {
        match rtype {
            DNSResourceType::A => 1,
            DNSResourceType::NS => 2,
            DNSResourceType::CNAME => 5,
            DNSResourceType::SOA => 6,
            DNSResourceType::PTR => 12,
            DNSResourceType::MX => 15,
            DNSResourceType::TXT => 16,
            DNSResourceType::AAAA => 28,
            DNSResourceType::SRV => 33,
            DNSResourceType::OPT => 41,
            DNSResourceType::DS => 43,
            DNSResourceType::RRSIG => 46,
            DNSResourceType::NSEC => 47,
            DNSResourceType::DNSKEY => 48,
            DNSResourceType::NSEC3 => 50,
            DNSResourceType::NSEC3PARAM => 51,
            DNSResourceType::Unknown(x) => x,
        }
    }
}

impl std::fmt::Display for DNSResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DNSResourceType::Unknown(x) => write!(f, "TYPE{}", x),
            other => write!(f, "{:?}", other),
        }
    }
}

/// DNS response codes (RFC 1035 §4.1.1)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResponseCode {
    NoError,
    FormatError,
    ServerFailure,
    NameError,
    NotImplemented,
    Refused,
    Other(u8),
}

impl ResponseCode {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::FormatError,
            2 => Self::ServerFailure,
            3 => Self::NameError,
            4 => Self::NotImplemented,
            5 => Self::Refused,
            x => Self::Other(x),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::NoError => 0,
            Self::FormatError => 1,
            Self::ServerFailure => 2,
            Self::NameError => 3,
            Self::NotImplemented => 4,
            Self::Refused => 5,
            Self::Other(x) => x,
        }
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoError => write!(f, "NOERROR"),
            Self::FormatError => write!(f, "FORMERR"),
            Self::ServerFailure => write!(f, "SERVFAIL"),
            Self::NameError => write!(f, "NXDOMAIN"),
            Self::NotImplemented => write!(f, "NOTIMP"),
            Self::Refused => write!(f, "REFUSED"),
            Self::Other(x) => write!(f, "RCODE{}", x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_round_trip_keeps_unknown_codes() {
        assert_eq!(DNSResourceType::from(50), DNSResourceType::NSEC3);
        assert_eq!(u16::from(DNSResourceType::from(65)), 65);
        assert_eq!(DNSResourceType::from(65).to_string(), "TYPE65");
    }

    #[test]
    fn test_opt_class_carries_payload_size() {
        let class = DNSResourceClass::from(1232);
        assert_eq!(class, DNSResourceClass::Unknown(1232));
        assert_eq!(u16::from(class), 1232);
    }
}
