pub mod common;
pub mod edns;
pub mod enums;
pub mod header;
pub mod name;
pub mod question;
pub mod rdata;
pub mod resource;

use bitstream_io::{BigEndian, BitReader, BitWrite, BitWriter};
use common::PacketComponent;
use edns::EdnsOpt;
use enums::{DNSResourceClass, DNSResourceType, ResponseCode};
use header::DNSHeader;
use question::DNSQuestion;
use resource::DNSResource;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSPacket {
    pub header: DNSHeader,
    pub questions: Vec<DNSQuestion>,
    pub answers: Vec<DNSResource>,
    pub authorities: Vec<DNSResource>,
    pub resources: Vec<DNSResource>,
    /// EDNS0 OPT record if present (extracted from additional records)
    pub edns: Option<EdnsOpt>,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid DNS header")]
    InvalidHeader,
    #[error("Invalid DNS label")]
    InvalidLabel,
    #[error("DNS name too long")]
    NameTooLong,
    #[error("Invalid question section")]
    InvalidQuestionSection,
    #[error("Invalid answer section")]
    InvalidAnswerSection,
    #[error("Invalid additional section")]
    InvalidAdditionalSection,
    #[error("Invalid record data: {0}")]
    InvalidRdata(String),
    #[error("Invalid bit stream: {0}")]
    InvalidBitStream(String),
}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        ParseError::InvalidBitStream(e.to_string())
    }
}

impl DNSPacket {
    /// Build a recursive query for `qname`/`qtype`.
    ///
    /// DNSSEC queries carry an EDNS0 OPT record with the DO bit so the
    /// upstream returns RRSIG and NSEC/NSEC3 records, and set CD so bogus data
    /// reaches the local validator instead of being replaced by SERVFAIL.
    pub fn query(
        id: u16,
        qname: &str,
        qtype: DNSResourceType,
        payload_size: u16,
        dnssec_ok: bool,
    ) -> Self {
        let mut edns = EdnsOpt::with_payload_size(payload_size);
        edns.set_do_flag(dnssec_ok);
        DNSPacket {
            header: DNSHeader {
                id,
                rd: true,
                cd: dnssec_ok,
                qdcount: 1,
                ..DNSHeader::default()
            },
            questions: vec![DNSQuestion::new(qname, qtype)],
            edns: Some(edns),
            ..DNSPacket::default()
        }
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        trace!("Parsing DNS packet, size: {} bytes", buf.len());
        let mut reader = BitReader::<_, BigEndian>::new(buf);
        let mut packet = DNSPacket::default();
        packet
            .header
            .read(&mut reader, buf)
            .map_err(|_| ParseError::InvalidHeader)?;
        debug!(
            "Parsed DNS header: id={}, rcode={}, questions={}, answers={}, authorities={}",
            packet.header.id,
            packet.header.rcode,
            packet.header.qdcount,
            packet.header.ancount,
            packet.header.nscount
        );

        for _ in 0..packet.header.qdcount {
            let mut question = DNSQuestion::default();
            question.read(&mut reader, buf)?;
            packet.questions.push(question);
        }

        for _ in 0..packet.header.ancount {
            let mut answer = DNSResource::default();
            answer.read(&mut reader, buf)?;
            packet.answers.push(answer);
        }

        for _ in 0..packet.header.nscount {
            let mut authority = DNSResource::default();
            authority.read(&mut reader, buf)?;
            packet.authorities.push(authority);
        }

        for _ in 0..packet.header.arcount {
            let mut resource = DNSResource::default();
            resource.read(&mut reader, buf)?;

            if resource.rtype == DNSResourceType::OPT && resource.labels.is_empty() {
                // OPT keeps the UDP payload size in the class field
                let udp_payload_size = u16::from(resource.rclass);
                match EdnsOpt::parse_from_resource(udp_payload_size, resource.ttl, &resource.rdata)
                {
                    Ok(edns_opt) => {
                        packet.edns = Some(edns_opt);
                        continue;
                    }
                    Err(e) => debug!("Failed to parse EDNS OPT record: {}", e),
                }
            }

            packet.resources.push(resource);
        }

        Ok(packet)
    }

    pub fn serialize(&self) -> Result<Vec<u8>, ParseError> {
        let mut buf = Vec::new();
        let mut writer: BitWriter<&mut Vec<u8>, BigEndian> = BitWriter::new(&mut buf);

        let mut header = self.header.clone();
        header.qdcount = self.questions.len() as u16;
        header.ancount = self.answers.len() as u16;
        header.nscount = self.authorities.len() as u16;
        header.arcount = self.resources.len() as u16 + u16::from(self.edns.is_some());
        header.write(&mut writer)?;

        for question in &self.questions {
            question.write(&mut writer)?;
        }
        for record in self
            .answers
            .iter()
            .chain(self.authorities.iter())
            .chain(self.resources.iter())
        {
            record.write(&mut writer)?;
        }

        if let Some(edns) = &self.edns {
            let (udp_payload_size, ttl, rdata) = edns.to_resource_format();
            let opt = DNSResource {
                labels: Vec::new(),
                rtype: DNSResourceType::OPT,
                rclass: DNSResourceClass::from(udp_payload_size),
                ttl,
                rdata,
            };
            opt.write(&mut writer)?;
        }

        writer.byte_align()?;
        Ok(buf)
    }

    pub fn response_code(&self) -> ResponseCode {
        ResponseCode::from_u8(self.header.rcode)
    }

    /// Records of `rtype` from one section, any owner
    pub fn records_of<'a>(
        section: &'a [DNSResource],
        rtype: DNSResourceType,
    ) -> impl Iterator<Item = &'a DNSResource> + 'a {
        section.iter().filter(move |rr| rr.rtype == rtype)
    }

    /// Check the response answers the question that was asked
    pub fn answers_question(&self, qname: &str, qtype: DNSResourceType) -> bool {
        match self.questions.as_slice() {
            [q] => q.qtype == qtype && name::eq(&q.name(), qname),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_round_trip() {
        let query = DNSPacket::query(0xbeef, "pay.example.com", DNSResourceType::TXT, 1232, true);
        let bytes = query.serialize().unwrap();
        let parsed = DNSPacket::parse(&bytes).unwrap();

        assert_eq!(parsed.header.id, 0xbeef);
        assert!(parsed.header.rd);
        assert!(parsed.header.cd);
        assert!(parsed.answers_question("PAY.example.com.", DNSResourceType::TXT));
        let edns = parsed.edns.expect("OPT record");
        assert!(edns.do_flag());
        assert_eq!(edns.udp_payload_size, 1232);
        assert!(parsed.resources.is_empty());
    }

    #[test]
    fn test_compressed_owner_names() {
        // Header, question for a.example, one TXT answer whose owner is a
        // pointer back to the question name at offset 12
        let mut msg = vec![
            0x12, 0x34, 0x81, 0x80, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
        ];
        msg.extend_from_slice(b"\x01a\x07example\x00");
        msg.extend_from_slice(&[0x00, 0x10, 0x00, 0x01]);
        msg.extend_from_slice(&[0xC0, 0x0C]);
        msg.extend_from_slice(&[0x00, 0x10, 0x00, 0x01, 0x00, 0x00, 0x0e, 0x10, 0x00, 0x04]);
        msg.extend_from_slice(b"\x03abc");

        let packet = DNSPacket::parse(&msg).unwrap();
        assert_eq!(packet.answers.len(), 1);
        assert_eq!(packet.answers[0].name(), "a.example");
        assert_eq!(packet.answers[0].rdata, b"\x03abc");
        assert_eq!(packet.response_code(), ResponseCode::NoError);
    }

    #[test]
    fn test_pointer_loop_rejected() {
        let mut msg = vec![
            0x12, 0x34, 0x81, 0x80, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        // Name at offset 12 points to itself
        msg.extend_from_slice(&[0xC0, 0x0C, 0x00, 0x10, 0x00, 0x01]);
        assert!(DNSPacket::parse(&msg).is_err());
    }

    #[test]
    fn test_truncated_packet_rejected() {
        assert!(DNSPacket::parse(&[0x12, 0x34, 0x81]).is_err());
    }
}
