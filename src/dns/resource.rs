use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, Endianness};

use super::{
    ParseError,
    common::PacketComponent,
    enums::{DNSResourceClass, DNSResourceType},
    name,
};

/// A resource record with its RDATA kept as raw bytes.
///
/// The record types this crate interprets (TXT, DNSKEY, DS, RRSIG, NSEC,
/// NSEC3) never compress names inside RDATA, so the raw bytes are also the
/// canonical form used for signature checks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSResource {
    pub labels: Vec<String>,
    pub rtype: DNSResourceType,
    pub rclass: DNSResourceClass,
    pub ttl: u32,
    pub rdata: Vec<u8>,
}

impl DNSResource {
    pub fn new(owner: &str, rtype: DNSResourceType, ttl: u32, rdata: Vec<u8>) -> Self {
        Self {
            labels: name::labels(owner).into_iter().map(String::from).collect(),
            rtype,
            rclass: DNSResourceClass::IN,
            ttl,
            rdata,
        }
    }

    pub fn name(&self) -> String {
        name::from_labels(&self.labels)
    }

    pub fn is_owned_by(&self, owner: &str) -> bool {
        name::eq(&self.name(), owner)
    }
}

impl PacketComponent for DNSResource {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError> {
        let rdlength =
            u16::try_from(self.rdata.len()).map_err(|_| ParseError::InvalidAnswerSection)?;
        self.write_labels(writer, &self.labels)?;
        writer.write_var::<u16>(16, self.rtype.into())?;
        writer.write_var::<u16>(16, self.rclass.into())?;
        writer.write_var::<u32>(32, self.ttl)?;
        writer.write_var::<u16>(16, rdlength)?;
        writer.write_bytes(&self.rdata)?;
        Ok(())
    }

    fn read<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        packet: &[u8],
    ) -> Result<(), ParseError> {
        self.labels = self.read_labels(reader, packet)?;
        self.rtype = reader.read_var::<u16>(16)?.into();
        self.rclass = reader.read_var::<u16>(16)?.into();
        self.ttl = reader.read_var::<u32>(32)?;
        let rdlength = reader.read_var::<u16>(16)?;
        let mut buf = vec![0_u8; rdlength as usize];
        reader.read_bytes(&mut buf)?;
        self.rdata = buf;

        Ok(())
    }
}
