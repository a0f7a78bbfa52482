use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, Endianness};

use super::ParseError;
use super::name::{MAX_LABEL_LEN, MAX_NAME_LEN};

/// Compression pointers followed before a name is rejected as a loop
const MAX_POINTER_HOPS: usize = 64;

pub trait PacketComponent {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError>;

    /// Read the component; `packet` is the whole message, needed to follow
    /// compression pointers.
    fn read<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        packet: &[u8],
    ) -> Result<(), ParseError>;

    fn read_labels<E: Endianness>(
        &self,
        reader: &mut BitReader<&[u8], E>,
        packet: &[u8],
    ) -> Result<Vec<String>, ParseError> {
        let mut labels = Vec::new();
        let mut wire_len = 1;
        loop {
            let label_len = reader.read_var::<u8>(8)?;
            if label_len == 0 {
                break;
            }
            if label_len & 0xC0 == 0xC0 {
                let low = reader.read_var::<u8>(8)?;
                let offset = (usize::from(label_len & 0x3F) << 8) | usize::from(low);
                follow_pointer(packet, offset, &mut labels, wire_len)?;
                break;
            }
            if usize::from(label_len) > MAX_LABEL_LEN {
                return Err(ParseError::InvalidLabel);
            }
            let mut buf = vec![0; label_len as usize];
            reader.read_bytes(&mut buf)?;
            wire_len += buf.len() + 1;
            if wire_len > MAX_NAME_LEN {
                return Err(ParseError::NameTooLong);
            }
            labels.push(String::from_utf8(buf).map_err(|_| ParseError::InvalidLabel)?);
        }

        Ok(labels)
    }

    fn write_labels<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
        labels: &[String],
    ) -> Result<(), ParseError> {
        let mut wire_len = 1;
        for label in labels.iter().filter(|l| !l.is_empty()) {
            if label.len() > MAX_LABEL_LEN {
                return Err(ParseError::InvalidLabel);
            }
            wire_len += label.len() + 1;
            if wire_len > MAX_NAME_LEN {
                return Err(ParseError::NameTooLong);
            }
            writer.write_var::<u8>(8, label.len() as u8)?;
            writer.write_bytes(label.as_bytes())?;
        }
        writer.write_var::<u8>(8, 0)?;

        Ok(())
    }
}

/// Continue reading a compressed name from `offset` in the full message
fn follow_pointer(
    packet: &[u8],
    mut offset: usize,
    labels: &mut Vec<String>,
    mut wire_len: usize,
) -> Result<(), ParseError> {
    let mut hops = 0;
    loop {
        let len = *packet.get(offset).ok_or(ParseError::InvalidLabel)?;
        if len == 0 {
            return Ok(());
        }
        if len & 0xC0 == 0xC0 {
            hops += 1;
            if hops > MAX_POINTER_HOPS {
                return Err(ParseError::InvalidLabel);
            }
            let low = *packet.get(offset + 1).ok_or(ParseError::InvalidLabel)?;
            offset = (usize::from(len & 0x3F) << 8) | usize::from(low);
            continue;
        }
        let len = usize::from(len);
        if len > MAX_LABEL_LEN {
            return Err(ParseError::InvalidLabel);
        }
        let label = packet
            .get(offset + 1..offset + 1 + len)
            .ok_or(ParseError::InvalidLabel)?;
        wire_len += len + 1;
        if wire_len > MAX_NAME_LEN {
            return Err(ParseError::NameTooLong);
        }
        labels.push(String::from_utf8(label.to_vec()).map_err(|_| ParseError::InvalidLabel)?);
        offset += len + 1;
    }
}
