/// Calculate the key tag for a DNSKEY record (RFC 4034 Appendix B)
pub fn calculate_key_tag(flags: u16, protocol: u8, algorithm: u8, public_key: &[u8]) -> u16 {
    // RSAMD5 uses the low 16 bits of the modulus
    if algorithm == 1 {
        return match public_key {
            [.., hi, lo] => u16::from_be_bytes([*hi, *lo]),
            _ => 0,
        };
    }

    let header = flags.to_be_bytes();
    let mut accumulator: u32 = u32::from(header[0]) << 8 | u32::from(header[1]);
    accumulator += u32::from(protocol) << 8 | u32::from(algorithm);

    for pair in public_key.chunks(2) {
        accumulator += match pair {
            [hi, lo] => u32::from(*hi) << 8 | u32::from(*lo),
            [hi] => u32::from(*hi) << 8,
            _ => 0,
        };
    }

    accumulator += accumulator >> 16;
    (accumulator & 0xFFFF) as u16
}
