//! UTF-16LE string helpers for RDP payloads.

use oxrdp_core::{ReadCursor, WriteCursor};

/// Number of bytes taken by `s` encoded as UTF-16LE, without terminator.
pub fn encoded_len(s: &str) -> usize {
    s.encode_utf16().count() * 2
}

/// Number of bytes taken by `s` encoded as UTF-16LE with a NUL terminator.
pub fn null_terminated_encoded_len(s: &str) -> usize {
    encoded_len(s) + 2
}

pub fn encode(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(s));
    for unit in s.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

pub fn encode_null_terminated(s: &str) -> Vec<u8> {
    let mut out = encode(s);
    out.extend_from_slice(&[0, 0]);
    out
}

pub fn write(dst: &mut WriteCursor<'_>, s: &str) {
    for unit in s.encode_utf16() {
        dst.write_u16(unit);
    }
}

pub fn write_null_terminated(dst: &mut WriteCursor<'_>, s: &str) {
    write(dst, s);
    dst.write_u16(0);
}

/// Reads `n` bytes and decodes them as UTF-16LE, stopping at the first NUL.
pub fn read_string(src: &mut ReadCursor<'_>, n: usize) -> String {
    let bytes = src.read_slice(n);
    decode_string(bytes)
}

pub fn decode_string(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|unit| *unit != 0)
        .collect();

    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode() {
        let encoded = encode_null_terminated("abc");
        assert_eq!(encoded, [0x61, 0, 0x62, 0, 0x63, 0, 0, 0]);
        assert_eq!(decode_string(&encoded), "abc");
    }
}
