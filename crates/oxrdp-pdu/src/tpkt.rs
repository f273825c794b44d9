use oxrdp_core::{
    ensure_fixed_part_size, read_padding, unsupported_version_err, write_padding, DecodeResult, EncodeResult,
    ReadCursor, WriteCursor,
};

/// TPKT header (RFC 1006 framing, 4 bytes).
///
/// ```text
/// +-----------+----------+--------------+--------------+
/// | version=3 | reserved | length (MSB) | length (LSB) |
/// +-----------+----------+--------------+--------------+
/// ```
///
/// The length covers the whole packet, header included.
#[derive(PartialEq, Eq, Debug)]
pub struct TpktHeader {
    pub packet_length: u16,
}

impl TpktHeader {
    pub const VERSION: u8 = 3;

    pub const SIZE: usize = 4;

    pub const NAME: &'static str = "TpktHeader";

    const FIXED_PART_SIZE: usize = Self::SIZE;

    pub fn read(src: &mut ReadCursor<'_>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let version = src.read_u8();

        if version != Self::VERSION {
            return Err(unsupported_version_err!("TPKT version", version));
        }

        read_padding!(src, 1);

        let packet_length = src.read_u16_be();

        Ok(Self { packet_length })
    }

    pub fn write(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u8(Self::VERSION);

        write_padding!(dst, 1);

        dst.write_u16_be(self.packet_length);

        Ok(())
    }

    pub fn packet_length(&self) -> usize {
        usize::from(self.packet_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_is_byte_exact() {
        let payload = [0x01, 0x02];

        let mut buf = [0u8; 6];
        let mut cursor = WriteCursor::new(&mut buf);
        TpktHeader {
            packet_length: (TpktHeader::SIZE + payload.len()) as u16,
        }
        .write(&mut cursor)
        .unwrap();
        cursor.write_slice(&payload);

        assert_eq!(buf, [0x03, 0x00, 0x00, 0x06, 0x01, 0x02]);
    }

    #[test]
    fn rejects_bad_version() {
        let bytes = [0x04, 0x00, 0x00, 0x06];
        assert!(TpktHeader::read(&mut ReadCursor::new(&bytes)).is_err());
    }
}
