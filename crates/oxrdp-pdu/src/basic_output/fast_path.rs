use bitflags::bitflags;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive as _;
use oxrdp_core::{
    ensure_size, invalid_field_err, invalid_field_err_with_source, Decode, DecodeError, DecodeResult, ReadCursor,
};

use crate::per;

/// Fast-path output header (TS_FP_UPDATE_PDU header).
///
/// The two high bits of the first byte are the security flags; the PER-style
/// length covers the whole frame including this header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastPathHeader {
    pub flags: EncryptionFlags,
    pub data_length: usize,
}

impl FastPathHeader {
    const NAME: &'static str = "FastPathHeader";
}

impl<'de> Decode<'de> for FastPathHeader {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_size!(in: src, size: 2);

        let header = src.read_u8();
        let flags = EncryptionFlags::from_bits_truncate((header >> 6) & 0x03);

        let (length, sizeof_length) = per::read_length(src)
            .map_err(|e| invalid_field_err_with_source::<DecodeError, _>(Self::NAME, "length", "PER", e))?;

        let header_size = sizeof_length + 1;
        let data_length = usize::from(length)
            .checked_sub(header_size)
            .ok_or_else(|| invalid_field_err!("length", "fast-path length smaller than its header"))?;

        Ok(Self { flags, data_length })
    }
}

/// TS_FP_UPDATE: the per-update header inside a fast-path frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastPathUpdatePdu<'a> {
    pub fragmentation: Fragmentation,
    pub update_code: UpdateCode,
    pub compression_flags: Option<u8>,
    pub data: &'a [u8],
}

impl FastPathUpdatePdu<'_> {
    const NAME: &'static str = "FastPathUpdatePdu";
}

impl<'de> Decode<'de> for FastPathUpdatePdu<'de> {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_size!(in: src, size: 1);

        let header = src.read_u8();

        let update_code = header & 0x0F;
        let update_code =
            UpdateCode::from_u8(update_code).ok_or_else(|| invalid_field_err!("updateCode", "invalid update code"))?;

        let fragmentation = (header >> 4) & 0x03;
        let fragmentation = Fragmentation::from_u8(fragmentation)
            .ok_or_else(|| invalid_field_err!("fragmentation", "invalid fragmentation"))?;

        let compression_used = (header >> 6) & 0x03 != 0;
        let compression_flags = if compression_used {
            ensure_size!(ctx: Self::NAME, in: src, size: 1);
            Some(src.read_u8())
        } else {
            None
        };

        ensure_size!(ctx: Self::NAME, in: src, size: 2);
        let data_length = usize::from(src.read_u16());

        ensure_size!(ctx: Self::NAME, in: src, size: data_length);
        let data = src.read_slice(data_length);

        Ok(Self {
            fragmentation,
            update_code,
            compression_flags,
            data,
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum UpdateCode {
    Orders = 0x0,
    Bitmap = 0x1,
    Palette = 0x2,
    Synchronize = 0x3,
    SurfaceCommands = 0x4,
    HiddenPointer = 0x5,
    DefaultPointer = 0x6,
    PositionPointer = 0x8,
    ColorPointer = 0x9,
    CachedPointer = 0xA,
    NewPointer = 0xB,
    LargePointer = 0xC,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum Fragmentation {
    Single = 0x0,
    Last = 0x1,
    First = 0x2,
    Next = 0x3,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct EncryptionFlags: u8 {
        const SECURE_CHECKSUM = 0x1;
        const ENCRYPTED = 0x2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdp_core::decode;

    #[test]
    fn header_with_short_length() {
        // action 0, no security flags, 7-bit length 0x10
        let bytes = [0x00, 0x10];
        let header: FastPathHeader = decode(&bytes).unwrap();
        assert_eq!(header.flags, EncryptionFlags::empty());
        assert_eq!(header.data_length, 0x10 - 2);
    }

    #[test]
    fn header_with_long_length_and_encryption() {
        // security flags ENCRYPTED (bit 7 of the header byte), 15-bit length
        let bytes = [0x80, 0x81, 0x00];
        let header: FastPathHeader = decode(&bytes).unwrap();
        assert_eq!(header.flags, EncryptionFlags::ENCRYPTED);
        assert_eq!(header.data_length, 0x100 - 3);
    }

    #[test]
    fn update_pdu_single_bitmap() {
        let bytes = [0x01, 0x04, 0x00, 0xAA, 0xBB, 0xCC, 0xDD];
        let pdu: FastPathUpdatePdu<'_> = decode(&bytes).unwrap();
        assert_eq!(pdu.update_code, UpdateCode::Bitmap);
        assert_eq!(pdu.fragmentation, Fragmentation::Single);
        assert_eq!(pdu.data, [0xAA, 0xBB, 0xCC, 0xDD]);
    }
}
