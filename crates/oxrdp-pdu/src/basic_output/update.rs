use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;
use oxrdp_core::{
    ensure_size, invalid_field_err, Decode, DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor,
};

/// TS_UPDATE_HDR carried by a slow-path Update PDU.
///
/// `data` keeps the complete update structure, updateType field included, so
/// that update-specific decoders ([`crate::bitmap::BitmapUpdateData`] in
/// particular) see the same layout on the slow path as on the fast path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlowPathUpdate {
    pub update_type: SlowPathUpdateType,
    pub data: Vec<u8>,
}

impl SlowPathUpdate {
    const NAME: &'static str = "SlowPathUpdate";

    const FIXED_PART_SIZE: usize = 2 /* updateType */;
}

impl Encode for SlowPathUpdate {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_slice(&self.data);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        self.data.len()
    }
}

impl<'de> Decode<'de> for SlowPathUpdate {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_size!(in: src, size: Self::FIXED_PART_SIZE);

        let update_type = SlowPathUpdateType::from_u16(src.peek_u16())
            .ok_or_else(|| invalid_field_err!("updateType", "invalid slow-path update type"))?;

        let data = src.read_remaining().to_vec();

        Ok(Self { update_type, data })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
#[repr(u16)]
pub enum SlowPathUpdateType {
    Orders = 0x0000,
    Bitmap = 0x0001,
    Palette = 0x0002,
    Synchronize = 0x0003,
}
