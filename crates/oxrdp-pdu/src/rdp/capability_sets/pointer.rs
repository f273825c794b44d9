use oxrdp_core::{
    ensure_fixed_part_size, ensure_size, Decode, DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor,
};

/// TS_POINTER_CAPABILITYSET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pointer {
    pub color_pointer_cache_size: u16,
    pub pointer_cache_size: u16,
}

impl Pointer {
    const NAME: &'static str = "Pointer";

    const FIXED_PART_SIZE: usize = 2 /* colorPointerFlag */ + 2 /* colorCacheSize */ + 2 /* cacheSize */;
}

impl Encode for Pointer {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u16(1); // colorPointerFlag, always supported
        dst.write_u16(self.color_pointer_cache_size);
        dst.write_u16(self.pointer_cache_size);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for Pointer {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_size!(in: src, size: 4);

        let _color_pointer_flag = src.read_u16();
        let color_pointer_cache_size = src.read_u16();

        // The pointerCacheSize field is optional.
        let pointer_cache_size = if src.len() >= 2 { src.read_u16() } else { 0 };

        Ok(Self {
            color_pointer_cache_size,
            pointer_cache_size,
        })
    }
}
