use bitflags::bitflags;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive as _, ToPrimitive as _};
use oxrdp_core::{
    ensure_fixed_part_size, invalid_field_err, read_padding, unsupported_version_err, write_padding, Decode,
    DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor,
};

pub const PROTOCOL_VER: u16 = 0x200;

/// TS_GENERAL_CAPABILITYSET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct General {
    pub major_platform_type: MajorPlatformType,
    pub minor_platform_type: MinorPlatformType,
    pub protocol_version: u16,
    pub extra_flags: GeneralExtraFlags,
    pub refresh_rect_support: bool,
    pub suppress_output_support: bool,
}

impl General {
    const NAME: &'static str = "General";

    const FIXED_PART_SIZE: usize = 2 /* osMajor */ + 2 /* osMinor */ + 2 /* protocolVersion */ + 2 /* pad */
        + 2 /* compressionTypes */ + 2 /* extraFlags */ + 2 /* updateCap */ + 2 /* remoteUnshare */
        + 2 /* compressionLevel */ + 1 /* refreshRect */ + 1 /* suppressOutput */;
}

impl Default for General {
    fn default() -> Self {
        Self {
            major_platform_type: MajorPlatformType::Unspecified,
            minor_platform_type: MinorPlatformType::Unspecified,
            protocol_version: PROTOCOL_VER,
            extra_flags: GeneralExtraFlags::empty(),
            refresh_rect_support: false,
            suppress_output_support: false,
        }
    }
}

impl Encode for General {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u16(self.major_platform_type.to_u16().unwrap());
        dst.write_u16(self.minor_platform_type.to_u16().unwrap());
        dst.write_u16(self.protocol_version);
        write_padding!(dst, 2);
        dst.write_u16(0); // generalCompressionTypes
        dst.write_u16(self.extra_flags.bits());
        dst.write_u16(0); // updateCapabilityFlag
        dst.write_u16(0); // remoteUnshareFlag
        dst.write_u16(0); // generalCompressionLevel
        dst.write_u8(u8::from(self.refresh_rect_support));
        dst.write_u8(u8::from(self.suppress_output_support));

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for General {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let major_platform_type = MajorPlatformType::from_u16(src.read_u16())
            .ok_or_else(|| invalid_field_err!("osMajorType", "invalid major platform type"))?;
        let minor_platform_type = MinorPlatformType::from_u16(src.read_u16())
            .ok_or_else(|| invalid_field_err!("osMinorType", "invalid minor platform type"))?;
        let protocol_version = src.read_u16();

        if protocol_version != PROTOCOL_VER {
            return Err(unsupported_version_err!("protocolVersion", protocol_version as u8));
        }

        read_padding!(src, 2);

        let compression_types = src.read_u16();
        if compression_types != 0 {
            return Err(invalid_field_err!("compressionTypes", "invalid compression types"));
        }

        let extra_flags = GeneralExtraFlags::from_bits_truncate(src.read_u16());

        let update_cap_flag = src.read_u16();
        if update_cap_flag != 0 {
            return Err(invalid_field_err!("updateCapabilityFlag", "invalid update capability flag"));
        }

        let remote_unshare_flag = src.read_u16();
        if remote_unshare_flag != 0 {
            return Err(invalid_field_err!("remoteUnshareFlag", "invalid remote unshare flag"));
        }

        let compression_level = src.read_u16();
        if compression_level != 0 {
            return Err(invalid_field_err!("compressionLevel", "invalid compression level"));
        }

        let refresh_rect_support = src.read_u8() != 0;
        let suppress_output_support = src.read_u8() != 0;

        Ok(Self {
            major_platform_type,
            minor_platform_type,
            protocol_version,
            extra_flags,
            refresh_rect_support,
            suppress_output_support,
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u16)]
pub enum MajorPlatformType {
    Unspecified = 0,
    Windows = 1,
    Os2 = 2,
    Macintosh = 3,
    Unix = 4,
    Ios = 5,
    OsX = 6,
    Android = 7,
    ChromeOs = 8,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u16)]
pub enum MinorPlatformType {
    Unspecified = 0,
    Windows31x = 1,
    Windows95 = 2,
    WindowsNt = 3,
    Os2V21 = 4,
    PowerPc = 5,
    Macintosh = 6,
    NativeXServer = 7,
    PseudoXServer = 8,
    WindowsRt = 9,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct GeneralExtraFlags: u16 {
        const FASTPATH_OUTPUT_SUPPORTED = 0x0001;
        const NO_BITMAP_COMPRESSION_HDR = 0x0400;
        const LONG_CREDENTIALS_SUPPORTED = 0x0004;
        const AUTORECONNECT_SUPPORTED = 0x0008;
        const ENC_SALTED_CHECKSUM = 0x0010;
    }
}
