use bitflags::bitflags;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive as _, ToPrimitive as _};
use oxrdp_core::{
    ensure_fixed_part_size, ensure_size, invalid_field_err, write_padding, Decode, DecodeResult, Encode, EncodeResult,
    ReadCursor, WriteCursor,
};

use crate::nego::SecurityProtocol;
use crate::utf16;

const CLIENT_NAME_SIZE: usize = 32;
const IME_FILE_NAME_SIZE: usize = 64;
const DIG_PRODUCT_ID_SIZE: usize = 64;

/// RDP version advertised in the core data blocks.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RdpVersion(pub u32);

impl RdpVersion {
    pub const V4: Self = Self(0x0008_0001);
    pub const V5_PLUS: Self = Self(0x0008_0004);
    pub const V10: Self = Self(0x0008_0005);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u16)]
pub enum ColorDepth {
    Bpp4 = 0xCA00,
    Bpp8 = 0xCA01,
    Bpp16_555 = 0xCA02,
    Bpp16_565 = 0xCA03,
    Bpp24 = 0xCA04,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u16)]
pub enum SecureAccessSequence {
    Del = 0xAA03,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum KeyboardType {
    IbmPcXt = 1,
    OlivettiIco = 2,
    IbmPcAt = 3,
    IbmEnhanced = 4,
    Nokia1050 = 5,
    Nokia9140 = 6,
    Japanese = 7,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u16)]
pub enum HighColorDepth {
    Bpp4 = 4,
    Bpp8 = 8,
    Bpp15 = 15,
    Bpp16 = 16,
    Bpp24 = 24,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum ConnectionType {
    NotUsed = 0,
    Modem = 1,
    BroadbandLow = 2,
    Satellite = 3,
    BroadbandHigh = 4,
    Wan = 5,
    Lan = 6,
    AutoDetect = 7,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct SupportedColorDepths: u16 {
        const BPP24 = 0x01;
        const BPP16 = 0x02;
        const BPP15 = 0x04;
        const BPP32 = 0x08;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct ClientEarlyCapabilityFlags: u16 {
        const SUPPORT_ERR_INFO_PDU = 0x0001;
        const WANT_32_BPP_SESSION = 0x0002;
        const SUPPORT_STATUS_INFO_PDU = 0x0004;
        const STRONG_ASYMMETRIC_KEYS = 0x0008;
        const VALID_CONNECTION_TYPE = 0x0020;
        const SUPPORT_MONITOR_LAYOUT_PDU = 0x0040;
        const SUPPORT_NET_CHAR_AUTODETECT = 0x0080;
        const SUPPORT_DYN_VC_GFX_PROTOCOL = 0x0100;
        const SUPPORT_DYNAMIC_TIME_ZONE = 0x0200;
        const SUPPORT_HEARTBEAT_PDU = 0x0400;
    }
}

/// TS_UD_CS_CORE, fixed part plus the optional tail this client understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCoreData {
    pub version: RdpVersion,
    pub desktop_width: u16,
    pub desktop_height: u16,
    pub color_depth: ColorDepth,
    pub sec_access_sequence: SecureAccessSequence,
    pub keyboard_layout: u32,
    pub client_build: u32,
    /// Truncated to 15 characters on the wire.
    pub client_name: String,
    pub keyboard_type: KeyboardType,
    pub keyboard_subtype: u32,
    pub keyboard_functional_keys_count: u32,
    pub ime_file_name: String,
    pub optional_data: ClientCoreOptionalData,
}

impl ClientCoreData {
    const NAME: &'static str = "ClientCoreData";

    const FIXED_PART_SIZE: usize = 4 + 2 + 2 + 2 + 2 + 4 + 4 + CLIENT_NAME_SIZE + 4 + 4 + 4 + IME_FILE_NAME_SIZE;
}

impl Encode for ClientCoreData {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32(self.version.0);
        dst.write_u16(self.desktop_width);
        dst.write_u16(self.desktop_height);
        dst.write_u16(self.color_depth.to_u16().unwrap());
        dst.write_u16(self.sec_access_sequence.to_u16().unwrap());
        dst.write_u32(self.keyboard_layout);
        dst.write_u32(self.client_build);
        write_fixed_utf16(dst, &self.client_name, CLIENT_NAME_SIZE);
        dst.write_u32(self.keyboard_type.to_u32().unwrap());
        dst.write_u32(self.keyboard_subtype);
        dst.write_u32(self.keyboard_functional_keys_count);
        write_fixed_utf16(dst, &self.ime_file_name, IME_FILE_NAME_SIZE);

        self.optional_data.encode(dst)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.optional_data.size()
    }
}

impl<'de> Decode<'de> for ClientCoreData {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let version = RdpVersion(src.read_u32());
        let desktop_width = src.read_u16();
        let desktop_height = src.read_u16();
        let color_depth = ColorDepth::from_u16(src.read_u16())
            .ok_or_else(|| invalid_field_err!("colorDepth", "invalid color depth"))?;
        let sec_access_sequence = SecureAccessSequence::from_u16(src.read_u16())
            .ok_or_else(|| invalid_field_err!("sasSequence", "invalid secure access sequence"))?;
        let keyboard_layout = src.read_u32();
        let client_build = src.read_u32();
        let client_name = utf16::read_string(src, CLIENT_NAME_SIZE);
        let keyboard_type = KeyboardType::from_u32(src.read_u32())
            .ok_or_else(|| invalid_field_err!("keyboardType", "invalid keyboard type"))?;
        let keyboard_subtype = src.read_u32();
        let keyboard_functional_keys_count = src.read_u32();
        let ime_file_name = utf16::read_string(src, IME_FILE_NAME_SIZE);

        let optional_data = ClientCoreOptionalData::decode(src)?;

        Ok(Self {
            version,
            desktop_width,
            desktop_height,
            color_depth,
            sec_access_sequence,
            keyboard_layout,
            client_build,
            client_name,
            keyboard_type,
            keyboard_subtype,
            keyboard_functional_keys_count,
            ime_file_name,
            optional_data,
        })
    }
}

/// Optional tail of TS_UD_CS_CORE. Fields are strictly sequential on the
/// wire, so the first `None` terminates encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientCoreOptionalData {
    pub post_beta2_color_depth: Option<ColorDepth>,
    pub client_product_id: Option<u16>,
    pub serial_number: Option<u32>,
    pub high_color_depth: Option<HighColorDepth>,
    pub supported_color_depths: Option<SupportedColorDepths>,
    pub early_capability_flags: Option<ClientEarlyCapabilityFlags>,
    pub dig_product_id: Option<String>,
    pub connection_type: Option<ConnectionType>,
    pub server_selected_protocol: Option<SecurityProtocol>,
}

impl ClientCoreOptionalData {
    const NAME: &'static str = "ClientCoreOptionalData";
}

macro_rules! try_or_return {
    ($expr:expr, $ret:expr) => {
        match $expr {
            Ok(v) => v,
            Err(_) => return Ok($ret),
        }
    };
}

impl Encode for ClientCoreOptionalData {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        if let Some(value) = self.post_beta2_color_depth {
            dst.write_u16(value.to_u16().unwrap());
        }
        if let Some(value) = self.client_product_id {
            dst.write_u16(value);
        }
        if let Some(value) = self.serial_number {
            dst.write_u32(value);
        }
        if let Some(value) = self.high_color_depth {
            dst.write_u16(value.to_u16().unwrap());
        }
        if let Some(value) = self.supported_color_depths {
            dst.write_u16(value.bits());
        }
        if let Some(value) = self.early_capability_flags {
            dst.write_u16(value.bits());
        }
        if let Some(ref value) = self.dig_product_id {
            write_fixed_utf16(dst, value, DIG_PRODUCT_ID_SIZE);
        }
        if let Some(value) = self.connection_type {
            dst.write_u8(value.to_u8().unwrap());
            write_padding!(dst, 1);
        }
        if let Some(value) = self.server_selected_protocol {
            dst.write_u32(value.bits());
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        let mut size = 0;

        size += self.post_beta2_color_depth.map_or(0, |_| 2);
        size += self.client_product_id.map_or(0, |_| 2);
        size += self.serial_number.map_or(0, |_| 4);
        size += self.high_color_depth.map_or(0, |_| 2);
        size += self.supported_color_depths.map_or(0, |_| 2);
        size += self.early_capability_flags.map_or(0, |_| 2);
        size += self.dig_product_id.as_ref().map_or(0, |_| DIG_PRODUCT_ID_SIZE);
        size += self.connection_type.map_or(0, |_| 2);
        size += self.server_selected_protocol.map_or(0, |_| 4);

        size
    }
}

impl<'de> Decode<'de> for ClientCoreOptionalData {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        let mut optional_data = Self::default();

        optional_data.post_beta2_color_depth = Some(
            ColorDepth::from_u16(try_or_return!(src.try_read_u16(), optional_data))
                .ok_or_else(|| invalid_field_err!("postBeta2ColorDepth", "invalid color depth"))?,
        );

        optional_data.client_product_id = Some(try_or_return!(src.try_read_u16(), optional_data));
        optional_data.serial_number = Some(try_or_return!(src.try_read_u32(), optional_data));

        optional_data.high_color_depth = Some(
            HighColorDepth::from_u16(try_or_return!(src.try_read_u16(), optional_data))
                .ok_or_else(|| invalid_field_err!("highColorDepth", "invalid high color depth"))?,
        );

        optional_data.supported_color_depths = Some(SupportedColorDepths::from_bits_truncate(try_or_return!(
            src.try_read_u16(),
            optional_data
        )));

        optional_data.early_capability_flags = Some(ClientEarlyCapabilityFlags::from_bits_truncate(try_or_return!(
            src.try_read_u16(),
            optional_data
        )));

        if src.len() < DIG_PRODUCT_ID_SIZE {
            return Ok(optional_data);
        }
        optional_data.dig_product_id = Some(utf16::read_string(src, DIG_PRODUCT_ID_SIZE));

        optional_data.connection_type = Some(
            ConnectionType::from_u8(try_or_return!(src.try_read_u8(), optional_data))
                .ok_or_else(|| invalid_field_err!("connectionType", "invalid connection type"))?,
        );
        try_or_return!(src.try_read_u8(), optional_data); // pad1octet

        optional_data.server_selected_protocol = Some(SecurityProtocol::from_bits_truncate(try_or_return!(
            src.try_read_u32(),
            optional_data
        )));

        Ok(optional_data)
    }
}

/// TS_UD_SC_CORE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCoreData {
    pub version: RdpVersion,
    pub optional_data: ServerCoreOptionalData,
}

impl ServerCoreData {
    const NAME: &'static str = "ServerCoreData";

    const FIXED_PART_SIZE: usize = 4;
}

impl Encode for ServerCoreData {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32(self.version.0);
        self.optional_data.encode(dst)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.optional_data.size()
    }
}

impl<'de> Decode<'de> for ServerCoreData {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let version = RdpVersion(src.read_u32());
        let optional_data = ServerCoreOptionalData::decode(src)?;

        Ok(Self { version, optional_data })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerCoreOptionalData {
    pub client_requested_protocols: Option<SecurityProtocol>,
    pub early_capability_flags: Option<u32>,
}

impl ServerCoreOptionalData {
    const NAME: &'static str = "ServerCoreOptionalData";
}

impl Encode for ServerCoreOptionalData {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        if let Some(value) = self.client_requested_protocols {
            dst.write_u32(value.bits());
        }
        if let Some(value) = self.early_capability_flags {
            dst.write_u32(value);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        self.client_requested_protocols.map_or(0, |_| 4) + self.early_capability_flags.map_or(0, |_| 4)
    }
}

impl<'de> Decode<'de> for ServerCoreOptionalData {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        let mut optional_data = Self::default();

        optional_data.client_requested_protocols = Some(SecurityProtocol::from_bits_truncate(try_or_return!(
            src.try_read_u32(),
            optional_data
        )));

        optional_data.early_capability_flags = Some(try_or_return!(src.try_read_u32(), optional_data));

        Ok(optional_data)
    }
}

/// Writes `value` as UTF-16LE into a fixed `total` bytes, NUL padded.
fn write_fixed_utf16(dst: &mut WriteCursor<'_>, value: &str, total: usize) {
    let max_chars = total / 2 - 1;
    let mut written = 0;

    for unit in value.encode_utf16().take(max_chars) {
        dst.write_u16(unit);
        written += 2;
    }

    let mut padding = total - written;
    while padding > 0 {
        dst.write_u8(0);
        padding -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_utf16_is_truncated_and_padded() {
        let mut buf = [0xFFu8; CLIENT_NAME_SIZE];
        let mut dst = WriteCursor::new(&mut buf);
        write_fixed_utf16(&mut dst, "computer-name-way-too-long", CLIENT_NAME_SIZE);

        assert_eq!(dst.pos(), CLIENT_NAME_SIZE);
        // last code unit slot is the NUL terminator
        assert_eq!(&buf[30..], [0, 0]);
    }
}
