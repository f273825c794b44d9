//! Demand Active / Confirm Active PDUs and the capability sets they carry.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive as _, ToPrimitive as _};
use oxrdp_core::{
    cast_length, decode, ensure_fixed_part_size, ensure_size, invalid_field_err, write_padding, Decode, DecodeResult,
    Encode, EncodeResult, ReadCursor, WriteCursor,
};

mod bitmap;
mod bitmap_cache;
mod brush;
mod general;
mod glyph_cache;
mod input;
mod offscreen_bitmap_cache;
mod order;
mod pointer;
mod sound;
mod virtual_channel;

pub use self::bitmap::{Bitmap, BitmapDrawingFlags};
pub use self::bitmap_cache::{BitmapCache, CacheEntry, BITMAP_CACHE_ENTRIES_NUM};
pub use self::brush::{Brush, SupportLevel};
pub use self::general::{General, GeneralExtraFlags, MajorPlatformType, MinorPlatformType, PROTOCOL_VER};
pub use self::glyph_cache::{CacheDefinition, GlyphCache, GlyphSupportLevel, GLYPH_CACHE_NUM};
pub use self::input::{Input, InputFlags};
pub use self::offscreen_bitmap_cache::OffscreenBitmapCache;
pub use self::order::{Order, OrderFlags};
pub use self::pointer::Pointer;
pub use self::sound::{Sound, SoundFlags};
pub use self::virtual_channel::{VirtualChannel, VirtualChannelFlags};

pub const SERVER_CHANNEL_ID: u16 = 0x03EA;

const SOURCE_DESCRIPTOR_LENGTH_FIELD_SIZE: usize = 2;
const COMBINED_CAPABILITIES_LENGTH_FIELD_SIZE: usize = 2;
const NUMBER_CAPABILITIES_FIELD_SIZE: usize = 2;
const PADDING_SIZE: usize = 2;
const SESSION_ID_FIELD_SIZE: usize = 4;
const CAPABILITY_SET_TYPE_FIELD_SIZE: usize = 2;
const CAPABILITY_SET_LENGTH_FIELD_SIZE: usize = 2;
const ORIGINATOR_ID_FIELD_SIZE: usize = 2;

const NULL_TERMINATOR: &str = "\0";

/// Server Demand Active PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDemandActive {
    pub pdu: DemandActive,
}

impl ServerDemandActive {
    const NAME: &'static str = "ServerDemandActive";

    const FIXED_PART_SIZE: usize = SESSION_ID_FIELD_SIZE;
}

impl Encode for ServerDemandActive {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        self.pdu.encode(dst)?;
        dst.write_u32(0); // sessionId, ignored by the client

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.pdu.size()
    }
}

impl<'de> Decode<'de> for ServerDemandActive {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        let pdu = DemandActive::decode(src)?;

        ensure_fixed_part_size!(in: src);
        let _session_id = src.read_u32();

        Ok(Self { pdu })
    }
}

/// Client Confirm Active PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfirmActive {
    /// Taken from the pduSource of the demand active, like the Microsoft
    /// client does (nominally always [`SERVER_CHANNEL_ID`]).
    pub originator_id: u16,
    pub pdu: DemandActive,
}

impl ClientConfirmActive {
    const NAME: &'static str = "ClientConfirmActive";

    const FIXED_PART_SIZE: usize = ORIGINATOR_ID_FIELD_SIZE;
}

impl Encode for ClientConfirmActive {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u16(self.originator_id);

        self.pdu.encode(dst)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.pdu.size()
    }
}

impl<'de> Decode<'de> for ClientConfirmActive {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let originator_id = src.read_u16();
        let pdu = DemandActive::decode(src)?;

        Ok(Self { originator_id, pdu })
    }
}

/// TS_DEMAND_ACTIVE_PDU: source descriptor and capability set list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemandActive {
    pub source_descriptor: String,
    pub capability_sets: Vec<CapabilitySet>,
}

impl DemandActive {
    const NAME: &'static str = "DemandActive";

    const FIXED_PART_SIZE: usize = SOURCE_DESCRIPTOR_LENGTH_FIELD_SIZE + COMBINED_CAPABILITIES_LENGTH_FIELD_SIZE;
}

impl Encode for DemandActive {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        let combined_length = self.capability_sets.iter().map(Encode::size).sum::<usize>()
            + NUMBER_CAPABILITIES_FIELD_SIZE
            + PADDING_SIZE;

        dst.write_u16(cast_length!(
            "sourceDescriptorLen",
            self.source_descriptor.len() + NULL_TERMINATOR.len()
        )?);
        dst.write_u16(cast_length!("combinedLen", combined_length)?);
        dst.write_slice(self.source_descriptor.as_ref());
        dst.write_slice(NULL_TERMINATOR.as_bytes());
        dst.write_u16(cast_length!("numberCapabilities", self.capability_sets.len())?);
        write_padding!(dst, 2);

        for capability_set in self.capability_sets.iter() {
            capability_set.encode(dst)?;
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
            + self.source_descriptor.len()
            + 1
            + NUMBER_CAPABILITIES_FIELD_SIZE
            + PADDING_SIZE
            + self.capability_sets.iter().map(Encode::size).sum::<usize>()
    }
}

impl<'de> Decode<'de> for DemandActive {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let source_descriptor_length = usize::from(src.read_u16());
        // Combined size of numberCapabilities, pad2Octets and capabilitySets.
        let _combined_capabilities_length = usize::from(src.read_u16());

        ensure_size!(in: src, size: source_descriptor_length);
        let source_descriptor = String::from_utf8_lossy(src.read_slice(source_descriptor_length))
            .trim_end_matches('\0')
            .to_owned();

        ensure_size!(in: src, size: 2 + 2);
        let capability_sets_count = usize::from(src.read_u16());
        let _padding = src.read_u16();

        let mut capability_sets = Vec::with_capacity(capability_sets_count);
        for _ in 0..capability_sets_count {
            capability_sets.push(CapabilitySet::decode(src)?);
        }

        Ok(Self {
            source_descriptor,
            capability_sets,
        })
    }
}

/// A single TS_*_CAPABILITYSET.
///
/// Sets the client builds are fully typed; everything else is retained with
/// its raw body so the collection round-trips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilitySet {
    General(General),
    Bitmap(Bitmap),
    Order(Order),
    BitmapCache(BitmapCache),
    Pointer(Pointer),
    Sound(Sound),
    Input(Input),
    Brush(Brush),
    GlyphCache(GlyphCache),
    OffscreenBitmapCache(OffscreenBitmapCache),
    VirtualChannel(VirtualChannel),

    Control(Vec<u8>),
    WindowActivation(Vec<u8>),
    Share(Vec<u8>),
    Font(Vec<u8>),

    Other { capability_type: u16, data: Vec<u8> },
}

impl CapabilitySet {
    const NAME: &'static str = "CapabilitySet";

    const FIXED_PART_SIZE: usize = CAPABILITY_SET_TYPE_FIELD_SIZE + CAPABILITY_SET_LENGTH_FIELD_SIZE;

    fn capability_type(&self) -> u16 {
        match self {
            CapabilitySet::General(_) => CapabilitySetType::General.to_u16().unwrap(),
            CapabilitySet::Bitmap(_) => CapabilitySetType::Bitmap.to_u16().unwrap(),
            CapabilitySet::Order(_) => CapabilitySetType::Order.to_u16().unwrap(),
            CapabilitySet::BitmapCache(_) => CapabilitySetType::BitmapCache.to_u16().unwrap(),
            CapabilitySet::Pointer(_) => CapabilitySetType::Pointer.to_u16().unwrap(),
            CapabilitySet::Sound(_) => CapabilitySetType::Sound.to_u16().unwrap(),
            CapabilitySet::Input(_) => CapabilitySetType::Input.to_u16().unwrap(),
            CapabilitySet::Brush(_) => CapabilitySetType::Brush.to_u16().unwrap(),
            CapabilitySet::GlyphCache(_) => CapabilitySetType::GlyphCache.to_u16().unwrap(),
            CapabilitySet::OffscreenBitmapCache(_) => CapabilitySetType::OffscreenBitmapCache.to_u16().unwrap(),
            CapabilitySet::VirtualChannel(_) => CapabilitySetType::VirtualChannel.to_u16().unwrap(),
            CapabilitySet::Control(_) => CapabilitySetType::Control.to_u16().unwrap(),
            CapabilitySet::WindowActivation(_) => CapabilitySetType::WindowActivation.to_u16().unwrap(),
            CapabilitySet::Share(_) => CapabilitySetType::Share.to_u16().unwrap(),
            CapabilitySet::Font(_) => CapabilitySetType::Font.to_u16().unwrap(),
            CapabilitySet::Other { capability_type, .. } => *capability_type,
        }
    }

    fn body_size(&self) -> usize {
        match self {
            CapabilitySet::General(capset) => capset.size(),
            CapabilitySet::Bitmap(capset) => capset.size(),
            CapabilitySet::Order(capset) => capset.size(),
            CapabilitySet::BitmapCache(capset) => capset.size(),
            CapabilitySet::Pointer(capset) => capset.size(),
            CapabilitySet::Sound(capset) => capset.size(),
            CapabilitySet::Input(capset) => capset.size(),
            CapabilitySet::Brush(capset) => capset.size(),
            CapabilitySet::GlyphCache(capset) => capset.size(),
            CapabilitySet::OffscreenBitmapCache(capset) => capset.size(),
            CapabilitySet::VirtualChannel(capset) => capset.size(),
            CapabilitySet::Control(data)
            | CapabilitySet::WindowActivation(data)
            | CapabilitySet::Share(data)
            | CapabilitySet::Font(data)
            | CapabilitySet::Other { data, .. } => data.len(),
        }
    }
}

impl Encode for CapabilitySet {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u16(self.capability_type());
        dst.write_u16(cast_length!("len", self.size())?);

        match self {
            CapabilitySet::General(capset) => capset.encode(dst),
            CapabilitySet::Bitmap(capset) => capset.encode(dst),
            CapabilitySet::Order(capset) => capset.encode(dst),
            CapabilitySet::BitmapCache(capset) => capset.encode(dst),
            CapabilitySet::Pointer(capset) => capset.encode(dst),
            CapabilitySet::Sound(capset) => capset.encode(dst),
            CapabilitySet::Input(capset) => capset.encode(dst),
            CapabilitySet::Brush(capset) => capset.encode(dst),
            CapabilitySet::GlyphCache(capset) => capset.encode(dst),
            CapabilitySet::OffscreenBitmapCache(capset) => capset.encode(dst),
            CapabilitySet::VirtualChannel(capset) => capset.encode(dst),
            CapabilitySet::Control(data)
            | CapabilitySet::WindowActivation(data)
            | CapabilitySet::Share(data)
            | CapabilitySet::Font(data)
            | CapabilitySet::Other { data, .. } => {
                dst.write_slice(data);
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.body_size()
    }
}

impl<'de> Decode<'de> for CapabilitySet {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let capability_type = src.read_u16();
        let length = usize::from(src.read_u16());

        if length < Self::FIXED_PART_SIZE {
            return Err(invalid_field_err!("len", "invalid capability set length"));
        }

        let body_length = length - Self::FIXED_PART_SIZE;
        ensure_size!(in: src, size: body_length);
        let body = src.read_slice(body_length);

        match CapabilitySetType::from_u16(capability_type) {
            Some(CapabilitySetType::General) => Ok(CapabilitySet::General(decode(body)?)),
            Some(CapabilitySetType::Bitmap) => Ok(CapabilitySet::Bitmap(decode(body)?)),
            Some(CapabilitySetType::Order) => Ok(CapabilitySet::Order(decode(body)?)),
            Some(CapabilitySetType::BitmapCache) => Ok(CapabilitySet::BitmapCache(decode(body)?)),
            Some(CapabilitySetType::Pointer) => Ok(CapabilitySet::Pointer(decode(body)?)),
            Some(CapabilitySetType::Sound) => Ok(CapabilitySet::Sound(decode(body)?)),
            Some(CapabilitySetType::Input) => Ok(CapabilitySet::Input(decode(body)?)),
            Some(CapabilitySetType::Brush) => Ok(CapabilitySet::Brush(decode(body)?)),
            Some(CapabilitySetType::GlyphCache) => Ok(CapabilitySet::GlyphCache(decode(body)?)),
            Some(CapabilitySetType::OffscreenBitmapCache) => Ok(CapabilitySet::OffscreenBitmapCache(decode(body)?)),
            Some(CapabilitySetType::VirtualChannel) => Ok(CapabilitySet::VirtualChannel(decode(body)?)),
            Some(CapabilitySetType::Control) => Ok(CapabilitySet::Control(body.into())),
            Some(CapabilitySetType::WindowActivation) => Ok(CapabilitySet::WindowActivation(body.into())),
            Some(CapabilitySetType::Share) => Ok(CapabilitySet::Share(body.into())),
            Some(CapabilitySetType::Font) => Ok(CapabilitySet::Font(body.into())),
            None => Ok(CapabilitySet::Other {
                capability_type,
                data: body.into(),
            }),
        }
    }
}

#[derive(Copy, Clone, Debug, FromPrimitive, ToPrimitive)]
enum CapabilitySetType {
    General = 0x01,
    Bitmap = 0x02,
    Order = 0x03,
    BitmapCache = 0x04,
    Control = 0x05,
    WindowActivation = 0x07,
    Pointer = 0x08,
    Share = 0x09,
    Sound = 0x0C,
    Input = 0x0D,
    Font = 0x0E,
    Brush = 0x0F,
    GlyphCache = 0x10,
    OffscreenBitmapCache = 0x11,
    VirtualChannel = 0x14,
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdp_core::encode_vec;

    #[test]
    fn demand_active_roundtrip() {
        let pdu = DemandActive {
            source_descriptor: "OXRDP".to_owned(),
            capability_sets: vec![
                CapabilitySet::General(General::default()),
                CapabilitySet::Bitmap(Bitmap {
                    pref_bits_per_pix: 16,
                    desktop_width: 1280,
                    desktop_height: 800,
                    desktop_resize_flag: false,
                    drawing_flags: BitmapDrawingFlags::empty(),
                }),
                CapabilitySet::Order(Order::bitmap_updates_only()),
                CapabilitySet::Other {
                    capability_type: 0x1A,
                    data: vec![0x00, 0x04, 0x00, 0x00],
                },
            ],
        };

        let encoded = encode_vec(&pdu).unwrap();
        let decoded: DemandActive = decode(&encoded).unwrap();
        assert_eq!(decoded, pdu);
    }
}
