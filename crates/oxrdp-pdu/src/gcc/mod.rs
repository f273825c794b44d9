//! GCC conference-create user data blocks (MS-RDPBCGR 2.2.1.3 / 2.2.1.4).

use oxrdp_core::{
    cast_length, decode, ensure_fixed_part_size, ensure_size, invalid_field_err, Decode, DecodeErrorKind,
    DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor,
};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

pub mod conference_create;

mod cluster_data;
mod core_data;
mod network_data;
mod security_data;

pub use self::cluster_data::{ClientClusterData, RedirectionFlags, RedirectionVersion};
pub use self::conference_create::{ConferenceCreateRequest, ConferenceCreateResponse};
pub use self::core_data::{
    ClientCoreData, ClientCoreOptionalData, ClientEarlyCapabilityFlags, ColorDepth, ConnectionType, HighColorDepth,
    KeyboardType, RdpVersion, SecureAccessSequence, ServerCoreData, ServerCoreOptionalData, SupportedColorDepths,
};
pub use self::network_data::{ChannelDef, ChannelName, ChannelOptions, ClientNetworkData, ServerNetworkData};
pub use self::security_data::{ClientSecurityData, EncryptionLevel, EncryptionMethod, ServerSecurityData};

macro_rules! user_header_try {
    ($e:expr) => {
        match $e {
            Ok(user_header) => user_header,
            Err(e) if matches!(e.kind(), DecodeErrorKind::NotEnoughBytes { .. }) => break,
            Err(e) => return Err(e),
        }
    };
}

const USER_DATA_HEADER_SIZE: usize = 4;

/// User data blocks of the Client MCS Connect Initial PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientGccBlocks {
    pub core: ClientCoreData,
    pub security: ClientSecurityData,
    pub network: Option<ClientNetworkData>,
    pub cluster: Option<ClientClusterData>,
}

impl ClientGccBlocks {
    const NAME: &'static str = "ClientGccBlocks";

    pub fn channel_names(&self) -> Option<Vec<ChannelDef>> {
        self.network.as_ref().map(|network| network.channels.clone())
    }
}

impl Encode for ClientGccBlocks {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        UserDataHeader::encode(dst, ClientGccType::CoreData.as_u16(), &self.core)?;
        UserDataHeader::encode(dst, ClientGccType::SecurityData.as_u16(), &self.security)?;

        if let Some(ref network) = self.network {
            UserDataHeader::encode(dst, ClientGccType::NetworkData.as_u16(), network)?;
        }
        if let Some(ref cluster) = self.cluster {
            UserDataHeader::encode(dst, ClientGccType::ClusterData.as_u16(), cluster)?;
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        let mut size = self.core.size() + self.security.size() + USER_DATA_HEADER_SIZE * 2;

        if let Some(ref network) = self.network {
            size += network.size() + USER_DATA_HEADER_SIZE;
        }
        if let Some(ref cluster) = self.cluster {
            size += cluster.size() + USER_DATA_HEADER_SIZE;
        }

        size
    }
}

impl<'de> Decode<'de> for ClientGccBlocks {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        let mut core = None;
        let mut security = None;
        let mut network = None;
        let mut cluster = None;

        loop {
            let (ty, block) = user_header_try!(UserDataHeader::decode::<ClientGccType>(src));

            match ty {
                ClientGccType::CoreData => core = Some(decode(block)?),
                ClientGccType::SecurityData => security = Some(decode(block)?),
                ClientGccType::NetworkData => network = Some(decode(block)?),
                ClientGccType::ClusterData => cluster = Some(decode(block)?),
                // Blocks the client never sends; ignored when echoed by tooling.
                _ => {}
            };
        }

        Ok(Self {
            core: core.ok_or_else(|| invalid_field_err!("core", "required GCC core block is absent"))?,
            security: security.ok_or_else(|| invalid_field_err!("security", "required GCC security block is absent"))?,
            network,
            cluster,
        })
    }
}

/// User data blocks of the Server MCS Connect Response PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerGccBlocks {
    pub core: ServerCoreData,
    pub network: ServerNetworkData,
    pub security: ServerSecurityData,
}

impl ServerGccBlocks {
    const NAME: &'static str = "ServerGccBlocks";

    pub fn channel_ids(&self) -> Vec<u16> {
        self.network.channel_ids.clone()
    }

    pub fn global_channel_id(&self) -> u16 {
        self.network.io_channel
    }
}

impl Encode for ServerGccBlocks {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        UserDataHeader::encode(dst, ServerGccType::CoreData.as_u16(), &self.core)?;
        UserDataHeader::encode(dst, ServerGccType::NetworkData.as_u16(), &self.network)?;
        UserDataHeader::encode(dst, ServerGccType::SecurityData.as_u16(), &self.security)?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        self.core.size() + self.network.size() + self.security.size() + USER_DATA_HEADER_SIZE * 3
    }
}

impl<'de> Decode<'de> for ServerGccBlocks {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        let mut core = None;
        let mut network = None;
        let mut security = None;

        loop {
            let (ty, block) = user_header_try!(UserDataHeader::decode::<ServerGccType>(src));

            match ty {
                ServerGccType::CoreData => core = Some(decode(block)?),
                ServerGccType::NetworkData => network = Some(decode(block)?),
                ServerGccType::SecurityData => security = Some(decode(block)?),
                // Message channel / multitransport blocks are not acted upon.
                _ => {}
            };
        }

        Ok(Self {
            core: core.ok_or_else(|| invalid_field_err!("core", "required GCC core block is absent"))?,
            network: network.ok_or_else(|| invalid_field_err!("network", "required GCC network block is absent"))?,
            security: security.ok_or_else(|| invalid_field_err!("security", "required GCC security block is absent"))?,
        })
    }
}

#[repr(u16)]
#[derive(Debug, Copy, Clone, FromPrimitive)]
pub enum ClientGccType {
    CoreData = 0xC001,
    SecurityData = 0xC002,
    NetworkData = 0xC003,
    ClusterData = 0xC004,
    MonitorData = 0xC005,
    MessageChannelData = 0xC006,
    MonitorExtendedData = 0xC008,
    MultiTransportChannelData = 0xC00A,
}

impl ClientGccType {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

#[repr(u16)]
#[derive(Debug, Copy, Clone, FromPrimitive)]
pub enum ServerGccType {
    CoreData = 0x0C01,
    SecurityData = 0x0C02,
    NetworkData = 0x0C03,
    MessageChannelData = 0x0C04,
    MultiTransportChannelData = 0x0C08,
}

impl ServerGccType {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

#[derive(Debug)]
pub struct UserDataHeader;

impl UserDataHeader {
    const NAME: &'static str = "UserDataHeader";

    const FIXED_PART_SIZE: usize = 2 /* blockType */ + 2 /* blockLen */;

    pub fn encode<B: Encode>(dst: &mut WriteCursor<'_>, block_type: u16, block: &B) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u16(block_type);
        dst.write_u16(cast_length!("blockLen", block.size() + USER_DATA_HEADER_SIZE)?);
        block.encode(dst)?;

        Ok(())
    }

    pub fn decode<'de, T: FromPrimitive>(src: &mut ReadCursor<'de>) -> DecodeResult<(T, &'de [u8])> {
        ensure_fixed_part_size!(in: src);

        let block_type =
            T::from_u16(src.read_u16()).ok_or_else(|| invalid_field_err!("blockType", "invalid GCC block type"))?;
        let block_length = usize::from(src.read_u16());

        if block_length <= USER_DATA_HEADER_SIZE {
            return Err(invalid_field_err!("blockLen", "invalid user data header length"));
        }

        let len = block_length - USER_DATA_HEADER_SIZE;
        ensure_size!(in: src, size: len);

        Ok((block_type, src.read_slice(len)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdp_core::encode_vec;

    fn client_blocks() -> ClientGccBlocks {
        ClientGccBlocks {
            core: ClientCoreData {
                version: RdpVersion::V5_PLUS,
                desktop_width: 1280,
                desktop_height: 800,
                color_depth: ColorDepth::Bpp8,
                sec_access_sequence: SecureAccessSequence::Del,
                keyboard_layout: 0,
                client_build: 3790,
                client_name: "TESTBOX".to_owned(),
                keyboard_type: KeyboardType::IbmEnhanced,
                keyboard_subtype: 0,
                keyboard_functional_keys_count: 12,
                ime_file_name: String::new(),
                optional_data: ClientCoreOptionalData {
                    post_beta2_color_depth: Some(ColorDepth::Bpp8),
                    client_product_id: Some(1),
                    serial_number: Some(0),
                    high_color_depth: Some(HighColorDepth::Bpp24),
                    supported_color_depths: Some(SupportedColorDepths::BPP16),
                    early_capability_flags: Some(ClientEarlyCapabilityFlags::VALID_CONNECTION_TYPE),
                    dig_product_id: Some(String::new()),
                    connection_type: Some(ConnectionType::Lan),
                    server_selected_protocol: Some(crate::nego::SecurityProtocol::HYBRID),
                },
            },
            security: ClientSecurityData {
                encryption_methods: EncryptionMethod::BIT_128,
                ext_encryption_methods: 0,
            },
            network: Some(ClientNetworkData { channels: Vec::new() }),
            cluster: None,
        }
    }

    #[test]
    fn client_blocks_roundtrip() {
        let blocks = client_blocks();
        let encoded = encode_vec(&blocks).unwrap();
        let decoded: ClientGccBlocks = decode(&encoded).unwrap();
        assert_eq!(decoded, blocks);
    }

    #[test]
    fn server_blocks_roundtrip() {
        let blocks = ServerGccBlocks {
            core: ServerCoreData {
                version: RdpVersion::V5_PLUS,
                optional_data: ServerCoreOptionalData {
                    client_requested_protocols: Some(crate::nego::SecurityProtocol::RDP),
                    early_capability_flags: None,
                },
            },
            network: ServerNetworkData {
                io_channel: 1003,
                channel_ids: vec![1004, 1005],
            },
            security: ServerSecurityData {
                encryption_method: EncryptionMethod::empty(),
                encryption_level: EncryptionLevel::None,
                server_random: None,
                server_cert: Vec::new(),
            },
        };

        let encoded = encode_vec(&blocks).unwrap();
        let decoded: ServerGccBlocks = decode(&encoded).unwrap();
        assert_eq!(decoded, blocks);
    }
}
