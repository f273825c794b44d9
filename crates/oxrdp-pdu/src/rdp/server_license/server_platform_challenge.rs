use oxrdp_core::{ensure_size, invalid_field_err, Decode, DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor};

use super::{BlobHeader, BlobType, MAC_SIZE};

/// SERVER_PLATFORM_CHALLENGE body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPlatformChallenge {
    pub encrypted_platform_challenge: Vec<u8>,
    pub mac_data: [u8; MAC_SIZE],
}

impl ServerPlatformChallenge {
    const NAME: &'static str = "ServerPlatformChallenge";

    const FIXED_PART_SIZE: usize = 4 /* connectFlags */ + BlobHeader::FIXED_PART_SIZE + MAC_SIZE;
}

impl Encode for ServerPlatformChallenge {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32(0); // connectFlags, reserved
        BlobHeader::new(BlobType::Any, self.encrypted_platform_challenge.len()).encode(dst)?;
        dst.write_slice(&self.encrypted_platform_challenge);
        dst.write_slice(&self.mac_data);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.encrypted_platform_challenge.len()
    }
}

impl<'de> Decode<'de> for ServerPlatformChallenge {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_size!(in: src, size: 4);
        let _connect_flags = src.read_u32();

        let blob = BlobHeader::decode(src)?;
        ensure_size!(in: src, size: blob.length);
        let encrypted_platform_challenge = src.read_slice(blob.length).to_vec();

        if src.len() < MAC_SIZE {
            return Err(invalid_field_err!("macData", "platform challenge MAC is truncated"));
        }
        let mac_data = src.read_array();

        Ok(Self {
            encrypted_platform_challenge,
            mac_data,
        })
    }
}
