use oxrdp_core::{ensure_size, Decode, DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor};

use super::{BlobHeader, BlobType, MAC_SIZE};

/// CLIENT_PLATFORM_CHALLENGE_RESPONSE body.
///
/// Both blobs are RC4-sealed with the licensing key; the MAC covers the
/// decrypted challenge concatenated with the clear HWID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientPlatformChallengeResponse {
    pub encrypted_challenge_response: Vec<u8>,
    pub encrypted_hwid: Vec<u8>,
    pub mac_data: [u8; MAC_SIZE],
}

impl ClientPlatformChallengeResponse {
    const NAME: &'static str = "ClientPlatformChallengeResponse";
}

impl Encode for ClientPlatformChallengeResponse {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        BlobHeader::new(BlobType::EncryptedData, self.encrypted_challenge_response.len()).encode(dst)?;
        dst.write_slice(&self.encrypted_challenge_response);

        BlobHeader::new(BlobType::EncryptedData, self.encrypted_hwid.len()).encode(dst)?;
        dst.write_slice(&self.encrypted_hwid);

        dst.write_slice(&self.mac_data);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        BlobHeader::FIXED_PART_SIZE * 2
            + self.encrypted_challenge_response.len()
            + self.encrypted_hwid.len()
            + MAC_SIZE
    }
}

impl<'de> Decode<'de> for ClientPlatformChallengeResponse {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        let challenge_blob = BlobHeader::decode(src)?;
        ensure_size!(in: src, size: challenge_blob.length);
        let encrypted_challenge_response = src.read_slice(challenge_blob.length).to_vec();

        let hwid_blob = BlobHeader::decode(src)?;
        ensure_size!(in: src, size: hwid_blob.length);
        let encrypted_hwid = src.read_slice(hwid_blob.length).to_vec();

        ensure_size!(in: src, size: MAC_SIZE);
        let mac_data = src.read_array();

        Ok(Self {
            encrypted_challenge_response,
            encrypted_hwid,
            mac_data,
        })
    }
}
