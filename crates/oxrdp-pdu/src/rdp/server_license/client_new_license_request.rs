use oxrdp_core::{ensure_size, invalid_field_err, Decode, DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor};

use super::{BlobHeader, BlobType, RANDOM_NUMBER_SIZE};

pub const KEY_EXCHANGE_ALGORITHM_RSA: u32 = 1;

/// PLATFORMID: ISV_ID "other" | OS_ID "other".
pub const PLATFORM_ID: u32 = 0x0400_0000 | 0x0001_0000;

/// CLIENT_NEW_LICENSE_REQUEST body.
///
/// `encrypted_premaster_secret` is the RSA-sealed premaster secret in
/// little-endian order with 8 bytes of zero padding appended, as produced by
/// the security crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientNewLicenseRequest {
    pub client_random: Vec<u8>,
    pub encrypted_premaster_secret: Vec<u8>,
    pub client_username: String,
    pub client_machine_name: String,
}

impl ClientNewLicenseRequest {
    const NAME: &'static str = "ClientNewLicenseRequest";

    const FIXED_PART_SIZE: usize = 4 /* keyExchangeAlg */ + 4 /* platformId */ + RANDOM_NUMBER_SIZE;
}

impl Encode for ClientNewLicenseRequest {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32(KEY_EXCHANGE_ALGORITHM_RSA);
        dst.write_u32(PLATFORM_ID);
        dst.write_slice(&self.client_random);

        BlobHeader::new(BlobType::Random, self.encrypted_premaster_secret.len()).encode(dst)?;
        dst.write_slice(&self.encrypted_premaster_secret);

        BlobHeader::new(BlobType::ClientUserName, self.client_username.len() + 1).encode(dst)?;
        dst.write_slice(self.client_username.as_bytes());
        dst.write_u8(0);

        BlobHeader::new(BlobType::ClientMachineName, self.client_machine_name.len() + 1).encode(dst)?;
        dst.write_slice(self.client_machine_name.as_bytes());
        dst.write_u8(0);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
            + BlobHeader::FIXED_PART_SIZE * 3
            + self.encrypted_premaster_secret.len()
            + self.client_username.len()
            + 1
            + self.client_machine_name.len()
            + 1
    }
}

impl<'de> Decode<'de> for ClientNewLicenseRequest {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_size!(in: src, size: Self::FIXED_PART_SIZE);

        let key_exchange_algorithm = src.read_u32();
        if key_exchange_algorithm != KEY_EXCHANGE_ALGORITHM_RSA {
            return Err(invalid_field_err!("keyExchangeAlg", "unsupported key exchange algorithm"));
        }

        let _platform_id = src.read_u32();
        let client_random = src.read_slice(RANDOM_NUMBER_SIZE).to_vec();

        let premaster_blob = BlobHeader::decode(src)?;
        if premaster_blob.blob_type != BlobType::Random {
            return Err(invalid_field_err!("blobType", "expected the premaster secret blob"));
        }
        ensure_size!(in: src, size: premaster_blob.length);
        let encrypted_premaster_secret = src.read_slice(premaster_blob.length).to_vec();

        let username_blob = BlobHeader::decode(src)?;
        if username_blob.blob_type != BlobType::ClientUserName || username_blob.length == 0 {
            return Err(invalid_field_err!("blobType", "expected the client username blob"));
        }
        ensure_size!(in: src, size: username_blob.length);
        let username_bytes = src.read_slice(username_blob.length);
        let client_username = String::from_utf8_lossy(&username_bytes[..username_blob.length - 1]).into_owned();

        let machine_name_blob = BlobHeader::decode(src)?;
        if machine_name_blob.blob_type != BlobType::ClientMachineName || machine_name_blob.length == 0 {
            return Err(invalid_field_err!("blobType", "expected the client machine name blob"));
        }
        ensure_size!(in: src, size: machine_name_blob.length);
        let machine_name_bytes = src.read_slice(machine_name_blob.length);
        let client_machine_name =
            String::from_utf8_lossy(&machine_name_bytes[..machine_name_blob.length - 1]).into_owned();

        Ok(Self {
            client_random,
            encrypted_premaster_secret,
            client_username,
            client_machine_name,
        })
    }
}
