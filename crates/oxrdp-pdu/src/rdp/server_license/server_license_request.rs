use oxrdp_core::{
    cast_length, ensure_size, invalid_field_err, Decode, DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor,
};

use super::{BlobHeader, BlobType, RANDOM_NUMBER_SIZE};
use crate::utf16;

pub const KEY_EXCHANGE_FIELD_SIZE: usize = 4;

/// SERVER_LICENSE_REQUEST body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLicenseRequest {
    pub server_random: Vec<u8>,
    pub product_info: ProductInfo,
    pub server_certificate: Vec<u8>,
    pub scope_list: Vec<Scope>,
}

impl ServerLicenseRequest {
    const NAME: &'static str = "ServerLicenseRequest";
}

impl Encode for ServerLicenseRequest {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_slice(&self.server_random);
        self.product_info.encode(dst)?;

        BlobHeader::new(BlobType::KeyExchangeAlgorithm, KEY_EXCHANGE_FIELD_SIZE).encode(dst)?;
        dst.write_u32(super::KEY_EXCHANGE_ALGORITHM_RSA);

        BlobHeader::new(BlobType::Certificate, self.server_certificate.len()).encode(dst)?;
        dst.write_slice(&self.server_certificate);

        dst.write_u32(cast_length!("scopeCount", self.scope_list.len())?);
        for scope in self.scope_list.iter() {
            scope.encode(dst)?;
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        RANDOM_NUMBER_SIZE
            + self.product_info.size()
            + BlobHeader::FIXED_PART_SIZE * 2
            + KEY_EXCHANGE_FIELD_SIZE
            + self.server_certificate.len()
            + 4
            + self.scope_list.iter().map(Encode::size).sum::<usize>()
    }
}

impl<'de> Decode<'de> for ServerLicenseRequest {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_size!(in: src, size: RANDOM_NUMBER_SIZE);
        let server_random = src.read_slice(RANDOM_NUMBER_SIZE).to_vec();

        let product_info = ProductInfo::decode(src)?;

        let key_exchange_blob = BlobHeader::decode(src)?;
        if key_exchange_blob.blob_type != BlobType::KeyExchangeAlgorithm {
            return Err(invalid_field_err!("blobType", "expected the key exchange algorithm blob"));
        }
        ensure_size!(in: src, size: key_exchange_blob.length);
        let key_exchange_algorithm = src.read_u32();
        if key_exchange_algorithm != super::KEY_EXCHANGE_ALGORITHM_RSA {
            return Err(invalid_field_err!("keyExchangeList", "unsupported key exchange algorithm"));
        }

        let certificate_blob = BlobHeader::decode(src)?;
        if certificate_blob.blob_type != BlobType::Certificate && certificate_blob.length != 0 {
            return Err(invalid_field_err!("blobType", "expected the certificate blob"));
        }
        ensure_size!(in: src, size: certificate_blob.length);
        let server_certificate = src.read_slice(certificate_blob.length).to_vec();

        ensure_size!(in: src, size: 4);
        let scope_count = usize::try_from(src.read_u32()).unwrap();
        let mut scope_list = Vec::with_capacity(scope_count.min(16));
        for _ in 0..scope_count {
            scope_list.push(Scope::decode(src)?);
        }

        Ok(Self {
            server_random,
            product_info,
            server_certificate,
            scope_list,
        })
    }
}

/// TS_PRODUCT_INFO. The strings are UTF-16LE with included terminators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInfo {
    pub version: u32,
    pub company_name: String,
    pub product_id: String,
}

impl ProductInfo {
    const NAME: &'static str = "ProductInfo";
}

impl Encode for ProductInfo {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32(self.version);

        dst.write_u32(cast_length!("cbCompanyName", utf16::null_terminated_encoded_len(&self.company_name))?);
        utf16::write_null_terminated(dst, &self.company_name);

        dst.write_u32(cast_length!("cbProductId", utf16::null_terminated_encoded_len(&self.product_id))?);
        utf16::write_null_terminated(dst, &self.product_id);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        4 + 4
            + utf16::null_terminated_encoded_len(&self.company_name)
            + 4
            + utf16::null_terminated_encoded_len(&self.product_id)
    }
}

impl<'de> Decode<'de> for ProductInfo {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_size!(in: src, size: 4 + 4);

        let version = src.read_u32();

        let company_name_len = usize::try_from(src.read_u32()).unwrap();
        ensure_size!(in: src, size: company_name_len);
        let company_name = utf16::read_string(src, company_name_len);

        ensure_size!(in: src, size: 4);
        let product_id_len = usize::try_from(src.read_u32()).unwrap();
        ensure_size!(in: src, size: product_id_len);
        let product_id = utf16::read_string(src, product_id_len);

        Ok(Self {
            version,
            company_name,
            product_id,
        })
    }
}

/// A scope entry: a NUL-terminated ANSI string inside a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope(pub String);

impl Scope {
    const NAME: &'static str = "Scope";
}

impl Encode for Scope {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        BlobHeader::new(BlobType::Scope, self.0.len() + 1).encode(dst)?;
        dst.write_slice(self.0.as_bytes());
        dst.write_u8(0);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        BlobHeader::FIXED_PART_SIZE + self.0.len() + 1
    }
}

impl<'de> Decode<'de> for Scope {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        let blob = BlobHeader::decode(src)?;
        if blob.blob_type != BlobType::Scope || blob.length == 0 {
            return Err(invalid_field_err!("blobType", "expected a scope blob"));
        }

        ensure_size!(in: src, size: blob.length);
        let bytes = src.read_slice(blob.length);
        let value = String::from_utf8_lossy(&bytes[..blob.length - 1]).into_owned();

        Ok(Self(value))
    }
}
