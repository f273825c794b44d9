//! RDP connection and session PDUs above the MCS layer.
//!
//! PDUs here describe payloads only; the 4-byte basic security header that
//! precedes them on the I/O channel (and the RC4 sealing when standard
//! security is active) is applied by the send path.

use oxrdp_core::{cast_length, ensure_size, Decode, DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor};

pub mod capability_sets;
pub mod client_info;
pub mod finalization_messages;
pub mod headers;
pub mod server_error_info;
pub mod server_license;

/// SECURITY_EXCHANGE_PDU: the RSA-sealed client random, sent with the
/// EXCHANGE_PKT flag right after channel join when standard security is
/// selected.
///
/// `encrypted_client_random` already carries its 8 trailing padding bytes;
/// the length field counts them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityExchangePdu {
    pub encrypted_client_random: Vec<u8>,
}

impl SecurityExchangePdu {
    const NAME: &'static str = "SecurityExchangePdu";

    const FIXED_PART_SIZE: usize = 4 /* length */;
}

impl Encode for SecurityExchangePdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32(cast_length!("length", self.encrypted_client_random.len())?);
        dst.write_slice(&self.encrypted_client_random);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + self.encrypted_client_random.len()
    }
}

impl<'de> Decode<'de> for SecurityExchangePdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_size!(in: src, size: Self::FIXED_PART_SIZE);

        let length = usize::try_from(src.read_u32()).unwrap();
        ensure_size!(in: src, size: length);

        Ok(Self {
            encrypted_client_random: src.read_slice(length).to_vec(),
        })
    }
}
