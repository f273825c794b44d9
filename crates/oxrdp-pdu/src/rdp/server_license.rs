//! Licensing PDUs (MS-RDPELE). Only the client-side mini-exchange is
//! covered: new-license request, platform challenge response, and the
//! error-alert path that most deployments take.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive as _, ToPrimitive as _};
use oxrdp_core::{
    cast_length, ensure_fixed_part_size, ensure_size, invalid_field_err, Decode, DecodeResult, Encode, EncodeResult,
    ReadCursor, WriteCursor,
};

mod client_new_license_request;
mod client_platform_challenge_response;
mod licensing_error_message;
mod server_license_request;
mod server_platform_challenge;

pub use self::client_new_license_request::{ClientNewLicenseRequest, KEY_EXCHANGE_ALGORITHM_RSA, PLATFORM_ID};
pub use self::client_platform_challenge_response::ClientPlatformChallengeResponse;
pub use self::licensing_error_message::{LicenseErrorCode, LicensingErrorMessage, LicensingStateTransition};
pub use self::server_license_request::{ProductInfo, Scope, ServerLicenseRequest};
pub use self::server_platform_challenge::ServerPlatformChallenge;

pub const PREAMBLE_SIZE: usize = 4;
pub const PREMASTER_SECRET_SIZE: usize = 48;
pub const RANDOM_NUMBER_SIZE: usize = 32;
pub const MAC_SIZE: usize = 16;

const PROTOCOL_VERSION_MASK: u8 = 0x0F;

/// Licensing preamble (LICENSE_PREAMBLE). The 4-byte basic security header
/// with the LICENSE_PKT flag precedes it on the wire and is handled by the
/// secured send/receive path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseHeader {
    pub preamble_message_type: PreambleType,
    pub preamble_flags: PreambleFlags,
    pub preamble_version: PreambleVersion,
    pub preamble_message_size: u16,
}

impl LicenseHeader {
    const NAME: &'static str = "LicenseHeader";

    const FIXED_PART_SIZE: usize = PREAMBLE_SIZE;

    fn for_message(preamble_message_type: PreambleType, message_size: usize) -> EncodeResult<Self> {
        Ok(Self {
            preamble_message_type,
            preamble_flags: PreambleFlags::empty(),
            preamble_version: PreambleVersion::V3,
            preamble_message_size: cast_length!(Self::NAME, "messageSize", message_size + PREAMBLE_SIZE)?,
        })
    }
}

impl Encode for LicenseHeader {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        let flags_with_version = self.preamble_flags.bits() | self.preamble_version.to_u8().unwrap();

        dst.write_u8(self.preamble_message_type.to_u8().unwrap());
        dst.write_u8(flags_with_version);
        dst.write_u16(self.preamble_message_size);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for LicenseHeader {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let preamble_message_type = PreambleType::from_u8(src.read_u8())
            .ok_or_else(|| invalid_field_err!("preambleType", "invalid license message type"))?;

        let flags_with_version = src.read_u8();
        let preamble_message_size = src.read_u16();

        let preamble_flags = PreambleFlags::from_bits(flags_with_version & !PROTOCOL_VERSION_MASK)
            .ok_or_else(|| invalid_field_err!("preambleFlags", "invalid preamble flags"))?;

        let preamble_version = PreambleVersion::from_u8(flags_with_version & PROTOCOL_VERSION_MASK)
            .ok_or_else(|| invalid_field_err!("preambleVersion", "invalid preamble version"))?;

        Ok(Self {
            preamble_message_type,
            preamble_flags,
            preamble_version,
            preamble_message_size,
        })
    }
}

/// Any licensing packet, dispatched on the preamble type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicensePdu {
    ServerLicenseRequest(ServerLicenseRequest),
    ServerPlatformChallenge(ServerPlatformChallenge),
    /// NEW_LICENSE / UPGRADE_LICENSE: success, the body is not interpreted.
    ServerNewLicense(Vec<u8>),
    ClientNewLicenseRequest(ClientNewLicenseRequest),
    ClientPlatformChallengeResponse(ClientPlatformChallengeResponse),
    LicensingErrorMessage(LicensingErrorMessage),
}

impl LicensePdu {
    const NAME: &'static str = "LicensePdu";

    fn preamble_type(&self) -> PreambleType {
        match self {
            Self::ServerLicenseRequest(_) => PreambleType::LicenseRequest,
            Self::ServerPlatformChallenge(_) => PreambleType::PlatformChallenge,
            Self::ServerNewLicense(_) => PreambleType::NewLicense,
            Self::ClientNewLicenseRequest(_) => PreambleType::NewLicenseRequest,
            Self::ClientPlatformChallengeResponse(_) => PreambleType::PlatformChallengeResponse,
            Self::LicensingErrorMessage(_) => PreambleType::ErrorAlert,
        }
    }

    fn body_size(&self) -> usize {
        match self {
            Self::ServerLicenseRequest(pdu) => pdu.size(),
            Self::ServerPlatformChallenge(pdu) => pdu.size(),
            Self::ServerNewLicense(body) => body.len(),
            Self::ClientNewLicenseRequest(pdu) => pdu.size(),
            Self::ClientPlatformChallengeResponse(pdu) => pdu.size(),
            Self::LicensingErrorMessage(pdu) => pdu.size(),
        }
    }
}

impl Encode for LicensePdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        let header = LicenseHeader::for_message(self.preamble_type(), self.body_size())?;
        header.encode(dst)?;

        match self {
            Self::ServerLicenseRequest(pdu) => pdu.encode(dst),
            Self::ServerPlatformChallenge(pdu) => pdu.encode(dst),
            Self::ServerNewLicense(body) => {
                dst.write_slice(body);
                Ok(())
            }
            Self::ClientNewLicenseRequest(pdu) => pdu.encode(dst),
            Self::ClientPlatformChallengeResponse(pdu) => pdu.encode(dst),
            Self::LicensingErrorMessage(pdu) => pdu.encode(dst),
        }
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        LicenseHeader::FIXED_PART_SIZE + self.body_size()
    }
}

impl<'de> Decode<'de> for LicensePdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        let header = LicenseHeader::decode(src)?;

        match header.preamble_message_type {
            PreambleType::LicenseRequest => Ok(Self::ServerLicenseRequest(ServerLicenseRequest::decode(src)?)),
            PreambleType::PlatformChallenge => Ok(Self::ServerPlatformChallenge(ServerPlatformChallenge::decode(src)?)),
            PreambleType::NewLicense | PreambleType::UpgradeLicense => {
                Ok(Self::ServerNewLicense(src.read_remaining().to_vec()))
            }
            PreambleType::NewLicenseRequest => Ok(Self::ClientNewLicenseRequest(ClientNewLicenseRequest::decode(src)?)),
            PreambleType::PlatformChallengeResponse => Ok(Self::ClientPlatformChallengeResponse(
                ClientPlatformChallengeResponse::decode(src)?,
            )),
            PreambleType::ErrorAlert => Ok(Self::LicensingErrorMessage(LicensingErrorMessage::decode(src)?)),
            _ => Err(invalid_field_err!("preambleType", "unexpected license message type")),
        }
    }
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum PreambleType {
    LicenseRequest = 0x01,
    PlatformChallenge = 0x02,
    NewLicense = 0x03,
    UpgradeLicense = 0x04,
    LicenseInfo = 0x12,
    NewLicenseRequest = 0x13,
    PlatformChallengeResponse = 0x15,
    ErrorAlert = 0xFF,
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct PreambleFlags: u8 {
        const EXTENDED_ERROR_MSG_SUPPORTED = 0x80;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum PreambleVersion {
    V2 = 2, // RDP 4.0
    V3 = 3, // RDP 5.0 and up
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum BlobType {
    Any = 0x00,
    Data = 0x01,
    Random = 0x02,
    Certificate = 0x03,
    Error = 0x04,
    RsaKey = 0x06,
    RsaSignature = 0x08,
    EncryptedData = 0x09,
    KeyExchangeAlgorithm = 0x0D,
    Scope = 0x0E,
    ClientUserName = 0x0F,
    ClientMachineName = 0x10,
}

/// LICENSE_BINARY_BLOB header.
pub struct BlobHeader {
    pub blob_type: BlobType,
    pub length: usize,
}

impl BlobHeader {
    const NAME: &'static str = "BlobHeader";

    pub const FIXED_PART_SIZE: usize = 2 /* blobType */ + 2 /* blobLen */;

    pub fn new(blob_type: BlobType, length: usize) -> Self {
        Self { blob_type, length }
    }
}

impl Encode for BlobHeader {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u16(self.blob_type.to_u16().unwrap());
        dst.write_u16(cast_length!("blobLen", self.length)?);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for BlobHeader {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let blob_type = src.read_u16();
        let blob_type =
            BlobType::from_u16(blob_type).ok_or_else(|| invalid_field_err!("blobType", "invalid blob type"))?;

        let length = usize::from(src.read_u16());

        Ok(Self { blob_type, length })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdp_core::{decode, encode_vec};

    #[test]
    fn error_alert_roundtrip() {
        let pdu = LicensePdu::LicensingErrorMessage(LicensingErrorMessage {
            error_code: LicenseErrorCode::StatusValidClient,
            state_transition: LicensingStateTransition::NoTransition,
            error_info: Vec::new(),
        });

        let encoded = encode_vec(&pdu).unwrap();
        let decoded: LicensePdu = decode(&encoded).unwrap();
        assert_eq!(decoded, pdu);
    }
}
