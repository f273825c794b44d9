use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive as _, ToPrimitive as _};
use oxrdp_core::{ensure_size, invalid_field_err, Decode, DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor};

use super::{BlobHeader, BlobType};

/// LICENSE_ERROR_MESSAGE body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicensingErrorMessage {
    pub error_code: LicenseErrorCode,
    pub state_transition: LicensingStateTransition,
    pub error_info: Vec<u8>,
}

impl LicensingErrorMessage {
    const NAME: &'static str = "LicensingErrorMessage";

    const FIXED_PART_SIZE: usize = 4 /* errorCode */ + 4 /* stateTransition */;

    /// STATUS_VALID_CLIENT with no state transition is the server saying
    /// that no license is needed; it is a success, not an error.
    pub fn is_valid_client(&self) -> bool {
        self.error_code == LicenseErrorCode::StatusValidClient
            && self.state_transition == LicensingStateTransition::NoTransition
    }
}

impl Encode for LicensingErrorMessage {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32(self.error_code.to_u32().unwrap());
        dst.write_u32(self.state_transition.to_u32().unwrap());

        BlobHeader::new(BlobType::Error, self.error_info.len()).encode(dst)?;
        dst.write_slice(&self.error_info);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE + BlobHeader::FIXED_PART_SIZE + self.error_info.len()
    }
}

impl<'de> Decode<'de> for LicensingErrorMessage {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_size!(in: src, size: Self::FIXED_PART_SIZE);

        let error_code = LicenseErrorCode::from_u32(src.read_u32())
            .ok_or_else(|| invalid_field_err!("errorCode", "invalid license error code"))?;
        let state_transition = LicensingStateTransition::from_u32(src.read_u32())
            .ok_or_else(|| invalid_field_err!("stateTransition", "invalid state transition"))?;

        // The error info blob is absent in some server implementations.
        let error_info = if src.len() >= BlobHeader::FIXED_PART_SIZE {
            let blob = BlobHeader::decode(src)?;
            ensure_size!(in: src, size: blob.length);
            src.read_slice(blob.length).to_vec()
        } else {
            Vec::new()
        };

        Ok(Self {
            error_code,
            state_transition,
            error_info,
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum LicenseErrorCode {
    InvalidServerCertificate = 0x01,
    NoLicense = 0x02,
    InvalidMac = 0x03,
    InvalidScope = 0x04,
    NoLicenseServer = 0x06,
    StatusValidClient = 0x07,
    InvalidClient = 0x08,
    InvalidProductId = 0x0B,
    InvalidMessageLen = 0x0C,
    InvalidFieldData = 0x0D,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum LicensingStateTransition {
    TotalAbort = 1,
    NoTransition = 2,
    ResetPhaseToStart = 3,
    ResendLastMessage = 4,
}
