//! PDUs of the connection initiation stage.

use bitflags::bitflags;
use oxrdp_core::{
    ensure_size, invalid_field_err, unexpected_message_type_err, DecodeResult, EncodeResult, ReadCursor, WriteCursor,
};

use crate::tpdu::{TpduCode, TpduHeader};
use crate::tpkt::TpktHeader;
use crate::x224::X224Pdu;

bitflags! {
    /// Security protocols negotiated during connection initiation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct SecurityProtocol: u32 {
        const RDP = 0x0000_0000;
        const SSL = 0x0000_0001;
        const HYBRID = 0x0000_0002;
        const HYBRID_EX = 0x0000_0008;
    }
}

impl SecurityProtocol {
    pub fn is_standard_rdp_security(self) -> bool {
        self == SecurityProtocol::RDP
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct RequestFlags: u8 {
        const RESTRICTED_ADMIN_MODE_REQUIRED = 0x01;
        const REDIRECTED_AUTHENTICATION_MODE_REQUIRED = 0x02;
        const CORRELATION_INFO_PRESENT = 0x08;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct ResponseFlags: u8 {
        const EXTENDED_CLIENT_DATA_SUPPORTED = 0x01;
        const DYNVC_GFX_PROTOCOL_SUPPORTED = 0x02;
        const RDP_NEG_RSP_RESERVED = 0x04;
        const RESTRICTED_ADMIN_MODE_SUPPORTED = 0x08;
        const REDIRECTED_AUTHENTICATION_MODE_SUPPORTED = 0x10;
    }
}

/// Negotiation failure code carried by a Connection Confirm of type 0x03.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FailureCode(u32);

impl FailureCode {
    pub const SSL_REQUIRED_BY_SERVER: Self = Self(1);
    pub const SSL_NOT_ALLOWED_BY_SERVER: Self = Self(2);
    pub const SSL_CERT_NOT_ON_SERVER: Self = Self(3);
    pub const INCONSISTENT_FLAGS: Self = Self(4);
    pub const HYBRID_REQUIRED_BY_SERVER: Self = Self(5);
    pub const SSL_WITH_USER_AUTH_REQUIRED_BY_SERVER: Self = Self(6);

    pub fn description(self) -> &'static str {
        match self {
            Self::SSL_REQUIRED_BY_SERVER => "TLS security required by server",
            Self::SSL_NOT_ALLOWED_BY_SERVER => "TLS security not allowed by server",
            Self::SSL_CERT_NOT_ON_SERVER => "no valid authentication certificate on server",
            Self::INCONSISTENT_FLAGS => "inconsistent negotiation flags",
            Self::HYBRID_REQUIRED_BY_SERVER => "CredSSP security required by server",
            Self::SSL_WITH_USER_AUTH_REQUIRED_BY_SERVER => "TLS with user authentication required by server",
            _ => "unknown negotiation failure",
        }
    }
}

impl From<u32> for FailureCode {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<FailureCode> for u32 {
    fn from(value: FailureCode) -> Self {
        value.0
    }
}

impl core::fmt::Display for FailureCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} (code {})", self.description(), self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct NegoMsgType(u8);

impl NegoMsgType {
    const REQUEST: Self = Self(0x01);
    const RESPONSE: Self = Self(0x02);
    const FAILURE: Self = Self(0x03);
}

impl From<u8> for NegoMsgType {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<NegoMsgType> for u8 {
    fn from(value: NegoMsgType) -> Self {
        value.0
    }
}

/// Routing cookie of the connection request (`Cookie: mstshash=<id>\r\n`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie(pub String);

impl Cookie {
    const PREFIX: &'static str = "Cookie: mstshash=";

    const NAME: &'static str = "Cookie";

    pub fn read(src: &mut ReadCursor<'_>) -> DecodeResult<Option<Self>> {
        if src.len() < Self::PREFIX.len() + 2 {
            return Ok(None);
        }

        if src.peek_slice(Self::PREFIX.len()) != Self::PREFIX.as_bytes() {
            return Ok(None);
        }

        src.advance(Self::PREFIX.len());

        let identifier_start = src.pos();

        while src.peek_u16() != 0x0A0D {
            src.advance(1);
            ensure_size!(ctx: Self::NAME, in: src, size: 2);
        }

        let identifier_end = src.pos();

        src.advance(2);

        let identifier = core::str::from_utf8(&src.inner()[identifier_start..identifier_end])
            .map_err(|_| invalid_field_err(Self::NAME, "identifier", "not valid UTF-8"))?
            .to_owned();

        Ok(Some(Self(identifier)))
    }

    pub fn write(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(ctx: Self::NAME, in: dst, size: self.size());

        dst.write_slice(Self::PREFIX.as_bytes());
        dst.write_slice(self.0.as_bytes());
        dst.write_u16(0x0A0D);

        Ok(())
    }

    pub fn size(&self) -> usize {
        Self::PREFIX.len() + self.0.len() + 2
    }
}

/// Client X.224 Connection Request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub cookie: Option<Cookie>,
    pub flags: RequestFlags,
    pub protocol: SecurityProtocol,
}

impl ConnectionRequest {
    const RDP_NEG_REQ_SIZE: u16 = 8;
}

impl<'de> X224Pdu<'de> for ConnectionRequest {
    const X224_NAME: &'static str = "Client X.224 Connection Request";

    const TPDU_CODE: TpduCode = TpduCode::CONNECTION_REQUEST;

    fn x224_body_encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        if let Some(cookie) = &self.cookie {
            cookie.write(dst)?;
        }

        if self.protocol != SecurityProtocol::RDP {
            dst.write_u8(u8::from(NegoMsgType::REQUEST));
            dst.write_u8(self.flags.bits());
            dst.write_u16(Self::RDP_NEG_REQ_SIZE);
            dst.write_u32(self.protocol.bits());
        }

        Ok(())
    }

    fn x224_body_decode(src: &mut ReadCursor<'de>, _: &TpktHeader, tpdu: &TpduHeader) -> DecodeResult<Self> {
        let variable_part_size = tpdu.variable_part_size();

        ensure_size!(ctx: Self::X224_NAME, in: src, size: variable_part_size);

        let cookie = Cookie::read(src)?;

        let Some(variable_part_rest_size) =
            variable_part_size.checked_sub(cookie.as_ref().map(Cookie::size).unwrap_or(0))
        else {
            return Err(invalid_field_err(
                Self::X224_NAME,
                "variablePart",
                "advertised size too small",
            ));
        };

        if variable_part_rest_size >= usize::from(Self::RDP_NEG_REQ_SIZE) {
            let msg_type = NegoMsgType::from(src.read_u8());

            if msg_type != NegoMsgType::REQUEST {
                return Err(unexpected_message_type_err(Self::X224_NAME, u8::from(msg_type)));
            }

            let flags = RequestFlags::from_bits_truncate(src.read_u8());
            let _length = src.read_u16();
            let protocol = SecurityProtocol::from_bits_truncate(src.read_u32());

            Ok(Self { cookie, flags, protocol })
        } else {
            Ok(Self {
                cookie,
                flags: RequestFlags::empty(),
                protocol: SecurityProtocol::RDP,
            })
        }
    }

    fn tpdu_header_variable_part_size(&self) -> usize {
        let cookie_size = self.cookie.as_ref().map(Cookie::size).unwrap_or(0);

        let rdp_neg_req_size = if self.protocol == SecurityProtocol::RDP {
            0
        } else {
            usize::from(Self::RDP_NEG_REQ_SIZE)
        };

        cookie_size + rdp_neg_req_size
    }

    fn tpdu_user_data_size(&self) -> usize {
        0
    }
}

/// Server X.224 Connection Confirm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionConfirm {
    Response {
        flags: ResponseFlags,
        protocol: SecurityProtocol,
    },
    Failure {
        code: FailureCode,
    },
}

impl ConnectionConfirm {
    const RDP_NEG_RSP_SIZE: u16 = 8;
}

impl<'de> X224Pdu<'de> for ConnectionConfirm {
    const X224_NAME: &'static str = "Server X.224 Connection Confirm";

    const TPDU_CODE: TpduCode = TpduCode::CONNECTION_CONFIRM;

    fn x224_body_encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        match self {
            ConnectionConfirm::Response { flags, protocol } => {
                dst.write_u8(u8::from(NegoMsgType::RESPONSE));
                dst.write_u8(flags.bits());
                dst.write_u16(Self::RDP_NEG_RSP_SIZE);
                dst.write_u32(protocol.bits());
            }
            ConnectionConfirm::Failure { code } => {
                dst.write_u8(u8::from(NegoMsgType::FAILURE));
                dst.write_u8(0);
                dst.write_u16(Self::RDP_NEG_RSP_SIZE);
                dst.write_u32(u32::from(*code));
            }
        }

        Ok(())
    }

    fn x224_body_decode(src: &mut ReadCursor<'de>, _: &TpktHeader, tpdu: &TpduHeader) -> DecodeResult<Self> {
        let variable_part_size = tpdu.variable_part_size();

        ensure_size!(ctx: Self::X224_NAME, in: src, size: variable_part_size);

        if variable_part_size > 0 {
            // message type (1) + flags (1) + length (2) + code / protocol (4)
            ensure_size!(ctx: Self::X224_NAME, in: src, size: 8);

            match NegoMsgType::from(src.read_u8()) {
                NegoMsgType::RESPONSE => {
                    let flags = ResponseFlags::from_bits_truncate(src.read_u8());
                    let _length = src.read_u16();
                    let protocol = SecurityProtocol::from_bits_truncate(src.read_u32());

                    Ok(Self::Response { flags, protocol })
                }
                NegoMsgType::FAILURE => {
                    let _flags = src.read_u8();
                    let _length = src.read_u16();
                    let code = FailureCode::from(src.read_u32());

                    Ok(Self::Failure { code })
                }
                unexpected => Err(unexpected_message_type_err(Self::X224_NAME, u8::from(unexpected))),
            }
        } else {
            Ok(Self::Response {
                flags: ResponseFlags::empty(),
                protocol: SecurityProtocol::RDP,
            })
        }
    }

    fn tpdu_header_variable_part_size(&self) -> usize {
        usize::from(Self::RDP_NEG_RSP_SIZE)
    }

    fn tpdu_user_data_size(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x224::X224;
    use oxrdp_core::{decode, encode_vec};

    #[test]
    fn connection_request_roundtrip() {
        let request = X224(ConnectionRequest {
            cookie: Some(Cookie("tester".to_owned())),
            flags: RequestFlags::empty(),
            protocol: SecurityProtocol::SSL | SecurityProtocol::HYBRID,
        });

        let encoded = encode_vec(&request).unwrap();
        let decoded: X224<ConnectionRequest> = decode(&encoded).unwrap();

        assert_eq!(decoded.0, request.0);
    }

    #[test]
    fn connection_request_negotiation_block() {
        let request = X224(ConnectionRequest {
            cookie: None,
            flags: RequestFlags::empty(),
            protocol: SecurityProtocol::SSL,
        });

        let encoded = encode_vec(&request).unwrap();

        // TPKT (4) + TPDU (7), then type 0x01, flags 0x00, length 0x0008, protocol mask
        assert_eq!(encoded.len(), 19);
        assert_eq!(encoded[11..], [0x01, 0x00, 0x08, 0x00, 0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn connection_confirm_failure() {
        let confirm = X224(ConnectionConfirm::Failure {
            code: FailureCode::SSL_NOT_ALLOWED_BY_SERVER,
        });

        let encoded = encode_vec(&confirm).unwrap();
        let decoded: X224<ConnectionConfirm> = decode(&encoded).unwrap();

        assert_eq!(decoded.0, confirm.0);
    }
}
