use oxrdp_core::{ensure_fixed_part_size, Decode, DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor};

/// TS_SET_ERROR_INFO_PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSetErrorInfoPdu(pub ErrorInfo);

impl ServerSetErrorInfoPdu {
    const NAME: &'static str = "ServerSetErrorInfoPdu";

    const FIXED_PART_SIZE: usize = 4;
}

impl Encode for ServerSetErrorInfoPdu {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_fixed_part_size!(in: dst);

        dst.write_u32(self.0 .0);

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        Self::FIXED_PART_SIZE
    }
}

impl<'de> Decode<'de> for ServerSetErrorInfoPdu {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        Ok(Self(ErrorInfo(src.read_u32())))
    }
}

/// Protocol-independent and server-specific error codes reported through the
/// Set Error Info PDU. Only the codes the client reacts to are named; the
/// rest are reported numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorInfo(pub u32);

impl ErrorInfo {
    pub const NONE: Self = Self(0x0000_0000);
    pub const RPC_INITIATED_DISCONNECT: Self = Self(0x0000_0001);
    pub const RPC_INITIATED_LOGOFF: Self = Self(0x0000_0002);
    pub const IDLE_TIMEOUT: Self = Self(0x0000_0003);
    pub const LOGON_TIMEOUT: Self = Self(0x0000_0004);
    pub const DISCONNECTED_BY_OTHER_CONNECTION: Self = Self(0x0000_0005);
    pub const OUT_OF_MEMORY: Self = Self(0x0000_0006);
    pub const SERVER_DENIED_CONNECTION: Self = Self(0x0000_0007);
    pub const SERVER_INSUFFICIENT_PRIVILEGES: Self = Self(0x0000_0009);
    pub const SERVER_FRESH_CREDENTIALS_REQUIRED: Self = Self(0x0000_000A);
    pub const RPC_INITIATED_DISCONNECT_BY_USER: Self = Self(0x0000_000B);
    pub const LOGOFF_BY_USER: Self = Self(0x0000_000C);

    pub fn is_error(self) -> bool {
        self != Self::NONE
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::NONE => "no error",
            Self::RPC_INITIATED_DISCONNECT => "the disconnection was initiated by an administrative tool",
            Self::RPC_INITIATED_LOGOFF => "the disconnection was due to a forced logoff",
            Self::IDLE_TIMEOUT => "the idle session limit timer expired",
            Self::LOGON_TIMEOUT => "the active session limit timer expired",
            Self::DISCONNECTED_BY_OTHER_CONNECTION => "another user connected to the session",
            Self::OUT_OF_MEMORY => "the server ran out of available memory resources",
            Self::SERVER_DENIED_CONNECTION => "the server denied the connection",
            Self::SERVER_INSUFFICIENT_PRIVILEGES => "insufficient privileges for the connection",
            Self::SERVER_FRESH_CREDENTIALS_REQUIRED => "fresh credentials are required",
            Self::RPC_INITIATED_DISCONNECT_BY_USER => "the disconnection was initiated by the user",
            Self::LOGOFF_BY_USER => "the user logged off",
            _ => "unrecognized server error",
        }
    }
}

impl core::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} (0x{:08X})", self.description(), self.0)
    }
}
