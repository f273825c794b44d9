//! The RDP connection sequence, expressed as resumable state machines.
//!
//! Every sequence implements [`Sequence`]: the transport reads the frame the
//! current state asks for (via [`Sequence::next_pdu_hint`]), feeds it to
//! [`Sequence::step`] and writes back whatever the step produced. No I/O
//! happens inside the state machines themselves.

#[macro_use]
extern crate tracing;

#[macro_use]
mod macros;

pub mod codec;

mod channel_connection;
mod connection;
mod connection_finalization;
mod license_exchange;

use core::any::Any;
use core::fmt;

use oxrdp_pdu::{gcc, nego, PduHint};

pub use channel_connection::{ChannelConnectionSequence, ChannelConnectionState};
pub use connection::{ClientConnector, ClientConnectorState, ConnectionResult, ServerSecurityInfo};
pub use connection_finalization::{ConnectionFinalizationSequence, ConnectionFinalizationState};
pub use license_exchange::{LicenseExchangeSequence, LicenseExchangeState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesktopSize {
    pub width: u16,
    pub height: u16,
}

/// Everything the connection sequence needs to know up front.
#[derive(Debug, Clone)]
pub struct Config {
    pub desktop_size: DesktopSize,
    pub security_protocol: nego::SecurityProtocol,
    pub username: String,
    pub password: String,
    pub domain: Option<String>,
    /// Build number advertised in the client core data.
    pub client_build: u32,
    /// Client computer name; truncated to 15 characters on the wire.
    pub client_name: String,
    pub keyboard_type: gcc::KeyboardType,
    pub keyboard_subtype: u32,
    pub keyboard_functional_keys_count: u32,
    pub ime_file_name: String,
    pub dig_product_id: String,
    /// Static virtual channels to announce in the GCC network block; ids
    /// are assigned by the server and joined during channel connection.
    pub static_channels: Vec<String>,
}

impl Config {
    pub fn new(desktop_size: DesktopSize, username: String, password: String, domain: Option<String>) -> Self {
        Self {
            desktop_size,
            security_protocol: nego::SecurityProtocol::SSL | nego::SecurityProtocol::HYBRID,
            username,
            password,
            domain,
            client_build: 2600,
            client_name: "oxrdp".to_owned(),
            keyboard_type: gcc::KeyboardType::IbmEnhanced,
            keyboard_subtype: 0,
            keyboard_functional_keys_count: 12,
            ime_file_name: String::new(),
            dig_product_id: String::new(),
            static_channels: Vec::new(),
        }
    }
}

/// A state of a connection sequence.
pub trait State: Send + core::fmt::Debug {
    fn name(&self) -> &'static str;
    fn is_terminal(&self) -> bool;
    fn as_any(&self) -> &dyn Any;
}

oxrdp_core::assert_obj_safe!(State);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Written {
    Nothing,
    Size(core::num::NonZeroUsize),
}

impl Written {
    #[inline]
    pub fn from_size(value: usize) -> ConnectorResult<Self> {
        core::num::NonZeroUsize::new(value)
            .map(Self::Size)
            .ok_or_else(|| general_err!("invalid written length (cannot be zero)"))
    }

    #[inline]
    pub fn is_nothing(self) -> bool {
        matches!(self, Self::Nothing)
    }

    #[inline]
    pub fn size(self) -> Option<usize> {
        if let Self::Size(size) = self {
            Some(size.get())
        } else {
            None
        }
    }
}

/// A resumable sub-sequence of the connection procedure.
pub trait Sequence: Send {
    /// The frame kind the current state is waiting for, or `None` when the
    /// next step produces output without input.
    fn next_pdu_hint(&self) -> Option<&dyn PduHint>;

    fn state(&self) -> &dyn State;

    fn step(&mut self, input: &[u8], output: &mut oxrdp_core::WriteBuf) -> ConnectorResult<Written>;

    fn step_no_input(&mut self, output: &mut oxrdp_core::WriteBuf) -> ConnectorResult<Written> {
        self.step(&[], output)
    }
}

oxrdp_core::assert_obj_safe!(Sequence);

pub type ConnectorResult<T> = Result<T, ConnectorError>;

#[non_exhaustive]
#[derive(Debug)]
pub enum ConnectorErrorKind {
    Encode(oxrdp_core::EncodeError),
    Decode(oxrdp_core::DecodeError),
    Security(oxrdp_security::SecurityError),
    Negotiation(nego::FailureCode),
    Reason(String),
    General,
    Custom,
}

impl fmt::Display for ConnectorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            ConnectorErrorKind::Encode(_) => write!(f, "encode error"),
            ConnectorErrorKind::Decode(_) => write!(f, "decode error"),
            ConnectorErrorKind::Security(_) => write!(f, "security error"),
            ConnectorErrorKind::Negotiation(code) => write!(f, "negotiation failure: {code}"),
            ConnectorErrorKind::Reason(description) => write!(f, "reason: {description}"),
            ConnectorErrorKind::General => write!(f, "general error"),
            ConnectorErrorKind::Custom => write!(f, "custom error"),
        }
    }
}

impl std::error::Error for ConnectorErrorKind {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self {
            ConnectorErrorKind::Encode(e) => Some(e),
            ConnectorErrorKind::Decode(e) => Some(e),
            ConnectorErrorKind::Security(e) => Some(e),
            _ => None,
        }
    }
}

pub type ConnectorError = oxrdp_core::Error<ConnectorErrorKind>;

pub trait ConnectorErrorExt {
    fn encode(error: oxrdp_core::EncodeError) -> Self;
    fn decode(error: oxrdp_core::DecodeError) -> Self;
    fn security(error: oxrdp_security::SecurityError) -> Self;
    fn general(context: &'static str) -> Self;
    fn reason(context: &'static str, reason: impl Into<String>) -> Self;
    fn custom<E>(context: &'static str, e: E) -> Self
    where
        E: std::error::Error + Sync + Send + 'static;
}

impl ConnectorErrorExt for ConnectorError {
    fn encode(error: oxrdp_core::EncodeError) -> Self {
        Self::new("invalid payload", ConnectorErrorKind::Encode(error))
    }

    fn decode(error: oxrdp_core::DecodeError) -> Self {
        Self::new("invalid payload", ConnectorErrorKind::Decode(error))
    }

    fn security(error: oxrdp_security::SecurityError) -> Self {
        Self::new("session crypto", ConnectorErrorKind::Security(error))
    }

    fn general(context: &'static str) -> Self {
        Self::new(context, ConnectorErrorKind::General)
    }

    fn reason(context: &'static str, reason: impl Into<String>) -> Self {
        Self::new(context, ConnectorErrorKind::Reason(reason.into()))
    }

    fn custom<E>(context: &'static str, e: E) -> Self
    where
        E: std::error::Error + Sync + Send + 'static,
    {
        Self::new(context, ConnectorErrorKind::Custom).with_source(e)
    }
}
