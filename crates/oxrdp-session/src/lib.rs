//! Post-connection processing: turning received frames into bitmap updates
//! and client input into slow-path input PDUs.

#[macro_use]
extern crate tracing;

pub mod fast_path;
pub mod x224;

mod active_stage;

use core::fmt;

pub use active_stage::{ActiveStage, ActiveStageOutput, BitmapUpdate, GracefulDisconnectReason};

pub type SessionResult<T> = Result<T, SessionError>;

#[non_exhaustive]
#[derive(Debug)]
pub enum SessionErrorKind {
    Encode(oxrdp_core::EncodeError),
    Decode(oxrdp_core::DecodeError),
    Security(oxrdp_security::SecurityError),
    Connector(oxrdp_connector::ConnectorError),
    Rle(oxrdp_graphics::rle::RleError),
    Reason(String),
    General,
}

impl fmt::Display for SessionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SessionErrorKind::Encode(_) => write!(f, "encode error"),
            SessionErrorKind::Decode(_) => write!(f, "decode error"),
            SessionErrorKind::Security(_) => write!(f, "security error"),
            SessionErrorKind::Connector(_) => write!(f, "connector error"),
            SessionErrorKind::Rle(_) => write!(f, "bitmap decompression error"),
            SessionErrorKind::Reason(description) => write!(f, "reason: {description}"),
            SessionErrorKind::General => write!(f, "general error"),
        }
    }
}

impl std::error::Error for SessionErrorKind {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self {
            SessionErrorKind::Encode(e) => Some(e),
            SessionErrorKind::Decode(e) => Some(e),
            SessionErrorKind::Security(e) => Some(e),
            SessionErrorKind::Connector(e) => Some(e),
            SessionErrorKind::Rle(e) => Some(e),
            _ => None,
        }
    }
}

pub type SessionError = oxrdp_core::Error<SessionErrorKind>;

pub trait SessionErrorExt {
    fn encode(error: oxrdp_core::EncodeError) -> Self;
    fn decode(error: oxrdp_core::DecodeError) -> Self;
    fn security(error: oxrdp_security::SecurityError) -> Self;
    fn connector(error: oxrdp_connector::ConnectorError) -> Self;
    fn rle(error: oxrdp_graphics::rle::RleError) -> Self;
    fn general(context: &'static str) -> Self;
    fn reason(context: &'static str, reason: impl Into<String>) -> Self;
}

impl SessionErrorExt for SessionError {
    fn encode(error: oxrdp_core::EncodeError) -> Self {
        Self::new("payload error", SessionErrorKind::Encode(error))
    }

    fn decode(error: oxrdp_core::DecodeError) -> Self {
        Self::new("payload error", SessionErrorKind::Decode(error))
    }

    fn security(error: oxrdp_security::SecurityError) -> Self {
        Self::new("session crypto", SessionErrorKind::Security(error))
    }

    fn connector(error: oxrdp_connector::ConnectorError) -> Self {
        Self::new("connector helper", SessionErrorKind::Connector(error))
    }

    fn rle(error: oxrdp_graphics::rle::RleError) -> Self {
        Self::new("bitmap decompression", SessionErrorKind::Rle(error))
    }

    fn general(context: &'static str) -> Self {
        Self::new(context, SessionErrorKind::General)
    }

    fn reason(context: &'static str, reason: impl Into<String>) -> Self {
        Self::new(context, SessionErrorKind::Reason(reason.into()))
    }
}
