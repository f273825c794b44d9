use core::fmt;

use crate::cursor::WriteCursor;
use crate::error::{
    Error, InvalidFieldErr, NotEnoughBytesErr, OtherErr, UnexpectedMessageTypeErr, UnsupportedVersionErr,
};
use crate::write_buf::WriteBuf;

pub type EncodeResult<T> = Result<T, EncodeError>;

pub type EncodeError = Error<EncodeErrorKind>;

#[non_exhaustive]
#[derive(Clone, Debug)]
pub enum EncodeErrorKind {
    NotEnoughBytes { received: usize, expected: usize },
    InvalidField { field: &'static str, reason: &'static str },
    UnexpectedMessageType { got: u8 },
    UnsupportedVersion { got: u8 },
    Other { description: &'static str },
}

impl std::error::Error for EncodeErrorKind {}

impl fmt::Display for EncodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotEnoughBytes { received, expected } => write!(
                f,
                "not enough bytes to encode: received {received} bytes, expected {expected} bytes"
            ),
            Self::InvalidField { field, reason } => write!(f, "invalid `{field}`: {reason}"),
            Self::UnexpectedMessageType { got } => write!(f, "invalid message type ({got})"),
            Self::UnsupportedVersion { got } => write!(f, "unsupported version ({got})"),
            Self::Other { description } => write!(f, "{description}"),
        }
    }
}

impl NotEnoughBytesErr for EncodeError {
    fn not_enough_bytes(context: &'static str, received: usize, expected: usize) -> Self {
        Self::new(context, EncodeErrorKind::NotEnoughBytes { received, expected })
    }
}

impl InvalidFieldErr for EncodeError {
    fn invalid_field(context: &'static str, field: &'static str, reason: &'static str) -> Self {
        Self::new(context, EncodeErrorKind::InvalidField { field, reason })
    }
}

impl UnexpectedMessageTypeErr for EncodeError {
    fn unexpected_message_type(context: &'static str, got: u8) -> Self {
        Self::new(context, EncodeErrorKind::UnexpectedMessageType { got })
    }
}

impl UnsupportedVersionErr for EncodeError {
    fn unsupported_version(context: &'static str, got: u8) -> Self {
        Self::new(context, EncodeErrorKind::UnsupportedVersion { got })
    }
}

impl OtherErr for EncodeError {
    fn other(context: &'static str, description: &'static str) -> Self {
        Self::new(context, EncodeErrorKind::Other { description })
    }
}

/// A PDU that can be encoded into its wire form.
///
/// Object-safe so that PDUs may be handled behind a `dyn` reference.
pub trait Encode {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()>;

    /// Name used as error context and in logs.
    fn name(&self) -> &'static str;

    /// Exact size in bytes of the encoded form.
    fn size(&self) -> usize;
}

crate::assert_obj_safe!(Encode);

/// Encodes `pdu` into `dst`, returning the number of bytes written.
pub fn encode<T: Encode + ?Sized>(pdu: &T, dst: &mut [u8]) -> EncodeResult<usize> {
    let mut cursor = WriteCursor::new(dst);
    encode_cursor(pdu, &mut cursor)?;
    Ok(cursor.pos())
}

pub fn encode_cursor<T: Encode + ?Sized>(pdu: &T, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
    pdu.encode(dst)
}

/// Same as [`encode`], but grows the buffer as needed.
pub fn encode_buf<T: Encode + ?Sized>(pdu: &T, buf: &mut WriteBuf) -> EncodeResult<usize> {
    let pdu_size = pdu.size();
    let dst = buf.unfilled_to(pdu_size);
    let written = encode(pdu, dst)?;
    debug_assert_eq!(written, pdu_size);
    buf.advance(written);
    Ok(written)
}

/// Same as [`encode`], but allocates a fresh buffer of the exact size.
pub fn encode_vec<T: Encode + ?Sized>(pdu: &T) -> EncodeResult<Vec<u8>> {
    let pdu_size = pdu.size();
    let mut buf = vec![0; pdu_size];
    let written = encode(pdu, buf.as_mut_slice())?;
    debug_assert_eq!(written, pdu_size);
    Ok(buf)
}

pub fn name<T: Encode>(pdu: &T) -> &'static str {
    pdu.name()
}

pub fn size<T: Encode>(pdu: &T) -> usize {
    pdu.size()
}
