//! Byte-level encoding and decoding primitives shared by the oxrdp crates.

#[macro_use]
mod macros;

mod cursor;
mod decode;
mod encode;
mod error;
mod write_buf;

pub use cursor::{NotEnoughBytesError, ReadCursor, WriteCursor};
pub use decode::{decode, decode_cursor, Decode, DecodeError, DecodeErrorKind, DecodeResult};
pub use encode::{encode, encode_buf, encode_cursor, encode_vec, name, size, Encode, EncodeError, EncodeErrorKind, EncodeResult};
pub use error::{
    invalid_field_err, invalid_field_err_with_source, not_enough_bytes_err, other_err, other_err_with_source,
    unexpected_message_type_err, unsupported_version_err, Error, InvalidFieldErr, NotEnoughBytesErr, OtherErr,
    Source, UnexpectedMessageTypeErr, UnsupportedVersionErr, WithSource,
};
pub use write_buf::WriteBuf;
