//! RDP wire formats.
//!
//! Every PDU implements the [`Encode`](oxrdp_core::Encode) and
//! [`Decode`](oxrdp_core::Decode) traits from `oxrdp-core`; nothing in this
//! crate performs I/O.

use oxrdp_core::{unexpected_message_type_err, DecodeError, DecodeResult, ReadCursor};

pub mod ber;
pub mod gcc;
pub mod geometry;
pub mod input;
pub mod mcs;
pub mod nego;
pub mod per;
pub mod rdp;
pub mod tpdu;
pub mod tpkt;
pub mod utf16;
pub mod x224;

mod basic_output;

pub use basic_output::{bitmap, fast_path, update};

/// Action bits of the first byte of an RDP frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Action {
    FastPath = 0x00,
    X224 = 0x03,
}

impl Action {
    pub fn from_fp_output_header(fp_output_header: u8) -> Result<Self, u8> {
        match fp_output_header & 0b11 {
            0x00 => Ok(Self::FastPath),
            0x03 => Ok(Self::X224),
            unknown_action_bits => Err(unknown_action_bits),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub action: Action,
    pub length: usize,
}

/// Classifies the next frame and computes its total length from the first
/// few bytes, without consuming anything.
///
/// Returns `Ok(None)` when more bytes are needed.
pub fn find_frame_size(bytes: &[u8]) -> DecodeResult<Option<FrameInfo>> {
    macro_rules! ensure_enough {
        ($bytes:expr, $len:expr) => {
            if $bytes.len() < $len {
                return Ok(None);
            }
        };
    }

    ensure_enough!(bytes, 1);

    let action = Action::from_fp_output_header(bytes[0])
        .map_err(|unknown| unexpected_message_type_err::<DecodeError>("frameHeader", unknown))?;

    match action {
        Action::X224 => {
            ensure_enough!(bytes, tpkt::TpktHeader::SIZE);
            let tpkt = tpkt::TpktHeader::read(&mut ReadCursor::new(bytes))?;

            Ok(Some(FrameInfo {
                action,
                length: tpkt.packet_length(),
            }))
        }
        Action::FastPath => {
            ensure_enough!(bytes, 2);
            let a = bytes[1];

            let length = if a & 0x80 != 0 {
                ensure_enough!(bytes, 3);
                let b = bytes[2];
                ((u16::from(a) & !0x80) << 8) | u16::from(b)
            } else {
                u16::from(a)
            };

            Ok(Some(FrameInfo {
                action,
                length: usize::from(length),
            }))
        }
    }
}

/// Hint used by transports to find frame boundaries during the connection
/// sequence, when the expected frame kind is known in advance.
pub trait PduHint: Send + Sync + core::fmt::Debug + 'static {
    fn find_size(&self, bytes: &[u8]) -> DecodeResult<Option<usize>>;
}

oxrdp_core::assert_obj_safe!(PduHint);

#[derive(Clone, Copy, Debug)]
pub struct X224Hint;

pub const X224_HINT: X224Hint = X224Hint;

impl PduHint for X224Hint {
    fn find_size(&self, bytes: &[u8]) -> DecodeResult<Option<usize>> {
        match find_frame_size(bytes)? {
            Some(info) => {
                debug_assert_eq!(info.action, Action::X224);
                Ok(Some(info.length))
            }
            None => Ok(None),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FastPathHint;

pub const FAST_PATH_HINT: FastPathHint = FastPathHint;

impl PduHint for FastPathHint {
    fn find_size(&self, bytes: &[u8]) -> DecodeResult<Option<usize>> {
        match find_frame_size(bytes)? {
            Some(info) => {
                debug_assert_eq!(info.action, Action::FastPath);
                Ok(Some(info.length))
            }
            None => Ok(None),
        }
    }
}
