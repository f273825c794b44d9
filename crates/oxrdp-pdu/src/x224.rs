use std::borrow::Cow;

use oxrdp_core::{
    cast_length, ensure_size, invalid_field_err, Decode, DecodeResult, Encode, EncodeResult, ReadCursor, WriteCursor,
};

use crate::tpdu::{TpduCode, TpduHeader};
use crate::tpkt::TpktHeader;

/// A PDU carried inside a TPKT + TPDU envelope.
///
/// Implementors only describe their body; the [`X224`] wrapper supplies the
/// framing when encoding or decoding.
pub trait X224Pdu<'de>: Sized {
    const X224_NAME: &'static str;

    const TPDU_CODE: TpduCode;

    fn x224_body_encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()>;

    fn x224_body_decode(src: &mut ReadCursor<'de>, tpkt: &TpktHeader, tpdu: &TpduHeader) -> DecodeResult<Self>;

    fn tpdu_header_variable_part_size(&self) -> usize;

    fn tpdu_user_data_size(&self) -> usize;
}

/// Newtype adding the TPKT/TPDU envelope around an [`X224Pdu`].
pub struct X224<T>(pub T);

impl<'de, T: X224Pdu<'de>> Encode for X224<T> {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        let packet_length = self.size();

        ensure_size!(ctx: T::X224_NAME, in: dst, size: packet_length);

        TpktHeader {
            packet_length: cast_length!(T::X224_NAME, "packetLength", packet_length)?,
        }
        .write(dst)?;

        TpduHeader {
            li: cast_length!(
                T::X224_NAME,
                "li",
                T::TPDU_CODE.header_fixed_part_size() + self.0.tpdu_header_variable_part_size() - 1
            )?,
            code: T::TPDU_CODE,
        }
        .write(dst)?;

        self.0.x224_body_encode(dst)
    }

    fn name(&self) -> &'static str {
        T::X224_NAME
    }

    fn size(&self) -> usize {
        TpktHeader::SIZE
            + T::TPDU_CODE.header_fixed_part_size()
            + self.0.tpdu_header_variable_part_size()
            + self.0.tpdu_user_data_size()
    }
}

impl<'de, T: X224Pdu<'de>> Decode<'de> for X224<T> {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        let tpkt = TpktHeader::read(src)?;

        ensure_size!(ctx: T::X224_NAME, in: src, size: tpkt.packet_length().saturating_sub(TpktHeader::SIZE));

        let tpdu = TpduHeader::read(src, &tpkt)?;
        tpdu.code.check_expected(T::TPDU_CODE)?;

        if tpdu.size() < tpdu.fixed_part_size() {
            return Err(invalid_field_err(
                TpduHeader::NAME,
                "li",
                "fixed part bigger than total header size",
            ));
        }

        T::x224_body_decode(src, &tpkt, &tpdu).map(X224)
    }
}

/// An X.224 data TPDU with an opaque payload.
pub struct X224Data<'a> {
    pub data: Cow<'a, [u8]>,
}

impl<'de> X224Pdu<'de> for X224Data<'de> {
    const X224_NAME: &'static str = "X.224 Data";

    const TPDU_CODE: TpduCode = TpduCode::DATA;

    fn x224_body_encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(ctx: Self::X224_NAME, in: dst, size: self.data.len());
        dst.write_slice(&self.data);

        Ok(())
    }

    fn x224_body_decode(src: &mut ReadCursor<'de>, tpkt: &TpktHeader, tpdu: &TpduHeader) -> DecodeResult<Self> {
        let user_data_size = user_data_size(tpkt, tpdu);

        ensure_size!(ctx: Self::X224_NAME, in: src, size: user_data_size);
        let data = src.read_slice(user_data_size);

        Ok(Self {
            data: Cow::Borrowed(data),
        })
    }

    fn tpdu_header_variable_part_size(&self) -> usize {
        0
    }

    fn tpdu_user_data_size(&self) -> usize {
        self.data.len()
    }
}

pub fn user_data_size(tpkt: &TpktHeader, tpdu: &TpduHeader) -> usize {
    tpkt.packet_length() - TpktHeader::SIZE - tpdu.size()
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdp_core::encode_vec;

    #[test]
    fn data_tpdu_framing_is_byte_exact() {
        let pdu = X224(X224Data {
            data: Cow::Borrowed(&[0x01, 0x02]),
        });

        let encoded = encode_vec(&pdu).unwrap();

        // TPKT header, then the constant 02 F0 80 data header.
        assert_eq!(encoded, [0x03, 0x00, 0x00, 0x09, 0x02, 0xF0, 0x80, 0x01, 0x02]);
    }

    #[test]
    fn empty_data_tpdu_header() {
        let pdu = X224(X224Data {
            data: Cow::Borrowed(&[]),
        });

        let encoded = encode_vec(&pdu).unwrap();

        assert_eq!(encoded[4..], [0x02, 0xF0, 0x80]);
    }

    #[test]
    fn data_tpdu_roundtrip() {
        let encoded = [0x03, 0x00, 0x00, 0x09, 0x02, 0xF0, 0x80, 0xAA, 0xBB];
        let decoded: X224<X224Data<'_>> = oxrdp_core::decode(&encoded).unwrap();
        assert_eq!(decoded.0.data.as_ref(), [0xAA, 0xBB]);
    }
}
