//! Helpers shared by the connection sequences and the active session for
//! moving PDUs through the MCS + security layering.

use std::borrow::Cow;

use oxrdp_core::{decode, encode_buf, encode_vec, Decode, Encode, WriteBuf};
use oxrdp_pdu::mcs::{McsMessage, SendDataRequest};
use oxrdp_pdu::rdp::headers::{
    BasicSecurityHeaderFlags, ShareControlHeader, ShareControlPdu, ShareDataHeader, ShareDataPdu, StreamPriority,
    BASIC_SECURITY_HEADER_SIZE,
};
use oxrdp_pdu::x224::X224;
use oxrdp_security::SecurityContext;

use crate::{ConnectorError, ConnectorErrorExt as _, ConnectorResult};

/// Encodes `user_msg` into an MCS Send-Data-Request with the X.224/TPKT
/// envelope, RC4-sealing it when a security context is active.
///
/// `header_flags` selects the basic security header: pass `None` for share
/// PDUs (headerless unless encryption is on), or the INFO/LICENSE/EXCHANGE
/// flag for the PDUs that always carry one.
pub fn encode_send_data_request<T: Encode>(
    initiator_id: u16,
    channel_id: u16,
    user_msg: &T,
    header_flags: Option<BasicSecurityHeaderFlags>,
    security: Option<&mut SecurityContext>,
    buf: &mut WriteBuf,
) -> ConnectorResult<usize> {
    let payload = encode_vec(user_msg).map_err(ConnectorError::encode)?;
    let user_data = seal_user_data(payload, header_flags, security);

    let pdu = SendDataRequest {
        initiator_id,
        channel_id,
        user_data: Cow::Owned(user_data),
    };

    let written = encode_buf(&X224(pdu), buf).map_err(ConnectorError::encode)?;

    Ok(written)
}

/// Applies the basic security header and RC4 sealing to a payload.
fn seal_user_data(
    payload: Vec<u8>,
    header_flags: Option<BasicSecurityHeaderFlags>,
    security: Option<&mut SecurityContext>,
) -> Vec<u8> {
    let (flags, body) = match security {
        Some(ctx) => (
            Some(header_flags.unwrap_or(BasicSecurityHeaderFlags::empty()) | BasicSecurityHeaderFlags::ENCRYPT),
            ctx.encrypt_payload(&payload),
        ),
        None => (header_flags, payload),
    };

    match flags {
        Some(flags) => {
            let mut out = Vec::with_capacity(BASIC_SECURITY_HEADER_SIZE + body.len());
            out.extend_from_slice(&flags.bits().to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&body);
            out
        }
        None => body,
    }
}

/// A received MCS Send-Data-Indication with its addressing.
#[derive(Debug, Clone)]
pub struct SendDataIndicationCtx<'a> {
    pub initiator_id: u16,
    pub channel_id: u16,
    pub user_data: Cow<'a, [u8]>,
}

impl SendDataIndicationCtx<'_> {
    pub fn decode_user_data<T>(&self) -> ConnectorResult<T>
    where
        for<'de> T: Decode<'de>,
    {
        decode::<T>(self.user_data.as_ref()).map_err(ConnectorError::decode)
    }
}

/// Decodes a Send-Data-Indication frame. A Disconnect-Provider-Ultimatum in
/// its place is surfaced as an error carrying the reason.
pub fn decode_send_data_indication(src: &[u8]) -> ConnectorResult<SendDataIndicationCtx<'_>> {
    let mcs_msg = decode::<X224<McsMessage<'_>>>(src).map_err(ConnectorError::decode)?;

    match mcs_msg.0 {
        McsMessage::SendDataIndication(msg) => Ok(SendDataIndicationCtx {
            initiator_id: msg.initiator_id,
            channel_id: msg.channel_id,
            user_data: msg.user_data,
        }),
        McsMessage::DisconnectProviderUltimatum(msg) => Err(reason_err!(
            "decode_send_data_indication",
            "server disconnected: {}",
            msg.reason
        )),
        _ => Err(general_err!("unexpected MCS message")),
    }
}

/// Strips the basic security header expected on licensing payloads and
/// decrypts the body when the header says so.
pub fn decode_license_payload(
    ctx: &SendDataIndicationCtx<'_>,
    security: Option<&mut SecurityContext>,
) -> ConnectorResult<(BasicSecurityHeaderFlags, Vec<u8>)> {
    let data = ctx.user_data.as_ref();

    if data.len() < BASIC_SECURITY_HEADER_SIZE {
        return Err(general_err!("license payload shorter than its security header"));
    }

    let flags = BasicSecurityHeaderFlags::from_bits_truncate(u16::from_le_bytes([data[0], data[1]]));
    let body = &data[BASIC_SECURITY_HEADER_SIZE..];

    let body = if flags.contains(BasicSecurityHeaderFlags::ENCRYPT) {
        let ctx = security.ok_or_else(|| general_err!("encrypted license payload without a security context"))?;
        ctx.decrypt_payload(body).map_err(ConnectorError::security)?
    } else {
        body.to_vec()
    };

    Ok((flags, body))
}

/// Strips the security layering (when active) off a share-channel payload.
pub fn decode_share_payload(
    ctx: &SendDataIndicationCtx<'_>,
    security: Option<&mut SecurityContext>,
) -> ConnectorResult<Vec<u8>> {
    let data = ctx.user_data.as_ref();

    match security {
        Some(security_ctx) => {
            if data.len() < BASIC_SECURITY_HEADER_SIZE {
                return Err(general_err!("payload shorter than its security header"));
            }

            let flags = BasicSecurityHeaderFlags::from_bits_truncate(u16::from_le_bytes([data[0], data[1]]));
            let body = &data[BASIC_SECURITY_HEADER_SIZE..];

            if flags.contains(BasicSecurityHeaderFlags::ENCRYPT) {
                security_ctx.decrypt_payload(body).map_err(ConnectorError::security)
            } else {
                Ok(body.to_vec())
            }
        }
        None => Ok(data.to_vec()),
    }
}

/// Encodes a share control PDU down through MCS.
pub fn encode_share_control(
    initiator_id: u16,
    channel_id: u16,
    share_id: u32,
    pdu: ShareControlPdu,
    security: Option<&mut SecurityContext>,
    buf: &mut WriteBuf,
) -> ConnectorResult<usize> {
    let share_control_header = ShareControlHeader {
        share_control_pdu: pdu,
        pdu_source: initiator_id,
        share_id,
    };

    encode_send_data_request(initiator_id, channel_id, &share_control_header, None, security, buf)
}

/// Encodes a share data PDU down through MCS.
pub fn encode_share_data(
    initiator_id: u16,
    channel_id: u16,
    share_id: u32,
    pdu: ShareDataPdu,
    security: Option<&mut SecurityContext>,
    buf: &mut WriteBuf,
) -> ConnectorResult<usize> {
    encode_share_control(
        initiator_id,
        channel_id,
        share_id,
        ShareControlPdu::Data(ShareDataHeader {
            share_data_pdu: pdu,
            stream_priority: StreamPriority::Low,
        }),
        security,
        buf,
    )
}

/// A decoded share control PDU with its addressing context.
#[derive(Debug, Clone)]
pub struct ShareControlCtx {
    pub initiator_id: u16,
    pub channel_id: u16,
    pub share_id: u32,
    pub pdu_source: u16,
    pub pdu: ShareControlPdu,
}

pub fn decode_share_control(
    ctx: SendDataIndicationCtx<'_>,
    security: Option<&mut SecurityContext>,
) -> ConnectorResult<ShareControlCtx> {
    let payload = decode_share_payload(&ctx, security)?;
    let header = decode::<ShareControlHeader>(&payload).map_err(ConnectorError::decode)?;

    Ok(ShareControlCtx {
        initiator_id: ctx.initiator_id,
        channel_id: ctx.channel_id,
        share_id: header.share_id,
        pdu_source: header.pdu_source,
        pdu: header.share_control_pdu,
    })
}

/// A decoded share data PDU with its addressing context.
#[derive(Debug, Clone)]
pub struct ShareDataCtx {
    pub initiator_id: u16,
    pub channel_id: u16,
    pub share_id: u32,
    pub pdu: ShareDataPdu,
}

pub fn decode_share_data(
    ctx: SendDataIndicationCtx<'_>,
    security: Option<&mut SecurityContext>,
) -> ConnectorResult<ShareDataCtx> {
    let share_control = decode_share_control(ctx, security)?;

    let ShareControlPdu::Data(header) = share_control.pdu else {
        return Err(general_err!("expected a share data PDU"));
    };

    Ok(ShareDataCtx {
        initiator_id: share_control.initiator_id,
        channel_id: share_control.channel_id,
        share_id: share_control.share_id,
        pdu: header.share_data_pdu,
    })
}

/// Encodes a PDU inside a plain X.224 data TPDU (used for the MCS connect
/// pair, which travels outside Send-Data-Requests).
pub fn encode_x224_packet<T: Encode>(pdu: &T, buf: &mut WriteBuf) -> ConnectorResult<usize> {
    let payload = encode_vec(pdu).map_err(ConnectorError::encode)?;

    let written = encode_buf(
        &X224(oxrdp_pdu::x224::X224Data {
            data: Cow::Owned(payload),
        }),
        buf,
    )
    .map_err(ConnectorError::encode)?;

    Ok(written)
}

/// Decodes a PDU from a plain X.224 data TPDU.
pub fn decode_x224_packet<T>(src: &[u8]) -> ConnectorResult<T>
where
    for<'de> T: Decode<'de>,
{
    let data = decode::<X224<oxrdp_pdu::x224::X224Data<'_>>>(src).map_err(ConnectorError::decode)?;
    decode::<T>(data.0.data.as_ref()).map_err(ConnectorError::decode)
}
