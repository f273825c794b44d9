//! The slow-path (X.224) receive pipeline for an active session.

use oxrdp_core::decode;
use oxrdp_pdu::bitmap::BitmapUpdateData;
use oxrdp_pdu::mcs::McsMessage;
use oxrdp_pdu::rdp::headers::{ShareControlHeader, ShareControlPdu, ShareDataPdu};
use oxrdp_pdu::update::SlowPathUpdateType;
use oxrdp_pdu::x224::X224;
use oxrdp_security::SecurityContext;

use crate::active_stage::{ActiveStageOutput, GracefulDisconnectReason};
use crate::fast_path::decode_bitmap_rectangles;
use crate::{SessionError, SessionErrorExt as _, SessionResult};

pub struct Processor {
    io_channel_id: u16,
}

impl Processor {
    pub fn new(io_channel_id: u16) -> Self {
        Self { io_channel_id }
    }

    /// Processes one X.224 frame received after the connection sequence.
    pub fn process(
        &mut self,
        frame: &[u8],
        security: Option<&mut SecurityContext>,
    ) -> SessionResult<Vec<ActiveStageOutput>> {
        let mcs_msg: X224<McsMessage<'_>> = decode(frame).map_err(SessionError::decode)?;

        match mcs_msg.0 {
            McsMessage::SendDataIndication(indication) => {
                if indication.channel_id != self.io_channel_id {
                    // Static virtual channel traffic: accepted and dropped,
                    // no channel processors are registered.
                    debug!(channel_id = indication.channel_id, "Ignoring static channel data");
                    return Ok(Vec::new());
                }

                let ctx = oxrdp_connector::codec::SendDataIndicationCtx {
                    initiator_id: indication.initiator_id,
                    channel_id: indication.channel_id,
                    user_data: indication.user_data,
                };

                let payload =
                    oxrdp_connector::codec::decode_share_payload(&ctx, security).map_err(SessionError::connector)?;

                let header: ShareControlHeader = decode(&payload).map_err(SessionError::decode)?;

                self.process_share_control(header.share_control_pdu)
            }
            McsMessage::DisconnectProviderUltimatum(ultimatum) => Ok(vec![ActiveStageOutput::Disconnect(
                GracefulDisconnectReason::from_mcs_reason(ultimatum.reason),
            )]),
            _ => {
                debug!("Ignoring an unexpected MCS message");
                Ok(Vec::new())
            }
        }
    }

    fn process_share_control(&mut self, pdu: ShareControlPdu) -> SessionResult<Vec<ActiveStageOutput>> {
        match pdu {
            ShareControlPdu::Data(header) => self.process_share_data(header.share_data_pdu),
            ShareControlPdu::ServerDeactivateAll => {
                // Deactivation-reactivation is not carried out; the session
                // keeps going until the server disconnects.
                debug!("Received Server Deactivate All");
                Ok(Vec::new())
            }
            other => {
                debug!(pdu = other.as_short_name(), "Ignoring a share control PDU");
                Ok(Vec::new())
            }
        }
    }

    fn process_share_data(&mut self, pdu: ShareDataPdu) -> SessionResult<Vec<ActiveStageOutput>> {
        match pdu {
            ShareDataPdu::Update(update) => {
                if update.update_type == SlowPathUpdateType::Bitmap {
                    let bitmap_update: BitmapUpdateData<'_> = decode(&update.data).map_err(SessionError::decode)?;
                    let updates = decode_bitmap_rectangles(bitmap_update)?;

                    if updates.is_empty() {
                        Ok(Vec::new())
                    } else {
                        Ok(vec![ActiveStageOutput::BitmapUpdates(updates)])
                    }
                } else {
                    trace!(update_type = ?update.update_type, "Ignoring a slow-path update");
                    Ok(Vec::new())
                }
            }
            ShareDataPdu::SaveSessionInfo(_) => {
                debug!("Received Save Session Info");
                Ok(Vec::new())
            }
            ShareDataPdu::ServerSetErrorInfo(pdu) => {
                if pdu.0.is_error() {
                    Err(SessionError::reason("ServerSetErrorInfo", pdu.0.to_string()))
                } else {
                    Ok(Vec::new())
                }
            }
            ShareDataPdu::ShutdownDenied => {
                debug!("Received Shutdown Denied");
                Ok(vec![ActiveStageOutput::Disconnect(GracefulDisconnectReason::UserInitiated)])
            }
            other => {
                debug!(pdu = other.as_short_name(), "Ignoring a share data PDU");
                Ok(Vec::new())
            }
        }
    }
}
