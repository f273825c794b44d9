use oxrdp_connector::codec;
use oxrdp_connector::ConnectionResult;
use oxrdp_core::WriteBuf;
use oxrdp_pdu::geometry::InclusiveRectangle;
use oxrdp_pdu::input::{InputEvent, InputEventPdu};
use oxrdp_pdu::mcs::DisconnectReason;
use oxrdp_pdu::rdp::headers::ShareDataPdu;
use oxrdp_pdu::Action;
use oxrdp_security::SecurityContext;

use crate::{fast_path, x224, SessionError, SessionErrorExt as _, SessionResult};

/// One decoded screen rectangle ready for the caller's frame buffer.
///
/// Decompressed rectangles (`top_down == true`) are row-major
/// top-to-bottom; uncompressed wire bitmaps keep their bottom-up order.
#[derive(Debug, Clone)]
pub struct BitmapUpdate {
    pub rectangle: InclusiveRectangle,
    pub width: u16,
    pub height: u16,
    pub bits_per_pixel: u16,
    pub top_down: bool,
    pub data: Vec<u8>,
}

/// Why the session ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GracefulDisconnectReason {
    UserInitiated,
    ServerInitiated,
    Other(&'static str),
}

impl GracefulDisconnectReason {
    pub(crate) fn from_mcs_reason(reason: DisconnectReason) -> Self {
        match reason {
            DisconnectReason::UserRequested => Self::UserInitiated,
            DisconnectReason::ProviderInitiated => Self::ServerInitiated,
            _ => Self::Other(reason.description()),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::UserInitiated => "user-initiated disconnect",
            Self::ServerInitiated => "server-initiated disconnect",
            Self::Other(description) => description,
        }
    }
}

#[derive(Debug)]
pub enum ActiveStageOutput {
    BitmapUpdates(Vec<BitmapUpdate>),
    Disconnect(GracefulDisconnectReason),
}

/// Drives an established session: decodes incoming frames and encodes
/// outgoing input events, sharing one security context across the slow and
/// fast paths.
pub struct ActiveStage {
    x224_processor: x224::Processor,
    fast_path_processor: fast_path::Processor,
    security: Option<SecurityContext>,
    io_channel_id: u16,
    user_channel_id: u16,
    share_id: u32,
}

impl ActiveStage {
    pub fn new(connection_result: ConnectionResult) -> Self {
        Self {
            x224_processor: x224::Processor::new(connection_result.io_channel_id),
            fast_path_processor: fast_path::Processor::new(),
            security: connection_result.security,
            io_channel_id: connection_result.io_channel_id,
            user_channel_id: connection_result.user_channel_id,
            share_id: connection_result.share_id,
        }
    }

    /// Processes one frame received from the server.
    pub fn process(&mut self, action: Action, frame: &[u8]) -> SessionResult<Vec<ActiveStageOutput>> {
        match action {
            Action::FastPath => {
                let updates = self.fast_path_processor.process(frame, self.security.as_mut())?;

                if updates.is_empty() {
                    Ok(Vec::new())
                } else {
                    Ok(vec![ActiveStageOutput::BitmapUpdates(updates)])
                }
            }
            Action::X224 => self.x224_processor.process(frame, self.security.as_mut()),
        }
    }

    /// Encodes a batch of input events into a slow-path input PDU, ready to
    /// be written to the transport.
    pub fn encode_input_events(&mut self, events: Vec<InputEvent>, output: &mut WriteBuf) -> SessionResult<usize> {
        if events.is_empty() {
            return Err(SessionError::general("no input events to send"));
        }

        codec::encode_share_data(
            self.user_channel_id,
            self.io_channel_id,
            self.share_id,
            ShareDataPdu::Input(InputEventPdu(events)),
            self.security.as_mut(),
            output,
        )
        .map_err(SessionError::connector)
    }

    /// Encodes the graceful shutdown request.
    pub fn encode_shutdown_request(&mut self, output: &mut WriteBuf) -> SessionResult<usize> {
        codec::encode_share_data(
            self.user_channel_id,
            self.io_channel_id,
            self.share_id,
            ShareDataPdu::ShutdownRequest,
            self.security.as_mut(),
            output,
        )
        .map_err(SessionError::connector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdp_pdu::input::{MousePdu, PointerFlags};
    use std::collections::HashMap;

    fn active_stage() -> ActiveStage {
        ActiveStage::new(ConnectionResult {
            io_channel_id: 1003,
            user_channel_id: 1004,
            share_id: 0x0001_000A,
            static_channels: HashMap::new(),
            desktop_size: oxrdp_connector::DesktopSize {
                width: 800,
                height: 600,
            },
            server_capability_sets: Vec::new(),
            client_capability_sets: Vec::new(),
            security: None,
        })
    }

    #[test]
    fn input_events_are_encoded_into_a_frame() {
        let mut stage = active_stage();
        let mut buf = WriteBuf::new();

        let written = stage
            .encode_input_events(
                vec![InputEvent::Mouse(MousePdu {
                    flags: PointerFlags::MOVE,
                    number_of_wheel_rotation_units: 0,
                    x_position: 1,
                    y_position: 2,
                })],
                &mut buf,
            )
            .unwrap();

        assert_eq!(written, buf.filled_len());
        // TPKT header leads the frame.
        assert_eq!(buf.filled()[0], 0x03);
    }

    #[test]
    fn empty_input_batch_is_rejected() {
        let mut stage = active_stage();
        let mut buf = WriteBuf::new();

        assert!(stage.encode_input_events(Vec::new(), &mut buf).is_err());
    }
}
