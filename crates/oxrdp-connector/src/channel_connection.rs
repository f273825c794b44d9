use std::mem;

use oxrdp_core::WriteBuf;
use oxrdp_pdu::{mcs, PduHint};

use crate::{ConnectorError, ConnectorErrorExt as _, ConnectorResult, Sequence, State, Written};

#[derive(Default, Debug)]
#[non_exhaustive]
pub enum ChannelConnectionState {
    #[default]
    Consumed,

    SendErectDomainRequest,
    SendAttachUserRequest,
    WaitAttachUserConfirm,
    SendChannelJoinRequest {
        user_channel_id: u16,
        index: usize,
    },
    WaitChannelJoinConfirm {
        user_channel_id: u16,
        index: usize,
    },
    AllJoined {
        user_channel_id: u16,
    },
}

impl State for ChannelConnectionState {
    fn name(&self) -> &'static str {
        match self {
            Self::Consumed => "Consumed",
            Self::SendErectDomainRequest => "SendErectDomainRequest",
            Self::SendAttachUserRequest => "SendAttachUserRequest",
            Self::WaitAttachUserConfirm => "WaitAttachUserConfirm",
            Self::SendChannelJoinRequest { .. } => "SendChannelJoinRequest",
            Self::WaitChannelJoinConfirm { .. } => "WaitChannelJoinConfirm",
            Self::AllJoined { .. } => "AllJoined",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::AllJoined { .. })
    }

    fn as_any(&self) -> &dyn core::any::Any {
        self
    }
}

/// Erect-domain, attach-user and the channel-join round trips.
///
/// Joins are sent one at a time, each waiting for its confirm, the way
/// pre-8.1 clients do.
#[derive(Debug)]
pub struct ChannelConnectionSequence {
    pub state: ChannelConnectionState,
    pub channel_ids: Vec<u16>,
}

impl ChannelConnectionSequence {
    /// The user channel and the I/O channel are joined ahead of the static
    /// channels announced by the server.
    pub fn new(io_channel_id: u16, mut channel_ids: Vec<u16>) -> Self {
        channel_ids.insert(0, io_channel_id);

        Self {
            state: ChannelConnectionState::SendErectDomainRequest,
            channel_ids,
        }
    }
}

impl Sequence for ChannelConnectionSequence {
    fn next_pdu_hint(&self) -> Option<&dyn PduHint> {
        match self.state {
            ChannelConnectionState::WaitAttachUserConfirm => Some(&oxrdp_pdu::X224_HINT),
            ChannelConnectionState::WaitChannelJoinConfirm { .. } => Some(&oxrdp_pdu::X224_HINT),
            _ => None,
        }
    }

    fn step(&mut self, input: &[u8], output: &mut WriteBuf) -> ConnectorResult<Written> {
        let (written, next_state) = match mem::take(&mut self.state) {
            ChannelConnectionState::Consumed => {
                return Err(general_err!("channel connection sequence state is consumed"))
            }

            ChannelConnectionState::SendErectDomainRequest => {
                let erect_domain_request = mcs::ErectDomainPdu {
                    sub_height: 0,
                    sub_interval: 0,
                };

                debug!(message = ?erect_domain_request, "Send");

                let written = oxrdp_core::encode_buf(&oxrdp_pdu::x224::X224(erect_domain_request), output)
                    .map_err(ConnectorError::encode)?;

                (
                    Written::from_size(written)?,
                    ChannelConnectionState::SendAttachUserRequest,
                )
            }

            ChannelConnectionState::SendAttachUserRequest => {
                let attach_user_request = mcs::AttachUserRequest;

                debug!(message = ?attach_user_request, "Send");

                let written = oxrdp_core::encode_buf(&oxrdp_pdu::x224::X224(attach_user_request), output)
                    .map_err(ConnectorError::encode)?;

                (
                    Written::from_size(written)?,
                    ChannelConnectionState::WaitAttachUserConfirm,
                )
            }

            ChannelConnectionState::WaitAttachUserConfirm => {
                let attach_user_confirm: oxrdp_pdu::x224::X224<mcs::AttachUserConfirm> =
                    oxrdp_core::decode(input).map_err(ConnectorError::decode)?;

                let user_channel_id = attach_user_confirm.0.initiator_id;

                debug!(message = ?attach_user_confirm.0, user_channel_id, "Received");

                // The user channel must be joined too; it was not known
                // before this confirm.
                self.channel_ids.insert(0, user_channel_id);

                (
                    Written::Nothing,
                    ChannelConnectionState::SendChannelJoinRequest {
                        user_channel_id,
                        index: 0,
                    },
                )
            }

            ChannelConnectionState::SendChannelJoinRequest { user_channel_id, index } => {
                let channel_id = self.channel_ids[index];

                let channel_join_request = mcs::ChannelJoinRequest {
                    initiator_id: user_channel_id,
                    channel_id,
                };

                debug!(message = ?channel_join_request, "Send");

                let written = oxrdp_core::encode_buf(&oxrdp_pdu::x224::X224(channel_join_request), output)
                    .map_err(ConnectorError::encode)?;

                (
                    Written::from_size(written)?,
                    ChannelConnectionState::WaitChannelJoinConfirm { user_channel_id, index },
                )
            }

            ChannelConnectionState::WaitChannelJoinConfirm { user_channel_id, index } => {
                let channel_id = self.channel_ids[index];

                let channel_join_confirm: oxrdp_pdu::x224::X224<mcs::ChannelJoinConfirm> =
                    oxrdp_core::decode(input).map_err(ConnectorError::decode)?;

                debug!(message = ?channel_join_confirm.0, "Received");

                if channel_join_confirm.0.initiator_id != user_channel_id
                    || channel_join_confirm.0.channel_id != channel_join_confirm.0.requested_channel_id
                    || channel_join_confirm.0.channel_id != channel_id
                {
                    return Err(general_err!("received bad MCS Channel Join Confirm"));
                }

                let next_index = index + 1;

                let next_state = if next_index == self.channel_ids.len() {
                    ChannelConnectionState::AllJoined { user_channel_id }
                } else {
                    ChannelConnectionState::SendChannelJoinRequest {
                        user_channel_id,
                        index: next_index,
                    }
                };

                (Written::Nothing, next_state)
            }

            ChannelConnectionState::AllJoined { .. } => return Err(general_err!("all channels are already joined")),
        };

        self.state = next_state;

        Ok(written)
    }

    fn state(&self) -> &dyn State {
        &self.state
    }
}
