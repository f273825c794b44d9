use std::io::{Read, Write};

use oxrdp_connector::{
    ClientConnector, ClientConnectorState, ConnectionResult, ConnectorError, ConnectorErrorExt as _, ConnectorResult,
    Sequence as _, State as _,
};
use oxrdp_core::WriteBuf;

use crate::framed::Framed;

/// What the connection sequence expects the transport to do next.
#[derive(Debug, PartialEq, Eq)]
pub enum SecurityUpgrade {
    /// Perform the TLS handshake (and possibly CredSSP afterwards), then
    /// call [`mark_as_upgraded`].
    Tls,
    /// Standard RDP security was selected; no transport upgrade happens.
    None,
}

/// Drives the connection sequence until the TLS upgrade point (or straight
/// through the security decision when standard RDP security was selected).
pub fn connect_begin<S>(framed: &mut Framed<S>, connector: &mut ClientConnector) -> ConnectorResult<SecurityUpgrade>
where
    S: Read + Write,
{
    let mut buf = WriteBuf::new();

    info!("Begin connection procedure");

    loop {
        if connector.should_perform_security_upgrade() {
            return Ok(SecurityUpgrade::Tls);
        }

        if connector.state.is_terminal() {
            return Ok(SecurityUpgrade::None);
        }

        // The upgrade decision is made right after the connection confirm.
        if matches!(connector.state, ClientConnectorState::BasicSettingsExchangeSendInitial { .. }) {
            return Ok(SecurityUpgrade::None);
        }

        single_connect_step(framed, connector, &mut buf)?;
    }
}

pub fn mark_as_upgraded(connector: &mut ClientConnector) {
    trace!("Marked as upgraded");
    connector.mark_security_upgrade_as_done();
}

/// Drives the remaining sequence to completion over the (possibly upgraded)
/// transport.
pub fn connect_finalize<S>(framed: &mut Framed<S>, mut connector: ClientConnector) -> ConnectorResult<ConnectionResult>
where
    S: Read + Write,
{
    let mut buf = WriteBuf::new();

    let result = loop {
        if let ClientConnectorState::Connected { result } = connector.state {
            break result;
        }

        single_connect_step(framed, &mut connector, &mut buf)?;
    };

    info!("Connected with success");

    Ok(result)
}

/// One step of a connection sequence: read the frame the state asks for,
/// advance the state machine, write out whatever it produced.
pub fn single_connect_step<S>(
    framed: &mut Framed<S>,
    connector: &mut ClientConnector,
    buf: &mut WriteBuf,
) -> ConnectorResult<oxrdp_connector::Written>
where
    S: Read + Write,
{
    buf.clear();

    let written = if let Some(next_pdu_hint) = connector.next_pdu_hint() {
        debug!(
            connector.state = connector.state.name(),
            hint = ?next_pdu_hint,
            "Wait for PDU"
        );

        let pdu = framed
            .read_by_hint(next_pdu_hint)
            .map_err(|e| ConnectorError::custom("read frame by hint", e))?;

        trace!(length = pdu.len(), "PDU received");

        connector.step(&pdu, buf)?
    } else {
        connector.step_no_input(buf)?
    };

    if let Some(response_len) = written.size() {
        debug_assert_eq!(buf.filled_len(), response_len);
        let response = buf.filled();
        trace!(response_len, "Send response");
        framed
            .write_all(response)
            .map_err(|e| ConnectorError::custom("write all", e))?;
    }

    Ok(written)
}
