//! Drives the CredSSP legs over an upgraded TLS stream.
//!
//! TSRequests are raw DER structures on the TLS stream, not TPKT frames, so
//! they are framed here by their outer SEQUENCE length.

use std::io::{self, Read, Write};

use oxrdp_connector::{ClientConnector, ConnectorError, ConnectorErrorExt as _, ConnectorResult};
use oxrdp_nla::{CredSspClient, NlaCredentials};

use crate::framed::Framed;

/// Runs the three CredSSP legs, then marks the connector step as done.
pub fn perform_credssp<S>(
    framed: &mut Framed<S>,
    connector: &mut ClientConnector,
    server_public_key: Vec<u8>,
) -> ConnectorResult<()>
where
    S: Read + Write,
{
    assert!(connector.should_perform_credssp());

    debug!("CredSSP procedure");

    let credentials = NlaCredentials::new(
        connector.config.domain.clone().unwrap_or_default(),
        connector.config.username.clone(),
        connector.config.password.clone(),
    );

    let mut client = CredSspClient::new(credentials, server_public_key);

    let request = client
        .initial_request()
        .map_err(|e| ConnectorError::custom("CredSSP", e))?;
    write_raw(framed, &request)?;

    let challenge = read_ts_request(framed)?;
    let request = client
        .process_challenge(&challenge)
        .map_err(|e| ConnectorError::custom("CredSSP", e))?;
    write_raw(framed, &request)?;

    let pub_key_echo = read_ts_request(framed)?;
    let request = client
        .process_pub_key_auth(&pub_key_echo)
        .map_err(|e| ConnectorError::custom("CredSSP", e))?;
    write_raw(framed, &request)?;

    connector.mark_credssp_as_done();

    Ok(())
}

fn write_raw<S: Read + Write>(framed: &mut Framed<S>, data: &[u8]) -> ConnectorResult<()> {
    framed
        .write_all(data)
        .map_err(|e| ConnectorError::custom("CredSSP write", e))
}

/// Reads one complete DER-framed TSRequest from the stream.
fn read_ts_request<S: Read + Write>(framed: &mut Framed<S>) -> ConnectorResult<Vec<u8>> {
    // Accumulate the TLV header first: tag, then 1-3 length bytes.
    let header = peek_exact(framed, 2)?;

    if header[0] != 0x30 {
        return Err(ConnectorError::general("TSRequest does not start with a SEQUENCE"));
    }

    let (header_size, body_len) = if header[1] & 0x80 == 0 {
        (2, usize::from(header[1]))
    } else {
        let len_octets = usize::from(header[1] & 0x7F);
        if len_octets == 0 || len_octets > 3 {
            return Err(ConnectorError::general("unsupported TSRequest length encoding"));
        }

        let header = peek_exact(framed, 2 + len_octets)?;
        let mut body_len = 0usize;
        for octet in &header[2..] {
            body_len = (body_len << 8) | usize::from(*octet);
        }
        (2 + len_octets, body_len)
    };

    framed
        .read_exact(header_size + body_len)
        .map(|bytes| bytes.to_vec())
        .map_err(|e| ConnectorError::custom("CredSSP read", e))
}

/// Fills the framed buffer until `length` bytes can be peeked.
fn peek_exact<S: Read + Write>(framed: &mut Framed<S>, length: usize) -> ConnectorResult<Vec<u8>> {
    while framed.peek().len() < length {
        let (stream, buf) = framed.get_inner_mut();

        let mut read_bytes = [0u8; 1024];
        let len = stream
            .read(&mut read_bytes)
            .map_err(|e| ConnectorError::custom("CredSSP read", e))?;

        if len == 0 {
            return Err(ConnectorError::custom(
                "CredSSP read",
                io::Error::new(io::ErrorKind::UnexpectedEof, "not enough bytes"),
            ));
        }

        buf.extend_from_slice(&read_bytes[..len]);
    }

    Ok(framed.peek()[..length].to_vec())
}
