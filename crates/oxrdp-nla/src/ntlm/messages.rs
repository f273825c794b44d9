//! NTLM message encoding and parsing (MS-NLMP 2.2.1).

use oxrdp_core::{ReadCursor, WriteCursor};
use oxrdp_pdu::utf16;
use oxrdp_security::rc4::Rc4;
use rand::RngCore as _;

use super::{computations, NegotiateFlags, CHALLENGE_SIZE, NTLM_SIGNATURE, NTLM_VERSION_SIZE, SESSION_KEY_SIZE};
use crate::{NlaCredentials, NlaError, NlaResult};

const MESSAGE_TYPE_NEGOTIATE: u32 = 1;
const MESSAGE_TYPE_CHALLENGE: u32 = 2;
const MESSAGE_TYPE_AUTHENTICATE: u32 = 3;

const NEGOTIATE_MESSAGE_SIZE: usize = 8 /* signature */ + 4 /* messageType */ + 4 /* flags */
    + FIELD_DESCRIPTOR_SIZE * 2 + NTLM_VERSION_SIZE;

const AUTHENTICATE_HEADER_SIZE: usize = 8 /* signature */ + 4 /* messageType */
    + FIELD_DESCRIPTOR_SIZE * 6 + 4 /* flags */ + NTLM_VERSION_SIZE;

const FIELD_DESCRIPTOR_SIZE: usize = 8;

/// A payload field descriptor: length, maximum length, offset.
struct FieldDescriptor {
    len: u16,
    offset: u32,
}

impl FieldDescriptor {
    fn write(&self, dst: &mut WriteCursor<'_>) {
        dst.write_u16(self.len);
        dst.write_u16(self.len);
        dst.write_u32(self.offset);
    }

    fn read(src: &mut ReadCursor<'_>) -> Self {
        let len = src.read_u16();
        let _max_len = src.read_u16();
        let offset = src.read_u32();

        Self { len, offset }
    }

    fn extract<'a>(&self, message: &'a [u8]) -> NlaResult<&'a [u8]> {
        let start = usize::try_from(self.offset).unwrap();
        let end = start + usize::from(self.len);

        message
            .get(start..end)
            .ok_or(NlaError::InvalidToken("field offset outside the message"))
    }
}

/// Builds the NEGOTIATE message: empty domain and workstation fields and a
/// zeroed version block, 40 bytes total.
pub(crate) fn write_negotiate(flags: NegotiateFlags) -> Vec<u8> {
    let mut buffer = vec![0u8; NEGOTIATE_MESSAGE_SIZE];
    let mut dst = WriteCursor::new(&mut buffer);

    dst.write_slice(NTLM_SIGNATURE);
    dst.write_u32(MESSAGE_TYPE_NEGOTIATE);
    dst.write_u32(flags.bits());
    FieldDescriptor { len: 0, offset: 0 }.write(&mut dst); // DomainName
    FieldDescriptor { len: 0, offset: 0 }.write(&mut dst); // Workstation
    // Version: left zeroed

    buffer
}

/// The parts of a CHALLENGE message the client acts upon.
pub(crate) struct Challenge {
    pub server_challenge: [u8; CHALLENGE_SIZE],
    pub target_info: Vec<u8>,
    #[allow(dead_code)]
    pub flags: NegotiateFlags,
}

pub(crate) fn read_challenge(message: &[u8]) -> NlaResult<Challenge> {
    if message.len() < 48 {
        return Err(NlaError::InvalidToken("challenge message is truncated"));
    }

    let mut src = ReadCursor::new(message);

    if src.read_slice(NTLM_SIGNATURE.len()) != NTLM_SIGNATURE {
        return Err(NlaError::InvalidToken("bad NTLM signature"));
    }
    if src.read_u32() != MESSAGE_TYPE_CHALLENGE {
        return Err(NlaError::InvalidToken("expected a CHALLENGE message"));
    }

    let _target_name = FieldDescriptor::read(&mut src);
    let flags = NegotiateFlags::from_bits_truncate(src.read_u32());

    let server_challenge = src.read_array();
    src.advance(8); // Reserved

    let target_info_field = FieldDescriptor::read(&mut src);
    let target_info = target_info_field.extract(message)?.to_vec();

    Ok(Challenge {
        server_challenge,
        target_info,
        flags,
    })
}

/// Builds the AUTHENTICATE message and returns it together with the
/// exported session key feeding the GSS context.
pub(crate) fn write_authenticate(
    credentials: &NlaCredentials,
    challenge: &Challenge,
) -> NlaResult<(Vec<u8>, [u8; SESSION_KEY_SIZE])> {
    let mut client_challenge = [0u8; CHALLENGE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut client_challenge);

    let timestamp = computations::timestamp_from_target_info(&challenge.target_info)
        .unwrap_or_else(computations::current_timestamp);

    let ntlm_v2_hash = computations::ntlm_v2_hash(credentials);

    let lm_response = computations::lm_v2_response(&client_challenge, &challenge.server_challenge, &ntlm_v2_hash);
    let (nt_response, session_base_key) = computations::ntlm_v2_response(
        &client_challenge,
        &challenge.server_challenge,
        &challenge.target_info,
        &ntlm_v2_hash,
        timestamp,
    );

    // With NTLMv2 the key exchange key is the session base key; the
    // exported session key travels RC4-sealed under it.
    let mut exported_session_key = [0u8; SESSION_KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut exported_session_key);
    let encrypted_session_key = Rc4::new(&session_base_key).process(&exported_session_key);

    let domain = utf16::encode(&credentials.domain);
    let username = utf16::encode(&credentials.username);
    let workstation: Vec<u8> = Vec::new();

    let payload_len =
        domain.len() + username.len() + workstation.len() + lm_response.len() + nt_response.len() + encrypted_session_key.len();

    let mut buffer = vec![0u8; AUTHENTICATE_HEADER_SIZE + payload_len];
    let mut dst = WriteCursor::new(&mut buffer);

    dst.write_slice(NTLM_SIGNATURE);
    dst.write_u32(MESSAGE_TYPE_AUTHENTICATE);

    let mut offset = AUTHENTICATE_HEADER_SIZE as u32;
    let mut descriptor = |field: &[u8]| {
        let current = FieldDescriptor {
            len: field.len() as u16,
            offset,
        };
        offset += field.len() as u32;
        current
    };

    let lm_field = descriptor(&lm_response);
    let nt_field = descriptor(&nt_response);
    let domain_field = descriptor(&domain);
    let username_field = descriptor(&username);
    let workstation_field = descriptor(&workstation);
    let session_key_field = descriptor(&encrypted_session_key);

    lm_field.write(&mut dst);
    nt_field.write(&mut dst);
    domain_field.write(&mut dst);
    username_field.write(&mut dst);
    workstation_field.write(&mut dst);
    session_key_field.write(&mut dst);

    dst.write_u32(NegotiateFlags::client_default().bits());
    dst.write_slice(&[0u8; NTLM_VERSION_SIZE]);

    dst.write_slice(&lm_response);
    dst.write_slice(&nt_response);
    dst.write_slice(&domain);
    dst.write_slice(&username);
    dst.write_slice(&workstation);
    dst.write_slice(&encrypted_session_key);

    Ok((buffer, exported_session_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_challenge_message() -> Vec<u8> {
        let target_info = [
            0x07, 0x00, 0x08, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // timestamp
            0x00, 0x00, 0x00, 0x00, // EOL
        ];

        let mut message = vec![0u8; 48 + target_info.len()];
        let mut dst = WriteCursor::new(&mut message);

        dst.write_slice(NTLM_SIGNATURE);
        dst.write_u32(MESSAGE_TYPE_CHALLENGE);
        // TargetName: empty, offset at end
        dst.write_u16(0);
        dst.write_u16(0);
        dst.write_u32(48);
        dst.write_u32(NegotiateFlags::client_default().bits());
        dst.write_slice(&[0x0Au8; CHALLENGE_SIZE]);
        dst.write_slice(&[0u8; 8]); // Reserved
        dst.write_u16(target_info.len() as u16);
        dst.write_u16(target_info.len() as u16);
        dst.write_u32(48);
        dst.write_slice(&target_info);

        message
    }

    #[test]
    fn challenge_fields_are_extracted() {
        let message = sample_challenge_message();
        let challenge = read_challenge(&message).unwrap();

        assert_eq!(challenge.server_challenge, [0x0A; CHALLENGE_SIZE]);
        assert_eq!(challenge.target_info.len(), 16);
        assert_eq!(computations::timestamp_from_target_info(&challenge.target_info), Some(0x10));
    }

    #[test]
    fn authenticate_message_layout() {
        let challenge = read_challenge(&sample_challenge_message()).unwrap();
        let credentials = NlaCredentials::new("DOMAIN", "user", "password");

        let (message, _) = write_authenticate(&credentials, &challenge).unwrap();

        assert_eq!(&message[..8], NTLM_SIGNATURE);
        assert_eq!(&message[8..12], &MESSAGE_TYPE_AUTHENTICATE.to_le_bytes());

        // The LM response descriptor points past the fixed header.
        let lm_len = u16::from_le_bytes([message[12], message[13]]);
        let lm_offset = u32::from_le_bytes([message[16], message[17], message[18], message[19]]);
        assert_eq!(lm_len, 24);
        assert_eq!(lm_offset as usize, AUTHENTICATE_HEADER_SIZE);
    }

    #[test]
    fn bad_signature_is_rejected() {
        let mut message = sample_challenge_message();
        message[0] = b'X';

        assert!(matches!(
            read_challenge(&message),
            Err(NlaError::InvalidToken("bad NTLM signature"))
        ));
    }
}
