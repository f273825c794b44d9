//! The NTLMv2 security provider: message generation and the GSS
//! signing/sealing context derived per RFC 4757.

mod computations;
mod messages;

use bitflags::bitflags;

use oxrdp_security::rc4::Rc4;

use crate::{NlaError, NlaResult, NlaCredentials};

pub(crate) const NTLM_SIGNATURE: &[u8; 8] = b"NTLMSSP\0";
pub(crate) const NTLM_VERSION_SIZE: usize = 8;
pub(crate) const CHALLENGE_SIZE: usize = 8;
pub(crate) const SESSION_KEY_SIZE: usize = 16;

const SIGNATURE_VERSION: u32 = 1;
const SIGNATURE_SIZE: usize = 16;
const SIGNATURE_CHECKSUM_SIZE: usize = 8;

const CLIENT_SIGN_MAGIC: &[u8] = b"session key to client-to-server signing key magic constant\0";
const SERVER_SIGN_MAGIC: &[u8] = b"session key to server-to-client signing key magic constant\0";
const CLIENT_SEAL_MAGIC: &[u8] = b"session key to client-to-server sealing key magic constant\0";
const SERVER_SEAL_MAGIC: &[u8] = b"session key to server-to-client sealing key magic constant\0";

bitflags! {
    /// NTLM NEGOTIATE flags (MS-NLMP 2.2.2.5).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct NegotiateFlags: u32 {
        const KEY_EXCH = 0x4000_0000;
        const NEGOTIATE_128 = 0x2000_0000;
        const TARGET_INFO = 0x0080_0000;
        const EXTENDED_SESSION_SECURITY = 0x0008_0000;
        const ALWAYS_SIGN = 0x0000_8000;
        const NTLM = 0x0000_0200;
        const SEAL = 0x0000_0020;
        const SIGN = 0x0000_0010;
        const REQUEST_TARGET = 0x0000_0004;
        const UNICODE = 0x0000_0001;
    }
}

impl NegotiateFlags {
    /// The NTLMv2 flag word sent in the NEGOTIATE message: 0x60088235.
    fn client_default() -> Self {
        Self::KEY_EXCH
            | Self::NEGOTIATE_128
            | Self::EXTENDED_SESSION_SECURITY
            | Self::ALWAYS_SIGN
            | Self::NTLM
            | Self::SEAL
            | Self::SIGN
            | Self::REQUEST_TARGET
            | Self::UNICODE
    }
}

/// The client-side NTLMv2 exchange.
pub struct Ntlm {
    credentials: NlaCredentials,
    negotiate_message: Vec<u8>,
}

impl Ntlm {
    pub fn new(credentials: NlaCredentials) -> Self {
        Self {
            negotiate_message: messages::write_negotiate(NegotiateFlags::client_default()),
            credentials,
        }
    }

    /// The NEGOTIATE token for the first CredSSP leg.
    pub fn negotiate_message(&self) -> &[u8] {
        &self.negotiate_message
    }

    /// Processes the CHALLENGE token and produces the AUTHENTICATE token
    /// together with the established security context.
    pub fn process_challenge(&self, challenge_message: &[u8]) -> NlaResult<(Vec<u8>, NtlmSecurity)> {
        let challenge = messages::read_challenge(challenge_message)?;

        let (authenticate_message, exported_session_key) =
            messages::write_authenticate(&self.credentials, &challenge)?;

        Ok((authenticate_message, NtlmSecurity::new(&exported_session_key)))
    }

    /// UTF-16LE credential buffers for the TSCredentials structure.
    pub fn credentials(&self) -> &NlaCredentials {
        &self.credentials
    }
}

/// GSS signing and sealing context established by the AUTHENTICATE message.
///
/// Each direction has an HMAC-MD5 signing key, an RC4 sealing stream and a
/// sequence number; a wrapped token is
/// `[version:4][RC4(checksum):8][seqnum:4] ++ RC4(payload)`.
pub struct NtlmSecurity {
    send_signing_key: [u8; 16],
    recv_signing_key: [u8; 16],
    send_sealing_stream: Rc4,
    recv_sealing_stream: Rc4,
    send_seq_num: u32,
    recv_seq_num: u32,
}

impl NtlmSecurity {
    fn new(exported_session_key: &[u8]) -> Self {
        Self {
            send_signing_key: computations::signing_key(exported_session_key, CLIENT_SIGN_MAGIC),
            recv_signing_key: computations::signing_key(exported_session_key, SERVER_SIGN_MAGIC),
            send_sealing_stream: Rc4::new(&computations::signing_key(exported_session_key, CLIENT_SEAL_MAGIC)),
            recv_sealing_stream: Rc4::new(&computations::signing_key(exported_session_key, SERVER_SEAL_MAGIC)),
            send_seq_num: 0,
            recv_seq_num: 0,
        }
    }

    /// Seals `data`, prepending the GSS signature.
    pub fn wrap(&mut self, data: &[u8]) -> Vec<u8> {
        let seq_num = self.send_seq_num;
        self.send_seq_num += 1;

        let digest = computations::hmac_md5(
            &self.send_signing_key,
            &[seq_num.to_le_bytes().as_ref(), data].concat(),
        );

        let sealed = self.send_sealing_stream.process(data);
        let checksum = self.send_sealing_stream.process(&digest[..SIGNATURE_CHECKSUM_SIZE]);

        let mut output = Vec::with_capacity(SIGNATURE_SIZE + sealed.len());
        output.extend_from_slice(&SIGNATURE_VERSION.to_le_bytes());
        output.extend_from_slice(&checksum);
        output.extend_from_slice(&seq_num.to_le_bytes());
        output.extend_from_slice(&sealed);

        output
    }

    /// Unseals a wrapped token, verifying its signature.
    pub fn unwrap(&mut self, data: &[u8]) -> NlaResult<Vec<u8>> {
        if data.len() < SIGNATURE_SIZE {
            return Err(NlaError::InvalidToken("wrapped token shorter than its signature"));
        }

        let seq_num = self.recv_seq_num;
        self.recv_seq_num += 1;

        let (signature, sealed) = data.split_at(SIGNATURE_SIZE);

        let plaintext = self.recv_sealing_stream.process(sealed);

        let digest = computations::hmac_md5(
            &self.recv_signing_key,
            &[seq_num.to_le_bytes().as_ref(), plaintext.as_slice()].concat(),
        );
        let checksum = self.recv_sealing_stream.process(&digest[..SIGNATURE_CHECKSUM_SIZE]);

        let mut expected = Vec::with_capacity(SIGNATURE_SIZE);
        expected.extend_from_slice(&SIGNATURE_VERSION.to_le_bytes());
        expected.extend_from_slice(&checksum);
        expected.extend_from_slice(&seq_num.to_le_bytes());

        if signature != expected {
            return Err(NlaError::MacMismatch);
        }

        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiate_message_is_the_reference_40_bytes() {
        let ntlm = Ntlm::new(NlaCredentials::default());
        let message = ntlm.negotiate_message();

        assert_eq!(message.len(), 40);
        assert_eq!(&message[..8], NTLM_SIGNATURE);
        assert_eq!(&message[8..12], &1u32.to_le_bytes());
        assert_eq!(&message[12..16], &0x6008_8235u32.to_le_bytes());
        assert!(message[16..].iter().all(|b| *b == 0));
    }

    #[test]
    fn wrap_then_unwrap_with_mirrored_context() {
        let exported_session_key = [0x42u8; SESSION_KEY_SIZE];

        let mut client = NtlmSecurity::new(&exported_session_key);

        // A server-view context: its receive side mirrors the client's send side.
        let mut server = NtlmSecurity {
            send_signing_key: computations::signing_key(&exported_session_key, SERVER_SIGN_MAGIC),
            recv_signing_key: computations::signing_key(&exported_session_key, CLIENT_SIGN_MAGIC),
            send_sealing_stream: Rc4::new(&computations::signing_key(&exported_session_key, SERVER_SEAL_MAGIC)),
            recv_sealing_stream: Rc4::new(&computations::signing_key(&exported_session_key, CLIENT_SEAL_MAGIC)),
            send_seq_num: 0,
            recv_seq_num: 0,
        };

        let wrapped = client.wrap(b"public key bytes");
        let unwrapped = server.unwrap(&wrapped).unwrap();
        assert_eq!(unwrapped, b"public key bytes");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let exported_session_key = [0x42u8; SESSION_KEY_SIZE];

        let mut client = NtlmSecurity::new(&exported_session_key);
        let mut receiver = NtlmSecurity {
            send_signing_key: computations::signing_key(&exported_session_key, SERVER_SIGN_MAGIC),
            recv_signing_key: computations::signing_key(&exported_session_key, CLIENT_SIGN_MAGIC),
            send_sealing_stream: Rc4::new(&computations::signing_key(&exported_session_key, SERVER_SEAL_MAGIC)),
            recv_sealing_stream: Rc4::new(&computations::signing_key(&exported_session_key, CLIENT_SEAL_MAGIC)),
            send_seq_num: 0,
            recv_seq_num: 0,
        };

        let mut wrapped = client.wrap(b"payload");
        let last = wrapped.len() - 1;
        wrapped[last] ^= 0xFF;

        assert!(matches!(receiver.unwrap(&wrapped), Err(NlaError::MacMismatch)));
    }
}
