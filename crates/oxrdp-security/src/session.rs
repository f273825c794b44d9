//! Per-session RC4 state: encryption, MAC verification and the 4096-packet
//! key update (MS-RDPBCGR 5.3.6 / 5.3.7).

use md5::{Digest as _, Md5};
use sha1::Sha1;

use crate::key_derivation::reduce_key;
use crate::rc4::Rc4;
use crate::{mac_data, EncryptionMethod, SecurityError, SecurityResult, SessionKeys};

pub const MAC_SIGNATURE_SIZE: usize = 8;

/// Keys are refreshed after this many packets in each direction.
pub const RC4_REKEY_PACKET_COUNT: u32 = 4096;

struct DirectionState {
    initial_key: Vec<u8>,
    current_key: Vec<u8>,
    stream: Rc4,
    packet_count: u32,
}

impl DirectionState {
    fn new(key: Vec<u8>) -> Self {
        Self {
            stream: Rc4::new(&key),
            initial_key: key.clone(),
            current_key: key,
            packet_count: 0,
        }
    }

    fn count_packet(&mut self, method: EncryptionMethod) {
        self.packet_count += 1;

        if self.packet_count == RC4_REKEY_PACKET_COUNT {
            self.current_key = update_session_key(&self.initial_key, &self.current_key, method);
            self.stream = Rc4::new(&self.current_key);
            self.packet_count = 0;
        }
    }
}

/// RC4 session state for both directions plus the shared MAC key.
///
/// The two directions are independent: each owns its stream and its packet
/// counter, and each rekeys on its own schedule.
pub struct SecurityContext {
    mac_key: Vec<u8>,
    method: EncryptionMethod,
    decrypt: DirectionState,
    encrypt: DirectionState,
}

impl SecurityContext {
    pub fn new(keys: SessionKeys, method: EncryptionMethod) -> Self {
        Self {
            mac_key: keys.mac_key,
            method,
            decrypt: DirectionState::new(keys.decrypt_key),
            encrypt: DirectionState::new(keys.encrypt_key),
        }
    }

    /// Produces `MAC(8) ++ RC4(plaintext)` and advances the send state.
    pub fn encrypt_payload(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let signature = mac_data(&self.mac_key, plaintext);

        let mut output = Vec::with_capacity(MAC_SIGNATURE_SIZE + plaintext.len());
        output.extend_from_slice(&signature[..MAC_SIGNATURE_SIZE]);
        output.extend_from_slice(plaintext);
        self.encrypt.stream.apply(&mut output[MAC_SIGNATURE_SIZE..]);

        self.encrypt.count_packet(self.method);

        output
    }

    /// Strips the 8-byte MAC prefix, decrypts and verifies the signature.
    pub fn decrypt_payload(&mut self, payload: &[u8]) -> SecurityResult<Vec<u8>> {
        if payload.len() < MAC_SIGNATURE_SIZE {
            return Err(SecurityError::PayloadTooShort);
        }

        let (signature, ciphertext) = payload.split_at(MAC_SIGNATURE_SIZE);

        let mut plaintext = ciphertext.to_vec();
        self.decrypt.stream.apply(&mut plaintext);

        self.decrypt.count_packet(self.method);

        let expected = mac_data(&self.mac_key, &plaintext);
        if signature != &expected[..MAC_SIGNATURE_SIZE] {
            return Err(SecurityError::MacMismatch);
        }

        Ok(plaintext)
    }
}

/// The 5.3.7 session key update.
///
/// `TempKey = MD5(initial ++ pad2 ++ SHA1(initial ++ pad1 ++ current))`,
/// self-encrypted with RC4 and re-salted for the 40/56-bit methods.
fn update_session_key(initial_key: &[u8], current_key: &[u8], method: EncryptionMethod) -> Vec<u8> {
    const PAD_ONE: [u8; 40] = [0x36; 40];
    const PAD_TWO: [u8; 48] = [0x5C; 48];

    let mut sha = Sha1::new();
    sha.update(initial_key);
    sha.update(PAD_ONE);
    sha.update(current_key);
    let sha_component: [u8; 20] = sha.finalize().into();

    let mut md5 = Md5::new();
    md5.update(initial_key);
    md5.update(PAD_TWO);
    md5.update(sha_component);
    let temp_key: [u8; 16] = md5.finalize().into();

    let temp_key = &temp_key[..method.key_length()];

    let mut new_key = temp_key.to_vec();
    Rc4::new(temp_key).apply(&mut new_key);

    reduce_key(&new_key, method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive_session_keys;

    fn matched_contexts() -> (SecurityContext, SecurityContext) {
        let keys = derive_session_keys(&[0x00; 32], &[0x01; 32], EncryptionMethod::Bit128);

        // Peer view: its encrypt key is our decrypt key.
        let peer_keys = SessionKeys {
            mac_key: keys.mac_key.clone(),
            decrypt_key: keys.encrypt_key.clone(),
            encrypt_key: keys.decrypt_key.clone(),
        };

        (
            SecurityContext::new(keys, EncryptionMethod::Bit128),
            SecurityContext::new(peer_keys, EncryptionMethod::Bit128),
        )
    }

    #[test]
    fn encrypt_decrypt_identity() {
        let (mut client, mut server) = matched_contexts();

        for payload in [&b"first packet"[..], &b"second"[..], &[0u8; 300][..]] {
            let sealed = client.encrypt_payload(payload);
            let opened = server.decrypt_payload(&sealed).unwrap();
            assert_eq!(opened, payload);
        }
    }

    #[test]
    fn tampered_mac_is_detected() {
        let (mut client, mut server) = matched_contexts();

        let mut sealed = client.encrypt_payload(b"payload");
        sealed[0] ^= 0xFF;

        assert!(matches!(server.decrypt_payload(&sealed), Err(SecurityError::MacMismatch)));
    }

    #[test]
    fn short_payload_is_rejected() {
        let (_, mut server) = matched_contexts();
        assert!(matches!(
            server.decrypt_payload(&[0x00; 4]),
            Err(SecurityError::PayloadTooShort)
        ));
    }

    #[test]
    fn streams_stay_aligned_across_rekey() {
        let (mut client, mut server) = matched_contexts();

        // Cross the 4096-packet boundary and keep talking.
        for i in 0..(RC4_REKEY_PACKET_COUNT + 8) {
            let payload = i.to_le_bytes();
            let sealed = client.encrypt_payload(&payload);
            let opened = server.decrypt_payload(&sealed).unwrap();
            assert_eq!(opened, payload);
        }
    }
}
