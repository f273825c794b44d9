//! Session and licensing key derivation (MS-RDPBCGR 5.3.5, MS-RDPELE).

use md5::{Digest as _, Md5};
use sha1::Sha1;

use crate::EncryptionMethod;

const PREMASTER_HALF: usize = 24;
const SALTED_SECRET_LEN: usize = 48;

/// The three session keys produced by the security commencement.
#[derive(Clone)]
pub struct SessionKeys {
    pub mac_key: Vec<u8>,
    pub decrypt_key: Vec<u8>,
    pub encrypt_key: Vec<u8>,
}

/// The licensing keys derived during the license exchange.
#[derive(Clone)]
pub struct LicenseKeys {
    pub mac_key: Vec<u8>,
    pub license_key: Vec<u8>,
}

fn md5(data: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn sha1(data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `MD5(secret[..48] ++ SHA1(salt ++ secret[..48] ++ random1 ++ random2))`.
fn salted_hash(salt: &[u8], secret: &[u8], random1: &[u8], random2: &[u8]) -> [u8; 16] {
    let secret = &secret[..SALTED_SECRET_LEN.min(secret.len())];

    let inner = sha1(&[salt, secret, random1, random2].concat());
    md5(&[secret, inner.as_ref()].concat())
}

/// The "A"/"BB"/"CCC" master secret construction.
pub fn master_secret(secret: &[u8], random1: &[u8], random2: &[u8]) -> Vec<u8> {
    [
        salted_hash(b"A", secret, random1, random2),
        salted_hash(b"BB", secret, random1, random2),
        salted_hash(b"CCC", secret, random1, random2),
    ]
    .concat()
}

/// The "X"/"YY"/"ZZZ" session key blob construction.
pub fn session_key_blob(secret: &[u8], random1: &[u8], random2: &[u8]) -> Vec<u8> {
    [
        salted_hash(b"X", secret, random1, random2),
        salted_hash(b"YY", secret, random1, random2),
        salted_hash(b"ZZZ", secret, random1, random2),
    ]
    .concat()
}

/// `MD5(key ++ random1 ++ random2)`.
pub fn final_hash(key: &[u8], random1: &[u8], random2: &[u8]) -> Vec<u8> {
    md5(&[key, random1, random2].concat()).to_vec()
}

/// Reduces a 128-bit key to its 40-bit form by salting the first 3 bytes.
fn reduce_to_40_bits(key: &[u8]) -> Vec<u8> {
    [&[0xD1, 0x26, 0x9E], &key[3..8]].concat()
}

/// Reduces a 128-bit key to its 56-bit form by salting the first byte.
fn reduce_to_56_bits(key: &[u8]) -> Vec<u8> {
    [&[0xD1], &key[1..8]].concat()
}

pub(crate) fn reduce_key(key: &[u8], method: EncryptionMethod) -> Vec<u8> {
    match method {
        EncryptionMethod::Bit40 => reduce_to_40_bits(key),
        EncryptionMethod::Bit56 => reduce_to_56_bits(key),
        EncryptionMethod::Bit128 => key.to_vec(),
    }
}

/// Derives the MAC, decrypt and encrypt keys from the random pair.
pub fn derive_session_keys(client_random: &[u8], server_random: &[u8], method: EncryptionMethod) -> SessionKeys {
    let pre_master = [&client_random[..PREMASTER_HALF], &server_random[..PREMASTER_HALF]].concat();

    let master = master_secret(&pre_master, client_random, server_random);
    let session = session_key_blob(&master, client_random, server_random);

    let mac_key_128 = &session[..16];
    let decrypt_key_128 = final_hash(&session[16..32], client_random, server_random);
    let encrypt_key_128 = final_hash(&session[32..48], client_random, server_random);

    SessionKeys {
        mac_key: reduce_key(mac_key_128, method),
        decrypt_key: reduce_key(&decrypt_key_128, method),
        encrypt_key: reduce_key(&encrypt_key_128, method),
    }
}

/// Derives the licensing MAC and RC4 keys.
///
/// The licensing blob swaps the randoms and reuses the master-secret salts,
/// matching what servers accept in the wild.
pub fn derive_license_keys(premaster_secret: &[u8], client_random: &[u8], server_random: &[u8]) -> LicenseKeys {
    let master = master_secret(premaster_secret, client_random, server_random);
    let blob = master_secret(&master, server_random, client_random);

    LicenseKeys {
        mac_key: blob[..16].to_vec(),
        license_key: final_hash(&blob[16..32], client_random, server_random),
    }
}

/// The MAC construction used for secured PDUs and licensing messages:
/// `MD5(key ++ pad2 ++ SHA1(key ++ pad1 ++ len_le32 ++ data))`.
pub fn mac_data(mac_key: &[u8], data: &[u8]) -> [u8; 16] {
    const PAD_ONE: [u8; 40] = [0x36; 40];
    const PAD_TWO: [u8; 48] = [0x5C; 48];

    let data_len = (data.len() as u32).to_le_bytes();

    let inner = sha1(&[mac_key, PAD_ONE.as_ref(), data_len.as_ref(), data].concat());
    md5(&[mac_key, PAD_TWO.as_ref(), inner.as_ref()].concat())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference vectors computed with the MS-RDPBCGR 5.3.5.1 construction
    // for client_random = 0x00 * 32, server_random = 0x01 * 32, 128-bit.
    const CLIENT_RANDOM: [u8; 32] = [0x00; 32];
    const SERVER_RANDOM: [u8; 32] = [0x01; 32];

    const EXPECTED_MAC_KEY: [u8; 16] = [
        0x7C, 0x1B, 0xBB, 0xBE, 0x57, 0xA2, 0x87, 0x2A, 0x44, 0x5D, 0x05, 0x4A, 0x65, 0xCF, 0xF4, 0x9F,
    ];
    const EXPECTED_DECRYPT_KEY: [u8; 16] = [
        0x6B, 0x67, 0x62, 0x29, 0xB1, 0xDB, 0x66, 0x96, 0x0D, 0x78, 0x0C, 0x4E, 0x5E, 0x51, 0x12, 0x7D,
    ];
    const EXPECTED_ENCRYPT_KEY: [u8; 16] = [
        0xCE, 0xCB, 0x93, 0x6C, 0x81, 0x35, 0x7D, 0xB0, 0xB4, 0x40, 0xB5, 0x2F, 0xA5, 0x3B, 0xC0, 0xA6,
    ];

    #[test]
    fn session_keys_128_bit() {
        let keys = derive_session_keys(&CLIENT_RANDOM, &SERVER_RANDOM, EncryptionMethod::Bit128);

        assert_eq!(keys.mac_key, EXPECTED_MAC_KEY);
        assert_eq!(keys.decrypt_key, EXPECTED_DECRYPT_KEY);
        assert_eq!(keys.encrypt_key, EXPECTED_ENCRYPT_KEY);
    }

    #[test]
    fn session_keys_40_bit_are_salted() {
        let keys = derive_session_keys(&CLIENT_RANDOM, &SERVER_RANDOM, EncryptionMethod::Bit40);

        assert_eq!(keys.mac_key.len(), 8);
        assert_eq!(keys.mac_key[..3], [0xD1, 0x26, 0x9E]);
        assert_eq!(keys.mac_key[3..], EXPECTED_MAC_KEY[3..8]);
    }

    #[test]
    fn session_keys_56_bit_are_salted() {
        let keys = derive_session_keys(&CLIENT_RANDOM, &SERVER_RANDOM, EncryptionMethod::Bit56);

        assert_eq!(keys.encrypt_key.len(), 8);
        assert_eq!(keys.encrypt_key[0], 0xD1);
        assert_eq!(keys.encrypt_key[1..], EXPECTED_ENCRYPT_KEY[1..8]);
    }

    #[test]
    fn mac_data_is_deterministic() {
        let a = mac_data(&EXPECTED_MAC_KEY, b"payload");
        let b = mac_data(&EXPECTED_MAC_KEY, b"payload");
        let c = mac_data(&EXPECTED_MAC_KEY, b"payloae");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
