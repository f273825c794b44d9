//! RSA sealing of client-generated secrets (client random, licensing
//! premaster secret).
//!
//! RDP transmits both the input and the output of the PKCS#1 v1.5
//! encryption in little-endian order, and pads the sealed blob with 8 zero
//! bytes.

use rsa::Pkcs1v15Encrypt;

use crate::cert::ServerPublicKey;
use crate::{SecurityError, SecurityResult};

pub const SEAL_PADDING_SIZE: usize = 8;

/// Encrypts `secret` under the server public key, returning the
/// little-endian ciphertext followed by the 8-byte zero padding.
pub fn encrypt_client_secret(public_key: &ServerPublicKey, secret: &[u8]) -> SecurityResult<Vec<u8>> {
    let mut reversed = secret.to_vec();
    reversed.reverse();

    let mut sealed = public_key
        .as_rsa()
        .encrypt(&mut rand::rngs::OsRng, Pkcs1v15Encrypt, &reversed)
        .map_err(SecurityError::RsaEncryption)?;

    sealed.reverse();
    sealed.extend_from_slice(&[0u8; SEAL_PADDING_SIZE]);

    Ok(sealed)
}
