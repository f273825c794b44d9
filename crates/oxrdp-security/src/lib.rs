//! Standard RDP security (MS-RDPBCGR section 5.3).
//!
//! This crate owns everything the client needs when the server selects
//! standard RDP security instead of TLS: the session key derivation, the
//! RC4 streams with their MAC signatures and 4096-packet key updates, the
//! licensing key derivation, server certificate parsing and the RSA sealing
//! of client-generated secrets.

pub mod cert;
pub mod rc4;

mod key_derivation;
mod rsa_seal;
mod session;

use core::fmt;

pub use key_derivation::{
    derive_license_keys, derive_session_keys, final_hash, mac_data, master_secret, session_key_blob, LicenseKeys,
    SessionKeys,
};
pub use rsa_seal::{encrypt_client_secret, SEAL_PADDING_SIZE};
pub use session::{SecurityContext, MAC_SIGNATURE_SIZE, RC4_REKEY_PACKET_COUNT};

/// Negotiated standard-security method, mirroring the GCC encryption method
/// bits that matter for key reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMethod {
    Bit40,
    Bit56,
    Bit128,
}

impl EncryptionMethod {
    pub fn from_gcc_encryption_method(method: oxrdp_pdu::gcc::EncryptionMethod) -> Option<Self> {
        use oxrdp_pdu::gcc::EncryptionMethod as Gcc;

        if method.contains(Gcc::BIT_128) {
            Some(Self::Bit128)
        } else if method.contains(Gcc::BIT_56) {
            Some(Self::Bit56)
        } else if method.contains(Gcc::BIT_40) {
            Some(Self::Bit40)
        } else {
            None
        }
    }

    /// Effective RC4 key length in bytes.
    pub fn key_length(self) -> usize {
        match self {
            Self::Bit40 | Self::Bit56 => 8,
            Self::Bit128 => 16,
        }
    }
}

pub type SecurityResult<T> = Result<T, SecurityError>;

#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("MAC signature mismatch on decrypted payload")]
    MacMismatch,
    #[error("encrypted payload is too short")]
    PayloadTooShort,
    #[error("invalid server certificate: {0}")]
    InvalidCertificate(&'static str),
    #[error("RSA public key encryption failed")]
    RsaEncryption(#[source] rsa::Error),
    #[error("malformed X.509 certificate")]
    X509(#[source] x509_cert::der::Error),
}

impl fmt::Display for EncryptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bit40 => write!(f, "40-bit"),
            Self::Bit56 => write!(f, "56-bit"),
            Self::Bit128 => write!(f, "128-bit"),
        }
    }
}
