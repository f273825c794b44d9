//! Network Level Authentication: the NTLMv2 security provider and the
//! CredSSP TSRequest exchange it is carried in.
//!
//! The exchange runs inside an established TLS session:
//!
//! 1. client → server: `negoTokens = [NTLM NEGOTIATE]`
//! 2. server → client: `negoTokens = [NTLM CHALLENGE]`; the client answers
//!    with the AUTHENTICATE token and the GSS-sealed TLS public key
//! 3. server → client: the sealed public key incremented by one; the client
//!    verifies it and sends the sealed TSCredentials

mod credssp;
mod ntlm;
mod ts_request;

pub use credssp::{CredSspClient, CredSspState};
pub use ntlm::{Ntlm, NtlmSecurity};
pub use ts_request::{TsRequest, NLA_VERSION};

/// Credentials delegated to the server at the end of the exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NlaCredentials {
    pub domain: String,
    pub username: String,
    pub password: String,
}

impl NlaCredentials {
    pub fn new(domain: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

pub type NlaResult<T> = Result<T, NlaError>;

#[derive(Debug, thiserror::Error)]
pub enum NlaError {
    #[error("malformed DER structure: {0}")]
    Der(#[from] oxrdp_core::DecodeError),
    #[error("malformed NTLM message: {0}")]
    InvalidToken(&'static str),
    #[error("GSS signature verification failed")]
    MacMismatch,
    #[error("public key echo verification failed")]
    PublicKeyMismatch,
    #[error("CredSSP exchange is out of sequence: {0}")]
    OutOfSequence(&'static str),
    #[error("server reported an NLA error code: 0x{0:08X}")]
    ServerError(u32),
}
