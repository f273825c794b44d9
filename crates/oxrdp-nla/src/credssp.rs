//! The client side of the three-leg CredSSP exchange.

use crate::ntlm::{Ntlm, NtlmSecurity};
use crate::ts_request::{encode_ts_credentials, TsRequest};
use crate::{NlaCredentials, NlaError, NlaResult};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CredSspState {
    /// The NEGOTIATE token has not been sent yet.
    Initial,
    /// Waiting for the server CHALLENGE.
    NegoToken,
    /// Waiting for the server pubKeyAuth echo.
    PubKeyAuth,
    /// The credentials were sent; the exchange is over.
    Final,
}

/// Drives TSRequest legs against an established NTLM context.
///
/// ```text
/// let request = client.initial_request()?;            // leg 1, send
/// let request = client.process_challenge(&response)?; // leg 2, send
/// let request = client.process_pub_key_auth(&response)?; // leg 3, send
/// ```
pub struct CredSspClient {
    state: CredSspState,
    ntlm: Ntlm,
    security: Option<NtlmSecurity>,
    public_key: Vec<u8>,
}

impl CredSspClient {
    /// `public_key` is the DER public key of the TLS server certificate,
    /// used for channel binding.
    pub fn new(credentials: NlaCredentials, public_key: Vec<u8>) -> Self {
        Self {
            state: CredSspState::Initial,
            ntlm: Ntlm::new(credentials),
            security: None,
            public_key,
        }
    }

    pub fn state(&self) -> CredSspState {
        self.state
    }

    /// Leg 1: a TSRequest carrying the NTLM NEGOTIATE token.
    pub fn initial_request(&mut self) -> NlaResult<Vec<u8>> {
        if self.state != CredSspState::Initial {
            return Err(NlaError::OutOfSequence("negotiate token already sent"));
        }

        self.state = CredSspState::NegoToken;

        TsRequest::with_nego_tokens(self.ntlm.negotiate_message().to_vec()).encode()
    }

    /// Leg 2: consumes the CHALLENGE response, returns the TSRequest with
    /// the AUTHENTICATE token and the sealed TLS public key.
    pub fn process_challenge(&mut self, response: &[u8]) -> NlaResult<Vec<u8>> {
        if self.state != CredSspState::NegoToken {
            return Err(NlaError::OutOfSequence("expected to be waiting for the challenge"));
        }

        let ts_request = TsRequest::decode(response)?;
        ts_request.check_error()?;

        let challenge_token = ts_request
            .nego_tokens
            .ok_or(NlaError::InvalidToken("challenge TSRequest without negoTokens"))?;

        let (authenticate_message, mut security) = self.ntlm.process_challenge(&challenge_token)?;

        let pub_key_auth = security.wrap(&self.public_key);
        self.security = Some(security);
        self.state = CredSspState::PubKeyAuth;

        let mut request = TsRequest::with_nego_tokens(authenticate_message);
        request.pub_key_auth = Some(pub_key_auth);
        request.encode()
    }

    /// Leg 3: verifies the server's pubKeyAuth echo (the public key
    /// incremented by one) and returns the TSRequest with the sealed
    /// TSCredentials.
    pub fn process_pub_key_auth(&mut self, response: &[u8]) -> NlaResult<Vec<u8>> {
        if self.state != CredSspState::PubKeyAuth {
            return Err(NlaError::OutOfSequence("expected to be waiting for the pubKeyAuth echo"));
        }

        let ts_request = TsRequest::decode(response)?;
        ts_request.check_error()?;

        let pub_key_auth = ts_request
            .pub_key_auth
            .ok_or(NlaError::InvalidToken("pubKeyAuth echo is missing"))?;

        let security = self.security.as_mut().expect("established with the challenge");

        let mut echoed_key = security.unwrap(&pub_key_auth)?;
        integer_decrement_le(&mut echoed_key);

        if echoed_key != self.public_key {
            return Err(NlaError::PublicKeyMismatch);
        }

        let ts_credentials = encode_ts_credentials(self.ntlm.credentials())?;
        let auth_info = security.wrap(&ts_credentials);

        self.state = CredSspState::Final;

        let mut request = TsRequest::default();
        request.auth_info = Some(auth_info);
        request.encode()
    }
}

fn integer_decrement_le(buffer: &mut [u8]) {
    for elem in buffer.iter_mut() {
        let (value, borrow) = elem.overflowing_sub(1);
        *elem = value;
        if !borrow {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legs_must_run_in_order() {
        let mut client = CredSspClient::new(NlaCredentials::default(), vec![0x01; 16]);

        assert!(matches!(
            client.process_challenge(&[0u8; 4]),
            Err(NlaError::OutOfSequence(_))
        ));

        client.initial_request().unwrap();
        assert_eq!(client.state(), CredSspState::NegoToken);

        assert!(matches!(client.initial_request(), Err(NlaError::OutOfSequence(_))));
    }

    #[test]
    fn integer_decrement_borrows_across_bytes() {
        let mut value = [0x00, 0x01];
        integer_decrement_le(&mut value);
        assert_eq!(value, [0xFF, 0x00]);
    }
}
