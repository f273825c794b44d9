//! The DER-encoded TSRequest and TSCredentials structures (MS-CSSP).

use oxrdp_core::{ReadCursor, WriteCursor};
use oxrdp_pdu::ber;
use oxrdp_pdu::utf16;

use crate::{NlaCredentials, NlaResult};

/// CredSSP protocol version advertised in every TSRequest.
pub const NLA_VERSION: u32 = 2;

/// TSRequest: the top-level structure of every CredSSP leg.
#[derive(Debug, Clone, Default)]
pub struct TsRequest {
    pub peer_version: Option<u32>,
    pub nego_tokens: Option<Vec<u8>>,
    pub auth_info: Option<Vec<u8>>,
    pub pub_key_auth: Option<Vec<u8>>,
    pub error_code: Option<u32>,
}

impl TsRequest {
    pub fn with_nego_tokens(nego_tokens: Vec<u8>) -> Self {
        Self {
            nego_tokens: Some(nego_tokens),
            ..Self::default()
        }
    }

    /// Encodes the TSRequest into a fresh buffer.
    pub fn encode(&self) -> NlaResult<Vec<u8>> {
        let ts_request_len = self.ts_request_len();
        let total_len = usize::from(ber::sizeof_sequence(ts_request_len));

        let mut buffer = vec![0u8; total_len];
        let mut dst = WriteCursor::new(&mut buffer);

        ber::write_sequence_tag(&mut dst, ts_request_len).map_err(into_der_error)?;

        // [0] version (INTEGER)
        ber::write_contextual_tag(&mut dst, 0, ber::sizeof_integer(NLA_VERSION) as u16, ber::Pc::Construct)
            .map_err(into_der_error)?;
        ber::write_integer(&mut dst, NLA_VERSION).map_err(into_der_error)?;

        // [1] negoTokens (NegoData: SEQUENCE OF NegoDataItem)
        if let Some(ref nego_tokens) = self.nego_tokens {
            let len = nego_tokens.len() as u16;
            ber::write_contextual_tag(
                &mut dst,
                1,
                ber::sizeof_sequence(ber::sizeof_sequence(ber::sizeof_sequence_octet_string(len))),
                ber::Pc::Construct,
            )
            .map_err(into_der_error)?;
            ber::write_sequence_tag(&mut dst, ber::sizeof_sequence(ber::sizeof_sequence_octet_string(len)))
                .map_err(into_der_error)?;
            ber::write_sequence_tag(&mut dst, ber::sizeof_sequence_octet_string(len)).map_err(into_der_error)?;
            ber::write_sequence_octet_string(&mut dst, 0, nego_tokens).map_err(into_der_error)?;
        }

        // [2] authInfo (OCTET STRING)
        if let Some(ref auth_info) = self.auth_info {
            ber::write_sequence_octet_string(&mut dst, 2, auth_info).map_err(into_der_error)?;
        }

        // [3] pubKeyAuth (OCTET STRING)
        if let Some(ref pub_key_auth) = self.pub_key_auth {
            ber::write_sequence_octet_string(&mut dst, 3, pub_key_auth).map_err(into_der_error)?;
        }

        Ok(buffer)
    }

    /// Decodes a TSRequest from a complete DER buffer.
    pub fn decode(buffer: &[u8]) -> NlaResult<Self> {
        let mut src = ReadCursor::new(buffer);

        ber::read_sequence_tag(&mut src)?;

        ber::read_contextual_tag(&mut src, 0, ber::Pc::Construct)?;
        let peer_version = ber::read_integer(&mut src)? as u32;

        let nego_tokens = if ber::read_contextual_tag_or_unwind(&mut src, 1, ber::Pc::Construct)?.is_some() {
            ber::read_sequence_tag(&mut src)?; // SEQUENCE OF NegoDataItem
            ber::read_sequence_tag(&mut src)?; // NegoDataItem
            ber::read_contextual_tag(&mut src, 0, ber::Pc::Construct)?;
            Some(ber::read_octet_string(&mut src)?)
        } else {
            None
        };

        let auth_info = if ber::read_contextual_tag_or_unwind(&mut src, 2, ber::Pc::Construct)?.is_some() {
            Some(ber::read_octet_string(&mut src)?)
        } else {
            None
        };

        let pub_key_auth = if ber::read_contextual_tag_or_unwind(&mut src, 3, ber::Pc::Construct)?.is_some() {
            Some(ber::read_octet_string(&mut src)?)
        } else {
            None
        };

        let error_code = if peer_version >= 3
            && ber::read_contextual_tag_or_unwind(&mut src, 4, ber::Pc::Construct)?.is_some()
        {
            Some(ber::read_integer(&mut src)? as u32)
        } else {
            None
        };

        Ok(Self {
            peer_version: Some(peer_version),
            nego_tokens,
            auth_info,
            pub_key_auth,
            error_code,
        })
    }

    pub fn check_error(&self) -> NlaResult<()> {
        match self.error_code {
            Some(error_code) if error_code != 0 => Err(crate::NlaError::ServerError(error_code)),
            _ => Ok(()),
        }
    }

    fn ts_request_len(&self) -> u16 {
        let version_len = ber::sizeof_integer(NLA_VERSION) as u16 + ber::sizeof_contextual_tag(ber::sizeof_integer(NLA_VERSION) as u16) as u16;

        let nego_tokens_len = match self.nego_tokens {
            Some(ref tokens) => {
                let len = tokens.len() as u16;
                let mut total = ber::sizeof_octet_string(len) as u16;
                total += ber::sizeof_contextual_tag(total) as u16;
                total += ber::sizeof_sequence_tag(total) as u16;
                total += ber::sizeof_sequence_tag(total) as u16;
                total += ber::sizeof_contextual_tag(total) as u16;
                total
            }
            None => 0,
        };

        let auth_info_len = self.auth_info.as_ref().map_or(0, |field| sizeof_field(field));
        let pub_key_auth_len = self.pub_key_auth.as_ref().map_or(0, |field| sizeof_field(field));

        version_len + nego_tokens_len + auth_info_len + pub_key_auth_len
    }
}

fn sizeof_field(field: &[u8]) -> u16 {
    let len = ber::sizeof_octet_string(field.len() as u16) as u16;
    len + ber::sizeof_contextual_tag(len) as u16
}

// Encoding only fails when the scratch buffer is sized wrong, which is a
// length-computation defect; surface it as a malformed-token error.
fn into_der_error(_: oxrdp_core::EncodeError) -> crate::NlaError {
    crate::NlaError::InvalidToken("TSRequest length computation mismatch")
}

/// Encodes TSCredentials{credType=1, TSPasswordCreds} with UTF-16LE fields.
pub fn encode_ts_credentials(credentials: &NlaCredentials) -> NlaResult<Vec<u8>> {
    let domain = utf16::encode(&credentials.domain);
    let username = utf16::encode(&credentials.username);
    let password = utf16::encode(&credentials.password);

    let password_creds_len = sizeof_ts_password_creds(&domain, &username, &password);
    let password_creds_sequence_len = ber::sizeof_sequence(password_creds_len);
    let ts_credentials_len = sizeof_ts_credentials(password_creds_sequence_len);
    let total_len = usize::from(ber::sizeof_sequence(ts_credentials_len));

    let mut buffer = vec![0u8; total_len];
    let mut dst = WriteCursor::new(&mut buffer);

    // TSCredentials (SEQUENCE)
    ber::write_sequence_tag(&mut dst, ts_credentials_len).map_err(into_der_error)?;
    // [0] credType (INTEGER, 1 = password credentials)
    ber::write_contextual_tag(&mut dst, 0, ber::sizeof_integer(1) as u16, ber::Pc::Construct)
        .map_err(into_der_error)?;
    ber::write_integer(&mut dst, 1).map_err(into_der_error)?;
    // [1] credentials (OCTET STRING wrapping TSPasswordCreds)
    ber::write_contextual_tag(
        &mut dst,
        1,
        ber::sizeof_octet_string(password_creds_sequence_len) as u16,
        ber::Pc::Construct,
    )
    .map_err(into_der_error)?;
    ber::write_octet_string_tag(&mut dst, password_creds_sequence_len).map_err(into_der_error)?;

    // TSPasswordCreds (SEQUENCE)
    ber::write_sequence_tag(&mut dst, password_creds_len).map_err(into_der_error)?;
    ber::write_sequence_octet_string(&mut dst, 0, &domain).map_err(into_der_error)?;
    ber::write_sequence_octet_string(&mut dst, 1, &username).map_err(into_der_error)?;
    ber::write_sequence_octet_string(&mut dst, 2, &password).map_err(into_der_error)?;

    Ok(buffer)
}

fn sizeof_ts_credentials(password_creds_sequence_len: u16) -> u16 {
    ber::sizeof_integer(1) as u16
        + ber::sizeof_contextual_tag(ber::sizeof_integer(1) as u16) as u16
        + ber::sizeof_sequence_octet_string(password_creds_sequence_len)
}

fn sizeof_ts_password_creds(domain: &[u8], username: &[u8], password: &[u8]) -> u16 {
    ber::sizeof_sequence_octet_string(domain.len() as u16)
        + ber::sizeof_sequence_octet_string(username.len() as u16)
        + ber::sizeof_sequence_octet_string(password.len() as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiate_ts_request_matches_reference_bytes() {
        // Reference negotiate TSRequest produced with empty credentials.
        let ntlm = crate::Ntlm::new(NlaCredentials::default());
        let request = TsRequest::with_nego_tokens(ntlm.negotiate_message().to_vec());

        let encoded = request.encode().unwrap();

        let expected = [
            0x30, 0x37, 0xA0, 0x03, 0x02, 0x01, 0x02, 0xA1, 0x30, 0x30, 0x2E, 0x30, 0x2C, 0xA0, 0x2A, 0x04, 0x28,
            0x4E, 0x54, 0x4C, 0x4D, 0x53, 0x53, 0x50, 0x00, 0x01, 0x00, 0x00, 0x00, 0x35, 0x82, 0x08, 0x60, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];

        assert_eq!(encoded.len(), 57);
        assert_eq!(encoded, expected);
    }

    #[test]
    fn ts_request_roundtrip() {
        let request = TsRequest {
            peer_version: None,
            nego_tokens: Some(vec![0xAA; 16]),
            auth_info: None,
            pub_key_auth: Some(vec![0xBB; 32]),
            error_code: None,
        };

        let encoded = request.encode().unwrap();
        let decoded = TsRequest::decode(&encoded).unwrap();

        assert_eq!(decoded.peer_version, Some(NLA_VERSION));
        assert_eq!(decoded.nego_tokens, request.nego_tokens);
        assert_eq!(decoded.pub_key_auth, request.pub_key_auth);
        assert_eq!(decoded.auth_info, None);
    }

    #[test]
    fn ts_credentials_holds_utf16_fields() {
        let credentials = NlaCredentials::new("D", "u", "p");
        let encoded = encode_ts_credentials(&credentials).unwrap();

        // domain "D" as UTF-16LE appears inside the structure
        assert!(encoded.windows(2).any(|w| w == [0x44, 0x00]));
        // credType INTEGER 1
        assert!(encoded.windows(3).any(|w| w == [0x02, 0x01, 0x01]));
    }
}
