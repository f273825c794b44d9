//! Client licensing exchange (MS-RDPELE 3.1.5.3.1, new-license path).

use std::mem;

use oxrdp_core::WriteBuf;
use oxrdp_pdu::rdp::headers::BasicSecurityHeaderFlags;
use oxrdp_pdu::rdp::server_license::{
    self, ClientNewLicenseRequest, ClientPlatformChallengeResponse, LicensePdu, ServerLicenseRequest,
};
use oxrdp_pdu::PduHint;
use oxrdp_security::cert::{parse_server_certificate, ServerPublicKey};
use oxrdp_security::rc4::Rc4;
use oxrdp_security::{derive_license_keys, encrypt_client_secret, mac_data, LicenseKeys, SecurityContext};
use rand::RngCore as _;

use crate::{codec, ConnectorError, ConnectorErrorExt as _, ConnectorResult, Sequence, State, Written};

const HWID_SIZE: usize = 20;

#[derive(Default, Debug)]
#[non_exhaustive]
pub enum LicenseExchangeState {
    #[default]
    Consumed,

    WaitServerRequest,
    WaitChallengeOrLicense,
    LicenseExchanged,
}

impl State for LicenseExchangeState {
    fn name(&self) -> &'static str {
        match self {
            Self::Consumed => "Consumed",
            Self::WaitServerRequest => "WaitServerRequest",
            Self::WaitChallengeOrLicense => "WaitChallengeOrLicense",
            Self::LicenseExchanged => "LicenseExchanged",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::LicenseExchanged)
    }

    fn as_any(&self) -> &dyn core::any::Any {
        self
    }
}

/// Runs the licensing mini-exchange on the I/O channel.
///
/// Whatever the server opens with decides the path: a LICENSE_REQUEST walks
/// the new-license path (with an optional platform challenge), while an
/// ERROR_ALERT carrying STATUS_VALID_CLIENT ends the exchange immediately.
pub struct LicenseExchangeSequence {
    pub state: LicenseExchangeState,
    pub io_channel_id: u16,
    pub user_channel_id: u16,
    pub username: String,
    pub client_name: String,
    /// Public key from the GCC server certificate, when one was present.
    pub server_public_key: Option<ServerPublicKey>,
    pub security: Option<SecurityContext>,
    license_keys: Option<LicenseKeys>,
}

impl LicenseExchangeSequence {
    pub fn new(
        io_channel_id: u16,
        user_channel_id: u16,
        username: String,
        client_name: String,
        server_public_key: Option<ServerPublicKey>,
        security: Option<SecurityContext>,
    ) -> Self {
        Self {
            state: LicenseExchangeState::WaitServerRequest,
            io_channel_id,
            user_channel_id,
            username,
            client_name,
            server_public_key,
            security,
            license_keys: None,
        }
    }

    /// Hands the security context back once the sequence is finished.
    pub fn into_security(self) -> Option<SecurityContext> {
        self.security
    }

    fn send_license_pdu(&mut self, pdu: LicensePdu, output: &mut WriteBuf) -> ConnectorResult<usize> {
        codec::encode_send_data_request(
            self.user_channel_id,
            self.io_channel_id,
            &pdu,
            Some(BasicSecurityHeaderFlags::LICENSE_PKT),
            self.security.as_mut(),
            output,
        )
    }

    fn new_license_request(&mut self, request: &ServerLicenseRequest) -> ConnectorResult<ClientNewLicenseRequest> {
        let mut client_random = vec![0u8; server_license::RANDOM_NUMBER_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut client_random);

        let mut premaster_secret = vec![0u8; server_license::PREMASTER_SECRET_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut premaster_secret);

        self.license_keys = Some(derive_license_keys(
            &premaster_secret,
            &client_random,
            &request.server_random,
        ));

        // Prefer the GCC certificate; fall back to the one embedded in the
        // license request.
        let public_key = match self.server_public_key.take() {
            Some(key) => key,
            None => parse_server_certificate(&request.server_certificate)
                .map_err(|e| custom_err!("licenseServerCertificate", e))?,
        };

        let encrypted_premaster_secret =
            encrypt_client_secret(&public_key, &premaster_secret).map_err(ConnectorError::security)?;

        Ok(ClientNewLicenseRequest {
            client_random,
            encrypted_premaster_secret,
            client_username: self.username.clone(),
            client_machine_name: self.client_name.clone(),
        })
    }

    fn platform_challenge_response(
        &self,
        challenge: &server_license::ServerPlatformChallenge,
    ) -> ConnectorResult<ClientPlatformChallengeResponse> {
        let keys = self
            .license_keys
            .as_ref()
            .ok_or_else(|| general_err!("platform challenge before the license request"))?;

        // A single RC4 stream decrypts the challenge and then seals the
        // HWID, exactly as the licensing protocol expects.
        let mut stream = Rc4::new(&keys.license_key);

        let decrypted_challenge = stream.process(&challenge.encrypted_platform_challenge);

        let mut hwid = Vec::with_capacity(HWID_SIZE);
        hwid.extend_from_slice(self.client_name.as_bytes());
        hwid.extend_from_slice(self.username.as_bytes());
        hwid.resize(HWID_SIZE, 0);
        hwid.truncate(HWID_SIZE);

        let encrypted_hwid = stream.process(&hwid);

        let mac_input = [decrypted_challenge.as_slice(), hwid.as_slice()].concat();
        let mac = mac_data(&keys.mac_key, &mac_input);

        Ok(ClientPlatformChallengeResponse {
            encrypted_challenge_response: challenge.encrypted_platform_challenge.clone(),
            encrypted_hwid,
            mac_data: mac,
        })
    }
}

impl Sequence for LicenseExchangeSequence {
    fn next_pdu_hint(&self) -> Option<&dyn PduHint> {
        match self.state {
            LicenseExchangeState::WaitServerRequest => Some(&oxrdp_pdu::X224_HINT),
            LicenseExchangeState::WaitChallengeOrLicense => Some(&oxrdp_pdu::X224_HINT),
            _ => None,
        }
    }

    fn state(&self) -> &dyn State {
        &self.state
    }

    fn step(&mut self, input: &[u8], output: &mut WriteBuf) -> ConnectorResult<Written> {
        let (written, next_state) = match mem::take(&mut self.state) {
            LicenseExchangeState::Consumed => {
                return Err(general_err!("license exchange sequence state is consumed"))
            }

            LicenseExchangeState::WaitServerRequest => {
                let ctx = codec::decode_send_data_indication(input)?;
                let (_, body) = codec::decode_license_payload(&ctx, self.security.as_mut())?;
                let license_pdu: LicensePdu = oxrdp_core::decode(&body).map_err(ConnectorError::decode)?;

                match license_pdu {
                    LicensePdu::ServerLicenseRequest(request) => {
                        debug!(message = ?request, "Received");

                        let new_license_request = self.new_license_request(&request)?;

                        debug!(message = ?new_license_request, "Send");

                        let written = self.send_license_pdu(
                            LicensePdu::ClientNewLicenseRequest(new_license_request),
                            output,
                        )?;

                        (
                            Written::from_size(written)?,
                            LicenseExchangeState::WaitChallengeOrLicense,
                        )
                    }
                    LicensePdu::LicensingErrorMessage(error_message) => {
                        if !error_message.is_valid_client() {
                            return Err(reason_err!(
                                "LicensingErrorMessage",
                                "server reported licensing error {:?}",
                                error_message.error_code
                            ));
                        }

                        info!("Server did not initiate a license exchange");
                        (Written::Nothing, LicenseExchangeState::LicenseExchanged)
                    }
                    LicensePdu::ServerNewLicense(_) => {
                        info!("Server granted a new license");
                        (Written::Nothing, LicenseExchangeState::LicenseExchanged)
                    }
                    _ => return Err(general_err!("unexpected license message")),
                }
            }

            LicenseExchangeState::WaitChallengeOrLicense => {
                let ctx = codec::decode_send_data_indication(input)?;
                let (_, body) = codec::decode_license_payload(&ctx, self.security.as_mut())?;
                let license_pdu: LicensePdu = oxrdp_core::decode(&body).map_err(ConnectorError::decode)?;

                match license_pdu {
                    LicensePdu::ServerPlatformChallenge(challenge) => {
                        debug!(message = ?challenge, "Received");

                        let response = self.platform_challenge_response(&challenge)?;

                        debug!(message = ?response, "Send");

                        let written =
                            self.send_license_pdu(LicensePdu::ClientPlatformChallengeResponse(response), output)?;

                        (
                            Written::from_size(written)?,
                            LicenseExchangeState::WaitChallengeOrLicense,
                        )
                    }
                    LicensePdu::ServerNewLicense(_) => {
                        info!("Server granted a new license");
                        (Written::Nothing, LicenseExchangeState::LicenseExchanged)
                    }
                    LicensePdu::LicensingErrorMessage(error_message) => {
                        if !error_message.is_valid_client() {
                            return Err(reason_err!(
                                "LicensingErrorMessage",
                                "server reported licensing error {:?}",
                                error_message.error_code
                            ));
                        }

                        info!("Client licensing completed");
                        (Written::Nothing, LicenseExchangeState::LicenseExchanged)
                    }
                    _ => return Err(general_err!("unexpected license message")),
                }
            }

            LicenseExchangeState::LicenseExchanged => return Err(general_err!("license already exchanged")),
        };

        self.state = next_state;

        Ok(written)
    }
}
