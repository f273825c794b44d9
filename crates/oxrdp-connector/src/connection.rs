use std::collections::HashMap;
use std::mem;

use oxrdp_core::WriteBuf;
use oxrdp_pdu::rdp::capability_sets::{CapabilitySet, ClientConfirmActive, DemandActive};
use oxrdp_pdu::rdp::client_info::{
    AddressFamily, ClientInfo, ClientInfoFlags, Credentials, ExtendedClientInfo, PerformanceFlags,
};
use oxrdp_pdu::rdp::headers::{BasicSecurityHeaderFlags, ShareControlPdu};
use oxrdp_pdu::rdp::SecurityExchangePdu;
use oxrdp_pdu::{gcc, mcs, nego, PduHint};
use oxrdp_security::cert::{parse_server_certificate, ServerPublicKey};
use oxrdp_security::{derive_session_keys, encrypt_client_secret, EncryptionMethod, SecurityContext};
use rand::RngCore as _;

use crate::channel_connection::{ChannelConnectionSequence, ChannelConnectionState};
use crate::connection_finalization::ConnectionFinalizationSequence;
use crate::license_exchange::LicenseExchangeSequence;
use crate::{codec, Config, ConnectorError, ConnectorErrorExt as _, ConnectorResult, DesktopSize, Sequence, State, Written};

/// Everything the active session needs once the connection sequence is over.
pub struct ConnectionResult {
    pub io_channel_id: u16,
    pub user_channel_id: u16,
    pub share_id: u32,
    pub static_channels: HashMap<String, u16>,
    pub desktop_size: DesktopSize,
    /// The capability sets advertised by the server in the demand active.
    pub server_capability_sets: Vec<CapabilitySet>,
    /// The capability sets the client confirmed.
    pub client_capability_sets: Vec<CapabilitySet>,
    /// Present when standard RDP security was negotiated.
    pub security: Option<SecurityContext>,
}

impl core::fmt::Debug for ConnectionResult {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConnectionResult")
            .field("io_channel_id", &self.io_channel_id)
            .field("user_channel_id", &self.user_channel_id)
            .field("share_id", &self.share_id)
            .field("static_channels", &self.static_channels)
            .field("desktop_size", &self.desktop_size)
            .field("encryption_enabled", &self.security.is_some())
            .finish()
    }
}

/// Connection parameters recovered from the MCS connect response and needed
/// by the standard security commencement.
pub struct ServerSecurityInfo {
    encryption_method: EncryptionMethod,
    server_random: [u8; 32],
    public_key: ServerPublicKey,
}

#[derive(Default)]
#[non_exhaustive]
pub enum ClientConnectorState {
    #[default]
    Consumed,

    ConnectionInitiationSendRequest,
    ConnectionInitiationWaitConfirm {
        requested_protocol: nego::SecurityProtocol,
    },
    EnhancedSecurityUpgrade {
        selected_protocol: nego::SecurityProtocol,
    },
    Credssp {
        selected_protocol: nego::SecurityProtocol,
    },
    BasicSettingsExchangeSendInitial {
        selected_protocol: nego::SecurityProtocol,
    },
    BasicSettingsExchangeWaitResponse {
        connect_initial: mcs::ConnectInitial,
        selected_protocol: nego::SecurityProtocol,
    },
    ChannelConnection {
        io_channel_id: u16,
        channel_names: Vec<String>,
        channel_connection: ChannelConnectionSequence,
        server_security: Option<ServerSecurityInfo>,
    },
    SecurityExchange {
        io_channel_id: u16,
        user_channel_id: u16,
        static_channels: HashMap<String, u16>,
        server_security: ServerSecurityInfo,
    },
    SecureSettingsExchange {
        io_channel_id: u16,
        user_channel_id: u16,
        static_channels: HashMap<String, u16>,
        security: Option<SecurityContext>,
    },
    LicensingExchange {
        io_channel_id: u16,
        user_channel_id: u16,
        static_channels: HashMap<String, u16>,
        license_exchange: Box<LicenseExchangeSequence>,
    },
    CapabilitiesExchange {
        io_channel_id: u16,
        user_channel_id: u16,
        static_channels: HashMap<String, u16>,
        security: Option<SecurityContext>,
    },
    ConnectionFinalization {
        io_channel_id: u16,
        user_channel_id: u16,
        static_channels: HashMap<String, u16>,
        desktop_size: DesktopSize,
        server_capability_sets: Vec<CapabilitySet>,
        client_capability_sets: Vec<CapabilitySet>,
        connection_finalization: Box<ConnectionFinalizationSequence>,
    },
    Connected {
        result: ConnectionResult,
    },
}

impl core::fmt::Debug for ClientConnectorState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(State::name(self))
    }
}

impl State for ClientConnectorState {
    fn name(&self) -> &'static str {
        match self {
            Self::Consumed => "Consumed",
            Self::ConnectionInitiationSendRequest => "ConnectionInitiationSendRequest",
            Self::ConnectionInitiationWaitConfirm { .. } => "ConnectionInitiationWaitConfirm",
            Self::EnhancedSecurityUpgrade { .. } => "EnhancedSecurityUpgrade",
            Self::Credssp { .. } => "Credssp",
            Self::BasicSettingsExchangeSendInitial { .. } => "BasicSettingsExchangeSendInitial",
            Self::BasicSettingsExchangeWaitResponse { .. } => "BasicSettingsExchangeWaitResponse",
            Self::ChannelConnection { .. } => "ChannelConnection",
            Self::SecurityExchange { .. } => "SecurityExchange",
            Self::SecureSettingsExchange { .. } => "SecureSettingsExchange",
            Self::LicensingExchange { .. } => "LicensingExchange",
            Self::CapabilitiesExchange { .. } => "CapabilitiesExchange",
            Self::ConnectionFinalization { .. } => "ConnectionFinalization",
            Self::Connected { .. } => "Connected",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    fn as_any(&self) -> &dyn core::any::Any {
        self
    }
}

/// The top-level connection sequence.
pub struct ClientConnector {
    pub config: Config,
    pub state: ClientConnectorState,
}

impl ClientConnector {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: ClientConnectorState::ConnectionInitiationSendRequest,
        }
    }

    /// True while the transport is expected to run the TLS upgrade.
    pub fn should_perform_security_upgrade(&self) -> bool {
        matches!(self.state, ClientConnectorState::EnhancedSecurityUpgrade { selected_protocol }
            if selected_protocol.intersects(nego::SecurityProtocol::SSL | nego::SecurityProtocol::HYBRID))
    }

    pub fn mark_security_upgrade_as_done(&mut self) {
        assert!(self.should_perform_security_upgrade());
        self.step_no_input(&mut WriteBuf::new()).expect("transition to next state");
        debug_assert!(!self.should_perform_security_upgrade());
    }

    /// True while the transport is expected to run the CredSSP legs.
    pub fn should_perform_credssp(&self) -> bool {
        matches!(self.state, ClientConnectorState::Credssp { .. })
    }

    pub fn mark_credssp_as_done(&mut self) {
        assert!(self.should_perform_credssp());
        let res = self.step_no_input(&mut WriteBuf::new()).expect("transition to next state");
        debug_assert!(!self.should_perform_credssp());
        assert_eq!(res, Written::Nothing);
    }

    pub fn selected_protocol(&self) -> Option<nego::SecurityProtocol> {
        match &self.state {
            ClientConnectorState::EnhancedSecurityUpgrade { selected_protocol }
            | ClientConnectorState::Credssp { selected_protocol }
            | ClientConnectorState::BasicSettingsExchangeSendInitial { selected_protocol } => Some(*selected_protocol),
            _ => None,
        }
    }
}

impl Sequence for ClientConnector {
    fn next_pdu_hint(&self) -> Option<&dyn PduHint> {
        match &self.state {
            ClientConnectorState::ConnectionInitiationWaitConfirm { .. } => Some(&oxrdp_pdu::X224_HINT),
            ClientConnectorState::BasicSettingsExchangeWaitResponse { .. } => Some(&oxrdp_pdu::X224_HINT),
            ClientConnectorState::ChannelConnection { channel_connection, .. } => channel_connection.next_pdu_hint(),
            ClientConnectorState::LicensingExchange { license_exchange, .. } => license_exchange.next_pdu_hint(),
            ClientConnectorState::CapabilitiesExchange { .. } => Some(&oxrdp_pdu::X224_HINT),
            ClientConnectorState::ConnectionFinalization {
                connection_finalization,
                ..
            } => connection_finalization.next_pdu_hint(),
            _ => None,
        }
    }

    fn state(&self) -> &dyn State {
        &self.state
    }

    fn step(&mut self, input: &[u8], output: &mut WriteBuf) -> ConnectorResult<Written> {
        let (written, next_state) = match mem::take(&mut self.state) {
            ClientConnectorState::Consumed => return Err(general_err!("connector sequence state is consumed")),

            //== Connection Initiation ==//
            ClientConnectorState::ConnectionInitiationSendRequest => {
                debug!("Connection Initiation");

                let connection_request = nego::ConnectionRequest {
                    cookie: Some(nego::Cookie(self.config.username.clone())),
                    flags: nego::RequestFlags::empty(),
                    protocol: self.config.security_protocol,
                };

                debug!(message = ?connection_request, "Send");

                let written = oxrdp_core::encode_buf(&oxrdp_pdu::x224::X224(connection_request), output)
                    .map_err(ConnectorError::encode)?;

                (
                    Written::from_size(written)?,
                    ClientConnectorState::ConnectionInitiationWaitConfirm {
                        requested_protocol: self.config.security_protocol,
                    },
                )
            }
            ClientConnectorState::ConnectionInitiationWaitConfirm { requested_protocol } => {
                let connection_confirm: oxrdp_pdu::x224::X224<nego::ConnectionConfirm> =
                    oxrdp_core::decode(input).map_err(ConnectorError::decode)?;

                debug!(message = ?connection_confirm.0, "Received");

                let (flags, selected_protocol) = match connection_confirm.0 {
                    nego::ConnectionConfirm::Response { flags, protocol } => (flags, protocol),
                    nego::ConnectionConfirm::Failure { code } => {
                        error!(?code, "Received connection failure code");
                        return Err(ConnectorError::new("Initiation", crate::ConnectorErrorKind::Negotiation(code)));
                    }
                };

                info!(?selected_protocol, ?flags, "Server confirmed connection");

                if selected_protocol.contains(nego::SecurityProtocol::HYBRID_EX) {
                    return Err(reason_err!("Initiation", "HYBRID_EX security is not supported"));
                }

                if !(selected_protocol.intersects(requested_protocol)
                    || selected_protocol.is_standard_rdp_security())
                {
                    return Err(reason_err!(
                        "Initiation",
                        "client advertised {requested_protocol:?}, but the server selected {selected_protocol:?}",
                    ));
                }

                (
                    Written::Nothing,
                    ClientConnectorState::EnhancedSecurityUpgrade { selected_protocol },
                )
            }

            //== Upgrade to Enhanced RDP Security ==//
            // The transport performs the TLS handshake between these steps
            // when an enhanced protocol was selected; standard RDP security
            // skips straight ahead.
            ClientConnectorState::EnhancedSecurityUpgrade { selected_protocol } => {
                let next_state = if selected_protocol.contains(nego::SecurityProtocol::HYBRID) {
                    debug!("Begin NLA using CredSSP");
                    ClientConnectorState::Credssp { selected_protocol }
                } else {
                    if selected_protocol.is_standard_rdp_security() {
                        debug!("Standard RDP security selected");
                    }
                    ClientConnectorState::BasicSettingsExchangeSendInitial { selected_protocol }
                };

                (Written::Nothing, next_state)
            }

            //== CredSSP ==//
            // Driven by the transport; nothing to do here.
            ClientConnectorState::Credssp { selected_protocol } => (
                Written::Nothing,
                ClientConnectorState::BasicSettingsExchangeSendInitial { selected_protocol },
            ),

            //== Basic Settings Exchange ==//
            ClientConnectorState::BasicSettingsExchangeSendInitial { selected_protocol } => {
                debug!("Basic Settings Exchange");

                let client_gcc_blocks = create_gcc_blocks(&self.config, selected_protocol);

                let connect_initial = mcs::ConnectInitial::with_gcc_blocks(client_gcc_blocks);

                debug!(message = ?connect_initial, "Send");

                let written = codec::encode_x224_packet(&connect_initial, output)?;

                (
                    Written::from_size(written)?,
                    ClientConnectorState::BasicSettingsExchangeWaitResponse {
                        connect_initial,
                        selected_protocol,
                    },
                )
            }
            ClientConnectorState::BasicSettingsExchangeWaitResponse {
                connect_initial,
                selected_protocol,
            } => {
                let connect_response: mcs::ConnectResponse = codec::decode_x224_packet(input)?;

                debug!(message = ?connect_response, "Received");

                let server_gcc_blocks = &connect_response.conference_create_response.gcc_blocks;

                let channel_names: Vec<String> = connect_initial
                    .channel_names()
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|def| def.name.as_str().map(str::to_owned))
                    .collect();

                let static_channel_ids = server_gcc_blocks.channel_ids();
                let io_channel_id = server_gcc_blocks.global_channel_id();

                debug!(?static_channel_ids, io_channel_id);

                // Standard security commencement happens only when no
                // enhanced protocol was selected and the server actually
                // turned encryption on.
                let server_security = if selected_protocol.is_standard_rdp_security() {
                    let security_data = &server_gcc_blocks.security;

                    match (
                        EncryptionMethod::from_gcc_encryption_method(security_data.encryption_method),
                        security_data.server_random,
                    ) {
                        (Some(encryption_method), Some(server_random)) => {
                            let public_key = parse_server_certificate(&security_data.server_cert)
                                .map_err(|e| custom_err!("serverCertificate", e))?;

                            Some(ServerSecurityInfo {
                                encryption_method,
                                server_random,
                                public_key,
                            })
                        }
                        _ => {
                            warn!("Standard RDP security selected, but the server disabled encryption");
                            None
                        }
                    }
                } else {
                    None
                };

                (
                    Written::Nothing,
                    ClientConnectorState::ChannelConnection {
                        io_channel_id,
                        channel_names,
                        channel_connection: ChannelConnectionSequence::new(io_channel_id, static_channel_ids.clone()),
                        server_security,
                    },
                )
            }

            //== Channel Connection ==//
            ClientConnectorState::ChannelConnection {
                io_channel_id,
                channel_names,
                mut channel_connection,
                server_security,
            } => {
                debug!("Channel Connection");

                let written = channel_connection.step(input, output)?;

                let next_state = if let ChannelConnectionState::AllJoined { user_channel_id } =
                    channel_connection.state
                {
                    // channel_ids = [user, io, static...]
                    let static_channels: HashMap<String, u16> = channel_names
                        .iter()
                        .cloned()
                        .zip(channel_connection.channel_ids.iter().copied().skip(2))
                        .collect();

                    match server_security {
                        Some(server_security) => ClientConnectorState::SecurityExchange {
                            io_channel_id,
                            user_channel_id,
                            static_channels,
                            server_security,
                        },
                        None => ClientConnectorState::SecureSettingsExchange {
                            io_channel_id,
                            user_channel_id,
                            static_channels,
                            security: None,
                        },
                    }
                } else {
                    ClientConnectorState::ChannelConnection {
                        io_channel_id,
                        channel_names,
                        channel_connection,
                        server_security,
                    }
                };

                (written, next_state)
            }

            //== RDP Security Commencement ==//
            // Generate the client random, derive the session keys and send
            // the RSA-sealed random as a Security Exchange PDU.
            ClientConnectorState::SecurityExchange {
                io_channel_id,
                user_channel_id,
                static_channels,
                server_security,
            } => {
                debug!("RDP Security Commencement");

                let mut client_random = [0u8; 32];
                rand::rngs::OsRng.fill_bytes(&mut client_random);

                let session_keys = derive_session_keys(
                    &client_random,
                    &server_security.server_random,
                    server_security.encryption_method,
                );

                let encrypted_client_random = encrypt_client_secret(&server_security.public_key, &client_random)
                    .map_err(ConnectorError::security)?;

                let security_exchange = SecurityExchangePdu {
                    encrypted_client_random,
                };

                debug!(message = ?security_exchange, "Send");

                // The exchange PDU itself is never encrypted.
                let written = codec::encode_send_data_request(
                    user_channel_id,
                    io_channel_id,
                    &security_exchange,
                    Some(BasicSecurityHeaderFlags::EXCHANGE_PKT),
                    None,
                    output,
                )?;

                let security = SecurityContext::new(session_keys, server_security.encryption_method);

                (
                    Written::from_size(written)?,
                    ClientConnectorState::SecureSettingsExchange {
                        io_channel_id,
                        user_channel_id,
                        static_channels,
                        security: Some(security),
                    },
                )
            }

            //== Secure Settings Exchange ==//
            ClientConnectorState::SecureSettingsExchange {
                io_channel_id,
                user_channel_id,
                static_channels,
                mut security,
            } => {
                debug!("Secure Settings Exchange");

                let client_info = create_client_info(&self.config);

                debug!("Send Client Info PDU");

                let written = codec::encode_send_data_request(
                    user_channel_id,
                    io_channel_id,
                    &client_info,
                    Some(BasicSecurityHeaderFlags::INFO_PKT),
                    security.as_mut(),
                    output,
                )?;

                (
                    Written::from_size(written)?,
                    ClientConnectorState::LicensingExchange {
                        io_channel_id,
                        user_channel_id,
                        static_channels,
                        license_exchange: Box::new(LicenseExchangeSequence::new(
                            io_channel_id,
                            user_channel_id,
                            self.config.username.clone(),
                            self.config.client_name.clone(),
                            None,
                            security,
                        )),
                    },
                )
            }

            //== Licensing ==//
            ClientConnectorState::LicensingExchange {
                io_channel_id,
                user_channel_id,
                static_channels,
                mut license_exchange,
            } => {
                debug!("Licensing Exchange");

                let written = license_exchange.step(input, output)?;

                let next_state = if license_exchange.state.is_terminal() {
                    ClientConnectorState::CapabilitiesExchange {
                        io_channel_id,
                        user_channel_id,
                        static_channels,
                        security: license_exchange.into_security(),
                    }
                } else {
                    ClientConnectorState::LicensingExchange {
                        io_channel_id,
                        user_channel_id,
                        static_channels,
                        license_exchange,
                    }
                };

                (written, next_state)
            }

            //== Capabilities Exchange ==//
            ClientConnectorState::CapabilitiesExchange {
                io_channel_id,
                user_channel_id,
                static_channels,
                mut security,
            } => {
                debug!("Capabilities Exchange");

                let ctx = codec::decode_send_data_indication(input)?;
                let share_control_ctx = codec::decode_share_control(ctx, security.as_mut())?;

                debug!(message = ?share_control_ctx.pdu.as_short_name(), "Received");

                if share_control_ctx.channel_id != io_channel_id {
                    warn!(
                        io_channel_id,
                        share_control_ctx.channel_id, "Unexpected channel ID for the received Share Control PDU"
                    );
                }

                let ShareControlPdu::ServerDemandActive(server_demand_active) = share_control_ctx.pdu else {
                    return Err(general_err!("expected Server Demand Active"));
                };

                let server_capability_sets = server_demand_active.pdu.capability_sets;

                let desktop_size = server_capability_sets
                    .iter()
                    .find_map(|c| match c {
                        CapabilitySet::Bitmap(b) => Some(DesktopSize {
                            width: b.desktop_width,
                            height: b.desktop_height,
                        }),
                        _ => None,
                    })
                    .unwrap_or(self.config.desktop_size);

                let confirm_active = create_client_confirm_active(&self.config, share_control_ctx.pdu_source);
                let client_capability_sets = confirm_active.pdu.capability_sets.clone();

                debug!("Send Client Confirm Active PDU");

                let share_id = share_control_ctx.share_id;

                let written = codec::encode_share_control(
                    user_channel_id,
                    io_channel_id,
                    share_id,
                    ShareControlPdu::ClientConfirmActive(confirm_active),
                    security.as_mut(),
                    output,
                )?;

                (
                    Written::from_size(written)?,
                    ClientConnectorState::ConnectionFinalization {
                        io_channel_id,
                        user_channel_id,
                        static_channels,
                        desktop_size,
                        server_capability_sets,
                        client_capability_sets,
                        connection_finalization: Box::new(ConnectionFinalizationSequence::new(
                            io_channel_id,
                            user_channel_id,
                            share_id,
                            security,
                        )),
                    },
                )
            }

            //== Connection Finalization ==//
            ClientConnectorState::ConnectionFinalization {
                io_channel_id,
                user_channel_id,
                static_channels,
                desktop_size,
                server_capability_sets,
                client_capability_sets,
                mut connection_finalization,
            } => {
                debug!("Connection Finalization");

                let written = connection_finalization.step(input, output)?;

                let next_state = if connection_finalization.state.is_terminal() {
                    let share_id = connection_finalization.share_id;
                    let security = connection_finalization.into_security();

                    ClientConnectorState::Connected {
                        result: ConnectionResult {
                            io_channel_id,
                            user_channel_id,
                            share_id,
                            static_channels,
                            desktop_size,
                            server_capability_sets,
                            client_capability_sets,
                            security,
                        },
                    }
                } else {
                    ClientConnectorState::ConnectionFinalization {
                        io_channel_id,
                        user_channel_id,
                        static_channels,
                        desktop_size,
                        server_capability_sets,
                        client_capability_sets,
                        connection_finalization,
                    }
                };

                (written, next_state)
            }

            ClientConnectorState::Connected { .. } => return Err(general_err!("already connected")),
        };

        self.state = next_state;

        Ok(written)
    }
}

fn create_gcc_blocks(config: &Config, selected_protocol: nego::SecurityProtocol) -> gcc::ClientGccBlocks {
    use oxrdp_pdu::gcc::*;

    let encryption_methods = if selected_protocol.is_standard_rdp_security() {
        EncryptionMethod::BIT_40 | EncryptionMethod::BIT_56 | EncryptionMethod::BIT_128
    } else {
        EncryptionMethod::empty()
    };

    gcc::ClientGccBlocks {
        core: ClientCoreData {
            version: RdpVersion::V5_PLUS,
            desktop_width: config.desktop_size.width,
            desktop_height: config.desktop_size.height,
            color_depth: ColorDepth::Bpp8, // superseded by the optional tail
            sec_access_sequence: SecureAccessSequence::Del,
            keyboard_layout: 0, // the server picks its default active layout
            client_build: config.client_build,
            client_name: config.client_name.clone(),
            keyboard_type: config.keyboard_type,
            keyboard_subtype: config.keyboard_subtype,
            keyboard_functional_keys_count: config.keyboard_functional_keys_count,
            ime_file_name: config.ime_file_name.clone(),
            optional_data: ClientCoreOptionalData {
                post_beta2_color_depth: Some(ColorDepth::Bpp8),
                client_product_id: Some(1),
                serial_number: Some(0),
                high_color_depth: Some(HighColorDepth::Bpp16),
                supported_color_depths: Some(
                    SupportedColorDepths::BPP15 | SupportedColorDepths::BPP16 | SupportedColorDepths::BPP24,
                ),
                early_capability_flags: Some(ClientEarlyCapabilityFlags::VALID_CONNECTION_TYPE
                    | ClientEarlyCapabilityFlags::SUPPORT_ERR_INFO_PDU),
                dig_product_id: Some(config.dig_product_id.clone()),
                connection_type: Some(ConnectionType::Lan),
                server_selected_protocol: Some(selected_protocol),
            },
        },
        security: ClientSecurityData {
            encryption_methods,
            ext_encryption_methods: 0,
        },
        network: Some(ClientNetworkData {
            channels: config
                .static_channels
                .iter()
                .filter_map(|name| ChannelName::from_utf8(name))
                .map(|name| ChannelDef {
                    name,
                    options: ChannelOptions::INITIALIZED
                        | ChannelOptions::ENCRYPT_RDP
                        | ChannelOptions::COMPRESS_RDP
                        | ChannelOptions::SHOW_PROTOCOL,
                })
                .collect(),
        }),
        cluster: Some(ClientClusterData {
            flags: RedirectionFlags::REDIRECTION_SUPPORTED,
            redirection_version: RedirectionVersion::V4,
            redirected_session_id: 0,
        }),
    }
}

fn create_client_info(config: &Config) -> ClientInfo {
    ClientInfo {
        credentials: Credentials {
            username: config.username.clone(),
            password: config.password.clone(),
            domain: config.domain.clone(),
        },
        code_page: 0, // ignored because keyboardLayout is zero
        flags: ClientInfoFlags::MOUSE
            | ClientInfoFlags::UNICODE
            | ClientInfoFlags::MAXIMIZE_SHELL
            | ClientInfoFlags::DISABLE_CTRL_ALT_DEL
            | ClientInfoFlags::ENABLE_WINDOWS_KEY
            | ClientInfoFlags::MOUSE_HAS_WHEEL
            | ClientInfoFlags::FORCE_ENCRYPTED_CS_PDU
            | ClientInfoFlags::AUTOLOGON
            | ClientInfoFlags::LOGON_NOTIFY
            | ClientInfoFlags::LOGON_ERRORS,
        alternate_shell: String::new(),
        work_dir: String::new(),
        extra_info: ExtendedClientInfo {
            address_family: AddressFamily::INet,
            address: String::new(),
            dir: String::new(),
            performance_flags: PerformanceFlags::empty(),
        },
    }
}

fn create_client_confirm_active(config: &Config, originator_id: u16) -> ClientConfirmActive {
    use oxrdp_pdu::rdp::capability_sets::*;

    let capability_sets = vec![
        CapabilitySet::General(General {
            extra_flags: GeneralExtraFlags::FASTPATH_OUTPUT_SUPPORTED | GeneralExtraFlags::NO_BITMAP_COMPRESSION_HDR,
            ..General::default()
        }),
        CapabilitySet::Bitmap(Bitmap {
            pref_bits_per_pix: 16,
            desktop_width: config.desktop_size.width,
            desktop_height: config.desktop_size.height,
            desktop_resize_flag: false,
            drawing_flags: BitmapDrawingFlags::empty(),
        }),
        // All order support bytes zero: the server must fall back to plain
        // bitmap updates.
        CapabilitySet::Order(Order::bitmap_updates_only()),
        CapabilitySet::BitmapCache(BitmapCache {
            caches: [CacheEntry {
                entries: 0,
                max_cell_size: 0,
            }; BITMAP_CACHE_ENTRIES_NUM],
        }),
        CapabilitySet::Pointer(Pointer {
            color_pointer_cache_size: 20,
            pointer_cache_size: 20,
        }),
        CapabilitySet::Input(Input {
            input_flags: InputFlags::SCANCODES | InputFlags::UNICODE | InputFlags::MOUSEX,
            keyboard_layout: 0,
            keyboard_type: 4,
            keyboard_subtype: config.keyboard_subtype,
            keyboard_function_key: config.keyboard_functional_keys_count,
            keyboard_ime_filename: config.ime_file_name.clone(),
        }),
        CapabilitySet::Brush(Brush {
            support_level: SupportLevel::Default,
        }),
        CapabilitySet::GlyphCache(GlyphCache {
            glyph_cache: [CacheDefinition {
                entries: 0,
                max_cell_size: 0,
            }; GLYPH_CACHE_NUM],
            frag_cache: CacheDefinition {
                entries: 0,
                max_cell_size: 0,
            },
            glyph_support_level: GlyphSupportLevel::None,
        }),
        CapabilitySet::OffscreenBitmapCache(OffscreenBitmapCache {
            is_supported: false,
            cache_size: 0,
            cache_entries: 0,
        }),
        CapabilitySet::VirtualChannel(VirtualChannel {
            flags: VirtualChannelFlags::NO_COMPRESSION,
            chunk_size: None,
        }),
        CapabilitySet::Sound(Sound {
            flags: SoundFlags::empty(),
        }),
        // controlFlags 0, remoteDetachFlag 0, controlInterest 2, detachInterest 2
        CapabilitySet::Control(vec![0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x02, 0x00]),
        CapabilitySet::WindowActivation(vec![0x00; 8]),
        CapabilitySet::Share(vec![0x00; 4]),
        // fontSupportFlags FONTSUPPORT_FONTLIST, pad
        CapabilitySet::Font(vec![0x01, 0x00, 0x00, 0x00]),
    ];

    ClientConfirmActive {
        originator_id,
        pdu: DemandActive {
            source_descriptor: "oxrdp".to_owned(),
            capability_sets,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdp_core::encode_vec;

    fn connector() -> ClientConnector {
        ClientConnector::new(Config::new(
            DesktopSize {
                width: 1024,
                height: 768,
            },
            "user".to_owned(),
            "pass".to_owned(),
            None,
        ))
    }

    #[test]
    fn connection_request_is_produced_first() {
        let mut connector = connector();
        let mut buf = WriteBuf::new();

        assert!(connector.next_pdu_hint().is_none());
        let written = connector.step_no_input(&mut buf).unwrap();

        assert!(written.size().is_some());
        assert_eq!(connector.state.name(), "ConnectionInitiationWaitConfirm");
    }

    #[test]
    fn negotiation_failure_aborts_the_sequence() {
        let mut connector = connector();
        let mut buf = WriteBuf::new();
        connector.step_no_input(&mut buf).unwrap();

        // SSL_NOT_ALLOWED_BY_SERVER
        let failure = encode_vec(&oxrdp_pdu::x224::X224(nego::ConnectionConfirm::Failure {
            code: nego::FailureCode::SSL_NOT_ALLOWED_BY_SERVER,
        }))
        .unwrap();

        buf.clear();
        let err = connector.step(&failure, &mut buf).unwrap_err();

        assert!(matches!(
            err.kind(),
            crate::ConnectorErrorKind::Negotiation(code) if *code == nego::FailureCode::SSL_NOT_ALLOWED_BY_SERVER
        ));
    }

    #[test]
    fn hybrid_ex_selection_is_refused() {
        let mut connector = connector();
        let mut buf = WriteBuf::new();
        connector.step_no_input(&mut buf).unwrap();

        let confirm = encode_vec(&oxrdp_pdu::x224::X224(nego::ConnectionConfirm::Response {
            flags: nego::ResponseFlags::empty(),
            protocol: nego::SecurityProtocol::HYBRID_EX,
        }))
        .unwrap();

        buf.clear();
        assert!(connector.step(&confirm, &mut buf).is_err());
    }

    #[test]
    fn tls_selection_leads_to_security_upgrade() {
        let mut connector = connector();
        let mut buf = WriteBuf::new();
        connector.step_no_input(&mut buf).unwrap();

        let confirm = encode_vec(&oxrdp_pdu::x224::X224(nego::ConnectionConfirm::Response {
            flags: nego::ResponseFlags::empty(),
            protocol: nego::SecurityProtocol::SSL,
        }))
        .unwrap();

        buf.clear();
        connector.step(&confirm, &mut buf).unwrap();

        assert!(connector.should_perform_security_upgrade());
        connector.mark_security_upgrade_as_done();
        assert_eq!(connector.state.name(), "BasicSettingsExchangeSendInitial");
    }
}
