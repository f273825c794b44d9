//! The high-level RDP client.
//!
//! ```no_run
//! use oxrdp_client::RdpClient;
//!
//! let mut client = RdpClient::new("192.168.1.10:3389", 1280, 800);
//! client.on_bitmap(|updates| {
//!     for update in updates {
//!         // blit update.data at update.rectangle
//!     }
//! });
//! client.on_close(|| println!("session closed"));
//! client.login("", "user", "password").unwrap();
//!
//! client.mouse_move(10, 20);
//! client.key_down(0x1C); // Enter
//! client.key_up(0x1C);
//! ```
//!
//! One reader thread drives the session; input calls enqueue events that
//! the reader drains between frames, so sends stay in call order.

#[macro_use]
extern crate tracing;

mod session_thread;
mod stream;

use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use oxrdp_blocking::{Framed, SecurityUpgrade};
use oxrdp_connector::{ClientConnector, Config, DesktopSize, State as _};
use oxrdp_core::WriteBuf;
use oxrdp_pdu::input::{InputEvent, KeyboardFlags, MousePdu, PointerFlags, ScanCodePdu, SyncPdu, SyncToggleFlags, UnicodePdu};
use oxrdp_pdu::input::unicode::UnicodeKeyboardFlags;
use oxrdp_session::ActiveStage;

pub use oxrdp_session::{BitmapUpdate, GracefulDisconnectReason};
pub use stream::RdpStream;

use session_thread::Callbacks;

const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const READ_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Mouse buttons as exposed by the public surface: 0 = left, 1 = middle,
/// 2 = right.
const BUTTON_LEFT: u8 = 0;
const BUTTON_MIDDLE: u8 = 1;
const BUTTON_RIGHT: u8 = 2;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("could not resolve the server address")]
    AddressResolution,
    #[error("transport failure")]
    Io(#[from] std::io::Error),
    #[error("connection sequence failed")]
    Connector(#[from] oxrdp_connector::ConnectorError),
    #[error("session processing failed")]
    Session(#[from] oxrdp_session::SessionError),
    #[error("the session is not established")]
    NotConnected,
}

/// The RDP client: owns the session lifecycle and the typed callbacks.
pub struct RdpClient {
    addr: String,
    desktop_size: DesktopSize,
    static_channels: Vec<String>,
    callbacks: Callbacks,
    input_tx: Option<mpsc::Sender<InputEvent>>,
    shutdown_handle: Option<TcpStream>,
    closing: Arc<AtomicBool>,
    reader: Option<std::thread::JoinHandle<()>>,
}

impl RdpClient {
    /// `addr` is a `host:port` pair; `width`/`height` the desktop size to
    /// request.
    pub fn new(addr: impl Into<String>, width: u16, height: u16) -> Self {
        Self {
            addr: addr.into(),
            desktop_size: DesktopSize { width, height },
            static_channels: Vec::new(),
            callbacks: Callbacks::default(),
            input_tx: None,
            shutdown_handle: None,
            closing: Arc::new(AtomicBool::new(false)),
            reader: None,
        }
    }

    /// Announces a static virtual channel (7 ASCII characters at most)
    /// before [`login`](Self::login); its id is assigned during channel
    /// join. Payload handling beyond the generic plumbing is up to the
    /// caller.
    pub fn register_channel(&mut self, name: impl Into<String>) -> &mut Self {
        self.static_channels.push(name.into());
        self
    }

    /// Fatal session errors end up here, right before `on_close`.
    pub fn on_error(&mut self, callback: impl FnMut(&ClientError) + Send + 'static) -> &mut Self {
        self.callbacks.on_error = Some(Box::new(callback));
        self
    }

    /// Fired exactly once when the session ends, whatever the cause.
    pub fn on_close(&mut self, callback: impl FnMut() + Send + 'static) -> &mut Self {
        self.callbacks.on_close = Some(Box::new(callback));
        self
    }

    /// Fired when the licensing stage completes.
    pub fn on_success(&mut self, callback: impl FnMut() + Send + 'static) -> &mut Self {
        self.callbacks.on_success = Some(Box::new(callback));
        self
    }

    /// Fired when the font map arrives and the session becomes interactive.
    /// No bitmap is delivered before this point.
    pub fn on_ready(&mut self, callback: impl FnMut() + Send + 'static) -> &mut Self {
        self.callbacks.on_ready = Some(Box::new(callback));
        self
    }

    /// Receives the decoded bitmap updates, in wire order.
    pub fn on_bitmap(&mut self, callback: impl FnMut(Vec<BitmapUpdate>) + Send + 'static) -> &mut Self {
        self.callbacks.on_bitmap = Some(Box::new(callback));
        self
    }

    /// Connects, authenticates and runs the connection sequence, then
    /// spawns the reader thread. `on_success` and `on_ready` fire during
    /// this call; bitmap updates start arriving after it returns.
    ///
    /// On failure the error is published through `on_error` followed by
    /// `on_close`, and also returned.
    pub fn login(&mut self, domain: &str, username: &str, password: &str) -> ClientResult<()> {
        match self.login_impl(domain, username, password) {
            Ok(()) => Ok(()),
            Err(error) => {
                self.callbacks.emit_error(&error);
                self.callbacks.emit_close();
                Err(error)
            }
        }
    }

    fn login_impl(&mut self, domain: &str, username: &str, password: &str) -> ClientResult<()> {
        let server_addr = self
            .addr
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or(ClientError::AddressResolution)?;

        let host = self.addr.split(':').next().unwrap_or_default().to_owned();

        let tcp = TcpStream::connect_timeout(&server_addr, TCP_CONNECT_TIMEOUT)?;
        tcp.set_nodelay(true)?;

        self.shutdown_handle = Some(tcp.try_clone()?);

        let mut config = Config::new(
            self.desktop_size,
            username.to_owned(),
            password.to_owned(),
            if domain.is_empty() { None } else { Some(domain.to_owned()) },
        );
        config.static_channels = self.static_channels.clone();

        let mut connector = ClientConnector::new(config);
        let mut framed = Framed::new(RdpStream::Tcp(tcp));

        // Run the sequence up to the security upgrade decision.
        let upgrade = oxrdp_blocking::connect_begin(&mut framed, &mut connector)?;

        if upgrade == SecurityUpgrade::Tls {
            let (stream, leftover) = framed.into_inner();

            let RdpStream::Tcp(tcp) = stream else {
                unreachable!("the transport is not upgraded twice");
            };

            let (tls, server_public_key) = oxrdp_tls::upgrade(tcp, &host)?;

            framed = Framed::new_with_leftover(RdpStream::Tls(Box::new(tls)), leftover);
            oxrdp_blocking::mark_as_upgraded(&mut connector);

            if connector.should_perform_credssp() {
                oxrdp_blocking::perform_credssp(&mut framed, &mut connector, server_public_key)?;
            }
        }

        // Drive the remaining sequence, surfacing the success/ready pair at
        // the right transitions.
        let mut buf = WriteBuf::new();
        let connection_result = loop {
            let was_licensing = connector.state.name() == "LicensingExchange";

            oxrdp_blocking::single_connect_step(&mut framed, &mut connector, &mut buf)?;

            if was_licensing && connector.state.name() != "LicensingExchange" {
                self.callbacks.emit_success();
            }

            if let oxrdp_connector::ClientConnectorState::Connected { result } = connector.state {
                break result;
            }
        };

        self.callbacks.emit_ready();

        // Switch the socket to the polling discipline used by the reader
        // thread so queued input gets a chance between frames.
        framed
            .get_inner_mut()
            .0
            .set_read_timeout(Some(READ_POLL_INTERVAL))?;

        let (input_tx, input_rx) = mpsc::channel();
        self.input_tx = Some(input_tx);

        let active_stage = ActiveStage::new(connection_result);
        let callbacks = std::mem::take(&mut self.callbacks);
        let closing = Arc::clone(&self.closing);

        self.reader = Some(std::thread::spawn(move || {
            session_thread::run(framed, active_stage, callbacks, input_rx, closing);
        }));

        Ok(())
    }

    /// Sends a key press. Scancodes above 0xFF (the 0xE0-prefixed set) are
    /// sent with the extended flag.
    pub fn key_down(&self, scancode: u16) -> ClientResult<()> {
        self.send_input(InputEvent::ScanCode(ScanCodePdu {
            flags: extended_flag(scancode),
            key_code: scancode & 0xFF,
        }))
    }

    /// Sends a key release.
    pub fn key_up(&self, scancode: u16) -> ClientResult<()> {
        self.send_input(InputEvent::ScanCode(ScanCodePdu {
            flags: KeyboardFlags::RELEASE | extended_flag(scancode),
            key_code: scancode & 0xFF,
        }))
    }

    /// Sends a unicode character press/release pair.
    pub fn unicode_key(&self, code: u16) -> ClientResult<()> {
        self.send_input(InputEvent::Unicode(UnicodePdu {
            flags: UnicodeKeyboardFlags::empty(),
            unicode_code: code,
        }))?;
        self.send_input(InputEvent::Unicode(UnicodePdu {
            flags: UnicodeKeyboardFlags::RELEASE,
            unicode_code: code,
        }))
    }

    pub fn mouse_move(&self, x: u16, y: u16) -> ClientResult<()> {
        self.send_input(InputEvent::Mouse(MousePdu {
            flags: PointerFlags::MOVE,
            number_of_wheel_rotation_units: 0,
            x_position: x,
            y_position: y,
        }))
    }

    pub fn mouse_down(&self, button: u8, x: u16, y: u16) -> ClientResult<()> {
        self.send_input(InputEvent::Mouse(MousePdu {
            flags: PointerFlags::DOWN | button_flag(button),
            number_of_wheel_rotation_units: 0,
            x_position: x,
            y_position: y,
        }))
    }

    pub fn mouse_up(&self, button: u8, x: u16, y: u16) -> ClientResult<()> {
        self.send_input(InputEvent::Mouse(MousePdu {
            flags: button_flag(button),
            number_of_wheel_rotation_units: 0,
            x_position: x,
            y_position: y,
        }))
    }

    /// Sends a vertical mouse wheel rotation.
    pub fn mouse_wheel(&self, delta: i16, x: u16, y: u16) -> ClientResult<()> {
        self.send_input(InputEvent::Mouse(MousePdu {
            flags: PointerFlags::VERTICAL_WHEEL,
            number_of_wheel_rotation_units: delta,
            x_position: x,
            y_position: y,
        }))
    }

    /// Sends the keyboard toggle-key state.
    pub fn sync_toggle_keys(&self, flags: SyncToggleFlags) -> ClientResult<()> {
        self.send_input(InputEvent::Sync(SyncPdu { flags }))
    }

    /// Shuts the session down. The reader thread unblocks, `on_close`
    /// fires, and the socket is torn down.
    pub fn close(&mut self) {
        self.closing.store(true, Ordering::SeqCst);

        if let Some(handle) = self.shutdown_handle.take() {
            let _ = handle.shutdown(std::net::Shutdown::Both);
        }

        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }

    fn send_input(&self, event: InputEvent) -> ClientResult<()> {
        self.input_tx
            .as_ref()
            .ok_or(ClientError::NotConnected)?
            .send(event)
            .map_err(|_| ClientError::NotConnected)
    }
}

impl Drop for RdpClient {
    fn drop(&mut self) {
        self.close();
    }
}

fn extended_flag(scancode: u16) -> KeyboardFlags {
    if scancode & 0xFF00 != 0 {
        KeyboardFlags::EXTENDED
    } else {
        KeyboardFlags::empty()
    }
}

fn button_flag(button: u8) -> PointerFlags {
    match button {
        BUTTON_LEFT => PointerFlags::LEFT_BUTTON,
        BUTTON_MIDDLE => PointerFlags::MIDDLE_BUTTON_OR_WHEEL,
        BUTTON_RIGHT => PointerFlags::RIGHT_BUTTON,
        _ => PointerFlags::LEFT_BUTTON,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_mapping_follows_the_public_contract() {
        assert_eq!(button_flag(0), PointerFlags::LEFT_BUTTON);
        assert_eq!(button_flag(1), PointerFlags::MIDDLE_BUTTON_OR_WHEEL);
        assert_eq!(button_flag(2), PointerFlags::RIGHT_BUTTON);
    }

    #[test]
    fn extended_scancodes_are_flagged() {
        assert_eq!(extended_flag(0x001C), KeyboardFlags::empty());
        assert_eq!(extended_flag(0xE048), KeyboardFlags::EXTENDED);
    }

    #[test]
    fn input_before_login_is_rejected() {
        let client = RdpClient::new("127.0.0.1:3389", 800, 600);
        assert!(matches!(client.mouse_move(1, 2), Err(ClientError::NotConnected)));
    }
}
