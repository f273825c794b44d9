use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// The session transport: a plain TCP stream, or the same stream upgraded
/// to TLS.
pub enum RdpStream {
    Tcp(TcpStream),
    Tls(Box<oxrdp_tls::TlsStream>),
}

impl RdpStream {
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            RdpStream::Tcp(stream) => stream.set_read_timeout(timeout),
            RdpStream::Tls(stream) => stream.sock.set_read_timeout(timeout),
        }
    }
}

impl Read for RdpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            RdpStream::Tcp(stream) => stream.read(buf),
            RdpStream::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for RdpStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            RdpStream::Tcp(stream) => stream.write(buf),
            RdpStream::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            RdpStream::Tcp(stream) => stream.flush(),
            RdpStream::Tls(stream) => stream.flush(),
        }
    }
}
