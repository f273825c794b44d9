//! Blocking TLS upgrade for the RDP enhanced security protocols.

use std::io;
use std::net::TcpStream;
use std::sync::Arc;

use x509_cert::der::Decode as _;

pub type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// Performs the TLS handshake over `stream` and returns the upgraded stream
/// together with the DER public key of the peer certificate (needed by
/// CredSSP for channel binding).
///
/// The peer certificate is NOT validated against a trust store: RDP servers
/// overwhelmingly present self-signed machine certificates, and the original
/// client behaves the same way. The extracted public key still binds the
/// CredSSP exchange to this exact TLS channel.
pub fn upgrade(stream: TcpStream, server_name: &str) -> io::Result<(TlsStream, Vec<u8>)> {
    let mut config = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(Arc::new(danger::NoCertificateVerification))
        .with_no_client_auth();

    // CredSSP does not support TLS session resumption.
    config.resumption = rustls::client::Resumption::disabled();

    let server_name = server_name
        .try_into()
        .unwrap_or_else(|_| rustls::ServerName::try_from("localhost").expect("valid static name"));

    let connection = rustls::ClientConnection::new(Arc::new(config), server_name)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let mut tls_stream = rustls::StreamOwned::new(connection, stream);

    // Drive the handshake to completion so that the peer certificate is
    // available before the first CredSSP leg.
    while tls_stream.conn.is_handshaking() {
        tls_stream
            .conn
            .complete_io(&mut tls_stream.sock)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    }

    let server_public_key = {
        let cert = tls_stream
            .conn
            .peer_certificates()
            .and_then(|certificates| certificates.first())
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "peer certificate is missing"))?;
        extract_server_public_key(&cert.0)?
    };

    Ok((tls_stream, server_public_key))
}

/// Extracts the DER public key bytes from an X.509 certificate.
pub fn extract_server_public_key(cert_der: &[u8]) -> io::Result<Vec<u8>> {
    let cert = x509_cert::Certificate::from_der(cert_der)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    cert.tbs_certificate
        .subject_public_key_info
        .subject_public_key
        .as_bytes()
        .map(<[u8]>::to_vec)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unaligned subject public key"))
}

mod danger {
    use std::time::SystemTime;

    use rustls::client::{ServerCertVerified, ServerCertVerifier};
    use rustls::{Certificate, Error, ServerName};

    pub(super) struct NoCertificateVerification;

    impl ServerCertVerifier for NoCertificateVerification {
        fn verify_server_cert(
            &self,
            _end_entity: &Certificate,
            _intermediates: &[Certificate],
            _server_name: &ServerName,
            _scts: &mut dyn Iterator<Item = &[u8]>,
            _ocsp_response: &[u8],
            _now: SystemTime,
        ) -> Result<ServerCertVerified, Error> {
            Ok(ServerCertVerified::assertion())
        }
    }
}
