//! Server certificate parsing (TS_UD_SC_SEC1 serverCertificate).
//!
//! Two formats reach the client: the RDP proprietary certificate with its
//! little-endian RSA key, and an X.509 chain whose leaf carries a PKCS#1
//! public key inside the SubjectPublicKeyInfo.

use oxrdp_core::ReadCursor;
use rsa::{BigUint, RsaPublicKey};
use x509_cert::der::Decode as _;

use crate::{SecurityError, SecurityResult};

const CERT_CHAIN_VERSION_MASK: u32 = 0x7FFF_FFFF;
const CERT_CHAIN_VERSION_1: u32 = 1;
const CERT_CHAIN_VERSION_2: u32 = 2;

const SIGNATURE_ALG_RSA: u32 = 0x0000_0001;
const KEY_EXCHANGE_ALG_RSA: u32 = 0x0000_0001;
const BB_RSA_KEY_BLOB: u16 = 0x0006;
const RSA_KEY_MAGIC: u32 = 0x3141_5352; // "RSA1"
const RSA_KEY_PADDING: usize = 8;

/// An RSA public key extracted from a server certificate.
pub struct ServerPublicKey {
    key: RsaPublicKey,
}

impl ServerPublicKey {
    pub fn as_rsa(&self) -> &RsaPublicKey {
        &self.key
    }

    fn from_parts(modulus_be: &[u8], exponent: &[u8]) -> SecurityResult<Self> {
        let n = BigUint::from_bytes_be(modulus_be);
        let e = BigUint::from_bytes_be(exponent);

        RsaPublicKey::new(n, e)
            .map(|key| Self { key })
            .map_err(|_| SecurityError::InvalidCertificate("rejected RSA public key"))
    }
}

/// Parses a serverCertificate blob and extracts its public key.
pub fn parse_server_certificate(blob: &[u8]) -> SecurityResult<ServerPublicKey> {
    let mut src = ReadCursor::new(blob);

    let version = src
        .try_read_u32()
        .map_err(|_| SecurityError::InvalidCertificate("truncated certificate header"))?;

    match version & CERT_CHAIN_VERSION_MASK {
        CERT_CHAIN_VERSION_1 => parse_proprietary_certificate(&mut src),
        CERT_CHAIN_VERSION_2 => parse_x509_chain(&mut src),
        _ => Err(SecurityError::InvalidCertificate("unknown certificate chain version")),
    }
}

fn parse_proprietary_certificate(src: &mut ReadCursor<'_>) -> SecurityResult<ServerPublicKey> {
    let truncated = |_| SecurityError::InvalidCertificate("truncated proprietary certificate");

    let sig_alg_id = src.try_read_u32().map_err(truncated)?;
    let key_alg_id = src.try_read_u32().map_err(truncated)?;

    if sig_alg_id != SIGNATURE_ALG_RSA || key_alg_id != KEY_EXCHANGE_ALG_RSA {
        return Err(SecurityError::InvalidCertificate("unsupported certificate algorithms"));
    }

    let blob_type = src.try_read_u16().map_err(truncated)?;
    let blob_len = usize::from(src.try_read_u16().map_err(truncated)?);

    if blob_type != BB_RSA_KEY_BLOB {
        return Err(SecurityError::InvalidCertificate("expected an RSA public key blob"));
    }

    let blob = src.try_read_slice(blob_len).map_err(truncated)?;
    let mut key = ReadCursor::new(blob);

    let magic = key.try_read_u32().map_err(truncated)?;
    if magic != RSA_KEY_MAGIC {
        return Err(SecurityError::InvalidCertificate("bad RSA public key magic"));
    }

    let key_len = usize::try_from(key.try_read_u32().map_err(truncated)?).unwrap();
    let _bit_len = key.try_read_u32().map_err(truncated)?;
    let _data_len = key.try_read_u32().map_err(truncated)?;
    let exponent = key.try_read_u32().map_err(truncated)?;

    if key_len < RSA_KEY_PADDING || key.len() < key_len {
        return Err(SecurityError::InvalidCertificate("bad RSA public key length"));
    }

    // The modulus is little-endian with 8 bytes of zero padding at the end.
    let mut modulus = key.try_read_slice(key_len - RSA_KEY_PADDING).map_err(truncated)?.to_vec();
    modulus.reverse();

    ServerPublicKey::from_parts(&modulus, &exponent.to_be_bytes())
}

fn parse_x509_chain(src: &mut ReadCursor<'_>) -> SecurityResult<ServerPublicKey> {
    let truncated = |_| SecurityError::InvalidCertificate("truncated X.509 certificate chain");

    let cert_count = src.try_read_u32().map_err(truncated)?;
    if cert_count == 0 {
        return Err(SecurityError::InvalidCertificate("empty X.509 certificate chain"));
    }

    // The leaf is the last certificate of the chain.
    let mut leaf = &[][..];
    for _ in 0..cert_count {
        let cert_len = usize::try_from(src.try_read_u32().map_err(truncated)?).unwrap();
        leaf = src.try_read_slice(cert_len).map_err(truncated)?;
    }

    let certificate = x509_cert::Certificate::from_der(leaf).map_err(SecurityError::X509)?;

    let spki_key = certificate
        .tbs_certificate
        .subject_public_key_info
        .subject_public_key
        .as_bytes()
        .ok_or(SecurityError::InvalidCertificate("unaligned subject public key"))?;

    parse_pkcs1_public_key(spki_key)
}

/// Parses a DER `RSAPublicKey ::= SEQUENCE { modulus, publicExponent }`.
fn parse_pkcs1_public_key(der: &[u8]) -> SecurityResult<ServerPublicKey> {
    let mut reader = DerReader::new(der);

    let mut sequence = DerReader::new(reader.element(0x30)?);
    let modulus = sequence.element(0x02)?;
    let exponent = sequence.element(0x02)?;

    ServerPublicKey::from_parts(modulus, exponent)
}

/// A minimal TLV walker for the single DER structure parsed above.
struct DerReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> DerReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn next_u8(&mut self) -> SecurityResult<u8> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or(SecurityError::InvalidCertificate("truncated DER element"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn element(&mut self, expected_tag: u8) -> SecurityResult<&'a [u8]> {
        let tag = self.next_u8()?;
        if tag != expected_tag {
            return Err(SecurityError::InvalidCertificate("unexpected DER tag"));
        }

        let first = self.next_u8()?;
        let length = if first & 0x80 == 0 {
            usize::from(first)
        } else {
            let count = usize::from(first & 0x7F);
            if count == 0 || count > 4 {
                return Err(SecurityError::InvalidCertificate("unsupported DER length"));
            }
            let mut length = 0usize;
            for _ in 0..count {
                length = (length << 8) | usize::from(self.next_u8()?);
            }
            length
        };

        let start = self.pos;
        let end = start
            .checked_add(length)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(SecurityError::InvalidCertificate("truncated DER element"))?;

        self.pos = end;
        Ok(&self.bytes[start..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdp_core::WriteCursor;
    use rsa::traits::PublicKeyParts;

    fn proprietary_certificate(modulus_le: &[u8], exponent: u32) -> Vec<u8> {
        let key_len = modulus_le.len() + RSA_KEY_PADDING;
        let blob_len = 4 + 4 + 4 + 4 + 4 + key_len;

        let mut buf = vec![0u8; 4 + 4 + 4 + 2 + 2 + blob_len];
        let mut dst = WriteCursor::new(&mut buf);

        dst.write_u32(CERT_CHAIN_VERSION_1);
        dst.write_u32(SIGNATURE_ALG_RSA);
        dst.write_u32(KEY_EXCHANGE_ALG_RSA);
        dst.write_u16(BB_RSA_KEY_BLOB);
        dst.write_u16(blob_len as u16);
        dst.write_u32(RSA_KEY_MAGIC);
        dst.write_u32(key_len as u32);
        dst.write_u32((modulus_le.len() * 8) as u32);
        dst.write_u32(modulus_le.len() as u32);
        dst.write_u32(exponent);
        dst.write_slice(modulus_le);
        // 8 zero padding bytes are already in place

        buf
    }

    #[test]
    fn proprietary_certificate_key_is_extracted() {
        // 2048-bit odd modulus (top byte set, low bit set)
        let mut modulus_le = vec![0u8; 256];
        modulus_le[0] = 0x01;
        modulus_le[255] = 0x80;

        let blob = proprietary_certificate(&modulus_le, 65537);
        let key = parse_server_certificate(&blob).unwrap();

        assert_eq!(key.as_rsa().e(), &BigUint::from(65537u32));
        assert_eq!(key.as_rsa().size(), 256);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut modulus_le = vec![0u8; 64];
        modulus_le[0] = 0x01;
        modulus_le[63] = 0x80;

        let mut blob = proprietary_certificate(&modulus_le, 65537);
        blob[16] = 0xAA; // corrupt the magic

        assert!(parse_server_certificate(&blob).is_err());
    }

    #[test]
    fn pkcs1_key_roundtrip() {
        // SEQUENCE { INTEGER 0x00C0...01, INTEGER 65537 }
        let modulus = {
            let mut m = vec![0xC0u8; 64];
            m[63] = 0x01;
            m
        };

        let mut der = vec![0x30, 0x00]; // patched below
        der.extend_from_slice(&[0x02, 0x41, 0x00]); // leading zero for the high bit
        der.extend_from_slice(&modulus);
        der.extend_from_slice(&[0x02, 0x03, 0x01, 0x00, 0x01]);
        let body_len = der.len() - 2;
        der[1] = body_len as u8;

        let key = parse_pkcs1_public_key(&der).unwrap();
        assert_eq!(key.as_rsa().e(), &BigUint::from(65537u32));
    }
}
