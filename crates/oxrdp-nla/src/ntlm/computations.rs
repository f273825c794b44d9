//! NTLMv2 cryptographic computations (MS-NLMP 3.3.2, RFC 4757).

use hmac::{Hmac, Mac as _};
use md4::{Digest as _, Md4};
use md5::Md5;

use oxrdp_pdu::utf16;

use super::CHALLENGE_SIZE;
use crate::NlaCredentials;

const NT_V2_RESPONSE_BASE_SIZE: usize = 28;

pub(crate) fn hmac_md5(key: &[u8], data: &[u8]) -> [u8; 16] {
    let mut mac = Hmac::<Md5>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

fn md4(data: &[u8]) -> [u8; 16] {
    let mut hasher = Md4::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn md5(data: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `HMAC_MD5(MD4(password), UPPER(user) ++ domain)` over UTF-16LE strings.
pub(crate) fn ntlm_v2_hash(credentials: &NlaCredentials) -> [u8; 16] {
    let key = md4(&utf16::encode(&credentials.password));

    let mut identity = utf16::encode(&credentials.username.to_uppercase());
    identity.extend(utf16::encode(&credentials.domain));

    hmac_md5(&key, &identity)
}

/// LMv2 response: `HMAC(hash, server ++ client) ++ client_challenge`.
pub(crate) fn lm_v2_response(client_challenge: &[u8], server_challenge: &[u8], ntlm_v2_hash: &[u8]) -> Vec<u8> {
    let mut challenges = [0u8; CHALLENGE_SIZE * 2];
    challenges[..CHALLENGE_SIZE].copy_from_slice(server_challenge);
    challenges[CHALLENGE_SIZE..].copy_from_slice(client_challenge);

    let mut response = hmac_md5(ntlm_v2_hash, &challenges).to_vec();
    response.extend_from_slice(client_challenge);
    response
}

/// NTv2 response and the session base key it yields.
pub(crate) fn ntlm_v2_response(
    client_challenge: &[u8],
    server_challenge: &[u8],
    target_info: &[u8],
    ntlm_v2_hash: &[u8],
    timestamp: u64,
) -> (Vec<u8>, [u8; 16]) {
    let mut temp = Vec::with_capacity(NT_V2_RESPONSE_BASE_SIZE + target_info.len());
    temp.push(1); // RespType
    temp.push(1); // HiRespType
    temp.extend_from_slice(&[0u8; 2]); // Reserved1
    temp.extend_from_slice(&[0u8; 4]); // Reserved2
    temp.extend_from_slice(&timestamp.to_le_bytes());
    temp.extend_from_slice(client_challenge);
    temp.extend_from_slice(&[0u8; 4]); // Reserved3
    temp.extend_from_slice(target_info);

    let nt_proof = hmac_md5(ntlm_v2_hash, &[server_challenge, temp.as_slice()].concat());

    let mut response = nt_proof.to_vec();
    response.extend_from_slice(&temp);

    let session_base_key = hmac_md5(ntlm_v2_hash, &nt_proof);

    (response, session_base_key)
}

/// RFC 4757 signing/sealing key derivation: `MD5(session_key ++ magic)`.
pub(crate) fn signing_key(exported_session_key: &[u8], magic: &[u8]) -> [u8; 16] {
    md5(&[exported_session_key, magic].concat())
}

/// Current time as a Windows FILETIME (100ns ticks since 1601-01-01).
pub(crate) fn current_timestamp() -> u64 {
    const UNIX_EPOCH_AS_FILETIME: u64 = 116_444_736_000_000_000;

    let since_unix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();

    UNIX_EPOCH_AS_FILETIME + since_unix.as_nanos() as u64 / 100
}

/// Scans an AV_PAIR list for the MsvAvTimestamp entry.
pub(crate) fn timestamp_from_target_info(target_info: &[u8]) -> Option<u64> {
    const AV_PAIR_EOL: u16 = 0;
    const AV_PAIR_TIMESTAMP: u16 = 7;

    let mut rest = target_info;

    while rest.len() >= 4 {
        let av_id = u16::from_le_bytes([rest[0], rest[1]]);
        let av_len = usize::from(u16::from_le_bytes([rest[2], rest[3]]));
        rest = &rest[4..];

        if av_id == AV_PAIR_EOL {
            break;
        }

        if rest.len() < av_len {
            break;
        }

        if av_id == AV_PAIR_TIMESTAMP && av_len == 8 {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&rest[..8]);
            return Some(u64::from_le_bytes(bytes));
        }

        rest = &rest[av_len..];
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ntlm_v2_hash_uses_uppercased_user() {
        let lower = ntlm_v2_hash(&NlaCredentials::new("DOM", "user", "pw"));
        let upper = ntlm_v2_hash(&NlaCredentials::new("DOM", "USER", "pw"));
        let other = ntlm_v2_hash(&NlaCredentials::new("dom", "USER", "pw"));

        assert_eq!(lower, upper);
        assert_ne!(lower, other); // the domain is case-sensitive
    }

    #[test]
    fn lm_v2_response_layout() {
        let response = lm_v2_response(&[0xAA; 8], &[0xBB; 8], &[0x11; 16]);

        assert_eq!(response.len(), 24);
        assert_eq!(&response[16..], &[0xAA; 8]);
    }

    #[test]
    fn nt_v2_response_embeds_temp_fields() {
        let target_info = [0x07, 0x00, 0x08, 0x00, 1, 2, 3, 4, 5, 6, 7, 8, 0, 0, 0, 0];
        let (response, _) = ntlm_v2_response(&[0xAA; 8], &[0xBB; 8], &target_info, &[0x11; 16], 0x1122_3344);

        assert_eq!(response[16], 1); // RespType
        assert_eq!(response[17], 1); // HiRespType
        assert_eq!(&response[24..32], &0x1122_3344u64.to_le_bytes());
        assert_eq!(&response[32..40], &[0xAA; 8]);
    }

    #[test]
    fn timestamp_av_pair_is_found() {
        let target_info = [
            0x01, 0x00, 0x02, 0x00, 0x41, 0x00, // MsvAvNbComputerName "A"
            0x07, 0x00, 0x08, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // timestamp = 1
            0x00, 0x00, 0x00, 0x00, // EOL
        ];

        assert_eq!(timestamp_from_target_info(&target_info), Some(1));
    }

    #[test]
    fn missing_timestamp_yields_none() {
        let target_info = [0x00, 0x00, 0x00, 0x00];
        assert_eq!(timestamp_from_target_info(&target_info), None);
    }
}
