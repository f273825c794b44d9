use bitflags::bitflags;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive as _, ToPrimitive as _};
use oxrdp_core::{
    cast_length, ensure_fixed_part_size, ensure_size, invalid_field_err, write_padding, Decode, DecodeResult, Encode,
    EncodeResult, ReadCursor, WriteCursor,
};

use crate::utf16;

const TIMEZONE_SIZE: usize = 172;

/// TS_INFO_PACKET (always sent with the UNICODE flag, so every string is
/// UTF-16LE and the length fields exclude the mandatory NUL terminator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub credentials: Credentials,
    pub code_page: u32,
    pub flags: ClientInfoFlags,
    pub alternate_shell: String,
    pub work_dir: String,
    pub extra_info: ExtendedClientInfo,
}

impl ClientInfo {
    const NAME: &'static str = "ClientInfo";

    const FIXED_PART_SIZE: usize = 4 /* codePage */ + 4 /* flags */ + 2 * 5 /* lengths */;
}

impl Encode for ClientInfo {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u32(self.code_page);
        dst.write_u32(self.flags.bits());

        let domain = self.credentials.domain.as_deref().unwrap_or("");

        dst.write_u16(cast_length!("cbDomain", utf16::encoded_len(domain))?);
        dst.write_u16(cast_length!("cbUserName", utf16::encoded_len(&self.credentials.username))?);
        dst.write_u16(cast_length!("cbPassword", utf16::encoded_len(&self.credentials.password))?);
        dst.write_u16(cast_length!("cbAlternateShell", utf16::encoded_len(&self.alternate_shell))?);
        dst.write_u16(cast_length!("cbWorkingDir", utf16::encoded_len(&self.work_dir))?);

        utf16::write_null_terminated(dst, domain);
        utf16::write_null_terminated(dst, &self.credentials.username);
        utf16::write_null_terminated(dst, &self.credentials.password);
        utf16::write_null_terminated(dst, &self.alternate_shell);
        utf16::write_null_terminated(dst, &self.work_dir);

        self.extra_info.encode(dst)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        let domain = self.credentials.domain.as_deref().unwrap_or("");

        Self::FIXED_PART_SIZE
            + utf16::null_terminated_encoded_len(domain)
            + utf16::null_terminated_encoded_len(&self.credentials.username)
            + utf16::null_terminated_encoded_len(&self.credentials.password)
            + utf16::null_terminated_encoded_len(&self.alternate_shell)
            + utf16::null_terminated_encoded_len(&self.work_dir)
            + self.extra_info.size()
    }
}

impl<'de> Decode<'de> for ClientInfo {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_fixed_part_size!(in: src);

        let code_page = src.read_u32();
        let flags = ClientInfoFlags::from_bits(src.read_u32())
            .ok_or_else(|| invalid_field_err!("flags", "invalid client info flags"))?;

        if !flags.contains(ClientInfoFlags::UNICODE) {
            return Err(invalid_field_err!("flags", "ANSI client info is not supported"));
        }

        let domain_size = usize::from(src.read_u16()) + 2;
        let user_name_size = usize::from(src.read_u16()) + 2;
        let password_size = usize::from(src.read_u16()) + 2;
        let alternate_shell_size = usize::from(src.read_u16()) + 2;
        let work_dir_size = usize::from(src.read_u16()) + 2;

        ensure_size!(in: src, size: domain_size + user_name_size + password_size + alternate_shell_size + work_dir_size);

        let domain = utf16::read_string(src, domain_size);
        let username = utf16::read_string(src, user_name_size);
        let password = utf16::read_string(src, password_size);
        let alternate_shell = utf16::read_string(src, alternate_shell_size);
        let work_dir = utf16::read_string(src, work_dir_size);

        let domain = if domain.is_empty() { None } else { Some(domain) };

        let extra_info = ExtendedClientInfo::decode(src)?;

        Ok(Self {
            credentials: Credentials {
                username,
                password,
                domain,
            },
            code_page,
            flags,
            alternate_shell,
            work_dir,
            extra_info,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub domain: Option<String>,
}

/// TS_EXTENDED_INFO_PACKET, through performanceFlags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedClientInfo {
    pub address_family: AddressFamily,
    pub address: String,
    pub dir: String,
    pub performance_flags: PerformanceFlags,
}

impl ExtendedClientInfo {
    const NAME: &'static str = "ExtendedClientInfo";
}

impl Encode for ExtendedClientInfo {
    fn encode(&self, dst: &mut WriteCursor<'_>) -> EncodeResult<()> {
        ensure_size!(in: dst, size: self.size());

        dst.write_u16(self.address_family.to_u16().unwrap());
        // This size includes the null terminator, unlike the lengths of the
        // TS_INFO_PACKET strings.
        dst.write_u16(cast_length!("cbClientAddress", utf16::null_terminated_encoded_len(&self.address))?);
        utf16::write_null_terminated(dst, &self.address);
        dst.write_u16(cast_length!("cbClientDir", utf16::null_terminated_encoded_len(&self.dir))?);
        utf16::write_null_terminated(dst, &self.dir);
        write_padding!(dst, TIMEZONE_SIZE);
        dst.write_u32(0); // clientSessionId, must be zero
        dst.write_u32(self.performance_flags.bits());

        Ok(())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn size(&self) -> usize {
        2 // addressFamily
        + 2 // cbClientAddress
        + utf16::null_terminated_encoded_len(&self.address)
        + 2 // cbClientDir
        + utf16::null_terminated_encoded_len(&self.dir)
        + TIMEZONE_SIZE
        + 4 // clientSessionId
        + 4 // performanceFlags
    }
}

impl<'de> Decode<'de> for ExtendedClientInfo {
    fn decode(src: &mut ReadCursor<'de>) -> DecodeResult<Self> {
        ensure_size!(in: src, size: 2 + 2);

        let address_family = AddressFamily::from_u16(src.read_u16())
            .ok_or_else(|| invalid_field_err!("addressFamily", "invalid address family"))?;

        let address_size = usize::from(src.read_u16());
        ensure_size!(in: src, size: address_size);
        let address = utf16::read_string(src, address_size);

        ensure_size!(in: src, size: 2);
        let dir_size = usize::from(src.read_u16());
        ensure_size!(in: src, size: dir_size);
        let dir = utf16::read_string(src, dir_size);

        ensure_size!(in: src, size: TIMEZONE_SIZE + 4 + 4);
        src.advance(TIMEZONE_SIZE);
        let _client_session_id = src.read_u32();
        let performance_flags = PerformanceFlags::from_bits_truncate(src.read_u32());

        Ok(Self {
            address_family,
            address,
            dir,
            performance_flags,
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u16)]
pub enum AddressFamily {
    INet = 0x0002,
    INet6 = 0x0017,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct ClientInfoFlags: u32 {
        const MOUSE = 0x0000_0001;
        const DISABLE_CTRL_ALT_DEL = 0x0000_0002;
        const AUTOLOGON = 0x0000_0008;
        const UNICODE = 0x0000_0010;
        const MAXIMIZE_SHELL = 0x0000_0020;
        const LOGON_NOTIFY = 0x0000_0040;
        const COMPRESSION = 0x0000_0080;
        const ENABLE_WINDOWS_KEY = 0x0000_0100;
        const REMOTE_CONSOLE_AUDIO = 0x0000_2000;
        const FORCE_ENCRYPTED_CS_PDU = 0x0000_4000;
        const RAIL = 0x0000_8000;
        const LOGON_ERRORS = 0x0001_0000;
        const MOUSE_HAS_WHEEL = 0x0002_0000;
        const PASSWORD_IS_SC_PIN = 0x0004_0000;
        const NO_AUDIO_PLAYBACK = 0x0008_0000;
        const USING_SAVED_CREDS = 0x0010_0000;
        const AUDIO_CAPTURE = 0x0020_0000;
        const VIDEO_DISABLE = 0x0040_0000;
        const COMPR_TYPE_MASK = 0x0000_1E00;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct PerformanceFlags: u32 {
        const DISABLE_WALLPAPER = 0x0000_0001;
        const DISABLE_FULLWINDOWDRAG = 0x0000_0002;
        const DISABLE_MENUANIMATIONS = 0x0000_0004;
        const DISABLE_THEMING = 0x0000_0008;
        const DISABLE_CURSOR_SHADOW = 0x0000_0020;
        const DISABLE_CURSORSETTINGS = 0x0000_0040;
        const ENABLE_FONT_SMOOTHING = 0x0000_0080;
        const ENABLE_DESKTOP_COMPOSITION = 0x0000_0100;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdp_core::{decode, encode_vec};

    #[test]
    fn client_info_roundtrip() {
        let info = ClientInfo {
            credentials: Credentials {
                username: "user".to_owned(),
                password: "pass".to_owned(),
                domain: Some("DOMAIN".to_owned()),
            },
            code_page: 0,
            flags: ClientInfoFlags::UNICODE
                | ClientInfoFlags::MOUSE
                | ClientInfoFlags::DISABLE_CTRL_ALT_DEL
                | ClientInfoFlags::ENABLE_WINDOWS_KEY,
            alternate_shell: String::new(),
            work_dir: String::new(),
            extra_info: ExtendedClientInfo {
                address_family: AddressFamily::INet,
                address: "192.168.1.100".to_owned(),
                dir: String::new(),
                performance_flags: PerformanceFlags::DISABLE_WALLPAPER,
            },
        };

        let encoded = encode_vec(&info).unwrap();
        let decoded: ClientInfo = decode(&encoded).unwrap();
        assert_eq!(decoded, info);
    }
}
