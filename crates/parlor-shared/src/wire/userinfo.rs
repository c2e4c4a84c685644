//! The TLV user-info structure embedded in presence and messaging SNACs.

use bytes::BufMut;
use bytes::Bytes;

use crate::error::Result;
use crate::wire::prim;
use crate::wire::tlv::{Tlv, TlvBlock};

/// User-info flag bits (TLV 0x01 of the user-info block).
pub mod userflag {
    pub const UNCONFIRMED: u16 = 0x0001;
    pub const AOL: u16 = 0x0004;
    pub const OSCAR_FREE: u16 = 0x0010;
    pub const UNAVAILABLE: u16 = 0x0020;
    pub const ICQ: u16 = 0x0040;
    pub const INVISIBLE: u16 = 0x0100;
}

/// TLV tags inside the user-info block.
pub mod infotag {
    pub const USER_FLAGS: u16 = 0x0001;
    pub const SIGNON_TIME: u16 = 0x0003;
    pub const IDLE_TIME: u16 = 0x0004;
    pub const MEMBER_SINCE: u16 = 0x0005;
}

/// `[name:u8-str][warning:u16][tlv count:u16][tlvs]`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TlvUserInfo {
    pub screen_name: String,
    pub warning_level: u16,
    pub tlvs: TlvBlock,
}

impl TlvUserInfo {
    pub fn new(screen_name: impl Into<String>, warning_level: u16) -> Self {
        Self {
            screen_name: screen_name.into(),
            warning_level,
            tlvs: TlvBlock::default(),
        }
    }

    pub fn with_flags(mut self, flags: u16) -> Self {
        self.tlvs.append(Tlv::u16(infotag::USER_FLAGS, flags));
        self
    }

    pub fn with_signon_time(mut self, unix_secs: u32) -> Self {
        self.tlvs.append(Tlv::u32(infotag::SIGNON_TIME, unix_secs));
        self
    }

    pub fn with_idle_minutes(mut self, minutes: u16) -> Self {
        self.tlvs.append(Tlv::u16(infotag::IDLE_TIME, minutes));
        self
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        prim::put_u8_string(buf, &self.screen_name);
        buf.put_u16(self.warning_level);
        self.tlvs.encode_counted(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            screen_name: prim::read_u8_string(buf)?,
            warning_level: prim::read_u16(buf)?,
            tlvs: TlvBlock::decode_counted(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let info = TlvUserInfo::new("Chatting Chuck", 300)
            .with_flags(userflag::OSCAR_FREE | userflag::UNAVAILABLE)
            .with_signon_time(1_046_500_000)
            .with_idle_minutes(12);
        let mut buf = Vec::new();
        info.encode(&mut buf);
        let decoded = TlvUserInfo::decode(&mut Bytes::from(buf)).unwrap();
        assert_eq!(decoded, info);
        assert_eq!(
            decoded.tlvs.u16(infotag::USER_FLAGS),
            Some(userflag::OSCAR_FREE | userflag::UNAVAILABLE)
        );
    }

    #[test]
    fn test_empty_tlv_block() {
        let info = TlvUserInfo::new("chuck", 0);
        let mut buf = Vec::new();
        info.encode(&mut buf);
        // name len + name + warning + count
        assert_eq!(buf.len(), 1 + 5 + 2 + 2);
        assert_eq!(TlvUserInfo::decode(&mut Bytes::from(buf)).unwrap(), info);
    }
}
