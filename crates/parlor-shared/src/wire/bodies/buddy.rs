//! Buddy food group (0x03): transient buddy lists and presence events.

use bytes::Bytes;

use crate::error::Result;
use crate::wire::prim;
use crate::wire::tlv::TlvBlock;
use crate::wire::userinfo::TlvUserInfo;

pub mod subgroup {
    pub const ERR: u16 = 0x0001;
    pub const RIGHTS_QUERY: u16 = 0x0002;
    pub const RIGHTS_REPLY: u16 = 0x0003;
    pub const ADD_BUDDIES: u16 = 0x0004;
    pub const DEL_BUDDIES: u16 = 0x0005;
    pub const ARRIVED: u16 = 0x000B;
    pub const DEPARTED: u16 = 0x000C;
}

pub mod rights {
    pub const MAX_BUDDIES: u16 = 0x0001;
    pub const MAX_WATCHERS: u16 = 0x0002;
    pub const MAX_ICQ_BROADCAST: u16 = 0x0003;
    pub const MAX_TEMP_BUDDIES: u16 = 0x0004;
}

/// SNAC(0x03,0x02).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RightsQuery {
    pub tlvs: TlvBlock,
}

impl RightsQuery {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        self.tlvs.encode_rest(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            tlvs: TlvBlock::decode_rest(buf)?,
        })
    }
}

/// SNAC(0x03,0x03).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RightsReply {
    pub tlvs: TlvBlock,
}

impl RightsReply {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        self.tlvs.encode_rest(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            tlvs: TlvBlock::decode_rest(buf)?,
        })
    }
}

fn encode_screen_names(names: &[String], buf: &mut Vec<u8>) {
    for name in names {
        prim::put_u8_string(buf, name);
    }
}

fn decode_screen_names(buf: &mut Bytes) -> Result<Vec<String>> {
    let mut names = Vec::new();
    while !buf.is_empty() {
        names.push(prim::read_u8_string(buf)?);
    }
    Ok(names)
}

/// SNAC(0x03,0x04): add to the transient (session-local) buddy list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddBuddies {
    pub buddies: Vec<String>,
}

impl AddBuddies {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        encode_screen_names(&self.buddies, buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            buddies: decode_screen_names(buf)?,
        })
    }
}

/// SNAC(0x03,0x05).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DelBuddies {
    pub buddies: Vec<String>,
}

impl DelBuddies {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        encode_screen_names(&self.buddies, buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            buddies: decode_screen_names(buf)?,
        })
    }
}

/// SNAC(0x03,0x0B).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arrived {
    pub user_info: TlvUserInfo,
}

impl Arrived {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        self.user_info.encode(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            user_info: TlvUserInfo::decode(buf)?,
        })
    }
}

/// SNAC(0x03,0x0C).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Departed {
    pub user_info: TlvUserInfo,
}

impl Departed {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        self.user_info.encode(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            user_info: TlvUserInfo::decode(buf)?,
        })
    }
}
