//! ChatNav food group (0x0D): room creation and discovery.

use bytes::{BufMut, Bytes};

use crate::error::Result;
use crate::wire::prim;
use crate::wire::tlv::TlvBlock;

pub mod subgroup {
    pub const ERR: u16 = 0x0001;
    pub const REQUEST_CHAT_RIGHTS: u16 = 0x0002;
    pub const REQUEST_EXCHANGE_INFO: u16 = 0x0003;
    pub const REQUEST_ROOM_INFO: u16 = 0x0004;
    pub const CREATE_ROOM: u16 = 0x0008;
    pub const NAV_INFO: u16 = 0x0009;
}

pub mod tag {
    pub const MAX_CONCURRENT_ROOMS: u16 = 0x0002;
    pub const EXCHANGE_INFO: u16 = 0x0003;
    pub const ROOM_INFO: u16 = 0x0004;
}

/// Cookie value a client sends when asking to create (or fetch) a room.
pub const CREATE_COOKIE: &str = "create";

/// SNAC(0x0D,0x04): look up a room by its wire identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestRoomInfo {
    pub exchange: u16,
    pub cookie: String,
    pub instance: u16,
    pub detail_level: u8,
}

impl RequestRoomInfo {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.exchange);
        prim::put_u8_string(buf, &self.cookie);
        buf.put_u16(self.instance);
        buf.put_u8(self.detail_level);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            exchange: prim::read_u16(buf)?,
            cookie: prim::read_u8_string(buf)?,
            instance: prim::read_u16(buf)?,
            detail_level: prim::read_u8(buf)?,
        })
    }
}

/// SNAC(0x0D,0x09): rights, exchange info, or room info TLVs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavInfo {
    pub tlvs: TlvBlock,
}

impl NavInfo {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        self.tlvs.encode_rest(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            tlvs: TlvBlock::decode_rest(buf)?,
        })
    }
}
