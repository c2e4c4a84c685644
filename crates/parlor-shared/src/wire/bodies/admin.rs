//! Admin food group (0x07): account info queries and confirmation.

use bytes::{BufMut, Bytes};

use crate::error::Result;
use crate::wire::prim;
use crate::wire::tlv::TlvBlock;

pub mod subgroup {
    pub const ERR: u16 = 0x0001;
    pub const INFO_QUERY: u16 = 0x0002;
    pub const INFO_REPLY: u16 = 0x0003;
    pub const INFO_CHANGE_REQUEST: u16 = 0x0004;
    pub const INFO_CHANGE_REPLY: u16 = 0x0005;
    pub const CONFIRM_REQUEST: u16 = 0x0006;
    pub const CONFIRM_REPLY: u16 = 0x0007;
}

pub mod tag {
    pub const SCREEN_NAME: u16 = 0x0001;
    pub const EMAIL: u16 = 0x0011;
    pub const REG_STATUS: u16 = 0x0013;
}

pub mod confirmstatus {
    pub const CONFIRMED: u16 = 0x0000;
    pub const SENT: u16 = 0x0001;
    pub const ALREADY_CONFIRMED: u16 = 0x001E;
}

/// SNAC(0x07,0x02) and (0x07,0x04): requested or updated account fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoRequest {
    pub tlvs: TlvBlock,
}

impl InfoRequest {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        self.tlvs.encode_rest(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            tlvs: TlvBlock::decode_rest(buf)?,
        })
    }
}

/// SNAC(0x07,0x03) and (0x07,0x05): `[permissions:u16]` then a counted TLV
/// block of account fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoReply {
    pub permissions: u16,
    pub tlvs: TlvBlock,
}

impl InfoReply {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.permissions);
        self.tlvs.encode_counted(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            permissions: prim::read_u16(buf)?,
            tlvs: TlvBlock::decode_counted(buf)?,
        })
    }
}

/// SNAC(0x07,0x07).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfirmReply {
    pub status: u16,
}

impl ConfirmReply {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.status);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            status: prim::read_u16(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::tlv::Tlv;

    #[test]
    fn test_info_reply_round_trip() {
        let reply = InfoReply {
            permissions: 3,
            tlvs: TlvBlock::new(vec![
                Tlv::string(tag::SCREEN_NAME, "Chatting Chuck"),
                Tlv::string(tag::EMAIL, "chuck@example.com"),
            ]),
        };
        let mut buf = Vec::new();
        reply.encode(&mut buf);
        assert_eq!(InfoReply::decode(&mut Bytes::from(buf)).unwrap(), reply);
    }
}
