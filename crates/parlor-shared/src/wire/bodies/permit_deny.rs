//! Permit/Deny food group (0x09): legacy session-local visibility lists.

use bytes::Bytes;

use crate::error::Result;
use crate::wire::prim;
use crate::wire::tlv::TlvBlock;

pub mod subgroup {
    pub const ERR: u16 = 0x0001;
    pub const RIGHTS_QUERY: u16 = 0x0002;
    pub const RIGHTS_REPLY: u16 = 0x0003;
    pub const ADD_PERMIT_ENTRIES: u16 = 0x0005;
    pub const DEL_PERMIT_ENTRIES: u16 = 0x0006;
    pub const ADD_DENY_ENTRIES: u16 = 0x0007;
    pub const DEL_DENY_ENTRIES: u16 = 0x0008;
}

pub mod rights {
    pub const MAX_PERMITS: u16 = 0x0001;
    pub const MAX_DENIES: u16 = 0x0002;
}

/// SNAC(0x09,0x03).
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

/// Body shared by the four list-mutation subgroups: u8-prefixed screen
/// names to the end of the frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListEntries {
    pub users: Vec<String>,
}

impl ListEntries {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        for u in &self.users {
            prim::put_u8_string(buf, u);
        }
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        let mut users = Vec::new();
        while !buf.is_empty() {
            users.push(prim::read_u8_string(buf)?);
        }
        Ok(Self { users })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_entries_round_trip() {
        let body = ListEntries {
            users: vec!["alice".to_string(), "bob".to_string()],
        };
        let mut buf = Vec::new();
        body.encode(&mut buf);
        assert_eq!(ListEntries::decode(&mut Bytes::from(buf)).unwrap(), body);
    }

    #[test]
    fn test_empty_list() {
        let body = ListEntries::default();
        let mut buf = Vec::new();
        body.encode(&mut buf);
        assert!(buf.is_empty());
        assert_eq!(ListEntries::decode(&mut Bytes::from(buf)).unwrap(), body);
    }
}
