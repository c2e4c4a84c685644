//! Feedbag food group (0x13): server-side buddy list and permit/deny
//! storage.

use bytes::{BufMut, Bytes};

use crate::error::Result;
use crate::wire::prim;
use crate::wire::tlv::TlvBlock;

pub mod subgroup {
    pub const ERR: u16 = 0x0001;
    pub const RIGHTS_QUERY: u16 = 0x0002;
    pub const RIGHTS_REPLY: u16 = 0x0003;
    pub const QUERY: u16 = 0x0004;
    pub const QUERY_IF_MODIFIED: u16 = 0x0005;
    pub const REPLY: u16 = 0x0006;
    pub const USE: u16 = 0x0007;
    pub const INSERT_ITEM: u16 = 0x0008;
    pub const UPDATE_ITEM: u16 = 0x0009;
    pub const DELETE_ITEM: u16 = 0x000A;
    pub const STATUS: u16 = 0x000E;
    pub const START_CLUSTER: u16 = 0x0011;
    pub const END_CLUSTER: u16 = 0x0012;
}

/// Feedbag item classes.
pub mod class {
    pub const BUDDY: u16 = 0x0000;
    pub const GROUP: u16 = 0x0001;
    pub const PERMIT: u16 = 0x0002;
    pub const DENY: u16 = 0x0003;
    pub const PD_INFO: u16 = 0x0004;
    pub const PRESENCE_INFO: u16 = 0x0005;
    pub const BART: u16 = 0x0014;
}

/// Item attribute TLV tags.
pub mod attr {
    pub const ORDER: u16 = 0x00C8;
    pub const PD_MODE: u16 = 0x00CA;
    pub const BART_INFO: u16 = 0x00D5;
}

/// Permit/deny modes stored in the PD_MODE attribute.
pub mod pdmode {
    pub const PERMIT_ALL: u8 = 1;
    pub const DENY_ALL: u8 = 2;
    pub const PERMIT_SOME: u8 = 3;
    pub const DENY_SOME: u8 = 4;
}

/// Status codes returned per item mutation.
pub mod status {
    pub const SUCCESS: u16 = 0x0000;
    pub const NOT_FOUND: u16 = 0x0002;
    pub const ALREADY_EXISTS: u16 = 0x0003;
    pub const LIMIT_EXCEEDED: u16 = 0x000C;
}

/// One server-stored list item. `(name, group_id, item_id)` identifies it;
/// attributes are an opaque TLV block that round-trips unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbagItem {
    pub name: String,
    pub group_id: u16,
    pub item_id: u16,
    pub class_id: u16,
    pub attributes: TlvBlock,
}

impl FeedbagItem {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        prim::put_u16_string(buf, &self.name);
        buf.put_u16(self.group_id);
        buf.put_u16(self.item_id);
        buf.put_u16(self.class_id);
        self.attributes.encode_len_prefixed(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            name: prim::read_u16_string(buf)?,
            group_id: prim::read_u16(buf)?,
            item_id: prim::read_u16(buf)?,
            class_id: prim::read_u16(buf)?,
            attributes: TlvBlock::decode_len_prefixed(buf)?,
        })
    }
}

/// SNAC(0x13,0x05): client asks for the list if changed since a timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueryIfModified {
    pub last_update: u32,
    pub count: u16,
}

impl QueryIfModified {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u32(self.last_update);
        buf.put_u16(self.count);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            last_update: prim::read_u32(buf)?,
            count: prim::read_u16(buf)?,
        })
    }
}

/// SNAC(0x13,0x06): the stored list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    pub version: u8,
    pub items: Vec<FeedbagItem>,
    pub last_update: u32,
}

impl Reply {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(self.version);
        buf.put_u16(self.items.len() as u16);
        for item in &self.items {
            item.encode(buf);
        }
        buf.put_u32(self.last_update);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        let version = prim::read_u8(buf)?;
        let count = prim::read_u16(buf)?;
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            items.push(FeedbagItem::decode(buf)?);
        }
        Ok(Self {
            version,
            items,
            last_update: prim::read_u32(buf)?,
        })
    }
}

/// SNAC(0x13,0x08), (0x13,0x09), (0x13,0x0A): item mutations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemMutation {
    pub items: Vec<FeedbagItem>,
}

impl ItemMutation {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        for item in &self.items {
            item.encode(buf);
        }
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        let mut items = Vec::new();
        while !buf.is_empty() {
            items.push(FeedbagItem::decode(buf)?);
        }
        Ok(Self { items })
    }
}

/// SNAC(0x13,0x0E): one status code per mutated item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Status {
    pub results: Vec<u16>,
}

impl Status {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        for r in &self.results {
            buf.put_u16(*r);
        }
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        let mut results = Vec::new();
        while !buf.is_empty() {
            results.push(prim::read_u16(buf)?);
        }
        Ok(Self { results })
    }
}

/// SNAC(0x13,0x03).
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::tlv::Tlv;

    fn sample_item() -> FeedbagItem {
        FeedbagItem {
            name: "buddy bob".to_string(),
            group_id: 1,
            item_id: 42,
            class_id: class::BUDDY,
            attributes: TlvBlock::new(vec![Tlv::new(0x0131, b"alias".to_vec())]),
        }
    }

    #[test]
    fn test_item_round_trip() {
        let item = sample_item();
        let mut buf = Vec::new();
        item.encode(&mut buf);
        assert_eq!(FeedbagItem::decode(&mut Bytes::from(buf)).unwrap(), item);
    }

    #[test]
    fn test_reply_round_trip() {
        let reply = Reply {
            version: 0,
            items: vec![sample_item(), sample_item()],
            last_update: 1_046_500_000,
        };
        let mut buf = Vec::new();
        reply.encode(&mut buf);
        assert_eq!(Reply::decode(&mut Bytes::from(buf)).unwrap(), reply);
    }

    #[test]
    fn test_unknown_attribute_preserved() {
        // 0x7777 is not an attribute this server knows about
        let mut item = sample_item();
        item.attributes.append(Tlv::new(0x7777, vec![1, 2, 3]));
        let mut buf = Vec::new();
        item.encode(&mut buf);
        let decoded = FeedbagItem::decode(&mut Bytes::from(buf)).unwrap();
        assert_eq!(decoded.attributes.bytes(0x7777), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn test_mutation_round_trip() {
        let m = ItemMutation {
            items: vec![sample_item()],
        };
        let mut buf = Vec::new();
        m.encode(&mut buf);
        assert_eq!(ItemMutation::decode(&mut Bytes::from(buf)).unwrap(), m);
    }
}
