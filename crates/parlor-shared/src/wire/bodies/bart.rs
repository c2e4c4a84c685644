//! BART food group (0x10): buddy-icon blobs addressed by content hash.

use bytes::{BufMut, Bytes};

use crate::error::Result;
use crate::wire::prim;

pub mod subgroup {
    pub const ERR: u16 = 0x0001;
    pub const UPLOAD_QUERY: u16 = 0x0002;
    pub const UPLOAD_REPLY: u16 = 0x0003;
    pub const DOWNLOAD_QUERY: u16 = 0x0004;
    pub const DOWNLOAD_REPLY: u16 = 0x0005;
}

/// BART asset types.
pub mod asset {
    pub const BUDDY_ICON_SMALL: u16 = 0x0000;
    pub const BUDDY_ICON: u16 = 0x0001;
}

pub mod replycode {
    pub const SUCCESS: u8 = 0x00;
    pub const INVALID: u8 = 0x01;
    pub const NO_CUSTOM: u8 = 0x02;
    pub const TOO_SMALL: u8 = 0x03;
    pub const TOO_BIG: u8 = 0x04;
    pub const INVALID_TYPE: u8 = 0x05;
    pub const BANNED: u8 = 0x06;
    pub const NOT_FOUND: u8 = 0x07;
}

/// `[type:u16][flags:u8][hash:u8-bytes]` — the content address of a blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BartId {
    pub asset_type: u16,
    pub flags: u8,
    pub hash: Vec<u8>,
}

impl BartId {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.asset_type);
        buf.put_u8(self.flags);
        prim::put_u8_bytes(buf, &self.hash);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            asset_type: prim::read_u16(buf)?,
            flags: prim::read_u8(buf)?,
            hash: prim::read_u8_bytes(buf)?.to_vec(),
        })
    }
}

/// SNAC(0x10,0x02): upload a blob.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadQuery {
    pub asset_type: u16,
    pub data: Vec<u8>,
}

impl UploadQuery {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.asset_type);
        prim::put_u16_bytes(buf, &self.data);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            asset_type: prim::read_u16(buf)?,
            data: prim::read_u16_bytes(buf)?.to_vec(),
        })
    }
}

/// SNAC(0x10,0x03): the stored blob's content address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadReply {
    pub code: u8,
    pub id: BartId,
}

impl UploadReply {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(self.code);
        self.id.encode(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            code: prim::read_u8(buf)?,
            id: BartId::decode(buf)?,
        })
    }
}

/// SNAC(0x10,0x04): fetch blobs for a screen name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadQuery {
    pub screen_name: String,
    pub ids: Vec<BartId>,
}

impl DownloadQuery {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        prim::put_u8_string(buf, &self.screen_name);
        buf.put_u8(self.ids.len() as u8);
        for id in &self.ids {
            id.encode(buf);
        }
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        let screen_name = prim::read_u8_string(buf)?;
        let count = prim::read_u8(buf)?;
        let mut ids = Vec::with_capacity(count as usize);
        for _ in 0..count {
            ids.push(BartId::decode(buf)?);
        }
        Ok(Self { screen_name, ids })
    }
}

/// SNAC(0x10,0x05): one blob.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadReply {
    pub screen_name: String,
    pub id: BartId,
    pub data: Vec<u8>,
}

impl DownloadReply {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        prim::put_u8_string(buf, &self.screen_name);
        self.id.encode(buf);
        prim::put_u16_bytes(buf, &self.data);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            screen_name: prim::read_u8_string(buf)?,
            id: BartId::decode(buf)?,
            data: prim::read_u16_bytes(buf)?.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_round_trip() {
        let q = UploadQuery {
            asset_type: asset::BUDDY_ICON,
            data: vec![0x47, 0x49, 0x46, 0x38], // GIF8
        };
        let mut buf = Vec::new();
        q.encode(&mut buf);
        assert_eq!(UploadQuery::decode(&mut Bytes::from(buf)).unwrap(), q);
    }

    #[test]
    fn test_download_query_round_trip() {
        let q = DownloadQuery {
            screen_name: "chuck".to_string(),
            ids: vec![BartId {
                asset_type: asset::BUDDY_ICON,
                flags: 0x01,
                hash: vec![0xAB; 16],
            }],
        };
        let mut buf = Vec::new();
        q.encode(&mut buf);
        assert_eq!(DownloadQuery::decode(&mut Bytes::from(buf)).unwrap(), q);
    }
}
