//! Tag-length-value records.
//!
//! `[tag:u16][len:u16][value]`. Lists come in three framings: a rest block
//! (bare concatenation to the end of the frame), a counted block
//! (`[count:u16]` then TLVs), and a length-prefixed block (`[bytes:u16]`
//! then TLVs, used by feedbag item attributes). Unknown tags always survive
//! a decode/encode round trip so vendor extensions are never dropped.

use bytes::{BufMut, Bytes};

use crate::error::{Result, WireError};
use crate::wire::prim;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    pub tag: u16,
    pub value: Vec<u8>,
}

impl Tlv {
    pub fn new(tag: u16, value: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    pub fn u8(tag: u16, value: u8) -> Self {
        Self::new(tag, value.to_be_bytes().to_vec())
    }

    pub fn u16(tag: u16, value: u16) -> Self {
        Self::new(tag, value.to_be_bytes().to_vec())
    }

    pub fn u32(tag: u16, value: u32) -> Self {
        Self::new(tag, value.to_be_bytes().to_vec())
    }

    pub fn string(tag: u16, value: &str) -> Self {
        Self::new(tag, value.as_bytes().to_vec())
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.tag);
        prim::put_u16_bytes(buf, &self.value);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        let tag = prim::read_u16(buf)?;
        let value = prim::read_u16_bytes(buf)?;
        Ok(Self {
            tag,
            value: value.to_vec(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlvBlock {
    pub tlvs: Vec<Tlv>,
}

impl TlvBlock {
    pub fn new(tlvs: Vec<Tlv>) -> Self {
        Self { tlvs }
    }

    pub fn append(&mut self, tlv: Tlv) {
        self.tlvs.push(tlv);
    }

    pub fn has(&self, tag: u16) -> bool {
        self.tlvs.iter().any(|t| t.tag == tag)
    }

    pub fn bytes(&self, tag: u16) -> Option<&[u8]> {
        self.tlvs
            .iter()
            .find(|t| t.tag == tag)
            .map(|t| t.value.as_slice())
    }

    pub fn string(&self, tag: u16) -> Option<String> {
        self.bytes(tag)
            .and_then(|v| String::from_utf8(v.to_vec()).ok())
    }

    pub fn u8(&self, tag: u16) -> Option<u8> {
        match self.bytes(tag) {
            Some([b]) => Some(*b),
            _ => None,
        }
    }

    pub fn u16(&self, tag: u16) -> Option<u16> {
        match self.bytes(tag) {
            Some([a, b]) => Some(u16::from_be_bytes([*a, *b])),
            _ => None,
        }
    }

    pub fn u32(&self, tag: u16) -> Option<u32> {
        match self.bytes(tag) {
            Some([a, b, c, d]) => Some(u32::from_be_bytes([*a, *b, *c, *d])),
            _ => None,
        }
    }

    /// Bare concatenation, consuming the rest of the frame.
    pub fn encode_rest(&self, buf: &mut Vec<u8>) {
        for tlv in &self.tlvs {
            tlv.encode(buf);
        }
    }

    pub fn decode_rest(buf: &mut Bytes) -> Result<Self> {
        let mut tlvs = Vec::new();
        while !buf.is_empty() {
            tlvs.push(Tlv::decode(buf)?);
        }
        Ok(Self { tlvs })
    }

    /// `[count:u16]` then TLVs.
    pub fn encode_counted(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.tlvs.len() as u16);
        self.encode_rest(buf);
    }

    pub fn decode_counted(buf: &mut Bytes) -> Result<Self> {
        let count = prim::read_u16(buf)?;
        let mut tlvs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            tlvs.push(Tlv::decode(buf)?);
        }
        Ok(Self { tlvs })
    }

    /// `[len:u16]` (total TLV bytes) then TLVs. Feedbag attribute framing.
    pub fn encode_len_prefixed(&self, buf: &mut Vec<u8>) {
        let mut inner = Vec::new();
        self.encode_rest(&mut inner);
        prim::put_u16_bytes(buf, &inner);
    }

    pub fn decode_len_prefixed(buf: &mut Bytes) -> Result<Self> {
        let mut inner = prim::read_u16_bytes(buf)?;
        let block = Self::decode_rest(&mut inner)?;
        if !inner.is_empty() {
            return Err(WireError::MalformedTlv);
        }
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> TlvBlock {
        TlvBlock::new(vec![
            Tlv::u16(0x01, 0x0010),
            Tlv::string(0x03, "client"),
            Tlv::new(0x99, vec![0xDE, 0xAD, 0xBE, 0xEF]),
        ])
    }

    #[test]
    fn test_rest_block_round_trip() {
        let block = sample_block();
        let mut buf = Vec::new();
        block.encode_rest(&mut buf);
        let decoded = TlvBlock::decode_rest(&mut Bytes::from(buf)).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_counted_block_round_trip() {
        let block = sample_block();
        let mut buf = Vec::new();
        block.encode_counted(&mut buf);
        let decoded = TlvBlock::decode_counted(&mut Bytes::from(buf)).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_len_prefixed_round_trip() {
        let block = sample_block();
        let mut buf = Vec::new();
        block.encode_len_prefixed(&mut buf);
        let decoded = TlvBlock::decode_len_prefixed(&mut Bytes::from(buf)).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_unknown_tags_preserved() {
        // tag 0x99 is not one this server interprets; it must survive
        let block = sample_block();
        let mut buf = Vec::new();
        block.encode_rest(&mut buf);
        let decoded = TlvBlock::decode_rest(&mut Bytes::from(buf)).unwrap();
        assert_eq!(decoded.bytes(0x99), Some(&[0xDE, 0xAD, 0xBE, 0xEF][..]));
    }

    #[test]
    fn test_typed_getters() {
        let block = sample_block();
        assert_eq!(block.u16(0x01), Some(0x0010));
        assert_eq!(block.string(0x03).as_deref(), Some("client"));
        assert_eq!(block.u16(0x99), None); // wrong width
        assert!(!block.has(0x42));
    }

    #[test]
    fn test_truncated_tlv_fails() {
        let bytes = &[0x00, 0x01, 0x00, 0x08, 0xAA];
        let err = TlvBlock::decode_rest(&mut Bytes::from_static(bytes)).unwrap_err();
        assert!(matches!(err, WireError::Truncated { .. }));
    }
}
