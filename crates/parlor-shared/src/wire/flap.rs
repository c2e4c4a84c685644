//! FLAP framing: `[0x2A][channel:u8][sequence:u16][len:u16][payload]`.

use bytes::{BufMut, Bytes};

use crate::error::{Result, WireError};
use crate::wire::prim;
use crate::wire::tlv::TlvBlock;

pub const FLAP_START_MARKER: u8 = 0x2A;

/// Fixed-size header preceding every payload.
pub const FLAP_HEADER_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FlapChannel {
    Signon = 1,
    Data = 2,
    Error = 3,
    Signoff = 4,
    Keepalive = 5,
}

impl FlapChannel {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Signon),
            2 => Some(Self::Data),
            3 => Some(Self::Error),
            4 => Some(Self::Signoff),
            5 => Some(Self::Keepalive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlapFrame {
    pub channel: FlapChannel,
    pub sequence: u16,
    pub payload: Vec<u8>,
}

impl FlapFrame {
    pub fn new(channel: FlapChannel, sequence: u16, payload: Vec<u8>) -> Self {
        Self {
            channel,
            sequence,
            payload,
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(FLAP_START_MARKER);
        buf.put_u8(self.channel as u8);
        buf.put_u16(self.sequence);
        prim::put_u16_bytes(buf, &self.payload);
    }

    /// Parse a header, returning (channel, sequence, payload length).
    pub fn parse_header(hdr: [u8; FLAP_HEADER_LEN]) -> Result<(FlapChannel, u16, u16)> {
        if hdr[0] != FLAP_START_MARKER {
            return Err(WireError::BadStartMarker(hdr[0]));
        }
        let channel = FlapChannel::from_byte(hdr[1]).ok_or(WireError::UnknownChannel(hdr[1]))?;
        let sequence = u16::from_be_bytes([hdr[2], hdr[3]]);
        let payload_len = u16::from_be_bytes([hdr[4], hdr[5]]);
        Ok((channel, sequence, payload_len))
    }

    /// Decode a whole frame from a buffer. The server loops read header and
    /// payload separately; this form suits buffered callers and tests.
    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        let hdr = prim::take(buf, FLAP_HEADER_LEN)?;
        let mut fixed = [0u8; FLAP_HEADER_LEN];
        fixed.copy_from_slice(&hdr);
        let (channel, sequence, payload_len) = Self::parse_header(fixed)?;
        let payload = prim::take(buf, payload_len as usize)?;
        Ok(Self {
            channel,
            sequence,
            payload: payload.to_vec(),
        })
    }
}

/// Channel-1 signon payload: a 4-byte version (always 1) and a TLV list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlapSignonFrame {
    pub tlvs: TlvBlock,
}

impl FlapSignonFrame {
    pub const VERSION: u32 = 1;

    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u32(Self::VERSION);
        self.tlvs.encode_rest(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        let _version = prim::read_u32(buf)?;
        let tlvs = TlvBlock::decode_rest(buf)?;
        Ok(Self { tlvs })
    }
}
