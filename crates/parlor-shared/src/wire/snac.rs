//! SNAC headers and the food-group tag space.

use bytes::{BufMut, Bytes};

use crate::error::Result;
use crate::wire::prim;

/// Top-level protocol services, fixed by the target clients' wire format.
pub mod foodgroup {
    pub const OSERVICE: u16 = 0x0001;
    pub const LOCATE: u16 = 0x0002;
    pub const BUDDY: u16 = 0x0003;
    pub const ICBM: u16 = 0x0004;
    pub const ADVERT: u16 = 0x0005;
    pub const INVITE: u16 = 0x0006;
    pub const ADMIN: u16 = 0x0007;
    pub const POPUP: u16 = 0x0008;
    pub const PERMIT_DENY: u16 = 0x0009;
    pub const USER_LOOKUP: u16 = 0x000A;
    pub const STATS: u16 = 0x000B;
    pub const CHAT_NAV: u16 = 0x000D;
    pub const CHAT: u16 = 0x000E;
    pub const ODIR: u16 = 0x000F;
    pub const BART: u16 = 0x0010;
    pub const FEEDBAG: u16 = 0x0013;
    pub const ICQ: u16 = 0x0015;
    pub const BUCP: u16 = 0x0017;
    pub const ALERT: u16 = 0x0018;
}

/// Standard SNAC error codes (subgroup 0x01 of every food group).
pub mod errcode {
    pub const INVALID_SNAC: u16 = 0x0001;
    pub const NOT_LOGGED_IN: u16 = 0x0004;
    pub const SERVICE_UNAVAILABLE: u16 = 0x0005;
    pub const NOT_SUPPORTED_BY_HOST: u16 = 0x0008;
    pub const INSUFFICIENT_RIGHTS: u16 = 0x000F;
    pub const IN_LOCAL_PERMIT_DENY: u16 = 0x0010;
    pub const NO_MATCH: u16 = 0x0014;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnacFrame {
    pub food_group: u16,
    pub sub_group: u16,
    pub flags: u16,
    pub request_id: u32,
}

impl SnacFrame {
    pub const LEN: usize = 10;

    pub fn new(food_group: u16, sub_group: u16) -> Self {
        Self {
            food_group,
            sub_group,
            flags: 0,
            request_id: 0,
        }
    }

    /// A reply frame echoing the request id of `req`.
    pub fn reply_to(req: SnacFrame, sub_group: u16) -> Self {
        Self {
            food_group: req.food_group,
            sub_group,
            flags: 0,
            request_id: req.request_id,
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.food_group);
        buf.put_u16(self.sub_group);
        buf.put_u16(self.flags);
        buf.put_u32(self.request_id);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            food_group: prim::read_u16(buf)?,
            sub_group: prim::read_u16(buf)?,
            flags: prim::read_u16(buf)?,
            request_id: prim::read_u32(buf)?,
        })
    }
}

/// A fully-assembled outbound SNAC: frame plus pre-encoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnacMessage {
    pub frame: SnacFrame,
    pub body: Vec<u8>,
}

impl SnacMessage {
    pub fn new(frame: SnacFrame, body: Vec<u8>) -> Self {
        Self { frame, body }
    }

    /// Serialize header and body into a FLAP data payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(SnacFrame::LEN + self.body.len());
        self.frame.encode(&mut buf);
        buf.extend_from_slice(&self.body);
        buf
    }
}

/// Generic error body: `[code:u16]` plus optional TLVs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnacError {
    pub code: u16,
}

impl SnacError {
    pub fn new(code: u16) -> Self {
        Self { code }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.code);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            code: prim::read_u16(buf)?,
        })
    }
}
