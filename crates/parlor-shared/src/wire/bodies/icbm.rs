//! ICBM food group (0x04): instant messages, warnings, rendezvous.

use bytes::{Buf, BufMut, Bytes};

use crate::error::{Result, WireError};
use crate::wire::prim;
use crate::wire::tlv::TlvBlock;
use crate::wire::userinfo::TlvUserInfo;

pub mod subgroup {
    pub const ERR: u16 = 0x0001;
    pub const ADD_PARAMETERS: u16 = 0x0002;
    pub const PARAMETER_QUERY: u16 = 0x0004;
    pub const PARAMETER_REPLY: u16 = 0x0005;
    pub const CHANNEL_MSG_TO_HOST: u16 = 0x0006;
    pub const CHANNEL_MSG_TO_CLIENT: u16 = 0x0007;
    pub const EVIL_REQUEST: u16 = 0x0008;
    pub const EVIL_REPLY: u16 = 0x0009;
    pub const CLIENT_ERR: u16 = 0x000B;
    pub const HOST_ACK: u16 = 0x000C;
}

pub mod channel {
    pub const IM: u16 = 0x0001;
    pub const RENDEZVOUS: u16 = 0x0002;
    pub const MIME: u16 = 0x0003;
}

pub mod tag {
    /// Channel-1 message payload (fragment list).
    pub const AIM_DATA: u16 = 0x0002;
    /// Sender asks for a host ack.
    pub const REQUEST_HOST_ACK: u16 = 0x0003;
    /// Message is an auto-response (away reply).
    pub const AUTO_RESPONSE: u16 = 0x0004;
    /// Channel-2 rendezvous payload.
    pub const DATA: u16 = 0x0005;
    /// Sender asks the host to store the message if recipient is offline.
    pub const STORE_OFFLINE: u16 = 0x0006;
}

/// SNAC(0x04,0x02): client channel parameters; accepted, not persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AddParameters {
    pub channel: u16,
    pub flags: u32,
    pub max_msg_len: u16,
    pub max_sender_evil: u16,
    pub max_receiver_evil: u16,
    pub min_msg_interval: u32,
}

impl AddParameters {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.channel);
        buf.put_u32(self.flags);
        buf.put_u16(self.max_msg_len);
        buf.put_u16(self.max_sender_evil);
        buf.put_u16(self.max_receiver_evil);
        buf.put_u32(self.min_msg_interval);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            channel: prim::read_u16(buf)?,
            flags: prim::read_u32(buf)?,
            max_msg_len: prim::read_u16(buf)?,
            max_sender_evil: prim::read_u16(buf)?,
            max_receiver_evil: prim::read_u16(buf)?,
            min_msg_interval: prim::read_u32(buf)?,
        })
    }
}

/// SNAC(0x04,0x05): the host's channel parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterReply {
    pub max_slots: u16,
    pub flags: u32,
    pub max_msg_len: u16,
    pub max_sender_evil: u16,
    pub max_receiver_evil: u16,
    pub min_msg_interval: u32,
}

impl Default for ParameterReply {
    fn default() -> Self {
        Self {
            max_slots: 100,
            flags: 0x0000_0003,
            max_msg_len: 512,
            max_sender_evil: 999,
            max_receiver_evil: 999,
            min_msg_interval: 0,
        }
    }
}

impl ParameterReply {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.max_slots);
        buf.put_u32(self.flags);
        buf.put_u16(self.max_msg_len);
        buf.put_u16(self.max_sender_evil);
        buf.put_u16(self.max_receiver_evil);
        buf.put_u32(self.min_msg_interval);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            max_slots: prim::read_u16(buf)?,
            flags: prim::read_u32(buf)?,
            max_msg_len: prim::read_u16(buf)?,
            max_sender_evil: prim::read_u16(buf)?,
            max_receiver_evil: prim::read_u16(buf)?,
            min_msg_interval: prim::read_u32(buf)?,
        })
    }
}

/// SNAC(0x04,0x06): client sends a message to a screen name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelMsgToHost {
    pub cookie: u64,
    pub channel: u16,
    pub screen_name: String,
    pub tlvs: TlvBlock,
}

impl ChannelMsgToHost {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u64(self.cookie);
        buf.put_u16(self.channel);
        prim::put_u8_string(buf, &self.screen_name);
        self.tlvs.encode_rest(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            cookie: prim::read_u64(buf)?,
            channel: prim::read_u16(buf)?,
            screen_name: prim::read_u8_string(buf)?,
            tlvs: TlvBlock::decode_rest(buf)?,
        })
    }
}

/// SNAC(0x04,0x07): message delivered to the recipient.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelMsgToClient {
    pub cookie: u64,
    pub channel: u16,
    pub sender_info: TlvUserInfo,
    pub tlvs: TlvBlock,
}

impl ChannelMsgToClient {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u64(self.cookie);
        buf.put_u16(self.channel);
        self.sender_info.encode(buf);
        self.tlvs.encode_rest(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            cookie: prim::read_u64(buf)?,
            channel: prim::read_u16(buf)?,
            sender_info: TlvUserInfo::decode(buf)?,
            tlvs: TlvBlock::decode_rest(buf)?,
        })
    }
}

/// SNAC(0x04,0x08): warn another user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvilRequest {
    /// 0 = normal, 1 = anonymous.
    pub send_as: u16,
    pub screen_name: String,
}

impl EvilRequest {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.send_as);
        prim::put_u8_string(buf, &self.screen_name);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            send_as: prim::read_u16(buf)?,
            screen_name: prim::read_u8_string(buf)?,
        })
    }
}

/// SNAC(0x04,0x09).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EvilReply {
    pub evil_delta_applied: u16,
    pub updated_evil: u16,
}

impl EvilReply {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.evil_delta_applied);
        buf.put_u16(self.updated_evil);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            evil_delta_applied: prim::read_u16(buf)?,
            updated_evil: prim::read_u16(buf)?,
        })
    }
}

/// SNAC(0x04,0x0C): host acknowledges a sent message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostAck {
    pub cookie: u64,
    pub channel: u16,
    pub screen_name: String,
}

impl HostAck {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u64(self.cookie);
        buf.put_u16(self.channel);
        prim::put_u8_string(buf, &self.screen_name);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            cookie: prim::read_u64(buf)?,
            channel: prim::read_u16(buf)?,
            screen_name: prim::read_u8_string(buf)?,
        })
    }
}

// Channel-1 message text is wrapped in a fragment list:
// [id:u8][version:u8][len:u16][data] per fragment. Fragment 5 carries the
// capability array, fragment 1 the charset-prefixed text.

const FRAG_CAPABILITIES: u8 = 0x05;
const FRAG_TEXT: u8 = 0x01;
const CHARSET_ASCII: u16 = 0x0000;

/// Build the channel-1 fragment list for a plain text message.
pub fn encode_im_text(text: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(text.len() + 17);
    // capabilities fragment: a single 0x01 (text) capability
    buf.put_u8(FRAG_CAPABILITIES);
    buf.put_u8(1);
    buf.put_u16(1);
    buf.put_u8(1);
    // text fragment: charset, charsubset, then the message bytes
    buf.put_u8(FRAG_TEXT);
    buf.put_u8(1);
    buf.put_u16(text.len() as u16 + 4);
    buf.put_u16(CHARSET_ASCII);
    buf.put_u16(0);
    buf.put_slice(text.as_bytes());
    buf
}

/// Extract the message text from a channel-1 fragment list.
pub fn decode_im_text(data: &[u8]) -> Result<String> {
    let mut buf = Bytes::copy_from_slice(data);
    while buf.remaining() >= 4 {
        let id = prim::read_u8(&mut buf)?;
        let _version = prim::read_u8(&mut buf)?;
        let mut frag = prim::read_u16_bytes(&mut buf)?;
        if id != FRAG_TEXT {
            continue;
        }
        if frag.remaining() < 4 {
            return Err(WireError::MalformedTlv);
        }
        frag.advance(4); // charset + charsubset
        return String::from_utf8(frag.to_vec()).map_err(|_| WireError::BadString);
    }
    Err(WireError::MalformedTlv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::tlv::Tlv;

    #[test]
    fn test_msg_to_host_round_trip() {
        let mut body = ChannelMsgToHost {
            cookie: 0x0102030405060708,
            channel: channel::IM,
            screen_name: "bob".to_string(),
            tlvs: TlvBlock::default(),
        };
        body.tlvs.append(Tlv::new(tag::AIM_DATA, encode_im_text("hi")));
        let mut buf = Vec::new();
        body.encode(&mut buf);
        assert_eq!(ChannelMsgToHost::decode(&mut Bytes::from(buf)).unwrap(), body);
    }

    #[test]
    fn test_im_text_round_trip() {
        let data = encode_im_text("hello there");
        assert_eq!(decode_im_text(&data).unwrap(), "hello there");
    }

    #[test]
    fn test_im_text_missing_fragment() {
        assert!(decode_im_text(&[]).is_err());
        // capabilities fragment only
        let caps = &[0x05, 0x01, 0x00, 0x01, 0x01];
        assert!(decode_im_text(caps).is_err());
    }

    #[test]
    fn test_evil_request_round_trip() {
        let body = EvilRequest {
            send_as: 1,
            screen_name: "victim".to_string(),
        };
        let mut buf = Vec::new();
        body.encode(&mut buf);
        assert_eq!(EvilRequest::decode(&mut Bytes::from(buf)).unwrap(), body);
    }
}
