//! Chat food group (0x0E): room membership and reflected messaging.

use bytes::{BufMut, Bytes};

use crate::error::{Result, WireError};
use crate::wire::prim;
use crate::wire::tlv::{Tlv, TlvBlock};
use crate::wire::userinfo::TlvUserInfo;

pub mod subgroup {
    pub const ERR: u16 = 0x0001;
    pub const ROOM_INFO_UPDATE: u16 = 0x0002;
    pub const USERS_JOINED: u16 = 0x0003;
    pub const USERS_LEFT: u16 = 0x0004;
    pub const CHANNEL_MSG_TO_HOST: u16 = 0x0005;
    pub const CHANNEL_MSG_TO_CLIENT: u16 = 0x0006;
}

pub mod tag {
    pub const PUBLIC_WHISPER: u16 = 0x0001;
    pub const SENDER_INFORMATION: u16 = 0x0003;
    pub const MESSAGE_INFO: u16 = 0x0005;
    pub const ENABLE_REFLECTION: u16 = 0x0006;
}

/// Tags inside the MESSAGE_INFO TLV.
pub mod msgtag {
    pub const TEXT: u16 = 0x0001;
    pub const ENCODING: u16 = 0x0002;
    pub const LANGUAGE: u16 = 0x0003;
}

/// Room metadata TLV tags.
pub mod roomtag {
    pub const MAX_OCCUPANCY: u16 = 0x00D2;
    pub const ROOM_NAME: u16 = 0x00D3;
    pub const FLAGS: u16 = 0x00C9;
}

/// The stable identity of a chat room on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct IcbmRoomInfo {
    pub exchange: u16,
    pub cookie: String,
    pub instance: u16,
}

/// SNAC(0x0E,0x02): room metadata, sent to a client joining a room.
/// Also the body of ChatNav CreateRoom.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomInfoUpdate {
    pub exchange: u16,
    pub cookie: String,
    pub instance: u16,
    pub detail_level: u8,
    pub tlvs: TlvBlock,
}

impl RoomInfoUpdate {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.exchange);
        prim::put_u8_string(buf, &self.cookie);
        buf.put_u16(self.instance);
        buf.put_u8(self.detail_level);
        self.tlvs.encode_counted(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            exchange: prim::read_u16(buf)?,
            cookie: prim::read_u8_string(buf)?,
            instance: prim::read_u16(buf)?,
            detail_level: prim::read_u8(buf)?,
            tlvs: TlvBlock::decode_counted(buf)?,
        })
    }

    pub fn room_name(&self) -> Option<String> {
        self.tlvs.string(roomtag::ROOM_NAME)
    }
}

/// SNAC(0x0E,0x03) and (0x0E,0x04): occupant arrivals and departures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Occupants {
    pub users: Vec<TlvUserInfo>,
}

impl Occupants {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        for u in &self.users {
            u.encode(buf);
        }
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        let mut users = Vec::new();
        while !buf.is_empty() {
            users.push(TlvUserInfo::decode(buf)?);
        }
        Ok(Self { users })
    }
}

/// SNAC(0x0E,0x05).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelMsgToHost {
    pub cookie: u64,
    pub channel: u16,
    pub tlvs: TlvBlock,
}

impl ChannelMsgToHost {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u64(self.cookie);
        buf.put_u16(self.channel);
        self.tlvs.encode_rest(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            cookie: prim::read_u64(buf)?,
            channel: prim::read_u16(buf)?,
            tlvs: TlvBlock::decode_rest(buf)?,
        })
    }
}

/// SNAC(0x0E,0x06).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelMsgToClient {
    pub cookie: u64,
    pub channel: u16,
    pub tlvs: TlvBlock,
}

impl ChannelMsgToClient {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u64(self.cookie);
        buf.put_u16(self.channel);
        self.tlvs.encode_rest(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            cookie: prim::read_u64(buf)?,
            channel: prim::read_u16(buf)?,
            tlvs: TlvBlock::decode_rest(buf)?,
        })
    }
}

/// Wrap message text in the MESSAGE_INFO TLV structure.
pub fn encode_chat_message_text(text: &str) -> Vec<u8> {
    let mut inner = TlvBlock::default();
    inner.append(Tlv::string(msgtag::TEXT, text));
    let mut buf = Vec::new();
    inner.encode_rest(&mut buf);
    buf
}

/// Extract message text from a MESSAGE_INFO TLV value.
pub fn decode_chat_message_text(data: &[u8]) -> Result<String> {
    let mut buf = Bytes::copy_from_slice(data);
    let block = TlvBlock::decode_rest(&mut buf)?;
    block.string(msgtag::TEXT).ok_or(WireError::MalformedTlv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_info_round_trip() {
        let mut room = RoomInfoUpdate {
            exchange: 4,
            cookie: "aol-4-lobby".to_string(),
            instance: 0,
            detail_level: 2,
            tlvs: TlvBlock::default(),
        };
        room.tlvs.append(Tlv::string(roomtag::ROOM_NAME, "lobby"));
        let mut buf = Vec::new();
        room.encode(&mut buf);
        let decoded = RoomInfoUpdate::decode(&mut Bytes::from(buf)).unwrap();
        assert_eq!(decoded, room);
        assert_eq!(decoded.room_name().as_deref(), Some("lobby"));
    }

    #[test]
    fn test_occupants_round_trip() {
        let body = Occupants {
            users: vec![TlvUserInfo::new("alice", 0), TlvUserInfo::new("bob", 30)],
        };
        let mut buf = Vec::new();
        body.encode(&mut buf);
        assert_eq!(Occupants::decode(&mut Bytes::from(buf)).unwrap(), body);
    }

    #[test]
    fn test_message_text_round_trip() {
        let data = encode_chat_message_text("hello room");
        assert_eq!(decode_chat_message_text(&data).unwrap(), "hello room");
    }

    #[test]
    fn test_msg_to_client_byte_identical_text() {
        let mut host = ChannelMsgToHost {
            cookie: 42,
            channel: 3,
            tlvs: TlvBlock::default(),
        };
        host.tlvs
            .append(Tlv::new(tag::MESSAGE_INFO, encode_chat_message_text("hello")));

        // the reflected client message carries the exact message-info bytes
        let reflected = ChannelMsgToClient {
            cookie: host.cookie,
            channel: host.channel,
            tlvs: host.tlvs.clone(),
        };
        assert_eq!(
            reflected.tlvs.bytes(tag::MESSAGE_INFO),
            host.tlvs.bytes(tag::MESSAGE_INFO)
        );
    }
}
