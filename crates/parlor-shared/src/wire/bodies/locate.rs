//! Locate food group (0x02): profiles, away messages, capabilities, and
//! directory info.

use bytes::{BufMut, Bytes};

use crate::error::Result;
use crate::wire::prim;
use crate::wire::tlv::TlvBlock;
use crate::wire::userinfo::TlvUserInfo;

pub mod subgroup {
    pub const ERR: u16 = 0x0001;
    pub const RIGHTS_QUERY: u16 = 0x0002;
    pub const RIGHTS_REPLY: u16 = 0x0003;
    pub const SET_INFO: u16 = 0x0004;
    pub const USER_INFO_QUERY: u16 = 0x0005;
    pub const USER_INFO_REPLY: u16 = 0x0006;
    pub const SET_DIR_INFO: u16 = 0x0009;
    pub const SET_DIR_REPLY: u16 = 0x000A;
    pub const GET_DIR_INFO: u16 = 0x000B;
    pub const GET_DIR_REPLY: u16 = 0x000C;
}

/// TLV tags carried by SetInfo and UserInfoReply.
pub mod tag {
    pub const SIG_MIME: u16 = 0x0001;
    pub const SIG_DATA: u16 = 0x0002;
    pub const UNAVAILABLE_MIME: u16 = 0x0003;
    pub const UNAVAILABLE_DATA: u16 = 0x0004;
    pub const CAPABILITIES: u16 = 0x0005;
}

/// Request-type bits of UserInfoQuery.
pub mod querytype {
    pub const PROFILE: u16 = 0x0001;
    pub const AWAY_MESSAGE: u16 = 0x0002;
    pub const CAPABILITIES: u16 = 0x0004;
}

/// Directory field TLV tags (shared with the ODir food group).
pub mod dirtag {
    pub const FIRST_NAME: u16 = 0x0001;
    pub const LAST_NAME: u16 = 0x0002;
    pub const MIDDLE_NAME: u16 = 0x0003;
    pub const MAIDEN_NAME: u16 = 0x0004;
    pub const EMAIL: u16 = 0x0005;
    pub const COUNTRY: u16 = 0x0006;
    pub const STATE: u16 = 0x0007;
    pub const CITY: u16 = 0x0008;
}

/// SNAC(0x02,0x02).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RightsQuery {
    pub tlvs: TlvBlock,
}

impl RightsQuery {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        self.tlvs.encode_rest(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            tlvs: TlvBlock::decode_rest(buf)?,
        })
    }
}

/// SNAC(0x02,0x03).
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

/// SNAC(0x02,0x04): set profile, away message, or capabilities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetInfo {
    pub tlvs: TlvBlock,
}

impl SetInfo {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        self.tlvs.encode_rest(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            tlvs: TlvBlock::decode_rest(buf)?,
        })
    }
}

/// SNAC(0x02,0x05): ask for another user's profile or away message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserInfoQuery {
    pub request_type: u16,
    pub screen_name: String,
}

impl UserInfoQuery {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.request_type);
        prim::put_u8_string(buf, &self.screen_name);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            request_type: prim::read_u16(buf)?,
            screen_name: prim::read_u8_string(buf)?,
        })
    }
}

/// SNAC(0x02,0x06): user info plus the requested locate TLVs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserInfoReply {
    pub user_info: TlvUserInfo,
    pub locate_info: TlvBlock,
}

impl UserInfoReply {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        self.user_info.encode(buf);
        self.locate_info.encode_rest(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            user_info: TlvUserInfo::decode(buf)?,
            locate_info: TlvBlock::decode_rest(buf)?,
        })
    }
}

/// SNAC(0x02,0x09).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetDirInfo {
    pub tlvs: TlvBlock,
}

impl SetDirInfo {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        self.tlvs.encode_rest(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            tlvs: TlvBlock::decode_rest(buf)?,
        })
    }
}

/// SNAC(0x02,0x0A).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SetDirReply {
    pub result: u16,
}

impl SetDirReply {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.result);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            result: prim::read_u16(buf)?,
        })
    }
}

/// SNAC(0x02,0x0B).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetDirInfo {
    pub screen_name: String,
}

impl GetDirInfo {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        prim::put_u8_string(buf, &self.screen_name);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            screen_name: prim::read_u8_string(buf)?,
        })
    }
}

/// SNAC(0x02,0x0C).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetDirReply {
    pub status: u16,
    pub fields: TlvBlock,
}

impl GetDirReply {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.status);
        self.fields.encode_counted(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            status: prim::read_u16(buf)?,
            fields: TlvBlock::decode_counted(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::tlv::Tlv;

    #[test]
    fn test_user_info_query_round_trip() {
        let q = UserInfoQuery {
            request_type: querytype::PROFILE | querytype::AWAY_MESSAGE,
            screen_name: "chuck".to_string(),
        };
        let mut buf = Vec::new();
        q.encode(&mut buf);
        assert_eq!(UserInfoQuery::decode(&mut Bytes::from(buf)).unwrap(), q);
    }

    #[test]
    fn test_user_info_reply_round_trip() {
        let reply = UserInfoReply {
            user_info: TlvUserInfo::new("chuck", 20),
            locate_info: TlvBlock::new(vec![
                Tlv::string(tag::SIG_MIME, "text/aolrtf; charset=\"us-ascii\""),
                Tlv::string(tag::SIG_DATA, "<html>my profile</html>"),
            ]),
        };
        let mut buf = Vec::new();
        reply.encode(&mut buf);
        assert_eq!(UserInfoReply::decode(&mut Bytes::from(buf)).unwrap(), reply);
    }

    #[test]
    fn test_dir_reply_round_trip() {
        let reply = GetDirReply {
            status: 1,
            fields: TlvBlock::new(vec![
                Tlv::string(dirtag::FIRST_NAME, "Chuck"),
                Tlv::string(dirtag::CITY, "Dulles"),
            ]),
        };
        let mut buf = Vec::new();
        reply.encode(&mut buf);
        assert_eq!(GetDirReply::decode(&mut Bytes::from(buf)).unwrap(), reply);
    }
}
