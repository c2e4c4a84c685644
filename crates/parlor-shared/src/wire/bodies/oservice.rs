//! OService food group (0x01): service bootstrap, rate params, user-info
//! state, cross-service routing.

use bytes::{Buf, BufMut, Bytes};

use crate::error::Result;
use crate::wire::prim;
use crate::wire::tlv::TlvBlock;
use crate::wire::userinfo::TlvUserInfo;

pub mod subgroup {
    pub const ERR: u16 = 0x0001;
    pub const CLIENT_ONLINE: u16 = 0x0002;
    pub const HOST_ONLINE: u16 = 0x0003;
    pub const SERVICE_REQUEST: u16 = 0x0004;
    pub const SERVICE_RESPONSE: u16 = 0x0005;
    pub const RATE_PARAMS_QUERY: u16 = 0x0006;
    pub const RATE_PARAMS_REPLY: u16 = 0x0007;
    pub const RATE_PARAMS_SUB_ADD: u16 = 0x0008;
    pub const USER_INFO_QUERY: u16 = 0x000E;
    pub const USER_INFO_UPDATE: u16 = 0x000F;
    pub const EVIL_NOTIFICATION: u16 = 0x0010;
    pub const IDLE_NOTIFICATION: u16 = 0x0011;
    pub const CLIENT_VERSIONS: u16 = 0x0017;
    pub const HOST_VERSIONS: u16 = 0x0018;
    pub const SET_USER_INFO_FIELDS: u16 = 0x001E;
}

pub mod tag {
    /// Room/service selector inside ServiceRequest.
    pub const ROOM_INFO: u16 = 0x0001;
    /// Host:port the client should reconnect to.
    pub const RECONNECT_HERE: u16 = 0x0005;
    /// Cookie to present on the new connection.
    pub const LOGIN_COOKIE: u16 = 0x0006;
    /// Food group the response is for.
    pub const GROUP_ID: u16 = 0x000D;
    /// User status bits in SetUserInfoFields.
    pub const USER_STATUS: u16 = 0x0006;
}

/// SNAC(0x01,0x03): food groups available on this connection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostOnline {
    pub food_groups: Vec<u16>,
}

impl HostOnline {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        for fg in &self.food_groups {
            buf.put_u16(*fg);
        }
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        let mut food_groups = Vec::new();
        while buf.remaining() >= 2 {
            food_groups.push(prim::read_u16(buf)?);
        }
        Ok(Self { food_groups })
    }
}

/// One entry of ClientOnline: the client's tool versions per food group.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GroupVersion {
    pub food_group: u16,
    pub version: u16,
    pub tool_id: u16,
    pub tool_version: u16,
}

/// SNAC(0x01,0x02): the client is done onboarding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientOnline {
    pub groups: Vec<GroupVersion>,
}

impl ClientOnline {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        for g in &self.groups {
            buf.put_u16(g.food_group);
            buf.put_u16(g.version);
            buf.put_u16(g.tool_id);
            buf.put_u16(g.tool_version);
        }
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        let mut groups = Vec::new();
        while buf.remaining() >= 8 {
            groups.push(GroupVersion {
                food_group: prim::read_u16(buf)?,
                version: prim::read_u16(buf)?,
                tool_id: prim::read_u16(buf)?,
                tool_version: prim::read_u16(buf)?,
            });
        }
        Ok(Self { groups })
    }
}

/// SNAC(0x01,0x04): ask BOS for a connection to another service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceRequest {
    pub food_group: u16,
    pub tlvs: TlvBlock,
}

impl ServiceRequest {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.food_group);
        self.tlvs.encode_rest(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            food_group: prim::read_u16(buf)?,
            tlvs: TlvBlock::decode_rest(buf)?,
        })
    }
}

/// The room selector TLV (0x01) inside a chat ServiceRequest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomSelector {
    pub exchange: u16,
    pub cookie: String,
    pub instance: u16,
}

impl RoomSelector {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.exchange);
        prim::put_u8_string(buf, &self.cookie);
        buf.put_u16(self.instance);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            exchange: prim::read_u16(buf)?,
            cookie: prim::read_u8_string(buf)?,
            instance: prim::read_u16(buf)?,
        })
    }
}

/// SNAC(0x01,0x05): where to connect and what cookie to present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceResponse {
    pub tlvs: TlvBlock,
}

impl ServiceResponse {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        self.tlvs.encode_rest(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            tlvs: TlvBlock::decode_rest(buf)?,
        })
    }
}

/// One advertised rate class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateClass {
    pub id: u16,
    pub window_size: u32,
    pub clear_level: u32,
    pub alert_level: u32,
    pub limit_level: u32,
    pub disconnect_level: u32,
    pub current_level: u32,
    pub max_level: u32,
    pub last_time: u32,
    pub current_state: u8,
}

impl RateClass {
    /// The permissive class advertised to every client.
    pub fn unlimited(id: u16) -> Self {
        Self {
            id,
            window_size: 80,
            clear_level: 2500,
            alert_level: 2000,
            limit_level: 1500,
            disconnect_level: 800,
            current_level: 2500,
            max_level: 6000,
            last_time: 0,
            current_state: 0,
        }
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.id);
        buf.put_u32(self.window_size);
        buf.put_u32(self.clear_level);
        buf.put_u32(self.alert_level);
        buf.put_u32(self.limit_level);
        buf.put_u32(self.disconnect_level);
        buf.put_u32(self.current_level);
        buf.put_u32(self.max_level);
        buf.put_u32(self.last_time);
        buf.put_u8(self.current_state);
    }

    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            id: prim::read_u16(buf)?,
            window_size: prim::read_u32(buf)?,
            clear_level: prim::read_u32(buf)?,
            alert_level: prim::read_u32(buf)?,
            limit_level: prim::read_u32(buf)?,
            disconnect_level: prim::read_u32(buf)?,
            current_level: prim::read_u32(buf)?,
            max_level: prim::read_u32(buf)?,
            last_time: prim::read_u32(buf)?,
            current_state: prim::read_u8(buf)?,
        })
    }
}

/// Membership of (food group, sub group) pairs in a rate class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateGroup {
    pub id: u16,
    pub pairs: Vec<(u16, u16)>,
}

impl RateGroup {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.id);
        buf.put_u16(self.pairs.len() as u16);
        for (fg, sg) in &self.pairs {
            buf.put_u16(*fg);
            buf.put_u16(*sg);
        }
    }

    fn decode(buf: &mut Bytes) -> Result<Self> {
        let id = prim::read_u16(buf)?;
        let count = prim::read_u16(buf)?;
        let mut pairs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            pairs.push((prim::read_u16(buf)?, prim::read_u16(buf)?));
        }
        Ok(Self { id, pairs })
    }
}

/// SNAC(0x01,0x07): advertised rate classes and memberships.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateParamsReply {
    pub classes: Vec<RateClass>,
    pub groups: Vec<RateGroup>,
}

impl RateParamsReply {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.classes.len() as u16);
        for c in &self.classes {
            c.encode(buf);
        }
        for g in &self.groups {
            g.encode(buf);
        }
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        let count = prim::read_u16(buf)?;
        let mut classes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            classes.push(RateClass::decode(buf)?);
        }
        let mut groups = Vec::new();
        while !buf.is_empty() {
            groups.push(RateGroup::decode(buf)?);
        }
        Ok(Self { classes, groups })
    }
}

/// SNAC(0x01,0x08): client acks the rate classes it will honor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateParamsSubAdd {
    pub class_ids: Vec<u16>,
}

impl RateParamsSubAdd {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        for id in &self.class_ids {
            buf.put_u16(*id);
        }
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        let mut class_ids = Vec::new();
        while buf.remaining() >= 2 {
            class_ids.push(prim::read_u16(buf)?);
        }
        Ok(Self { class_ids })
    }
}

/// SNAC(0x01,0x0F): the client's own user info.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserInfoUpdate {
    pub user_info: TlvUserInfo,
}

impl UserInfoUpdate {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        self.user_info.encode(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            user_info: TlvUserInfo::decode(buf)?,
        })
    }
}

/// SNAC(0x01,0x10): warning-level change, optionally naming the snitcher.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvilNotification {
    pub new_evil: u16,
    pub snitcher: Option<TlvUserInfo>,
}

impl EvilNotification {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u16(self.new_evil);
        if let Some(snitcher) = &self.snitcher {
            snitcher.encode(buf);
        }
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        let new_evil = prim::read_u16(buf)?;
        let snitcher = if buf.is_empty() {
            None
        } else {
            Some(TlvUserInfo::decode(buf)?)
        };
        Ok(Self { new_evil, snitcher })
    }
}

/// SNAC(0x01,0x11): seconds the user has been idle; 0 clears idle state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IdleNotification {
    pub idle_secs: u32,
}

impl IdleNotification {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u32(self.idle_secs);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            idle_secs: prim::read_u32(buf)?,
        })
    }
}

/// SNAC(0x01,0x17) and (0x01,0x18): food-group version lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Versions {
    pub pairs: Vec<(u16, u16)>,
}

impl Versions {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        for (fg, version) in &self.pairs {
            buf.put_u16(*fg);
            buf.put_u16(*version);
        }
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        let mut pairs = Vec::new();
        while buf.remaining() >= 4 {
            pairs.push((prim::read_u16(buf)?, prim::read_u16(buf)?));
        }
        Ok(Self { pairs })
    }
}

/// SNAC(0x01,0x1E): client sets its own status bits (invisibility).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetUserInfoFields {
    pub tlvs: TlvBlock,
}

impl SetUserInfoFields {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        self.tlvs.encode_rest(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            tlvs: TlvBlock::decode_rest(buf)?,
        })
    }
}
