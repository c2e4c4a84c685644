//! BUCP food group (0x17) and the login TLV tag space shared with FLAP
//! channel-1 signon frames.

use bytes::Bytes;

use crate::error::Result;
use crate::wire::prim;
use crate::wire::tlv::TlvBlock;

pub mod subgroup {
    pub const ERR: u16 = 0x0001;
    pub const LOGIN_REQUEST: u16 = 0x0002;
    pub const LOGIN_RESPONSE: u16 = 0x0003;
    pub const CHALLENGE_REQUEST: u16 = 0x0006;
    pub const CHALLENGE_RESPONSE: u16 = 0x0007;
}

/// TLV tags used during login, on both the BUCP and FLAP signon paths.
pub mod tag {
    pub const SCREEN_NAME: u16 = 0x0001;
    pub const ROASTED_PASSWORD: u16 = 0x0002;
    pub const CLIENT_IDENTITY: u16 = 0x0003;
    pub const RECONNECT_HERE: u16 = 0x0005;
    pub const AUTHORIZATION_COOKIE: u16 = 0x0006;
    pub const ERROR_SUBCODE: u16 = 0x0008;
    pub const ROASTED_TOC_PASSWORD: u16 = 0x0009;
    pub const PASSWORD_HASH: u16 = 0x0025;
}

/// Login error subcodes.
pub mod loginerr {
    pub const INVALID_USERNAME_OR_PASSWORD: u16 = 0x0001;
    pub const INVALID_PASSWORD: u16 = 0x0005;
    pub const ICQ_USER_ERR: u16 = 0x0008;
    pub const SUSPENDED_ACCOUNT: u16 = 0x0011;
}

/// SNAC(0x17,0x06): client requests a challenge for its screen name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucpChallengeRequest {
    pub tlvs: TlvBlock,
}

impl BucpChallengeRequest {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        self.tlvs.encode_rest(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            tlvs: TlvBlock::decode_rest(buf)?,
        })
    }
}

/// SNAC(0x17,0x07): the auth key the client salts its password hash with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucpChallengeResponse {
    pub auth_key: String,
}

impl BucpChallengeResponse {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        prim::put_u16_string(buf, &self.auth_key);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            auth_key: prim::read_u16_string(buf)?,
        })
    }
}

/// SNAC(0x17,0x02): hashed-password login request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucpLoginRequest {
    pub tlvs: TlvBlock,
}

impl BucpLoginRequest {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        self.tlvs.encode_rest(buf);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            tlvs: TlvBlock::decode_rest(buf)?,
        })
    }
}

/// SNAC(0x17,0x03): login response carrying either the BOS address and
/// cookie or an error subcode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucpLoginResponse {
    pub tlvs: TlvBlock,
}

impl BucpLoginResponse {
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

    #[test]
    fn test_challenge_response_round_trip() {
        let resp = BucpChallengeResponse {
            auth_key: "0123456789abcdef".to_string(),
        };
        let mut buf = Vec::new();
        resp.encode(&mut buf);
        assert_eq!(BucpChallengeResponse::decode(&mut Bytes::from(buf)).unwrap(), resp);
    }

    #[test]
    fn test_login_response_round_trip() {
        let mut resp = BucpLoginResponse::default();
        resp.tlvs.append(Tlv::string(tag::SCREEN_NAME, "chuck"));
        resp.tlvs.append(Tlv::string(tag::RECONNECT_HERE, "127.0.0.1:5191"));
        resp.tlvs.append(Tlv::new(tag::AUTHORIZATION_COOKIE, vec![9; 48]));
        let mut buf = Vec::new();
        resp.encode(&mut buf);
        let decoded = BucpLoginResponse::decode(&mut Bytes::from(buf)).unwrap();
        assert_eq!(decoded, resp);
        assert!(decoded.tlvs.has(tag::AUTHORIZATION_COOKIE));
    }
}
