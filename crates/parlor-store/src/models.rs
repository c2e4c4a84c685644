use chrono::{DateTime, Utc};

use parlor_shared::login;
use parlor_shared::{DisplayScreenName, IdentScreenName};

/// A registered account. Never destroyed by the protocol runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub ident: IdentScreenName,
    pub display: DisplayScreenName,
    /// MD5 salt handed to BUCP clients.
    pub auth_key: String,
    pub strong_md5: Vec<u8>,
    pub weak_md5: Vec<u8>,
    pub profile: String,
    pub confirmed: bool,
    pub reg_status: u16,
    pub email: String,
}

impl User {
    /// Build a user from a plaintext password, deriving both login hashes.
    pub fn new(display: DisplayScreenName, password: &str, auth_key: String) -> Self {
        let strong_md5 = login::strong_md5_hash(&auth_key, password);
        let weak_md5 = login::weak_md5_hash(&auth_key, password);
        Self {
            ident: display.ident(),
            display,
            auth_key,
            strong_md5,
            weak_md5,
            profile: String::new(),
            confirmed: false,
            reg_status: 3,
            email: String::new(),
        }
    }

    pub fn validate_hash(&self, client_hash: &[u8]) -> bool {
        login::validate_strong_hash(&self.strong_md5, client_hash)
    }

    pub fn validate_roasted_pass(&self, roasted: &[u8]) -> bool {
        login::validate_roasted_aim(&self.weak_md5, &self.auth_key, roasted)
    }

    pub fn validate_roasted_toc_pass(&self, roasted: &[u8]) -> bool {
        login::validate_roasted_toc(&self.weak_md5, &self.auth_key, roasted)
    }
}

/// An ICBM payload parked for a signed-off recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct OfflineMessage {
    pub sender: IdentScreenName,
    pub recipient: IdentScreenName,
    pub sent_at: DateTime<Utc>,
    /// Encoded `ChannelMsgToHost` body, replayed at delivery time.
    pub payload: Vec<u8>,
}

/// Persistent chat-room metadata. The cookie is the canonical identifier
/// across the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRoom {
    pub cookie: String,
    pub exchange: u16,
    pub name: String,
    pub created: DateTime<Utc>,
    pub creator: IdentScreenName,
    pub instance: u16,
    pub detail_level: u8,
}

/// Directory fields settable via Locate SetDirInfo / TOC toc_set_dir.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirInfo {
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub maiden_name: String,
    pub email: String,
    pub country: String,
    pub state: String,
    pub city: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_shared::roast;

    #[test]
    fn test_user_validates_own_password() {
        let user = User::new(DisplayScreenName::new("Chatting Chuck"), "hunter2", "K".into());
        assert_eq!(user.ident.as_str(), "chattingchuck");
        assert!(user.validate_roasted_pass(&roast::roast_aim(b"hunter2")));
        assert!(user.validate_roasted_toc_pass(&roast::roast_toc(b"hunter2")));
        assert!(!user.validate_roasted_pass(&roast::roast_aim(b"wrong")));
    }
}
