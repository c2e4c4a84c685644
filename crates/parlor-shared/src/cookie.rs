//! Opaque auth tokens passed between services.
//!
//! A token is `keyed_hash(payload) || payload`. Any service holding the
//! shared key can verify that a token it receives was issued by the auth
//! service and trust the embedded identity without a user lookup. Hash
//! comparison goes through [`blake3::Hash`], which compares in constant
//! time.

use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::constants::MAX_TOKEN_SIZE;
use crate::error::CookieError;
use crate::ident::DisplayScreenName;

const TAG_SIZE: usize = blake3::OUT_LEN;

/// Issues and verifies MAC-signed opaque tokens.
#[derive(Clone)]
pub struct CookieBaker {
    key: [u8; 32],
}

impl CookieBaker {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Generate a baker with a random key. Tokens do not survive restarts.
    pub fn with_random_key() -> Self {
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Sign a payload, producing an opaque token.
    pub fn issue(&self, payload: &[u8]) -> Result<Vec<u8>, CookieError> {
        let size = TAG_SIZE + payload.len();
        if size > MAX_TOKEN_SIZE {
            return Err(CookieError::TooLarge {
                size,
                max: MAX_TOKEN_SIZE,
            });
        }
        let tag = blake3::keyed_hash(&self.key, payload);
        let mut token = Vec::with_capacity(size);
        token.extend_from_slice(tag.as_bytes());
        token.extend_from_slice(payload);
        Ok(token)
    }

    /// Verify a token and return the embedded payload.
    pub fn crack(&self, token: &[u8]) -> Result<Vec<u8>, CookieError> {
        if token.len() > MAX_TOKEN_SIZE {
            return Err(CookieError::TooLarge {
                size: token.len(),
                max: MAX_TOKEN_SIZE,
            });
        }
        if token.len() < TAG_SIZE {
            return Err(CookieError::TooShort);
        }
        let (tag, payload) = token.split_at(TAG_SIZE);
        let mut provided = [0u8; TAG_SIZE];
        provided.copy_from_slice(tag);
        if blake3::Hash::from(provided) != blake3::keyed_hash(&self.key, payload) {
            return Err(CookieError::BadSignature);
        }
        Ok(payload.to_vec())
    }

    /// Issue a token embedding a serialized payload struct.
    pub fn issue_payload<T: Serialize>(&self, payload: &T) -> Result<Vec<u8>, CookieError> {
        let bytes =
            bincode::serialize(payload).map_err(|e| CookieError::BadPayload(e.to_string()))?;
        self.issue(&bytes)
    }

    /// Verify a token and deserialize its embedded payload struct.
    pub fn crack_payload<T: DeserializeOwned>(&self, token: &[u8]) -> Result<T, CookieError> {
        let bytes = self.crack(token)?;
        bincode::deserialize(&bytes).map_err(|e| CookieError::BadPayload(e.to_string()))
    }
}

/// Client metadata carried into the BOS service by the login cookie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BosCookie {
    pub screen_name: DisplayScreenName,
    pub client_id: String,
}

/// Identity and room carried into the chat service by the chat login cookie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatLoginCookie {
    pub screen_name: DisplayScreenName,
    pub chat_cookie: String,
}
