//! MD5 login-hash computation shared by the auth service and the user store.
//!
//! Two hash forms are kept per account. The strong hash covers BUCP logins
//! (the client hashes its password before salting); the weak hash covers
//! roasted FLAP/TOC logins (the server recovers the plaintext and hashes it
//! with the salt).

use md5::{Digest, Md5};

use crate::roast;

/// Constant suffix mixed into every AIM login hash.
pub const HASH_SUFFIX: &[u8] = b"AOL Instant Messenger (SM)";

fn md5(parts: &[&[u8]]) -> Vec<u8> {
    let mut hasher = Md5::new();
    for p in parts {
        hasher.update(p);
    }
    hasher.finalize().to_vec()
}

/// Hash validated against BUCP logins: md5(key || md5(password) || suffix).
pub fn strong_md5_hash(auth_key: &str, password: &str) -> Vec<u8> {
    let inner = md5(&[password.as_bytes()]);
    md5(&[auth_key.as_bytes(), &inner, HASH_SUFFIX])
}

/// Hash validated against roasted logins: md5(key || password || suffix).
pub fn weak_md5_hash(auth_key: &str, password: &str) -> Vec<u8> {
    md5(&[auth_key.as_bytes(), password.as_bytes(), HASH_SUFFIX])
}

/// Validate the salted hash sent by a BUCP client.
pub fn validate_strong_hash(stored: &[u8], client_hash: &[u8]) -> bool {
    !stored.is_empty() && stored == client_hash
}

/// Validate an AIM-roasted password against the stored weak hash.
pub fn validate_roasted_aim(stored_weak: &[u8], auth_key: &str, roasted: &[u8]) -> bool {
    let plain = roast::roast_aim(roasted);
    validate_plaintext(stored_weak, auth_key, &plain)
}

/// Validate a TOC-roasted password against the stored weak hash.
pub fn validate_roasted_toc(stored_weak: &[u8], auth_key: &str, roasted: &[u8]) -> bool {
    let plain = roast::roast_toc(roasted);
    validate_plaintext(stored_weak, auth_key, &plain)
}

fn validate_plaintext(stored_weak: &[u8], auth_key: &str, plain: &[u8]) -> bool {
    let Ok(password) = std::str::from_utf8(plain) else {
        return false;
    };
    !stored_weak.is_empty() && stored_weak == weak_md5_hash(auth_key, password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_hash_matches_client_computation() {
        // what a BUCP client sends: md5(key || md5(pass) || suffix)
        let client = {
            let mut h = Md5::new();
            h.update(b"K");
            h.update(Md5::digest(b"hunter2"));
            h.update(HASH_SUFFIX);
            h.finalize().to_vec()
        };
        assert!(validate_strong_hash(&strong_md5_hash("K", "hunter2"), &client));
    }

    #[test]
    fn test_strong_hash_rejects_wrong_password() {
        let stored = strong_md5_hash("K", "hunter2");
        let wrong = strong_md5_hash("K", "hunter3");
        assert!(!validate_strong_hash(&stored, &wrong));
    }

    #[test]
    fn test_roasted_aim_round_trip() {
        let stored = weak_md5_hash("salt", "hunter2");
        let roasted = roast::roast_aim(b"hunter2");
        assert!(validate_roasted_aim(&stored, "salt", &roasted));
        assert!(!validate_roasted_aim(&stored, "salt", &roast::roast_aim(b"wrong")));
    }

    #[test]
    fn test_roasted_toc_round_trip() {
        let stored = weak_md5_hash("salt", "password");
        let roasted = roast::roast_toc(b"password");
        assert!(validate_roasted_toc(&stored, "salt", &roasted));
    }

    #[test]
    fn test_empty_stored_hash_never_validates() {
        assert!(!validate_strong_hash(&[], &[]));
        assert!(!validate_roasted_aim(&[], "salt", b""));
    }
}
