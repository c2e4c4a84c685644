//! Password roasting, the XOR obfuscation legacy clients apply before
//! sending a password over the wire. Roasting is symmetric: applying the
//! same table twice restores the input.

/// Roasting table used by AIM 1.0-3.0 and ICQ FLAP logins.
pub const AIM_ROAST_TABLE: [u8; 16] = [
    0xF3, 0x26, 0x81, 0xC4, 0x39, 0x86, 0xDB, 0x92, 0x71, 0xA3, 0xB9, 0xE6, 0x53, 0x7A, 0x95,
    0x7C,
];

/// Roasting key used by TOC clients ("Tic/Toc").
pub const TOC_ROAST_TABLE: &[u8] = b"Tic/Toc";

fn xor_with(table: &[u8], input: &[u8]) -> Vec<u8> {
    input
        .iter()
        .enumerate()
        .map(|(i, b)| b ^ table[i % table.len()])
        .collect()
}

/// Roast or de-roast a password with the AIM table.
pub fn roast_aim(password: &[u8]) -> Vec<u8> {
    xor_with(&AIM_ROAST_TABLE, password)
}

/// Roast or de-roast a password with the TOC "Tic/Toc" key.
pub fn roast_toc(password: &[u8]) -> Vec<u8> {
    xor_with(TOC_ROAST_TABLE, password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aim_roast_is_symmetric() {
        let plain = b"hunter2";
        let roasted = roast_aim(plain);
        assert_ne!(roasted, plain);
        assert_eq!(roast_aim(&roasted), plain);
    }

    #[test]
    fn test_toc_roast_known_value() {
        // "password" roasts to 0x2408105c23001130 per the TiK docs
        let roasted = roast_toc(b"password");
        assert_eq!(hex::encode(&roasted), "2408105c23001130");
    }

    #[test]
    fn test_empty_password() {
        assert!(roast_aim(b"").is_empty());
        assert!(roast_toc(b"").is_empty());
    }
}
