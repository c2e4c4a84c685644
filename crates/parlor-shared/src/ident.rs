use serde::{Deserialize, Serialize};

use crate::error::ScreenNameError;

/// Canonical screen-name form used for identity comparison and map keys.
///
/// AIM handles are lowercased with spaces removed; ICQ UINs are plain digit
/// strings and pass through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentScreenName(String);

impl IdentScreenName {
    pub fn new(raw: &str) -> Self {
        let canonical = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(|c| c.to_lowercase())
            .collect();
        Self(canonical)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdentScreenName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Screen name as the user typed it at registration, case and spaces intact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DisplayScreenName(String);

impl DisplayScreenName {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn ident(&self) -> IdentScreenName {
        IdentScreenName::new(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An ICQ UIN is an all-digit screen name.
    pub fn is_uin(&self) -> bool {
        !self.0.is_empty() && self.0.chars().all(|c| c.is_ascii_digit())
    }

    pub fn validate_aim_handle(&self) -> Result<(), ScreenNameError> {
        let ident = self.ident();
        let name = ident.as_str();
        if !(3..=16).contains(&name.len()) {
            return Err(ScreenNameError::HandleLength);
        }
        if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(ScreenNameError::HandleFormat);
        }
        Ok(())
    }

    pub fn validate_uin(&self) -> Result<(), ScreenNameError> {
        match self.0.parse::<u32>() {
            Ok(uin) if (10_000..=2_147_483_646).contains(&uin) => Ok(()),
            _ => Err(ScreenNameError::UinFormat),
        }
    }
}

impl std::fmt::Display for DisplayScreenName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DisplayScreenName {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ident_canonicalization() {
        let a = IdentScreenName::new("Screen Name");
        let b = IdentScreenName::new("screenname");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "screenname");
    }

    #[test]
    fn test_display_preserves_case_and_spaces() {
        let d = DisplayScreenName::new("Screen Name");
        assert_eq!(d.as_str(), "Screen Name");
        assert_eq!(d.ident().as_str(), "screenname");
    }

    #[test]
    fn test_uin_detection() {
        assert!(DisplayScreenName::new("123456").is_uin());
        assert!(!DisplayScreenName::new("chattingchuck").is_uin());
        assert!(!DisplayScreenName::new("").is_uin());
    }

    #[test]
    fn test_aim_handle_validation() {
        assert!(DisplayScreenName::new("Chatting Chuck").validate_aim_handle().is_ok());
        assert!(DisplayScreenName::new("ab").validate_aim_handle().is_err());
        assert!(DisplayScreenName::new("1stplace").validate_aim_handle().is_err());
        assert!(DisplayScreenName::new("seventeenchars-xx").validate_aim_handle().is_err());
    }

    #[test]
    fn test_uin_validation() {
        assert!(DisplayScreenName::new("100003").validate_uin().is_ok());
        assert!(DisplayScreenName::new("42").validate_uin().is_err());
        assert!(DisplayScreenName::new("chuck").validate_uin().is_err());
    }
}
