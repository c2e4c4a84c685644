use thiserror::Error;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("FLAP start marker is not 0x2A (got 0x{0:02X})")]
    BadStartMarker(u8),

    #[error("unknown FLAP channel {0}")]
    UnknownChannel(u8),

    #[error("frame truncated: needed {needed} more bytes, had {remaining}")]
    Truncated { needed: usize, remaining: usize },

    #[error("malformed TLV block")]
    MalformedTlv,

    #[error("missing required TLV tag 0x{0:04X}")]
    MissingTlv(u16),

    #[error("string value is not valid UTF-8")]
    BadString,

    #[error("unknown SNAC (0x{food_group:04X}, 0x{sub_group:04X})")]
    UnknownSnac { food_group: u16, sub_group: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum CookieError {
    #[error("token is too short to carry a signature")]
    TooShort,

    #[error("token exceeds maximum size ({size} > {max})")]
    TooLarge { size: usize, max: usize },

    #[error("token signature mismatch")]
    BadSignature,

    #[error("token payload is malformed: {0}")]
    BadPayload(String),
}

#[derive(Error, Debug)]
pub enum ScreenNameError {
    #[error("AIM handle must start with a letter")]
    HandleFormat,

    #[error("AIM handle must be between 3 and 16 characters")]
    HandleLength,

    #[error("ICQ UIN must be a number between 10000 and 2147483646")]
    UinFormat,
}

pub type Result<T> = std::result::Result<T, WireError>;
