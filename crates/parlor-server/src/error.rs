use thiserror::Error;

use parlor_shared::error::{CookieError, WireError};
use parlor_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("protocol error: {0}")]
    Wire(#[from] WireError),

    #[error("cookie rejected: {0}")]
    Cookie(#[from] CookieError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("chat room not found: {0}")]
    ChatRoomNotFound(String),

    #[error("blob not found: {0}")]
    BlobNotFound(String),

    #[error("signon handshake timed out")]
    SignonTimeout,

    #[error("handshake failed: {0}")]
    Handshake(&'static str),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("TOC parse error: {0}")]
    TocParse(#[from] crate::toc::parse::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Whether the connection that produced this error must be torn down.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ServerError::Wire(_)
                | ServerError::Cookie(_)
                | ServerError::SignonTimeout
                | ServerError::Handshake(_)
                | ServerError::ConnectionClosed
                | ServerError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
