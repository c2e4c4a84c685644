//! FLAP/SNAC wire codec.
//!
//! Everything on the OSCAR wire is big-endian. Frames are length-delimited
//! by the FLAP header; SNAC bodies are schema-driven structs with
//! hand-written encode/decode over [`bytes`] cursors. Decoding never reads
//! past the frame payload and surfaces truncation as [`WireError::Truncated`].
//!
//! [`WireError::Truncated`]: crate::error::WireError::Truncated

pub mod bodies;
pub mod flap;
pub mod prim;
pub mod snac;
pub mod tlv;
pub mod userinfo;

pub use flap::{FlapChannel, FlapFrame, FlapSignonFrame};
pub use snac::{SnacFrame, SnacMessage};
pub use tlv::{Tlv, TlvBlock};
pub use userinfo::TlvUserInfo;
