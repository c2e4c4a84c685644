//! Typed SNAC bodies, one module per food group.
//!
//! Each (food group, sub group) pair is a distinct record type; the set is
//! closed. Decode functions consume from the frame payload and fail with a
//! truncation error rather than reading past it.

pub mod admin;
pub mod auth;
pub mod bart;
pub mod buddy;
pub mod chat;
pub mod chat_nav;
pub mod feedbag;
pub mod icbm;
pub mod locate;
pub mod oservice;
pub mod permit_deny;
