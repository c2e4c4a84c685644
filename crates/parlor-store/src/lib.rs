pub mod chat_rooms;
pub mod database;
pub mod feedbag;
pub mod migrations;
pub mod models;
pub mod offline;
pub mod toc_config;
pub mod users;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
