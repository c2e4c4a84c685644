pub mod constants;
pub mod cookie;
pub mod error;
pub mod ident;
pub mod login;
pub mod roast;
pub mod wire;

pub use error::{Result, WireError};
pub use ident::{DisplayScreenName, IdentScreenName};
