//! Food-group services. Each service is a stateless singleton shared across
//! connection tasks, holding its collaborators through [`Deps`].

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

use std::sync::Arc;

use parlor_shared::cookie::CookieBaker;
use parlor_store::Database;

use crate::bart_store::BartStore;
use crate::chat_registry::ChatRegistry;
use crate::config::ServerConfig;
use crate::registry::SessionRegistry;

/// Shared collaborators handed to every service.
#[derive(Clone)]
pub struct Deps {
    pub config: Arc<ServerConfig>,
    pub db: Arc<Database>,
    pub baker: CookieBaker,
    pub sessions: Arc<SessionRegistry>,
    pub chat: Arc<ChatRegistry>,
    pub bart: Arc<BartStore>,
}
