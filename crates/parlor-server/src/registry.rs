//! The BOS session registry: at most one active session per identity.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use parlor_shared::wire::SnacMessage;
use parlor_shared::{DisplayScreenName, IdentScreenName};

use crate::session::{RelayResult, Session};

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<IdentScreenName, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new session for `display`. An existing session holding the
    /// same ident is superseded: closed and replaced before the new session
    /// becomes visible.
    pub fn add_session(&self, display: DisplayScreenName) -> Arc<Session> {
        let sess = Arc::new(Session::new(display));
        let mut sessions = self.write();
        if let Some(prior) = sessions.insert(sess.ident().clone(), sess.clone()) {
            tracing::info!(ident = %prior.ident(), "superseding existing session");
            prior.close();
        }
        sess
    }

    /// Remove `sess` from the registry, but only if it is still the stored
    /// session for its ident. A session superseded by a newer login never
    /// removes its replacement.
    pub fn remove_session(&self, sess: &Arc<Session>) {
        let mut sessions = self.write();
        if let Some(stored) = sessions.get(sess.ident()) {
            if stored.id() == sess.id() {
                sessions.remove(sess.ident());
            }
        }
        sess.close();
    }

    pub fn retrieve(&self, ident: &IdentScreenName) -> Option<Arc<Session>> {
        self.read().get(ident).cloned()
    }

    /// Snapshot of every active session.
    pub fn all_sessions(&self) -> Vec<Arc<Session>> {
        self.read().values().cloned().collect()
    }

    /// Best-effort delivery to one online user.
    pub fn relay_to_screen_name(&self, ident: &IdentScreenName, msg: SnacMessage) -> RelayResult {
        match self.retrieve(ident) {
            Some(sess) => sess.relay(msg),
            None => RelayResult::Closed,
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<IdentScreenName, Arc<Session>>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<IdentScreenName, Arc<Session>>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }
}
