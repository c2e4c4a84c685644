//! Chat rooms keyed by cookie, each holding an ordered set of participant
//! sessions. Rooms are created on first join and destroyed when the last
//! participant leaves.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use parlor_shared::wire::SnacMessage;
use parlor_shared::{DisplayScreenName, IdentScreenName};

use crate::session::{RelayResult, Session};

#[derive(Default)]
pub struct ChatRegistry {
    rooms: RwLock<HashMap<String, Vec<Arc<Session>>>>,
}

impl ChatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a chat-scoped session bound to `cookie` and add it to the
    /// room, creating the room if needed. A prior participant with the same
    /// ident is superseded.
    pub fn add_session(&self, cookie: &str, display: DisplayScreenName) -> Arc<Session> {
        let sess = Arc::new(Session::with_chat_cookie(display, Some(cookie.to_string())));
        let mut rooms = self.write();
        let participants = rooms.entry(cookie.to_string()).or_default();
        if let Some(pos) = participants.iter().position(|p| p.ident() == sess.ident()) {
            let prior = participants.remove(pos);
            prior.close();
        }
        participants.push(sess.clone());
        sess
    }

    /// Remove a participant; the room disappears with its last member.
    pub fn remove_session(&self, sess: &Arc<Session>) {
        let Some(cookie) = sess.chat_cookie() else {
            return;
        };
        let mut rooms = self.write();
        if let Some(participants) = rooms.get_mut(cookie) {
            participants.retain(|p| p.id() != sess.id());
            if participants.is_empty() {
                rooms.remove(cookie);
            }
        }
        sess.close();
    }

    /// Snapshot of a room's participants in join order.
    pub fn all_sessions(&self, cookie: &str) -> Vec<Arc<Session>> {
        self.read().get(cookie).cloned().unwrap_or_default()
    }

    pub fn retrieve(&self, cookie: &str, ident: &IdentScreenName) -> Option<Arc<Session>> {
        self.read()
            .get(cookie)?
            .iter()
            .find(|p| p.ident() == ident)
            .cloned()
    }

    /// Broadcast to every participant except `except`. Participants that
    /// left mid-broadcast are skipped without error.
    pub fn relay_to_all_except(
        &self,
        cookie: &str,
        except: Option<&IdentScreenName>,
        msg: &SnacMessage,
    ) {
        for sess in self.all_sessions(cookie) {
            if Some(sess.ident()) == except {
                continue;
            }
            sess.relay(msg.clone());
        }
    }

    pub fn relay_to_screen_name(
        &self,
        cookie: &str,
        ident: &IdentScreenName,
        msg: SnacMessage,
    ) -> RelayResult {
        match self.retrieve(cookie, ident) {
            Some(sess) => sess.relay(msg),
            None => RelayResult::Closed,
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Vec<Arc<Session>>>> {
        self.rooms.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<Arc<Session>>>> {
        self.rooms.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_shared::wire::snac::{foodgroup, SnacFrame};

    fn msg(body: &[u8]) -> SnacMessage {
        SnacMessage::new(SnacFrame::new(foodgroup::CHAT, 0x06), body.to_vec())
    }

    #[test]
    fn test_room_auto_create_and_destroy() {
        let registry = ChatRegistry::new();
        let alice = registry.add_session("room-1", DisplayScreenName::new("alice"));
        let bob = registry.add_session("room-1", DisplayScreenName::new("bob"));
        assert_eq!(registry.all_sessions("room-1").len(), 2);

        registry.remove_session(&alice);
        assert_eq!(registry.all_sessions("room-1").len(), 1);
        registry.remove_session(&bob);
        assert!(registry.all_sessions("room-1").is_empty());
    }

    #[test]
    fn test_duplicate_join_supersedes() {
        let registry = ChatRegistry::new();
        let first = registry.add_session("room-1", DisplayScreenName::new("alice"));
        let second = registry.add_session("room-1", DisplayScreenName::new("Alice"));

        assert!(first.is_closed());
        let participants = registry.all_sessions("room-1");
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].id(), second.id());
    }

    #[tokio::test]
    async fn test_broadcast_excludes_sender() {
        let registry = ChatRegistry::new();
        let alice = registry.add_session("room-1", DisplayScreenName::new("alice"));
        let bob = registry.add_session("room-1", DisplayScreenName::new("bob"));

        registry.relay_to_all_except("room-1", Some(alice.ident()), &msg(b"hi"));

        let mut bob_rx = bob.take_receiver();
        assert_eq!(bob_rx.recv().await.unwrap().body, b"hi");

        let mut alice_rx = alice.take_receiver();
        assert!(alice_rx.try_recv().is_err());
    }

    #[test]
    fn test_sessions_isolated_per_room() {
        let registry = ChatRegistry::new();
        registry.add_session("room-1", DisplayScreenName::new("alice"));
        registry.add_session("room-2", DisplayScreenName::new("alice"));

        assert_eq!(registry.all_sessions("room-1").len(), 1);
        assert_eq!(registry.all_sessions("room-2").len(), 1);
    }
}
