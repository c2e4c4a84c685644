//! Buddy food group and the presence fan-out engine.
//!
//! Watcher sets are computed on demand from the feedbag plus each online
//! session's transient buddy list; there is no in-memory graph of who
//! watches whom.

use std::collections::HashSet;
use std::sync::Arc;

use parlor_shared::wire::bodies::buddy::{self, subgroup};
use parlor_shared::wire::snac::foodgroup;
use parlor_shared::wire::tlv::Tlv;
use parlor_shared::wire::userinfo::TlvUserInfo;
use parlor_shared::wire::{SnacFrame, SnacMessage};
use parlor_shared::IdentScreenName;

use crate::error::Result;
use crate::services::Deps;
use crate::session::Session;

pub struct BuddyService {
    deps: Deps,
}

/// Whether a message may pass between `a` and `b` at all: neither side
/// blocks the other.
pub fn blocked_between(deps: &Deps, a: &IdentScreenName, b: &IdentScreenName) -> Result<bool> {
    let a_prefs = deps.db.visibility_prefs(a)?;
    let b_prefs = deps.db.visibility_prefs(b)?;
    Ok(a_prefs.blocks(b) || b_prefs.blocks(a))
}

impl BuddyService {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    pub fn rights_query(&self, frame: SnacFrame) -> SnacMessage {
        let mut reply = buddy::RightsReply::default();
        reply.tlvs.append(Tlv::u16(buddy::rights::MAX_BUDDIES, 500));
        reply.tlvs.append(Tlv::u16(buddy::rights::MAX_WATCHERS, 500));
        reply.tlvs.append(Tlv::u16(buddy::rights::MAX_ICQ_BROADCAST, 20));
        reply.tlvs.append(Tlv::u16(buddy::rights::MAX_TEMP_BUDDIES, 160));
        let mut body = Vec::new();
        reply.encode(&mut body);
        SnacMessage::new(SnacFrame::reply_to(frame, subgroup::RIGHTS_REPLY), body)
    }

    /// Add screen names to the session-local buddy list and report current
    /// presence of each one that is online and visible.
    pub fn add_buddies(&self, sess: &Arc<Session>, body: buddy::AddBuddies) -> Result<()> {
        let idents: Vec<IdentScreenName> =
            body.buddies.iter().map(|n| IdentScreenName::new(n)).collect();
        sess.add_transient_buddies(&idents);

        for ident in &idents {
            let Some(target) = self.deps.sessions.retrieve(ident) else {
                continue;
            };
            if !target.signon_complete() {
                continue;
            }
            if self.subject_visible_to(&target, sess.ident())? {
                sess.relay(arrived_message(target.user_info()));
            }
        }
        Ok(())
    }

    pub fn del_buddies(&self, sess: &Arc<Session>, body: buddy::DelBuddies) {
        let idents: Vec<IdentScreenName> =
            body.buddies.iter().map(|n| IdentScreenName::new(n)).collect();
        sess.remove_transient_buddies(&idents);
    }

    /// Fan out `Buddy.Arrived` to every online watcher of `sess`.
    pub fn broadcast_arrival(&self, sess: &Arc<Session>) -> Result<()> {
        let info = sess.user_info();
        for watcher in self.visible_watchers(sess)? {
            watcher.relay(arrived_message(info.clone()));
        }
        Ok(())
    }

    /// Fan out `Buddy.Departed` to every online watcher of `sess`.
    pub fn broadcast_departure(&self, sess: &Arc<Session>) -> Result<()> {
        let info = TlvUserInfo::new(sess.display().as_str(), sess.warning());
        for watcher in self.visible_watchers(sess)? {
            watcher.relay(departed_message(info.clone()));
        }
        Ok(())
    }

    /// Recompute who may see `sess` after an invisibility or permit/deny
    /// change and emit Arrived (or, when `send_departures`, Departed)
    /// accordingly. Idempotent with respect to the observed end state.
    pub fn broadcast_visibility(&self, sess: &Arc<Session>, send_departures: bool) -> Result<()> {
        let info = sess.user_info();
        let departed = TlvUserInfo::new(sess.display().as_str(), sess.warning());
        for watcher in self.watcher_candidates(sess.ident()) {
            if self.subject_visible_to(sess, watcher.ident())? {
                watcher.relay(arrived_message(info.clone()));
            } else if send_departures {
                watcher.relay(departed_message(departed.clone()));
            }
        }
        Ok(())
    }

    /// Online sessions interested in `ident`, before visibility filtering:
    /// feedbag watchers plus sessions holding `ident` as a transient buddy.
    fn watcher_candidates(&self, ident: &IdentScreenName) -> Vec<Arc<Session>> {
        let feedbag_watchers: HashSet<IdentScreenName> = match self.deps.db.watchers(ident) {
            Ok(watchers) => watchers.into_iter().collect(),
            Err(e) => {
                tracing::error!(ident = %ident, error = %e, "watcher query failed");
                HashSet::new()
            }
        };

        self.deps
            .sessions
            .all_sessions()
            .into_iter()
            .filter(|s| s.ident() != ident)
            .filter(|s| s.signon_complete())
            .filter(|s| feedbag_watchers.contains(s.ident()) || s.has_transient_buddy(ident))
            .collect()
    }

    fn visible_watchers(&self, sess: &Arc<Session>) -> Result<Vec<Arc<Session>>> {
        let mut out = Vec::new();
        for watcher in self.watcher_candidates(sess.ident()) {
            if self.subject_visible_to(sess, watcher.ident())? {
                out.push(watcher);
            }
        }
        Ok(out)
    }

    /// The presence predicate: `watcher` sees `subject` iff neither blocks
    /// the other, and an invisible subject permits the watcher explicitly.
    pub fn subject_visible_to(
        &self,
        subject: &Arc<Session>,
        watcher: &IdentScreenName,
    ) -> Result<bool> {
        let s_prefs = self.deps.db.visibility_prefs(subject.ident())?;
        let w_prefs = self.deps.db.visibility_prefs(watcher)?;
        if s_prefs.blocks(watcher) || w_prefs.blocks(subject.ident()) {
            return Ok(false);
        }
        if subject.invisible() && !s_prefs.permit.contains(watcher) {
            return Ok(false);
        }
        Ok(true)
    }
}

pub fn arrived_message(info: TlvUserInfo) -> SnacMessage {
    let mut body = Vec::new();
    buddy::Arrived { user_info: info }.encode(&mut body);
    SnacMessage::new(
        SnacFrame::new(foodgroup::BUDDY, subgroup::ARRIVED),
        body,
    )
}

pub fn departed_message(info: TlvUserInfo) -> SnacMessage {
    let mut body = Vec::new();
    buddy::Departed { user_info: info }.encode(&mut body);
    SnacMessage::new(
        SnacFrame::new(foodgroup::BUDDY, subgroup::DEPARTED),
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testutil::test_deps;
    use bytes::Bytes;
    use parlor_shared::wire::bodies::feedbag::{class, pdmode, FeedbagItem};
    use parlor_shared::DisplayScreenName;
    use tokio::sync::mpsc::Receiver;

    fn buddy_item(name: &str, item_id: u16) -> FeedbagItem {
        FeedbagItem {
            name: name.to_string(),
            group_id: 1,
            item_id,
            class_id: class::BUDDY,
            attributes: Default::default(),
        }
    }

    fn online(deps: &Deps, name: &str) -> Arc<Session> {
        let sess = deps.sessions.add_session(DisplayScreenName::new(name));
        sess.set_signon_complete();
        sess
    }

    fn recv_subgroup(rx: &mut Receiver<SnacMessage>) -> Option<u16> {
        rx.try_recv().ok().map(|m| m.frame.sub_group)
    }

    fn decode_arrived(msg: &SnacMessage) -> buddy::Arrived {
        buddy::Arrived::decode(&mut Bytes::copy_from_slice(&msg.body)).unwrap()
    }

    #[tokio::test]
    async fn test_mutual_buddies_see_arrival_and_departure() {
        let (deps, _dir) = test_deps().await;
        let svc = BuddyService::new(deps.clone());
        let alice_ident = IdentScreenName::new("alice");
        let bob_ident = IdentScreenName::new("bob");
        deps.db.feedbag_upsert(&alice_ident, &[buddy_item("bob", 1)]).unwrap();
        deps.db.feedbag_upsert(&bob_ident, &[buddy_item("alice", 1)]).unwrap();

        let alice = online(&deps, "alice");
        let bob = online(&deps, "bob");
        let mut alice_rx = alice.take_receiver();

        svc.broadcast_arrival(&bob).unwrap();
        let msg = alice_rx.try_recv().unwrap();
        assert_eq!(msg.frame.sub_group, subgroup::ARRIVED);
        assert_eq!(decode_arrived(&msg).user_info.screen_name, "bob");

        svc.broadcast_departure(&alice).unwrap();
        let mut bob_rx = bob.take_receiver();
        assert_eq!(recv_subgroup(&mut bob_rx), Some(subgroup::DEPARTED));
    }

    #[tokio::test]
    async fn test_blocked_watcher_gets_nothing() {
        let (deps, _dir) = test_deps().await;
        let svc = BuddyService::new(deps.clone());
        let alice_ident = IdentScreenName::new("alice");
        let bob_ident = IdentScreenName::new("bob");
        deps.db.feedbag_upsert(&alice_ident, &[buddy_item("bob", 1)]).unwrap();

        // bob denies alice
        deps.db.set_pd_mode(&bob_ident, pdmode::DENY_SOME).unwrap();
        deps.db
            .add_pd_entries(&bob_ident, class::DENY, std::slice::from_ref(&alice_ident))
            .unwrap();

        let alice = online(&deps, "alice");
        let bob = online(&deps, "bob");
        let mut alice_rx = alice.take_receiver();

        svc.broadcast_arrival(&bob).unwrap();
        assert_eq!(recv_subgroup(&mut alice_rx), None);
    }

    #[tokio::test]
    async fn test_invisible_visible_only_to_permit_list() {
        let (deps, _dir) = test_deps().await;
        let svc = BuddyService::new(deps.clone());
        let alice_ident = IdentScreenName::new("alice");
        let carol_ident = IdentScreenName::new("carol");
        // both bob and carol watch alice
        deps.db
            .feedbag_upsert(&IdentScreenName::new("bob"), &[buddy_item("alice", 1)])
            .unwrap();
        deps.db.feedbag_upsert(&carol_ident, &[buddy_item("alice", 1)]).unwrap();
        // alice permits carol only
        deps.db
            .add_pd_entries(&alice_ident, class::PERMIT, std::slice::from_ref(&carol_ident))
            .unwrap();

        let alice = online(&deps, "alice");
        alice.set_invisible(true);
        let bob = online(&deps, "bob");
        let carol = online(&deps, "carol");
        let mut bob_rx = bob.take_receiver();
        let mut carol_rx = carol.take_receiver();

        svc.broadcast_visibility(&alice, true).unwrap();
        assert_eq!(recv_subgroup(&mut bob_rx), Some(subgroup::DEPARTED));
        assert_eq!(recv_subgroup(&mut carol_rx), Some(subgroup::ARRIVED));
    }

    #[tokio::test]
    async fn test_transient_buddies_count_as_watchers() {
        let (deps, _dir) = test_deps().await;
        let svc = BuddyService::new(deps.clone());

        let alice = online(&deps, "alice");
        let bob = online(&deps, "bob");
        svc.add_buddies(
            &alice,
            buddy::AddBuddies {
                buddies: vec!["bob".to_string()],
            },
        )
        .unwrap();

        // add_buddies reports bob's current presence immediately
        let mut alice_rx = alice.take_receiver();
        assert_eq!(recv_subgroup(&mut alice_rx), Some(subgroup::ARRIVED));

        // and alice now observes bob's future departures
        svc.broadcast_departure(&bob).unwrap();
        assert_eq!(recv_subgroup(&mut alice_rx), Some(subgroup::DEPARTED));
    }

    #[tokio::test]
    async fn test_departure_not_sent_to_non_watchers() {
        let (deps, _dir) = test_deps().await;
        let svc = BuddyService::new(deps.clone());
        let alice = online(&deps, "alice");
        let _bob = online(&deps, "bob");
        let mut alice_rx = alice.take_receiver();

        // alice has nobody on her list; bob's departure is not her business
        let bob = deps.sessions.retrieve(&IdentScreenName::new("bob")).unwrap();
        svc.broadcast_departure(&bob).unwrap();
        assert_eq!(recv_subgroup(&mut alice_rx), None);
    }
}
