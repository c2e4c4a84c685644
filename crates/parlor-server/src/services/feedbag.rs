//! Feedbag food group: the server-side buddy list.

use std::sync::Arc;

use parlor_shared::wire::bodies::feedbag::{
    self, class, status, subgroup, ItemMutation, QueryIfModified, Reply, RightsReply, Status,
};
use parlor_shared::wire::tlv::Tlv;
use parlor_shared::wire::{SnacFrame, SnacMessage};
use parlor_shared::IdentScreenName;

use crate::error::Result;
use crate::services::buddy::BuddyService;
use crate::services::Deps;
use crate::session::Session;

pub struct FeedbagService {
    deps: Deps,
    buddy: BuddyService,
}

impl FeedbagService {
    pub fn new(deps: Deps) -> Self {
        Self {
            buddy: BuddyService::new(deps.clone()),
            deps,
        }
    }

    /// SNAC(0x13,0x02).
    pub fn rights_query(&self, frame: SnacFrame) -> SnacMessage {
        let mut reply = RightsReply::default();
        // max items per class, one u16 per class id
        let max_items: Vec<u8> = std::iter::repeat(200u16)
            .take(21)
            .flat_map(|v| v.to_be_bytes())
            .collect();
        reply.tlvs.append(Tlv::new(0x0004, max_items));
        let mut body = Vec::new();
        reply.encode(&mut body);
        SnacMessage::new(SnacFrame::reply_to(frame, subgroup::RIGHTS_REPLY), body)
    }

    /// SNAC(0x13,0x04) and (0x13,0x05): the stored list. A query-if-modified
    /// is answered with the full list as well; clients reconcile by the
    /// update timestamp.
    pub fn query(&self, sess: &Arc<Session>, frame: SnacFrame) -> Result<SnacMessage> {
        let items = self.deps.db.feedbag_items(sess.ident())?;
        let last_update = self.deps.db.feedbag_last_modified(sess.ident())?;
        let reply = Reply {
            version: 0,
            items,
            last_update,
        };
        let mut body = Vec::new();
        reply.encode(&mut body);
        Ok(SnacMessage::new(
            SnacFrame::reply_to(frame, subgroup::REPLY),
            body,
        ))
    }

    pub fn query_if_modified(
        &self,
        sess: &Arc<Session>,
        frame: SnacFrame,
        _body: QueryIfModified,
    ) -> Result<SnacMessage> {
        self.query(sess, frame)
    }

    /// SNAC(0x13,0x08) and (0x13,0x09).
    pub fn upsert_item(
        &self,
        sess: &Arc<Session>,
        frame: SnacFrame,
        body: ItemMutation,
    ) -> Result<SnacMessage> {
        self.deps.db.feedbag_upsert(sess.ident(), &body.items)?;
        let reply = self.status_reply(frame, &body);
        self.apply_side_effects(sess, &body)?;
        Ok(reply)
    }

    /// SNAC(0x13,0x0A).
    pub fn delete_item(
        &self,
        sess: &Arc<Session>,
        frame: SnacFrame,
        body: ItemMutation,
    ) -> Result<SnacMessage> {
        self.deps.db.feedbag_delete(sess.ident(), &body.items)?;
        let reply = self.status_reply(frame, &body);
        self.apply_side_effects(sess, &body)?;
        Ok(reply)
    }

    /// SNAC(0x13,0x07), (0x13,0x11), (0x13,0x12): accepted, no response.
    pub fn no_op(&self) {}

    fn status_reply(&self, frame: SnacFrame, body: &ItemMutation) -> SnacMessage {
        let reply = Status {
            results: vec![status::SUCCESS; body.items.len()],
        };
        let mut payload = Vec::new();
        reply.encode(&mut payload);
        SnacMessage::new(SnacFrame::reply_to(frame, subgroup::STATUS), payload)
    }

    /// List mutations are presence-affecting. New buddies get their current
    /// presence reported; permit/deny/pdinfo changes re-run the visibility
    /// computation toward everyone watching this user.
    fn apply_side_effects(&self, sess: &Arc<Session>, body: &ItemMutation) -> Result<()> {
        let mut visibility_changed = false;
        for item in &body.items {
            match item.class_id {
                class::BUDDY => {
                    let ident = IdentScreenName::new(&item.name);
                    if let Some(target) = self.deps.sessions.retrieve(&ident) {
                        if target.signon_complete()
                            && self.buddy.subject_visible_to(&target, sess.ident())?
                        {
                            sess.relay(crate::services::buddy::arrived_message(
                                target.user_info(),
                            ));
                        }
                    }
                }
                class::PERMIT | class::DENY | class::PD_INFO => visibility_changed = true,
                _ => {}
            }
        }
        if visibility_changed && sess.signon_complete() {
            self.buddy.broadcast_visibility(sess, true)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testutil::test_deps;
    use bytes::Bytes;
    use parlor_shared::wire::bodies::feedbag::FeedbagItem;
    use parlor_shared::wire::snac::foodgroup;
    use parlor_shared::DisplayScreenName;

    fn frame(sub_group: u16) -> SnacFrame {
        SnacFrame::new(foodgroup::FEEDBAG, sub_group)
    }

    fn buddy_item(name: &str, item_id: u16) -> FeedbagItem {
        FeedbagItem {
            name: name.to_string(),
            group_id: 1,
            item_id,
            class_id: class::BUDDY,
            attributes: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_query_round_trip() {
        let (deps, _dir) = test_deps().await;
        let svc = FeedbagService::new(deps.clone());
        let alice = deps.sessions.add_session(DisplayScreenName::new("alice"));

        let mutation = ItemMutation {
            items: vec![buddy_item("bob", 1), buddy_item("carol", 2)],
        };
        let reply = svc.upsert_item(&alice, frame(subgroup::INSERT_ITEM), mutation).unwrap();
        let statuses = Status::decode(&mut Bytes::from(reply.body)).unwrap();
        assert_eq!(statuses.results, vec![status::SUCCESS, status::SUCCESS]);

        let reply = svc.query(&alice, frame(subgroup::QUERY)).unwrap();
        let list = Reply::decode(&mut Bytes::from(reply.body)).unwrap();
        assert_eq!(list.items.len(), 2);
        assert!(list.last_update > 0);
    }

    #[tokio::test]
    async fn test_insert_buddy_reports_current_presence() {
        let (deps, _dir) = test_deps().await;
        let svc = FeedbagService::new(deps.clone());
        let alice = deps.sessions.add_session(DisplayScreenName::new("alice"));
        alice.set_signon_complete();
        let bob = deps.sessions.add_session(DisplayScreenName::new("bob"));
        bob.set_signon_complete();

        svc.upsert_item(
            &alice,
            frame(subgroup::INSERT_ITEM),
            ItemMutation {
                items: vec![buddy_item("bob", 1)],
            },
        )
        .unwrap();

        let mut rx = alice.take_receiver();
        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.frame.food_group, foodgroup::BUDDY);
    }

    #[tokio::test]
    async fn test_delete_removes_items() {
        let (deps, _dir) = test_deps().await;
        let svc = FeedbagService::new(deps.clone());
        let alice = deps.sessions.add_session(DisplayScreenName::new("alice"));

        let item = buddy_item("bob", 1);
        svc.upsert_item(
            &alice,
            frame(subgroup::INSERT_ITEM),
            ItemMutation {
                items: vec![item.clone()],
            },
        )
        .unwrap();
        svc.delete_item(
            &alice,
            frame(subgroup::DELETE_ITEM),
            ItemMutation { items: vec![item] },
        )
        .unwrap();

        assert!(deps.db.feedbag_items(alice.ident()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_feedbag_deny_insert_changes_visibility() {
        let (deps, _dir) = test_deps().await;
        let svc = FeedbagService::new(deps.clone());
        let alice = deps.sessions.add_session(DisplayScreenName::new("alice"));
        alice.set_signon_complete();
        let bob = deps.sessions.add_session(DisplayScreenName::new("bob"));
        bob.set_signon_complete();
        // bob watches alice
        deps.db
            .feedbag_upsert(bob.ident(), &[buddy_item("alice", 1)])
            .unwrap();
        let mut bob_rx = bob.take_receiver();

        // alice switches to deny-some and denies bob
        let mut pd_item = FeedbagItem {
            name: String::new(),
            group_id: 0,
            item_id: 10,
            class_id: class::PD_INFO,
            attributes: Default::default(),
        };
        pd_item
            .attributes
            .append(Tlv::u8(feedbag::attr::PD_MODE, feedbag::pdmode::DENY_SOME));
        let deny_item = FeedbagItem {
            name: "bob".to_string(),
            group_id: 0,
            item_id: 11,
            class_id: class::DENY,
            attributes: Default::default(),
        };
        svc.upsert_item(
            &alice,
            frame(subgroup::INSERT_ITEM),
            ItemMutation {
                items: vec![pd_item, deny_item],
            },
        )
        .unwrap();

        // bob sees alice depart
        let msg = bob_rx.try_recv().unwrap();
        assert_eq!(
            msg.frame.sub_group,
            parlor_shared::wire::bodies::buddy::subgroup::DEPARTED
        );
    }
}
