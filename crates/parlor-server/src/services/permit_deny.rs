//! Permit/Deny food group. List mutations imply the matching mode switch
//! and re-run the visibility broadcast.

use std::sync::Arc;

use parlor_shared::wire::bodies::feedbag::{class, pdmode};
use parlor_shared::wire::bodies::permit_deny::{self, subgroup, ListEntries};
use parlor_shared::wire::tlv::Tlv;
use parlor_shared::wire::{SnacFrame, SnacMessage};
use parlor_shared::IdentScreenName;

use crate::error::Result;
use crate::services::buddy::BuddyService;
use crate::services::Deps;
use crate::session::Session;

pub struct PermitDenyService {
    deps: Deps,
    buddy: BuddyService,
}

impl PermitDenyService {
    pub fn new(deps: Deps) -> Self {
        Self {
            buddy: BuddyService::new(deps.clone()),
            deps,
        }
    }

    /// SNAC(0x09,0x02).
    pub fn rights_query(&self, frame: SnacFrame) -> SnacMessage {
        let mut reply = permit_deny::RightsReply::default();
        reply.tlvs.append(Tlv::u16(permit_deny::rights::MAX_PERMITS, 200));
        reply.tlvs.append(Tlv::u16(permit_deny::rights::MAX_DENIES, 200));
        let mut body = Vec::new();
        reply.encode(&mut body);
        SnacMessage::new(SnacFrame::reply_to(frame, subgroup::RIGHTS_REPLY), body)
    }

    /// SNAC(0x09,0x05): adding permit entries switches to permit-some mode.
    pub fn add_permit_entries(&self, sess: &Arc<Session>, body: ListEntries) -> Result<()> {
        self.mutate(sess, class::PERMIT, Some(pdmode::PERMIT_SOME), &body, true)
    }

    /// SNAC(0x09,0x06).
    pub fn del_permit_entries(&self, sess: &Arc<Session>, body: ListEntries) -> Result<()> {
        self.mutate(sess, class::PERMIT, None, &body, false)
    }

    /// SNAC(0x09,0x07): adding deny entries switches to deny-some mode.
    pub fn add_deny_entries(&self, sess: &Arc<Session>, body: ListEntries) -> Result<()> {
        self.mutate(sess, class::DENY, Some(pdmode::DENY_SOME), &body, true)
    }

    /// SNAC(0x09,0x08).
    pub fn del_deny_entries(&self, sess: &Arc<Session>, body: ListEntries) -> Result<()> {
        self.mutate(sess, class::DENY, None, &body, false)
    }

    fn mutate(
        &self,
        sess: &Arc<Session>,
        class_id: u16,
        mode: Option<u8>,
        body: &ListEntries,
        add: bool,
    ) -> Result<()> {
        let idents: Vec<IdentScreenName> =
            body.users.iter().map(|u| IdentScreenName::new(u)).collect();

        if add {
            self.deps.db.add_pd_entries(sess.ident(), class_id, &idents)?;
        } else {
            self.deps.db.remove_pd_entries(sess.ident(), class_id, &idents)?;
        }
        if let Some(mode) = mode {
            self.deps.db.set_pd_mode(sess.ident(), mode)?;
        }

        if sess.signon_complete() {
            self.buddy.broadcast_visibility(sess, true)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testutil::test_deps;
    use parlor_shared::wire::bodies::feedbag::FeedbagItem;
    use parlor_shared::DisplayScreenName;

    fn entries(users: &[&str]) -> ListEntries {
        ListEntries {
            users: users.iter().map(|u| u.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_add_deny_switches_mode_and_stores() {
        let (deps, _dir) = test_deps().await;
        let svc = PermitDenyService::new(deps.clone());
        let alice = deps.sessions.add_session(DisplayScreenName::new("alice"));

        svc.add_deny_entries(&alice, entries(&["Mallory"])).unwrap();
        assert_eq!(deps.db.pd_mode(alice.ident()).unwrap(), Some(pdmode::DENY_SOME));
        assert_eq!(
            deps.db.deny_list(alice.ident()).unwrap(),
            vec![IdentScreenName::new("mallory")]
        );
    }

    #[tokio::test]
    async fn test_add_permit_makes_invisible_user_appear() {
        let (deps, _dir) = test_deps().await;
        let svc = PermitDenyService::new(deps.clone());

        // carol watches alice
        let carol = deps.sessions.add_session(DisplayScreenName::new("carol"));
        carol.set_signon_complete();
        deps.db
            .feedbag_upsert(
                carol.ident(),
                &[FeedbagItem {
                    name: "alice".to_string(),
                    group_id: 1,
                    item_id: 1,
                    class_id: class::BUDDY,
                    attributes: Default::default(),
                }],
            )
            .unwrap();

        let alice = deps.sessions.add_session(DisplayScreenName::new("alice"));
        alice.set_signon_complete();
        alice.set_invisible(true);
        let mut carol_rx = carol.take_receiver();

        svc.add_permit_entries(&alice, entries(&["carol"])).unwrap();

        let msg = carol_rx.try_recv().unwrap();
        assert_eq!(
            msg.frame.sub_group,
            parlor_shared::wire::bodies::buddy::subgroup::ARRIVED
        );
    }

    #[tokio::test]
    async fn test_del_entries_removes() {
        let (deps, _dir) = test_deps().await;
        let svc = PermitDenyService::new(deps.clone());
        let alice = deps.sessions.add_session(DisplayScreenName::new("alice"));

        svc.add_permit_entries(&alice, entries(&["bob", "carol"])).unwrap();
        svc.del_permit_entries(&alice, entries(&["bob"])).unwrap();
        assert_eq!(
            deps.db.permit_list(alice.ident()).unwrap(),
            vec![IdentScreenName::new("carol")]
        );
    }
}
