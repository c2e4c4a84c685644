//! ICBM food group: instant messages, offline queuing, and warnings.

use std::sync::Arc;

use chrono::Utc;
use parlor_shared::wire::bodies::icbm::{self, subgroup, tag};
use parlor_shared::wire::bodies::oservice;
use parlor_shared::wire::snac::{errcode, foodgroup, SnacError};
use parlor_shared::wire::{SnacFrame, SnacMessage};
use parlor_shared::IdentScreenName;
use parlor_store::OfflineMessage;

use crate::error::Result;
use crate::services::buddy::{blocked_between, BuddyService};
use crate::services::Deps;
use crate::session::Session;

/// Warning-level increase for a normal warning (units of 0.1%).
const EVIL_DELTA: u16 = 100;
/// Anonymous warnings sting less.
const EVIL_DELTA_ANON: u16 = 30;

pub struct IcbmService {
    deps: Deps,
    buddy: BuddyService,
}

impl IcbmService {
    pub fn new(deps: Deps) -> Self {
        Self {
            buddy: BuddyService::new(deps.clone()),
            deps,
        }
    }

    /// SNAC(0x04,0x04).
    pub fn parameter_query(&self, frame: SnacFrame) -> SnacMessage {
        let mut body = Vec::new();
        icbm::ParameterReply::default().encode(&mut body);
        SnacMessage::new(SnacFrame::reply_to(frame, subgroup::PARAMETER_REPLY), body)
    }

    /// SNAC(0x04,0x02): accepted for compatibility; the host parameters
    /// stay canned.
    pub fn add_parameters(&self, _body: icbm::AddParameters) {}

    /// SNAC(0x04,0x06): deliver a message to the recipient, or park it in
    /// the offline queue when the recipient is signed off.
    pub fn channel_msg_to_host(
        &self,
        sess: &Arc<Session>,
        frame: SnacFrame,
        body: icbm::ChannelMsgToHost,
    ) -> Result<Option<SnacMessage>> {
        let recipient = IdentScreenName::new(&body.screen_name);

        if blocked_between(&self.deps, sess.ident(), &recipient)? {
            return Ok(Some(error_reply(frame, errcode::IN_LOCAL_PERMIT_DENY)));
        }

        let wants_ack = body.tlvs.has(tag::REQUEST_HOST_ACK);

        let online = self
            .deps
            .sessions
            .retrieve(&recipient)
            .filter(|t| t.signon_complete());

        match online {
            Some(target) => {
                let mut outbound = icbm::ChannelMsgToClient {
                    cookie: body.cookie,
                    channel: body.channel,
                    sender_info: sess.user_info(),
                    tlvs: Default::default(),
                };
                for tlv in &body.tlvs.tlvs {
                    if tlv.tag != tag::REQUEST_HOST_ACK && tlv.tag != tag::STORE_OFFLINE {
                        outbound.tlvs.append(tlv.clone());
                    }
                }
                let mut payload = Vec::new();
                outbound.encode(&mut payload);
                target.relay(SnacMessage::new(
                    SnacFrame::new(foodgroup::ICBM, subgroup::CHANNEL_MSG_TO_CLIENT),
                    payload,
                ));
            }
            None => {
                if self.deps.db.user(&recipient)?.is_none() {
                    return Ok(Some(error_reply(frame, errcode::NOT_LOGGED_IN)));
                }
                if body.channel != icbm::channel::IM {
                    // rendezvous has no offline story
                    return Ok(Some(error_reply(frame, errcode::NOT_LOGGED_IN)));
                }
                let mut payload = Vec::new();
                body.encode(&mut payload);
                self.deps.db.enqueue_offline_message(&OfflineMessage {
                    sender: sess.ident().clone(),
                    recipient: recipient.clone(),
                    sent_at: Utc::now(),
                    payload,
                })?;
                tracing::debug!(recipient = %recipient, "message parked offline");
            }
        }

        if wants_ack {
            let ack = icbm::HostAck {
                cookie: body.cookie,
                channel: body.channel,
                screen_name: body.screen_name,
            };
            let mut payload = Vec::new();
            ack.encode(&mut payload);
            return Ok(Some(SnacMessage::new(
                SnacFrame::reply_to(frame, subgroup::HOST_ACK),
                payload,
            )));
        }
        Ok(None)
    }

    /// SNAC(0x04,0x08): warn another user. The victim learns its new level
    /// (and, for normal warnings, who complained); watchers see the raised
    /// warning via a fresh arrival.
    pub fn evil_request(
        &self,
        sess: &Arc<Session>,
        frame: SnacFrame,
        body: icbm::EvilRequest,
    ) -> Result<SnacMessage> {
        let target_ident = IdentScreenName::new(&body.screen_name);
        if &target_ident == sess.ident() {
            return Ok(error_reply(frame, errcode::NOT_SUPPORTED_BY_HOST));
        }
        if blocked_between(&self.deps, sess.ident(), &target_ident)? {
            return Ok(error_reply(frame, errcode::IN_LOCAL_PERMIT_DENY));
        }
        let Some(target) = self
            .deps
            .sessions
            .retrieve(&target_ident)
            .filter(|t| t.signon_complete())
        else {
            return Ok(error_reply(frame, errcode::NOT_LOGGED_IN));
        };

        let anonymous = body.send_as == 1;
        let delta = if anonymous { EVIL_DELTA_ANON } else { EVIL_DELTA };
        let updated = target.increase_warning(delta);

        let notification = oservice::EvilNotification {
            new_evil: updated,
            snitcher: (!anonymous).then(|| sess.user_info()),
        };
        let mut payload = Vec::new();
        notification.encode(&mut payload);
        target.relay(SnacMessage::new(
            SnacFrame::new(foodgroup::OSERVICE, oservice::subgroup::EVIL_NOTIFICATION),
            payload,
        ));

        if let Err(e) = self.buddy.broadcast_arrival(&target) {
            tracing::error!(ident = %target.ident(), error = %e, "warning rebroadcast failed");
        }

        let reply = icbm::EvilReply {
            evil_delta_applied: delta,
            updated_evil: updated,
        };
        let mut payload = Vec::new();
        reply.encode(&mut payload);
        Ok(SnacMessage::new(
            SnacFrame::reply_to(frame, subgroup::EVIL_REPLY),
            payload,
        ))
    }
}

fn error_reply(frame: SnacFrame, code: u16) -> SnacMessage {
    let mut body = Vec::new();
    SnacError::new(code).encode(&mut body);
    SnacMessage::new(SnacFrame::reply_to(frame, subgroup::ERR), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testutil::{insert_user, test_deps};
    use bytes::Bytes;
    use parlor_shared::wire::bodies::feedbag::{class, pdmode};
    use parlor_shared::wire::tlv::Tlv;
    use parlor_shared::DisplayScreenName;

    fn online(deps: &Deps, name: &str) -> Arc<Session> {
        let sess = deps.sessions.add_session(DisplayScreenName::new(name));
        sess.set_signon_complete();
        sess
    }

    fn im(to: &str, text: &str) -> icbm::ChannelMsgToHost {
        let mut body = icbm::ChannelMsgToHost {
            cookie: 1,
            channel: icbm::channel::IM,
            screen_name: to.to_string(),
            tlvs: Default::default(),
        };
        body.tlvs
            .append(Tlv::new(tag::AIM_DATA, icbm::encode_im_text(text)));
        body
    }

    fn frame() -> SnacFrame {
        SnacFrame::new(foodgroup::ICBM, subgroup::CHANNEL_MSG_TO_HOST)
    }

    #[tokio::test]
    async fn test_online_delivery() {
        let (deps, _dir) = test_deps().await;
        let svc = IcbmService::new(deps.clone());
        let alice = online(&deps, "alice");
        let bob = online(&deps, "bob");

        let reply = svc.channel_msg_to_host(&alice, frame(), im("bob", "hi")).unwrap();
        assert!(reply.is_none());

        let mut bob_rx = bob.take_receiver();
        let msg = bob_rx.try_recv().unwrap();
        assert_eq!(msg.frame.sub_group, subgroup::CHANNEL_MSG_TO_CLIENT);
        let delivered = icbm::ChannelMsgToClient::decode(&mut Bytes::from(msg.body)).unwrap();
        assert_eq!(delivered.sender_info.screen_name, "alice");
        assert_eq!(
            icbm::decode_im_text(delivered.tlvs.bytes(tag::AIM_DATA).unwrap()).unwrap(),
            "hi"
        );
    }

    #[tokio::test]
    async fn test_blocked_recipient_yields_permit_deny_error() {
        let (deps, _dir) = test_deps().await;
        let svc = IcbmService::new(deps.clone());
        let alice = online(&deps, "alice");
        let bob = online(&deps, "bob");

        let bob_ident = IdentScreenName::new("bob");
        deps.db.set_pd_mode(&bob_ident, pdmode::DENY_SOME).unwrap();
        deps.db
            .add_pd_entries(&bob_ident, class::DENY, &[IdentScreenName::new("alice")])
            .unwrap();

        let reply = svc
            .channel_msg_to_host(&alice, frame(), im("bob", "hi"))
            .unwrap()
            .unwrap();
        assert_eq!(reply.frame.sub_group, subgroup::ERR);
        let err = SnacError::decode(&mut Bytes::from(reply.body)).unwrap();
        assert_eq!(err.code, errcode::IN_LOCAL_PERMIT_DENY);

        let mut bob_rx = bob.take_receiver();
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_offline_recipient_queues_message() {
        let (deps, _dir) = test_deps().await;
        insert_user(&deps, "bob", "pw");
        let svc = IcbmService::new(deps.clone());
        let alice = online(&deps, "alice");

        svc.channel_msg_to_host(&alice, frame(), im("bob", "hi")).unwrap();
        svc.channel_msg_to_host(&alice, frame(), im("bob", "there")).unwrap();

        let queued = deps.db.offline_messages(&IdentScreenName::new("bob")).unwrap();
        assert_eq!(queued.len(), 2);
        let first = icbm::ChannelMsgToHost::decode(&mut Bytes::from(queued[0].payload.clone()))
            .unwrap();
        assert_eq!(
            icbm::decode_im_text(first.tlvs.bytes(tag::AIM_DATA).unwrap()).unwrap(),
            "hi"
        );
    }

    #[tokio::test]
    async fn test_unknown_recipient_errors() {
        let (deps, _dir) = test_deps().await;
        let svc = IcbmService::new(deps.clone());
        let alice = online(&deps, "alice");

        let reply = svc
            .channel_msg_to_host(&alice, frame(), im("ghost", "hi"))
            .unwrap()
            .unwrap();
        let err = SnacError::decode(&mut Bytes::from(reply.body)).unwrap();
        assert_eq!(err.code, errcode::NOT_LOGGED_IN);
    }

    #[tokio::test]
    async fn test_host_ack_when_requested() {
        let (deps, _dir) = test_deps().await;
        let svc = IcbmService::new(deps.clone());
        let alice = online(&deps, "alice");
        let _bob = online(&deps, "bob");

        let mut body = im("bob", "hi");
        body.tlvs.append(Tlv::new(tag::REQUEST_HOST_ACK, Vec::new()));
        let reply = svc.channel_msg_to_host(&alice, frame(), body).unwrap().unwrap();
        assert_eq!(reply.frame.sub_group, subgroup::HOST_ACK);
    }

    #[tokio::test]
    async fn test_evil_request_updates_warning() {
        let (deps, _dir) = test_deps().await;
        let svc = IcbmService::new(deps.clone());
        let alice = online(&deps, "alice");
        let bob = online(&deps, "bob");

        let reply = svc
            .evil_request(
                &alice,
                SnacFrame::new(foodgroup::ICBM, subgroup::EVIL_REQUEST),
                icbm::EvilRequest {
                    send_as: 0,
                    screen_name: "bob".to_string(),
                },
            )
            .unwrap();
        assert_eq!(reply.frame.sub_group, subgroup::EVIL_REPLY);
        let evil = icbm::EvilReply::decode(&mut Bytes::from(reply.body)).unwrap();
        assert_eq!(evil.evil_delta_applied, EVIL_DELTA);
        assert_eq!(bob.warning(), EVIL_DELTA);

        let mut bob_rx = bob.take_receiver();
        let note = bob_rx.try_recv().unwrap();
        assert_eq!(note.frame.sub_group, oservice::subgroup::EVIL_NOTIFICATION);
        let note = oservice::EvilNotification::decode(&mut Bytes::from(note.body)).unwrap();
        assert_eq!(note.snitcher.unwrap().screen_name, "alice");
    }

    #[tokio::test]
    async fn test_anonymous_evil_hides_snitcher() {
        let (deps, _dir) = test_deps().await;
        let svc = IcbmService::new(deps.clone());
        let alice = online(&deps, "alice");
        let bob = online(&deps, "bob");

        svc.evil_request(
            &alice,
            SnacFrame::new(foodgroup::ICBM, subgroup::EVIL_REQUEST),
            icbm::EvilRequest {
                send_as: 1,
                screen_name: "bob".to_string(),
            },
        )
        .unwrap();
        assert_eq!(bob.warning(), EVIL_DELTA_ANON);

        let mut bob_rx = bob.take_receiver();
        let note = oservice::EvilNotification::decode(&mut Bytes::from(
            bob_rx.try_recv().unwrap().body,
        ))
        .unwrap();
        assert!(note.snitcher.is_none());
    }

    #[tokio::test]
    async fn test_evil_offline_target_errors() {
        let (deps, _dir) = test_deps().await;
        let svc = IcbmService::new(deps.clone());
        let alice = online(&deps, "alice");

        let reply = svc
            .evil_request(
                &alice,
                SnacFrame::new(foodgroup::ICBM, subgroup::EVIL_REQUEST),
                icbm::EvilRequest {
                    send_as: 0,
                    screen_name: "ghost".to_string(),
                },
            )
            .unwrap();
        assert_eq!(reply.frame.sub_group, subgroup::ERR);
    }
}
