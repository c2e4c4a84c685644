//! Chat food group: reflected room messaging and occupancy alerts.

use std::sync::Arc;

use parlor_shared::wire::bodies::chat::{self, subgroup, tag};
use parlor_shared::wire::snac::{errcode, foodgroup, SnacError};
use parlor_shared::wire::tlv::Tlv;
use parlor_shared::wire::{SnacFrame, SnacMessage};

use crate::error::Result;
use crate::services::Deps;
use crate::session::Session;

pub struct ChatService {
    deps: Deps,
}

impl ChatService {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    /// SNAC(0x0E,0x05): broadcast a room message to every other
    /// participant. The sender sees its own message only via the returned
    /// reflection (never by local echo), so all participants observe
    /// identical ordering. Reflection is emitted when the client set the
    /// EnableReflection TLV.
    pub fn channel_msg_to_host(
        &self,
        sess: &Arc<Session>,
        frame: SnacFrame,
        body: chat::ChannelMsgToHost,
    ) -> Result<Option<SnacMessage>> {
        let Some(cookie) = sess.chat_cookie() else {
            let mut out = Vec::new();
            SnacError::new(errcode::NOT_LOGGED_IN).encode(&mut out);
            return Ok(Some(SnacMessage::new(
                SnacFrame::reply_to(frame, subgroup::ERR),
                out,
            )));
        };

        let mut outbound = chat::ChannelMsgToClient {
            cookie: body.cookie,
            channel: body.channel,
            tlvs: Default::default(),
        };
        // sender info is stamped by the server; message TLVs pass through
        // byte-for-byte so every client renders the identical payload.
        let mut sender_info = Vec::new();
        sess.user_info().encode(&mut sender_info);
        outbound.tlvs.append(Tlv::new(tag::SENDER_INFORMATION, sender_info));
        for tlv in &body.tlvs.tlvs {
            if tlv.tag != tag::SENDER_INFORMATION && tlv.tag != tag::ENABLE_REFLECTION {
                outbound.tlvs.append(tlv.clone());
            }
        }

        let mut payload = Vec::new();
        outbound.encode(&mut payload);
        let msg = SnacMessage::new(
            SnacFrame::new(foodgroup::CHAT, subgroup::CHANNEL_MSG_TO_CLIENT),
            payload,
        );
        self.deps
            .chat
            .relay_to_all_except(cookie, Some(sess.ident()), &msg);

        if body.tlvs.has(tag::ENABLE_REFLECTION) {
            let mut reflected = msg;
            reflected.frame.request_id = frame.request_id;
            Ok(Some(reflected))
        } else {
            Ok(None)
        }
    }
}

/// Send the room's metadata and current roster to a client that just
/// finished the chat onboarding handshake, and announce it to the room.
pub fn alert_user_joined(deps: &Deps, sess: &Arc<Session>) -> Result<()> {
    let Some(cookie) = sess.chat_cookie() else {
        return Ok(());
    };

    if let Some(room) = deps.db.chat_room_by_cookie(cookie)? {
        let mut update = chat::RoomInfoUpdate {
            exchange: room.exchange,
            cookie: room.cookie.clone(),
            instance: room.instance,
            detail_level: room.detail_level,
            tlvs: Default::default(),
        };
        update
            .tlvs
            .append(Tlv::string(chat::roomtag::ROOM_NAME, &room.name));
        let mut payload = Vec::new();
        update.encode(&mut payload);
        sess.relay(SnacMessage::new(
            SnacFrame::new(foodgroup::CHAT, subgroup::ROOM_INFO_UPDATE),
            payload,
        ));
    }

    let participants = deps.chat.all_sessions(cookie);

    // announce the newcomer to everyone else
    let joined = occupants_message(subgroup::USERS_JOINED, &[sess.clone()]);
    deps.chat.relay_to_all_except(cookie, Some(sess.ident()), &joined);

    // and the full roster to the newcomer
    let roster = occupants_message(subgroup::USERS_JOINED, &participants);
    sess.relay(roster);
    Ok(())
}

/// Tell remaining participants that a user left.
pub fn alert_user_left(deps: &Deps, sess: &Arc<Session>) {
    let Some(cookie) = sess.chat_cookie() else {
        return;
    };
    let left = occupants_message(subgroup::USERS_LEFT, &[sess.clone()]);
    deps.chat.relay_to_all_except(cookie, Some(sess.ident()), &left);
}

fn occupants_message(sub_group: u16, sessions: &[Arc<Session>]) -> SnacMessage {
    let body = chat::Occupants {
        users: sessions.iter().map(|s| s.user_info()).collect(),
    };
    let mut payload = Vec::new();
    body.encode(&mut payload);
    SnacMessage::new(SnacFrame::new(foodgroup::CHAT, sub_group), payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testutil::test_deps;
    use bytes::Bytes;
    use parlor_shared::DisplayScreenName;

    fn chat_msg(text: &str, reflect: bool) -> chat::ChannelMsgToHost {
        let mut body = chat::ChannelMsgToHost {
            cookie: 7,
            channel: 3,
            tlvs: Default::default(),
        };
        if reflect {
            body.tlvs.append(Tlv::u8(tag::ENABLE_REFLECTION, 1));
        }
        body.tlvs
            .append(Tlv::new(tag::MESSAGE_INFO, chat::encode_chat_message_text(text)));
        body
    }

    #[tokio::test]
    async fn test_reflection_and_broadcast() {
        let (deps, _dir) = test_deps().await;
        let svc = ChatService::new(deps.clone());
        let alice = deps.chat.add_session("room-1", DisplayScreenName::new("alice"));
        let bob = deps.chat.add_session("room-1", DisplayScreenName::new("bob"));

        let reply = svc
            .channel_msg_to_host(&alice, SnacFrame::new(foodgroup::CHAT, 0x05), chat_msg("hello", true))
            .unwrap()
            .expect("reflection requested");

        // the sender's reflection and bob's copy carry byte-identical text
        let reflected =
            chat::ChannelMsgToClient::decode(&mut Bytes::from(reply.body.clone())).unwrap();
        assert_eq!(
            chat::decode_chat_message_text(reflected.tlvs.bytes(tag::MESSAGE_INFO).unwrap())
                .unwrap(),
            "hello"
        );

        let mut bob_rx = bob.take_receiver();
        let bob_msg = bob_rx.try_recv().unwrap();
        assert_eq!(bob_msg.body, reply.body);

        // sender does not receive a queued copy on top of the reflection
        let mut alice_rx = alice.take_receiver();
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_no_reflection_when_not_requested() {
        let (deps, _dir) = test_deps().await;
        let svc = ChatService::new(deps.clone());
        let alice = deps.chat.add_session("room-1", DisplayScreenName::new("alice"));

        let reply = svc
            .channel_msg_to_host(&alice, SnacFrame::new(foodgroup::CHAT, 0x05), chat_msg("hi", false))
            .unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_join_alerts() {
        let (deps, _dir) = test_deps().await;
        let alice = deps.chat.add_session("room-1", DisplayScreenName::new("alice"));
        let mut alice_rx = alice.take_receiver();

        let bob = deps.chat.add_session("room-1", DisplayScreenName::new("bob"));
        alert_user_joined(&deps, &bob).unwrap();

        let alert = alice_rx.try_recv().unwrap();
        assert_eq!(alert.frame.sub_group, subgroup::USERS_JOINED);
        let joined = chat::Occupants::decode(&mut Bytes::from(alert.body)).unwrap();
        assert_eq!(joined.users[0].screen_name, "bob");

        alert_user_left(&deps, &bob);
        let alert = alice_rx.try_recv().unwrap();
        assert_eq!(alert.frame.sub_group, subgroup::USERS_LEFT);
    }
}
