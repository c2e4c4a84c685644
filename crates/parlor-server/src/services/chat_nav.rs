//! ChatNav food group: room creation and lookup on exchange 4.

use std::sync::Arc;

use chrono::Utc;
use parlor_shared::wire::bodies::chat::RoomInfoUpdate;
use parlor_shared::wire::bodies::chat_nav::{self, subgroup, tag, NavInfo};
use parlor_shared::wire::tlv::Tlv;
use parlor_shared::wire::{SnacFrame, SnacMessage};
use parlor_store::ChatRoom;

use crate::error::{Result, ServerError};
use crate::services::Deps;
use crate::session::Session;

pub struct ChatNavService {
    deps: Deps,
}

impl ChatNavService {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    /// SNAC(0x0D,0x02).
    pub fn request_chat_rights(&self, frame: SnacFrame) -> SnacMessage {
        let mut nav = NavInfo::default();
        nav.tlvs.append(Tlv::u8(tag::MAX_CONCURRENT_ROOMS, 10));
        nav_info_message(frame, nav)
    }

    /// SNAC(0x0D,0x08): create a room, or return the existing room with the
    /// same name on the exchange. The created room's cookie becomes its
    /// canonical wire identity.
    pub fn create_room(
        &self,
        sess: &Arc<Session>,
        frame: SnacFrame,
        body: RoomInfoUpdate,
    ) -> Result<SnacMessage> {
        let name = body
            .room_name()
            .filter(|n| !n.trim().is_empty())
            .ok_or(parlor_shared::WireError::MissingTlv(
                parlor_shared::wire::bodies::chat::roomtag::ROOM_NAME,
            ))?;

        let room = self.deps.db.create_chat_room(&ChatRoom {
            cookie: uuid::Uuid::new_v4().to_string(),
            exchange: body.exchange,
            name: name.trim().to_string(),
            created: Utc::now(),
            creator: sess.ident().clone(),
            instance: body.instance,
            detail_level: 2,
        })?;
        tracing::debug!(cookie = %room.cookie, name = %room.name, "chat room ready");

        Ok(nav_info_message(frame, room_nav_info(&room)))
    }

    /// SNAC(0x0D,0x04): metadata for a room the client already knows.
    pub fn request_room_info(
        &self,
        frame: SnacFrame,
        body: chat_nav::RequestRoomInfo,
    ) -> Result<SnacMessage> {
        let room = self
            .deps
            .db
            .chat_room_by_cookie(&body.cookie)?
            .ok_or_else(|| ServerError::ChatRoomNotFound(body.cookie.clone()))?;
        Ok(nav_info_message(frame, room_nav_info(&room)))
    }
}

fn room_nav_info(room: &ChatRoom) -> NavInfo {
    let mut update = RoomInfoUpdate {
        exchange: room.exchange,
        cookie: room.cookie.clone(),
        instance: room.instance,
        detail_level: room.detail_level,
        tlvs: Default::default(),
    };
    update.tlvs.append(Tlv::string(
        parlor_shared::wire::bodies::chat::roomtag::ROOM_NAME,
        &room.name,
    ));
    let mut room_bytes = Vec::new();
    update.encode(&mut room_bytes);

    let mut nav = NavInfo::default();
    nav.tlvs.append(Tlv::new(tag::ROOM_INFO, room_bytes));
    nav
}

fn nav_info_message(frame: SnacFrame, nav: NavInfo) -> SnacMessage {
    let mut body = Vec::new();
    nav.encode(&mut body);
    SnacMessage::new(SnacFrame::reply_to(frame, subgroup::NAV_INFO), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testutil::test_deps;
    use bytes::Bytes;
    use parlor_shared::wire::bodies::chat::roomtag;
    use parlor_shared::wire::snac::foodgroup;
    use parlor_shared::DisplayScreenName;

    fn create_body(exchange: u16, name: &str) -> RoomInfoUpdate {
        let mut body = RoomInfoUpdate {
            exchange,
            cookie: chat_nav::CREATE_COOKIE.to_string(),
            instance: 0,
            detail_level: 1,
            tlvs: Default::default(),
        };
        body.tlvs.append(Tlv::string(roomtag::ROOM_NAME, name));
        body
    }

    fn embedded_room(reply: &SnacMessage) -> RoomInfoUpdate {
        let nav = NavInfo::decode(&mut Bytes::copy_from_slice(&reply.body)).unwrap();
        let raw = nav.tlvs.bytes(tag::ROOM_INFO).unwrap();
        RoomInfoUpdate::decode(&mut Bytes::copy_from_slice(raw)).unwrap()
    }

    #[tokio::test]
    async fn test_create_room_and_lookup() {
        let (deps, _dir) = test_deps().await;
        let svc = ChatNavService::new(deps.clone());
        let sess = Arc::new(Session::new(DisplayScreenName::new("alice")));
        let frame = SnacFrame::new(foodgroup::CHAT_NAV, subgroup::CREATE_ROOM);

        let reply = svc.create_room(&sess, frame, create_body(4, "lobby")).unwrap();
        let room = embedded_room(&reply);
        assert_eq!(room.room_name().as_deref(), Some("lobby"));
        assert_ne!(room.cookie, chat_nav::CREATE_COOKIE);

        // request_room_info finds it by cookie
        let req = chat_nav::RequestRoomInfo {
            exchange: 4,
            cookie: room.cookie.clone(),
            instance: 0,
            detail_level: 2,
        };
        let reply = svc.request_room_info(frame, req).unwrap();
        assert_eq!(embedded_room(&reply).cookie, room.cookie);
    }

    #[tokio::test]
    async fn test_create_is_idempotent_per_name() {
        let (deps, _dir) = test_deps().await;
        let svc = ChatNavService::new(deps);
        let sess = Arc::new(Session::new(DisplayScreenName::new("alice")));
        let frame = SnacFrame::new(foodgroup::CHAT_NAV, subgroup::CREATE_ROOM);

        let first = embedded_room(&svc.create_room(&sess, frame, create_body(4, "lobby")).unwrap());
        let second =
            embedded_room(&svc.create_room(&sess, frame, create_body(4, "LOBBY")).unwrap());
        assert_eq!(first.cookie, second.cookie);
    }

    #[tokio::test]
    async fn test_unknown_room_errors() {
        let (deps, _dir) = test_deps().await;
        let svc = ChatNavService::new(deps);
        let req = chat_nav::RequestRoomInfo {
            exchange: 4,
            cookie: "missing".to_string(),
            instance: 0,
            detail_level: 2,
        };
        assert!(svc
            .request_room_info(SnacFrame::new(foodgroup::CHAT_NAV, 0x04), req)
            .is_err());
    }

    #[tokio::test]
    async fn test_create_requires_name() {
        let (deps, _dir) = test_deps().await;
        let svc = ChatNavService::new(deps);
        let sess = Arc::new(Session::new(DisplayScreenName::new("alice")));
        let body = RoomInfoUpdate {
            exchange: 4,
            cookie: chat_nav::CREATE_COOKIE.to_string(),
            ..Default::default()
        };
        assert!(svc
            .create_room(&sess, SnacFrame::new(foodgroup::CHAT_NAV, 0x08), body)
            .is_err());
    }
}
