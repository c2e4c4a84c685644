//! Translates TOC commands into calls on the food-group services, exactly
//! as a native OSCAR client would make them, and renders the replies back
//! into TOC text.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::{Buf, BufMut, Bytes};

use parlor_shared::constants::CAP_CHAT;
use parlor_shared::roast;
use parlor_shared::wire::bodies::chat::{self, IcbmRoomInfo, RoomInfoUpdate};
use parlor_shared::wire::bodies::chat_nav::{self, NavInfo};
use parlor_shared::wire::bodies::icbm;
use parlor_shared::wire::bodies::locate;
use parlor_shared::wire::bodies::oservice::{self, RoomSelector, ServiceRequest, ServiceResponse};
use parlor_shared::wire::bodies::{auth as auth_bodies, buddy as buddy_bodies, feedbag};
use parlor_shared::wire::prim;
use parlor_shared::wire::snac::foodgroup;
use parlor_shared::wire::tlv::{Tlv, TlvBlock};
use parlor_shared::wire::{FlapSignonFrame, SnacFrame};
use parlor_shared::IdentScreenName;

use crate::error::ServerError;
use crate::services::auth::AuthService;
use crate::services::buddy::BuddyService;
use crate::services::chat::ChatService;
use crate::services::chat_nav::ChatNavService;
use crate::services::icbm::IcbmService;
use crate::services::locate::LocateService;
use crate::services::oservice::{Endpoint, OServiceService};
use crate::services::permit_deny::PermitDenyService;
use crate::services::Deps;
use crate::session::Session;
use crate::toc::parse::parse_args;

/// Generic internal-error reply; TOC has no finer-grained code for it.
pub const ERR_INTERNAL: &str = "ERROR:983";
/// Bad screen name or password at signon.
pub const ERR_BAD_LOGIN: &str = "ERROR:980";
/// Warning the target is not currently possible.
pub const ERR_WARN_UNAVAILABLE: &str = "ERROR:902";

/// Maps the integer chat ids a TOC session hands its client to room wire
/// identities and chat-scoped sessions.
#[derive(Default)]
pub struct ChatIdRegistry {
    inner: Mutex<ChatIdState>,
}

#[derive(Default)]
struct ChatIdState {
    rooms: HashMap<usize, IcbmRoomInfo>,
    sessions: HashMap<usize, Arc<Session>>,
    next_id: usize,
}

impl ChatIdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a room, returning its id. Re-registering the same room
    /// returns the existing id.
    pub fn add(&self, room: IcbmRoomInfo) -> usize {
        let mut state = self.lock();
        if let Some((id, _)) = state.rooms.iter().find(|(_, r)| **r == room) {
            return *id;
        }
        let id = state.next_id;
        state.next_id += 1;
        state.rooms.insert(id, room);
        id
    }

    pub fn room(&self, id: usize) -> Option<IcbmRoomInfo> {
        self.lock().rooms.get(&id).cloned()
    }

    pub fn register_session(&self, id: usize, sess: Arc<Session>) {
        self.lock().sessions.insert(id, sess);
    }

    pub fn session(&self, id: usize) -> Option<Arc<Session>> {
        self.lock().sessions.get(&id).cloned()
    }

    pub fn all_sessions(&self) -> Vec<Arc<Session>> {
        self.lock().sessions.values().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChatIdState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct OscarProxy {
    pub deps: Deps,
    pub auth: AuthService,
    pub buddy: BuddyService,
    pub chat: ChatService,
    pub chat_nav: ChatNavService,
    pub icbm: IcbmService,
    pub locate: LocateService,
    pub oservice_bos: OServiceService,
    pub oservice_chat: OServiceService,
    pub permit_deny: PermitDenyService,
}

impl OscarProxy {
    pub fn new(deps: Deps) -> Self {
        Self {
            auth: AuthService::new(deps.clone()),
            buddy: BuddyService::new(deps.clone()),
            chat: ChatService::new(deps.clone()),
            chat_nav: ChatNavService::new(deps.clone()),
            icbm: IcbmService::new(deps.clone()),
            locate: LocateService::new(deps.clone()),
            oservice_bos: OServiceService::new(deps.clone(), Endpoint::Bos),
            oservice_chat: OServiceService::new(deps.clone(), Endpoint::Chat),
            permit_deny: PermitDenyService::new(deps.clone()),
            deps,
        }
    }

    /// `toc_signon <host> <port> <user> <password> [<lang> <version>]`.
    /// Success replies with SIGN_ON and the stored CONFIG blob.
    pub fn signon(&self, tokens: &[String]) -> Result<(Arc<Session>, Vec<String>), String> {
        let (fixed, _) =
            parse_args(tokens, "toc_signon", 4).map_err(|e| self.runtime_err_str(e.into()))?;
        let (user, password) = (&fixed[2], &fixed[3]);

        let roasted = match password.strip_prefix("0x").map(hex::decode) {
            Some(Ok(bytes)) => bytes,
            // tolerate an unroasted password from hand-driven clients
            _ => roast::roast_toc(password.as_bytes()),
        };

        let mut signon_frame = FlapSignonFrame::default();
        signon_frame
            .tlvs
            .append(Tlv::string(auth_bodies::tag::SCREEN_NAME, user));
        signon_frame
            .tlvs
            .append(Tlv::new(auth_bodies::tag::ROASTED_TOC_PASSWORD, roasted));

        let block = self
            .auth
            .flap_login(&signon_frame)
            .map_err(|e| self.runtime_err_str(e))?;
        if block.has(auth_bodies::tag::ERROR_SUBCODE) {
            return Err(ERR_BAD_LOGIN.to_string());
        }
        let token = block
            .bytes(auth_bodies::tag::AUTHORIZATION_COOKIE)
            .ok_or_else(|| self.runtime_err_str(ServerError::Handshake("missing cookie")))?;

        let sess = self
            .auth
            .register_bos_session(token)
            .map_err(|e| self.runtime_err_str(e))?;
        // chat capability is implied for TOC clients
        sess.set_capabilities(vec![CAP_CHAT]);

        let config = self
            .deps
            .db
            .toc_config(sess.ident())
            .map_err(|e| self.runtime_err_str(e.into()))?;

        Ok((
            sess,
            vec!["SIGN_ON:TOC1.0".to_string(), format!("CONFIG:{config}")],
        ))
    }

    /// `toc_init_done`: flips the session online and starts presence
    /// fan-out plus offline-message delivery.
    pub fn init_done(&self, sess: &Arc<Session>) -> Option<String> {
        match self.oservice_bos.client_online(sess, Default::default()) {
            Ok(()) => None,
            Err(e) => self.runtime_err(e),
        }
    }

    /// `toc_send_im <dest> <message> [auto]`.
    pub fn send_im(&self, sess: &Arc<Session>, tokens: &[String]) -> Option<String> {
        let (fixed, varargs) = match parse_args(tokens, "toc_send_im", 2) {
            Ok(parsed) => parsed,
            Err(e) => return self.runtime_err(e.into()),
        };

        let mut body = icbm::ChannelMsgToHost {
            cookie: rand::random(),
            channel: icbm::channel::IM,
            screen_name: fixed[0].clone(),
            tlvs: TlvBlock::default(),
        };
        body.tlvs
            .append(Tlv::new(icbm::tag::AIM_DATA, icbm::encode_im_text(&fixed[1])));
        if varargs.first().map(String::as_str) == Some("auto") {
            body.tlvs.append(Tlv::new(icbm::tag::AUTO_RESPONSE, Vec::new()));
        }

        // the reply is dropped: TOC has no error code for "user offline"
        let frame = SnacFrame::new(foodgroup::ICBM, icbm::subgroup::CHANNEL_MSG_TO_HOST);
        match self.icbm.channel_msg_to_host(sess, frame, body) {
            Ok(_) => None,
            Err(e) => self.runtime_err(e),
        }
    }

    /// `toc_add_buddy <user>...`.
    pub fn add_buddy(&self, sess: &Arc<Session>, tokens: &[String]) -> Option<String> {
        let (_, users) = match parse_args(tokens, "toc_add_buddy", 0) {
            Ok(parsed) => parsed,
            Err(e) => return self.runtime_err(e.into()),
        };
        let body = buddy_bodies::AddBuddies {
            buddies: users.to_vec(),
        };
        match self.buddy.add_buddies(sess, body) {
            Ok(()) => None,
            Err(e) => self.runtime_err(e),
        }
    }

    /// `toc_remove_buddy <user>...`.
    pub fn remove_buddy(&self, sess: &Arc<Session>, tokens: &[String]) -> Option<String> {
        let (_, users) = match parse_args(tokens, "toc_remove_buddy", 0) {
            Ok(parsed) => parsed,
            Err(e) => return self.runtime_err(e.into()),
        };
        self.buddy.del_buddies(
            sess,
            buddy_bodies::DelBuddies {
                buddies: users.to_vec(),
            },
        );
        None
    }

    /// `toc_add_permit [<user>...]`.
    pub fn add_permit(&self, sess: &Arc<Session>, tokens: &[String]) -> Option<String> {
        self.pd_mutation(sess, tokens, "toc_add_permit", true)
    }

    /// `toc_add_deny [<user>...]`.
    pub fn add_deny(&self, sess: &Arc<Session>, tokens: &[String]) -> Option<String> {
        self.pd_mutation(sess, tokens, "toc_add_deny", false)
    }

    fn pd_mutation(
        &self,
        sess: &Arc<Session>,
        tokens: &[String],
        cmd: &str,
        permit: bool,
    ) -> Option<String> {
        let (_, users) = match parse_args(tokens, cmd, 0) {
            Ok(parsed) => parsed,
            Err(e) => return self.runtime_err(e.into()),
        };
        let body = parlor_shared::wire::bodies::permit_deny::ListEntries {
            users: users.to_vec(),
        };
        let result = if permit {
            self.permit_deny.add_permit_entries(sess, body)
        } else {
            self.permit_deny.add_deny_entries(sess, body)
        };
        match result {
            Ok(()) => None,
            Err(e) => self.runtime_err(e),
        }
    }

    /// `toc_set_away [<message>]`.
    pub fn set_away(&self, sess: &Arc<Session>, tokens: &[String]) -> Option<String> {
        let (_, varargs) = match parse_args(tokens, "toc_set_away", 0) {
            Ok(parsed) => parsed,
            Err(e) => return self.runtime_err(e.into()),
        };
        let msg = varargs.first().cloned().unwrap_or_default();
        let mut body = locate::SetInfo::default();
        body.tlvs.append(Tlv::string(locate::tag::UNAVAILABLE_DATA, &msg));
        match self.locate.set_info(sess, body) {
            Ok(()) => None,
            Err(e) => self.runtime_err(e),
        }
    }

    /// `toc_set_info <html>`.
    pub fn set_info(&self, sess: &Arc<Session>, tokens: &[String]) -> Option<String> {
        let (fixed, _) = match parse_args(tokens, "toc_set_info", 1) {
            Ok(parsed) => parsed,
            Err(e) => return self.runtime_err(e.into()),
        };
        let mut body = locate::SetInfo::default();
        body.tlvs.append(Tlv::string(locate::tag::SIG_DATA, &fixed[0]));
        match self.locate.set_info(sess, body) {
            Ok(()) => None,
            Err(e) => self.runtime_err(e),
        }
    }

    /// `toc_set_caps [<uuid>...]`. The chat capability is always appended;
    /// official clients rely on it without sending it.
    pub fn set_caps(&self, sess: &Arc<Session>, tokens: &[String]) -> Option<String> {
        let (_, uuids) = match parse_args(tokens, "toc_set_caps", 0) {
            Ok(parsed) => parsed,
            Err(e) => return self.runtime_err(e.into()),
        };
        let mut caps = Vec::with_capacity(16 * (uuids.len() + 1));
        for raw in uuids {
            let Ok(uid) = uuid::Uuid::parse_str(raw) else {
                return Some(ERR_INTERNAL.to_string());
            };
            caps.extend_from_slice(uid.as_bytes());
        }
        caps.extend_from_slice(&CAP_CHAT);

        let mut body = locate::SetInfo::default();
        body.tlvs.append(Tlv::new(locate::tag::CAPABILITIES, caps));
        match self.locate.set_info(sess, body) {
            Ok(()) => None,
            Err(e) => self.runtime_err(e),
        }
    }

    /// `toc_set_idle <seconds>`.
    pub fn set_idle(&self, sess: &Arc<Session>, tokens: &[String]) -> Option<String> {
        let (fixed, _) = match parse_args(tokens, "toc_set_idle", 1) {
            Ok(parsed) => parsed,
            Err(e) => return self.runtime_err(e.into()),
        };
        let Ok(secs) = fixed[0].parse::<u32>() else {
            return Some(ERR_INTERNAL.to_string());
        };
        let body = oservice::IdleNotification { idle_secs: secs };
        match self.oservice_bos.idle_notification(sess, body) {
            Ok(()) => None,
            Err(e) => self.runtime_err(e),
        }
    }

    /// `toc_set_dir <field1:field2:...>`.
    pub fn set_dir(&self, sess: &Arc<Session>, tokens: &[String]) -> Option<String> {
        let (fixed, _) = match parse_args(tokens, "toc_set_dir", 1) {
            Ok(parsed) => parsed,
            Err(e) => return self.runtime_err(e.into()),
        };
        let fields: Vec<&str> = fixed[0].split(':').collect();
        if fields.len() > 9 {
            return Some(ERR_INTERNAL.to_string());
        }
        let get = |i: usize| fields.get(i).map(|f| f.trim_matches('"')).unwrap_or("");

        let mut body = locate::SetDirInfo::default();
        body.tlvs.append(Tlv::string(locate::dirtag::FIRST_NAME, get(0)));
        body.tlvs.append(Tlv::string(locate::dirtag::MIDDLE_NAME, get(1)));
        body.tlvs.append(Tlv::string(locate::dirtag::LAST_NAME, get(2)));
        body.tlvs.append(Tlv::string(locate::dirtag::MAIDEN_NAME, get(3)));
        body.tlvs.append(Tlv::string(locate::dirtag::CITY, get(4)));
        body.tlvs.append(Tlv::string(locate::dirtag::STATE, get(5)));
        body.tlvs.append(Tlv::string(locate::dirtag::COUNTRY, get(6)));
        let frame = SnacFrame::new(foodgroup::LOCATE, locate::subgroup::SET_DIR_INFO);
        match self.locate.set_dir_info(sess, frame, body) {
            Ok(_) => None,
            Err(e) => self.runtime_err(e),
        }
    }

    /// `toc_set_config <config>`: replays the buddy list and permit/deny
    /// mode a TOC client keeps server-side, then persists the raw blob.
    pub fn set_config(&self, sess: &Arc<Session>, tokens: &[String]) -> Option<String> {
        let (fixed, _) = match parse_args(tokens, "toc_set_config", 1) {
            Ok(parsed) => parsed,
            Err(e) => return self.runtime_err(e.into()),
        };
        let info = &fixed[0];

        let mut mode = feedbag::pdmode::PERMIT_ALL;
        let mut buddies = Vec::new();
        let mut permits = Vec::new();
        let mut denies = Vec::new();
        for item in info.lines() {
            let Some((kind, value)) = item.split_once(' ') else {
                continue;
            };
            match kind {
                "m" => {
                    mode = match value {
                        "1" => feedbag::pdmode::PERMIT_ALL,
                        "2" => feedbag::pdmode::DENY_ALL,
                        "3" => feedbag::pdmode::PERMIT_SOME,
                        "4" => feedbag::pdmode::DENY_SOME,
                        _ => return Some(ERR_INTERNAL.to_string()),
                    }
                }
                "b" => buddies.push(value.to_string()),
                "p" => permits.push(value.to_string()),
                "d" => denies.push(value.to_string()),
                _ => {}
            }
        }

        let pd = |users: Vec<String>| parlor_shared::wire::bodies::permit_deny::ListEntries {
            users,
        };
        let result = match mode {
            feedbag::pdmode::PERMIT_SOME => self.permit_deny.add_permit_entries(sess, pd(permits)),
            feedbag::pdmode::DENY_SOME => self.permit_deny.add_deny_entries(sess, pd(denies)),
            other => self.deps.db.set_pd_mode(sess.ident(), other).map_err(Into::into),
        };
        if let Err(e) = result {
            return self.runtime_err(e);
        }

        if !buddies.is_empty() {
            let body = buddy_bodies::AddBuddies { buddies };
            if let Err(e) = self.buddy.add_buddies(sess, body) {
                return self.runtime_err(e);
            }
        }

        match self.deps.db.set_toc_config(sess.ident(), info) {
            Ok(()) => None,
            Err(e) => self.runtime_err(e.into()),
        }
    }

    /// `toc_evil <user> <norm|anon>`.
    pub fn evil(&self, sess: &Arc<Session>, tokens: &[String]) -> Option<String> {
        let (fixed, _) = match parse_args(tokens, "toc_evil", 2) {
            Ok(parsed) => parsed,
            Err(e) => return self.runtime_err(e.into()),
        };
        let send_as = match fixed[1].as_str() {
            "norm" => 0,
            "anon" => 1,
            _ => return Some(ERR_INTERNAL.to_string()),
        };
        let body = icbm::EvilRequest {
            send_as,
            screen_name: fixed[0].clone(),
        };
        let frame = SnacFrame::new(foodgroup::ICBM, icbm::subgroup::EVIL_REQUEST);
        match self.icbm.evil_request(sess, frame, body) {
            Ok(reply) if reply.frame.sub_group == icbm::subgroup::ERR => {
                Some(ERR_WARN_UNAVAILABLE.to_string())
            }
            Ok(_) => None,
            Err(e) => self.runtime_err(e),
        }
    }

    /// `toc_get_info <user>`.
    pub fn get_info_url(&self, sess: &Arc<Session>, tokens: &[String]) -> Option<String> {
        let (fixed, _) = match parse_args(tokens, "toc_get_info", 1) {
            Ok(parsed) => parsed,
            Err(e) => return self.runtime_err(e.into()),
        };
        let cookie = match self.http_auth_token(sess.ident()) {
            Ok(cookie) => cookie,
            Err(e) => return self.runtime_err(e),
        };
        Some(format!(
            "GOTO_URL:profile:info?cookie={cookie}&from={}&user={}",
            urlencode(sess.ident().as_str()),
            urlencode(&fixed[0]),
        ))
    }

    /// `toc_get_dir <user>`.
    pub fn get_dir_url(&self, sess: &Arc<Session>, tokens: &[String]) -> Option<String> {
        let (fixed, _) = match parse_args(tokens, "toc_get_dir", 1) {
            Ok(parsed) => parsed,
            Err(e) => return self.runtime_err(e.into()),
        };
        let cookie = match self.http_auth_token(sess.ident()) {
            Ok(cookie) => cookie,
            Err(e) => return self.runtime_err(e),
        };
        Some(format!(
            "GOTO_URL:directory info:dir_info?cookie={cookie}&user={}",
            urlencode(&fixed[0]),
        ))
    }

    /// `toc_dir_search <field1:field2:...>`.
    pub fn dir_search_url(&self, sess: &Arc<Session>, tokens: &[String]) -> Option<String> {
        let (fixed, _) = match parse_args(tokens, "toc_dir_search", 1) {
            Ok(parsed) => parsed,
            Err(e) => return self.runtime_err(e.into()),
        };
        let labels = [
            "first_name",
            "middle_name",
            "last_name",
            "maiden_name",
            "city",
            "state",
            "country",
            "email",
            "nop",
            "nop",
            "keyword",
        ];
        let mut query = String::new();
        for (label, value) in labels.iter().zip(fixed[0].split(':')) {
            let value = value.trim_matches('"');
            if value.is_empty() || *label == "nop" {
                continue;
            }
            query.push_str(&format!("&{label}={}", urlencode(value)));
        }
        if query.is_empty() {
            return Some(ERR_INTERNAL.to_string());
        }
        let cookie = match self.http_auth_token(sess.ident()) {
            Ok(cookie) => cookie,
            Err(e) => return self.runtime_err(e),
        };
        Some(format!("GOTO_URL:search results:dir_search?cookie={cookie}{query}"))
    }

    /// `toc_chat_join <exchange> <name>`: create-or-get the room, then run
    /// the same room-join flow a native client would.
    pub fn chat_join(
        &self,
        sess: &Arc<Session>,
        registry: &ChatIdRegistry,
        tokens: &[String],
    ) -> (Option<usize>, Option<String>) {
        let (fixed, _) = match parse_args(tokens, "toc_chat_join", 2) {
            Ok(parsed) => parsed,
            Err(e) => return (None, self.runtime_err(e.into())),
        };
        let Ok(exchange) = fixed[0].parse::<u16>() else {
            return (None, Some(ERR_INTERNAL.to_string()));
        };

        let mut create = RoomInfoUpdate {
            exchange,
            cookie: chat_nav::CREATE_COOKIE.to_string(),
            instance: 0,
            detail_level: 1,
            tlvs: TlvBlock::default(),
        };
        create
            .tlvs
            .append(Tlv::string(chat::roomtag::ROOM_NAME, &fixed[1]));
        let frame = SnacFrame::new(foodgroup::CHAT_NAV, chat_nav::subgroup::CREATE_ROOM);
        let reply = match self.chat_nav.create_room(sess, frame, create) {
            Ok(reply) => reply,
            Err(e) => return (None, self.runtime_err(e)),
        };
        let room = match room_from_nav_reply(&reply.body) {
            Ok(room) => room,
            Err(e) => return (None, self.runtime_err(e)),
        };
        self.join_room(sess, registry, room)
    }

    /// `toc_chat_accept <chat id>`: join a room known from a CHAT_INVITE.
    pub fn chat_accept(
        &self,
        sess: &Arc<Session>,
        registry: &ChatIdRegistry,
        tokens: &[String],
    ) -> (Option<usize>, Option<String>) {
        let (fixed, _) = match parse_args(tokens, "toc_chat_accept", 1) {
            Ok(parsed) => parsed,
            Err(e) => return (None, self.runtime_err(e.into())),
        };
        let Ok(chat_id) = fixed[0].parse::<usize>() else {
            return (None, Some(ERR_INTERNAL.to_string()));
        };
        let Some(info) = registry.room(chat_id) else {
            return (None, Some(ERR_INTERNAL.to_string()));
        };

        let req = chat_nav::RequestRoomInfo {
            exchange: info.exchange,
            cookie: info.cookie,
            instance: info.instance,
            detail_level: 2,
        };
        let frame = SnacFrame::new(foodgroup::CHAT_NAV, chat_nav::subgroup::REQUEST_ROOM_INFO);
        let reply = match self.chat_nav.request_room_info(frame, req) {
            Ok(reply) => reply,
            Err(e) => return (None, self.runtime_err(e)),
        };
        let room = match room_from_nav_reply(&reply.body) {
            Ok(room) => room,
            Err(e) => return (None, self.runtime_err(e)),
        };
        self.join_room(sess, registry, room)
    }

    fn join_room(
        &self,
        sess: &Arc<Session>,
        registry: &ChatIdRegistry,
        room: RoomInfoUpdate,
    ) -> (Option<usize>, Option<String>) {
        let room_name = room.room_name().unwrap_or_default();

        let mut selector = Vec::new();
        RoomSelector {
            exchange: room.exchange,
            cookie: room.cookie.clone(),
            instance: room.instance,
        }
        .encode(&mut selector);
        let mut svc_req = ServiceRequest {
            food_group: foodgroup::CHAT,
            tlvs: TlvBlock::default(),
        };
        svc_req.tlvs.append(Tlv::new(oservice::tag::ROOM_INFO, selector));

        let frame = SnacFrame::new(foodgroup::OSERVICE, oservice::subgroup::SERVICE_REQUEST);
        let reply = match self.oservice_bos.service_request(sess, frame, svc_req) {
            Ok(reply) if reply.frame.sub_group == oservice::subgroup::SERVICE_RESPONSE => reply,
            Ok(_) => return (None, Some(ERR_INTERNAL.to_string())),
            Err(e) => return (None, self.runtime_err(e)),
        };
        let response = match ServiceResponse::decode(&mut Bytes::from(reply.body)) {
            Ok(response) => response,
            Err(e) => return (None, self.runtime_err(e.into())),
        };
        let Some(token) = response.tlvs.bytes(oservice::tag::LOGIN_COOKIE) else {
            return (None, Some(ERR_INTERNAL.to_string()));
        };

        let chat_sess = match self.auth.register_chat_session(token) {
            Ok(chat_sess) => chat_sess,
            Err(e) => return (None, self.runtime_err(e)),
        };

        let chat_id = registry.add(IcbmRoomInfo {
            exchange: room.exchange,
            cookie: room.cookie,
            instance: room.instance,
        });
        registry.register_session(chat_id, chat_sess.clone());

        if let Err(e) = self.oservice_chat.client_online(&chat_sess, Default::default()) {
            return (None, self.runtime_err(e));
        }

        (Some(chat_id), Some(format!("CHAT_JOIN:{chat_id}:{room_name}")))
    }

    /// `toc_chat_send <chat id> <message>`: reflection is always on in TOC,
    /// so the client renders its own message from the returned CHAT_IN.
    pub fn chat_send(&self, registry: &ChatIdRegistry, tokens: &[String]) -> Option<String> {
        let (fixed, _) = match parse_args(tokens, "toc_chat_send", 2) {
            Ok(parsed) => parsed,
            Err(e) => return self.runtime_err(e.into()),
        };
        let Ok(chat_id) = fixed[0].parse::<usize>() else {
            return Some(ERR_INTERNAL.to_string());
        };
        let Some(chat_sess) = registry.session(chat_id) else {
            return Some(ERR_INTERNAL.to_string());
        };

        let mut body = chat::ChannelMsgToHost {
            cookie: rand::random(),
            channel: icbm::channel::MIME,
            tlvs: TlvBlock::default(),
        };
        // TLV order matters for AIM 2.x; keep reflection first
        body.tlvs.append(Tlv::u8(chat::tag::ENABLE_REFLECTION, 1));
        body.tlvs.append(Tlv::new(chat::tag::PUBLIC_WHISPER, Vec::new()));
        body.tlvs.append(Tlv::new(
            chat::tag::MESSAGE_INFO,
            chat::encode_chat_message_text(&fixed[1]),
        ));

        let frame = SnacFrame::new(foodgroup::CHAT, chat::subgroup::CHANNEL_MSG_TO_HOST);
        let reply = match self.chat.channel_msg_to_host(&chat_sess, frame, body) {
            Ok(Some(reply)) => reply,
            Ok(None) => return Some(ERR_INTERNAL.to_string()),
            Err(e) => return self.runtime_err(e),
        };
        match chat_in_line(chat_id, &reply.body) {
            Ok(line) => Some(line),
            Err(e) => self.runtime_err(e),
        }
    }

    /// `toc_chat_leave <chat id>`.
    pub fn chat_leave(&self, registry: &ChatIdRegistry, tokens: &[String]) -> Option<String> {
        let (fixed, _) = match parse_args(tokens, "toc_chat_leave", 1) {
            Ok(parsed) => parsed,
            Err(e) => return self.runtime_err(e.into()),
        };
        let Ok(chat_id) = fixed[0].parse::<usize>() else {
            return Some(ERR_INTERNAL.to_string());
        };
        let Some(chat_sess) = registry.session(chat_id) else {
            return Some(ERR_INTERNAL.to_string());
        };
        self.auth.signout_chat(&chat_sess);
        Some(format!("CHAT_LEFT:{chat_id}"))
    }

    /// `toc_chat_invite <chat id> <message> <user>...`.
    pub fn chat_invite(
        &self,
        sess: &Arc<Session>,
        registry: &ChatIdRegistry,
        tokens: &[String],
    ) -> Option<String> {
        let (fixed, guests) = match parse_args(tokens, "toc_chat_invite", 2) {
            Ok(parsed) => parsed,
            Err(e) => return self.runtime_err(e.into()),
        };
        let Ok(chat_id) = fixed[0].parse::<usize>() else {
            return Some(ERR_INTERNAL.to_string());
        };
        let Some(room) = registry.room(chat_id) else {
            return Some(ERR_INTERNAL.to_string());
        };

        for guest in guests {
            let mut body = icbm::ChannelMsgToHost {
                cookie: rand::random(),
                channel: icbm::channel::RENDEZVOUS,
                screen_name: guest.clone(),
                tlvs: TlvBlock::default(),
            };
            body.tlvs
                .append(Tlv::new(icbm::tag::DATA, encode_chat_invite(&room, &fixed[1])));
            let frame = SnacFrame::new(foodgroup::ICBM, icbm::subgroup::CHANNEL_MSG_TO_HOST);
            if let Err(e) = self.icbm.channel_msg_to_host(sess, frame, body) {
                return self.runtime_err(e);
            }
        }
        None
    }

    /// Sign out: departure notifications, session removal, chat cleanup.
    pub fn signout(&self, sess: &Arc<Session>, registry: &ChatIdRegistry) {
        for chat_sess in registry.all_sessions() {
            self.auth.signout_chat(&chat_sess);
        }
        self.auth.signout(sess);
    }

    fn http_auth_token(&self, ident: &IdentScreenName) -> Result<String, ServerError> {
        let token = self.deps.baker.issue(ident.as_str().as_bytes())?;
        Ok(hex::encode(token))
    }

    fn runtime_err(&self, e: ServerError) -> Option<String> {
        Some(self.runtime_err_str(e))
    }

    fn runtime_err_str(&self, e: ServerError) -> String {
        tracing::error!(error = %e, "internal service error");
        ERR_INTERNAL.to_string()
    }
}

fn room_from_nav_reply(body: &[u8]) -> Result<RoomInfoUpdate, ServerError> {
    let nav = NavInfo::decode(&mut Bytes::copy_from_slice(body))?;
    let raw = nav
        .tlvs
        .bytes(chat_nav::tag::ROOM_INFO)
        .ok_or(ServerError::Handshake("missing room info"))?;
    Ok(RoomInfoUpdate::decode(&mut Bytes::copy_from_slice(raw))?)
}

/// Render a reflected chat message as a CHAT_IN line.
pub fn chat_in_line(chat_id: usize, body: &[u8]) -> Result<String, ServerError> {
    let msg = chat::ChannelMsgToClient::decode(&mut Bytes::copy_from_slice(body))?;
    let sender_raw = msg
        .tlvs
        .bytes(chat::tag::SENDER_INFORMATION)
        .ok_or(ServerError::Handshake("missing sender information"))?;
    let sender =
        parlor_shared::wire::TlvUserInfo::decode(&mut Bytes::copy_from_slice(sender_raw))?;
    let text = msg
        .tlvs
        .bytes(chat::tag::MESSAGE_INFO)
        .ok_or(ServerError::Handshake("missing message info"))
        .and_then(|raw| chat::decode_chat_message_text(raw).map_err(Into::into))?;
    Ok(format!("CHAT_IN:{chat_id}:{}:F:{text}", sender.screen_name))
}

// A chat invite rides ICBM channel 2 as an opaque rendezvous blob:
// [type:u16][cookie:8][capability:16] then TLVs (10: sequence, 12: invite
// text, 10001: room selector).

const INVITE_TLV_SEQUENCE: u16 = 10;
const INVITE_TLV_MESSAGE: u16 = 12;
const INVITE_TLV_ROOM_INFO: u16 = 10001;

pub fn encode_chat_invite(room: &IcbmRoomInfo, msg: &str) -> Vec<u8> {
    let mut selector = Vec::new();
    RoomSelector {
        exchange: room.exchange,
        cookie: room.cookie.clone(),
        instance: room.instance,
    }
    .encode(&mut selector);

    let mut buf = Vec::new();
    buf.put_u16(0);
    buf.put_slice(&[0u8; 8]);
    buf.put_slice(&CAP_CHAT);
    let mut tlvs = TlvBlock::default();
    tlvs.append(Tlv::u16(INVITE_TLV_SEQUENCE, 1));
    tlvs.append(Tlv::string(INVITE_TLV_MESSAGE, msg));
    tlvs.append(Tlv::new(INVITE_TLV_ROOM_INFO, selector));
    tlvs.encode_rest(&mut buf);
    buf
}

pub fn decode_chat_invite(data: &[u8]) -> Result<(IcbmRoomInfo, String), ServerError> {
    let mut buf = Bytes::copy_from_slice(data);
    if buf.remaining() < 2 + 8 + 16 {
        return Err(parlor_shared::WireError::Truncated {
            needed: 26,
            remaining: buf.remaining(),
        }
        .into());
    }
    let _type = prim::read_u16(&mut buf).map_err(ServerError::Wire)?;
    buf.advance(8);
    let mut capability = [0u8; 16];
    capability.copy_from_slice(&buf.split_to(16));
    if capability != CAP_CHAT {
        return Err(ServerError::Handshake("rendezvous is not a chat invite"));
    }

    let tlvs = TlvBlock::decode_rest(&mut buf).map_err(ServerError::Wire)?;
    let msg = tlvs.string(INVITE_TLV_MESSAGE).unwrap_or_default();
    let raw = tlvs
        .bytes(INVITE_TLV_ROOM_INFO)
        .ok_or(ServerError::Handshake("missing room selector"))?;
    let selector = RoomSelector::decode(&mut Bytes::copy_from_slice(raw))
        .map_err(ServerError::Wire)?;
    Ok((
        IcbmRoomInfo {
            exchange: selector.exchange,
            cookie: selector.cookie,
            instance: selector.instance,
        },
        msg,
    ))
}

fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => out.push(b as char),
            b' ' => out.push('+'),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}
