//! OService food group: onboarding handshake, cross-service routing, and
//! own-state updates. One instance serves each endpoint flavor.

use std::sync::Arc;

use bytes::Bytes;

use parlor_shared::cookie::{BosCookie, ChatLoginCookie};
use parlor_shared::wire::bodies::icbm;
use parlor_shared::wire::bodies::oservice::{
    self, subgroup, tag, ClientOnline, HostOnline, IdleNotification, RateClass, RateGroup,
    RateParamsReply, RoomSelector, ServiceRequest, ServiceResponse, SetUserInfoFields,
    UserInfoUpdate, Versions,
};
use parlor_shared::wire::snac::{errcode, foodgroup, SnacError};
use parlor_shared::wire::tlv::Tlv;
use parlor_shared::wire::userinfo::{userflag, TlvUserInfo};
use parlor_shared::wire::{SnacFrame, SnacMessage};

use crate::error::Result;
use crate::services::buddy::BuddyService;
use crate::services::{chat, Deps};
use crate::session::Session;

/// Which listener this OService instance fronts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Bos,
    Chat,
    ChatNav,
    Bart,
    Admin,
}

impl Endpoint {
    /// Food groups advertised in HostOnline.
    pub fn food_groups(self) -> Vec<u16> {
        match self {
            Endpoint::Bos => vec![
                foodgroup::OSERVICE,
                foodgroup::LOCATE,
                foodgroup::BUDDY,
                foodgroup::ICBM,
                foodgroup::PERMIT_DENY,
                foodgroup::CHAT_NAV,
                foodgroup::FEEDBAG,
                foodgroup::BART,
            ],
            Endpoint::Chat => vec![foodgroup::OSERVICE, foodgroup::CHAT],
            Endpoint::ChatNav => vec![foodgroup::OSERVICE, foodgroup::CHAT_NAV],
            Endpoint::Bart => vec![foodgroup::OSERVICE, foodgroup::BART],
            Endpoint::Admin => vec![foodgroup::OSERVICE, foodgroup::ADMIN],
        }
    }
}

pub struct OServiceService {
    deps: Deps,
    buddy: BuddyService,
    endpoint: Endpoint,
}

impl OServiceService {
    pub fn new(deps: Deps, endpoint: Endpoint) -> Self {
        Self {
            buddy: BuddyService::new(deps.clone()),
            deps,
            endpoint,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// First SNAC on every connection: the food groups served here.
    pub fn host_online(&self) -> SnacMessage {
        let body = HostOnline {
            food_groups: self.endpoint.food_groups(),
        };
        let mut payload = Vec::new();
        body.encode(&mut payload);
        SnacMessage::new(
            SnacFrame::new(foodgroup::OSERVICE, subgroup::HOST_ONLINE),
            payload,
        )
    }

    /// SNAC(0x01,0x04): hand the client an address and cookie for another
    /// service. Chat requests name the room; the issued cookie embeds it.
    pub fn service_request(
        &self,
        sess: &Arc<Session>,
        frame: SnacFrame,
        body: ServiceRequest,
    ) -> Result<SnacMessage> {
        let (addr, token) = match body.food_group {
            foodgroup::CHAT => {
                let raw = body
                    .tlvs
                    .bytes(tag::ROOM_INFO)
                    .ok_or(parlor_shared::WireError::MissingTlv(tag::ROOM_INFO))?;
                let selector = RoomSelector::decode(&mut Bytes::copy_from_slice(raw))?;
                if self.deps.db.chat_room_by_cookie(&selector.cookie)?.is_none() {
                    return Ok(error_reply(frame, errcode::NO_MATCH));
                }
                let cookie = ChatLoginCookie {
                    screen_name: sess.display().clone(),
                    chat_cookie: selector.cookie,
                };
                (
                    self.deps.config.chat_addr(),
                    self.deps.baker.issue_payload(&cookie)?,
                )
            }
            foodgroup::CHAT_NAV | foodgroup::BART | foodgroup::ADMIN => {
                let cookie = BosCookie {
                    screen_name: sess.display().clone(),
                    client_id: sess.client_id(),
                };
                let addr = match body.food_group {
                    foodgroup::CHAT_NAV => self.deps.config.chat_nav_addr(),
                    foodgroup::BART => self.deps.config.bart_addr(),
                    _ => self.deps.config.admin_addr(),
                };
                (addr, self.deps.baker.issue_payload(&cookie)?)
            }
            _ => return Ok(error_reply(frame, errcode::SERVICE_UNAVAILABLE)),
        };

        let mut response = ServiceResponse::default();
        response.tlvs.append(Tlv::u16(tag::GROUP_ID, body.food_group));
        response.tlvs.append(Tlv::string(tag::RECONNECT_HERE, &addr));
        response.tlvs.append(Tlv::new(tag::LOGIN_COOKIE, token));
        let mut payload = Vec::new();
        response.encode(&mut payload);
        Ok(SnacMessage::new(
            SnacFrame::reply_to(frame, subgroup::SERVICE_RESPONSE),
            payload,
        ))
    }

    /// SNAC(0x01,0x06): rate classes are advertised but not enforced.
    pub fn rate_params_query(&self, frame: SnacFrame) -> SnacMessage {
        let mut pairs = Vec::new();
        for fg in self.endpoint.food_groups() {
            for sg in 0x0001..=0x0021u16 {
                pairs.push((fg, sg));
            }
        }
        let body = RateParamsReply {
            classes: vec![RateClass::unlimited(1)],
            groups: vec![RateGroup { id: 1, pairs }],
        };
        let mut payload = Vec::new();
        body.encode(&mut payload);
        SnacMessage::new(
            SnacFrame::reply_to(frame, subgroup::RATE_PARAMS_REPLY),
            payload,
        )
    }

    /// SNAC(0x01,0x08): client acks the advertised classes. No response.
    pub fn rate_params_sub_add(&self, _body: oservice::RateParamsSubAdd) {}

    /// SNAC(0x01,0x17): version negotiation; echo our supported versions.
    pub fn client_versions(&self, frame: SnacFrame, _body: Versions) -> SnacMessage {
        let body = Versions {
            pairs: self.endpoint.food_groups().iter().map(|fg| (*fg, 1)).collect(),
        };
        let mut payload = Vec::new();
        body.encode(&mut payload);
        SnacMessage::new(SnacFrame::reply_to(frame, subgroup::HOST_VERSIONS), payload)
    }

    /// SNAC(0x01,0x02): the client finished onboarding. On BOS this flips
    /// the session online, announces it to watchers, and drains the offline
    /// message queue in sent order. On chat it joins the room roster.
    pub fn client_online(&self, sess: &Arc<Session>, _body: ClientOnline) -> Result<()> {
        sess.set_signon_complete();
        match self.endpoint {
            Endpoint::Chat => chat::alert_user_joined(&self.deps, sess)?,
            Endpoint::Bos => {
                self.buddy.broadcast_arrival(sess)?;
                self.deliver_offline_messages(sess)?;
            }
            // secondary services host request/reply traffic only; their
            // detached sessions are invisible to presence
            _ => {}
        }
        Ok(())
    }

    fn deliver_offline_messages(&self, sess: &Arc<Session>) -> Result<()> {
        let queued = self.deps.db.offline_messages(sess.ident())?;
        if queued.is_empty() {
            return Ok(());
        }
        tracing::debug!(ident = %sess.ident(), count = queued.len(), "delivering offline messages");

        for stored in &queued {
            let original =
                match icbm::ChannelMsgToHost::decode(&mut Bytes::from(stored.payload.clone())) {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::error!(error = %e, "skipping corrupt offline message");
                        continue;
                    }
                };
            let sender_display = match self.deps.db.user(&stored.sender)? {
                Some(user) => user.display.as_str().to_string(),
                None => stored.sender.to_string(),
            };
            let mut outbound = icbm::ChannelMsgToClient {
                cookie: original.cookie,
                channel: original.channel,
                sender_info: TlvUserInfo::new(sender_display, 0),
                tlvs: Default::default(),
            };
            for tlv in &original.tlvs.tlvs {
                if tlv.tag != icbm::tag::REQUEST_HOST_ACK && tlv.tag != icbm::tag::STORE_OFFLINE {
                    outbound.tlvs.append(tlv.clone());
                }
            }
            let mut payload = Vec::new();
            outbound.encode(&mut payload);
            sess.relay(SnacMessage::new(
                SnacFrame::new(foodgroup::ICBM, icbm::subgroup::CHANNEL_MSG_TO_CLIENT),
                payload,
            ));
        }

        self.deps.db.delete_offline_messages(sess.ident())?;
        Ok(())
    }

    /// SNAC(0x01,0x11): idle state feeds the user-info idle TLV. A change
    /// is presence-visible, so watchers get a fresh arrival.
    pub fn idle_notification(&self, sess: &Arc<Session>, body: IdleNotification) -> Result<()> {
        sess.set_idle_secs(body.idle_secs);
        if sess.signon_complete() {
            self.buddy.broadcast_arrival(sess)?;
        }
        Ok(())
    }

    /// SNAC(0x01,0x0E): the client asks for its own user info.
    pub fn user_info_query(&self, sess: &Arc<Session>, frame: SnacFrame) -> SnacMessage {
        user_info_update(sess, frame)
    }

    /// SNAC(0x01,0x1E): status bits. The invisible bit drives the
    /// visibility re-broadcast; everything else is accepted silently.
    pub fn set_user_info_fields(
        &self,
        sess: &Arc<Session>,
        frame: SnacFrame,
        body: SetUserInfoFields,
    ) -> Result<SnacMessage> {
        if let Some(status) = body.tlvs.u32(tag::USER_STATUS) {
            let invisible = status as u16 & userflag::INVISIBLE != 0;
            let was_invisible = sess.invisible();
            sess.set_invisible(invisible);
            if sess.signon_complete() && invisible != was_invisible {
                self.buddy.broadcast_visibility(sess, true)?;
            }
        }
        Ok(user_info_update(sess, frame))
    }
}

fn user_info_update(sess: &Arc<Session>, frame: SnacFrame) -> SnacMessage {
    let body = UserInfoUpdate {
        user_info: sess.user_info(),
    };
    let mut payload = Vec::new();
    body.encode(&mut payload);
    SnacMessage::new(
        SnacFrame::reply_to(frame, subgroup::USER_INFO_UPDATE),
        payload,
    )
}

fn error_reply(frame: SnacFrame, code: u16) -> SnacMessage {
    let mut body = Vec::new();
    SnacError::new(code).encode(&mut body);
    SnacMessage::new(SnacFrame::reply_to(frame, subgroup::ERR), body)
}
