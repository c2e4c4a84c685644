//! Routes inbound SNACs to food-group services.
//!
//! Each connection owns a dispatcher. Unknown (food group, sub group)
//! pairs answer with a "not supported" SNAC error and leave the connection
//! up; malformed bodies bubble up as fatal protocol errors.

use std::sync::Arc;

use bytes::Bytes;

use parlor_shared::wire::bodies::{
    admin, bart, buddy, chat, chat_nav, feedbag, icbm, locate, oservice, permit_deny,
};
use parlor_shared::wire::snac::{errcode, foodgroup, SnacError};
use parlor_shared::wire::{SnacFrame, SnacMessage};

use crate::error::Result;
use crate::services::admin::AdminService;
use crate::services::bart::BartService;
use crate::services::buddy::BuddyService;
use crate::services::chat::ChatService;
use crate::services::chat_nav::ChatNavService;
use crate::services::feedbag::FeedbagService;
use crate::services::icbm::IcbmService;
use crate::services::locate::LocateService;
use crate::services::oservice::{Endpoint, OServiceService};
use crate::services::permit_deny::PermitDenyService;
use crate::services::Deps;
use crate::session::Session;

pub struct Dispatcher {
    oservice: OServiceService,
    locate: LocateService,
    buddy: BuddyService,
    icbm: IcbmService,
    permit_deny: PermitDenyService,
    chat_nav: ChatNavService,
    chat: ChatService,
    feedbag: FeedbagService,
    bart: BartService,
    admin: AdminService,
}

impl Dispatcher {
    pub fn new(deps: Deps, endpoint: Endpoint) -> Self {
        Self {
            oservice: OServiceService::new(deps.clone(), endpoint),
            locate: LocateService::new(deps.clone()),
            buddy: BuddyService::new(deps.clone()),
            icbm: IcbmService::new(deps.clone()),
            permit_deny: PermitDenyService::new(deps.clone()),
            chat_nav: ChatNavService::new(deps.clone()),
            chat: ChatService::new(deps.clone()),
            feedbag: FeedbagService::new(deps.clone()),
            bart: BartService::new(deps.clone()),
            admin: AdminService::new(deps),
        }
    }

    pub fn host_online(&self) -> SnacMessage {
        self.oservice.host_online()
    }

    /// Handle one inbound SNAC, returning at most one reply to enqueue.
    pub async fn dispatch(
        &self,
        sess: &Arc<Session>,
        frame: SnacFrame,
        mut body: Bytes,
    ) -> Result<Option<SnacMessage>> {
        use foodgroup as fg;

        let reply = match (frame.food_group, frame.sub_group) {
            // OService
            (fg::OSERVICE, oservice::subgroup::CLIENT_ONLINE) => {
                let body = oservice::ClientOnline::decode(&mut body)?;
                self.oservice.client_online(sess, body)?;
                None
            }
            (fg::OSERVICE, oservice::subgroup::SERVICE_REQUEST) => {
                let body = oservice::ServiceRequest::decode(&mut body)?;
                Some(self.oservice.service_request(sess, frame, body)?)
            }
            (fg::OSERVICE, oservice::subgroup::RATE_PARAMS_QUERY) => {
                Some(self.oservice.rate_params_query(frame))
            }
            (fg::OSERVICE, oservice::subgroup::RATE_PARAMS_SUB_ADD) => {
                let body = oservice::RateParamsSubAdd::decode(&mut body)?;
                self.oservice.rate_params_sub_add(body);
                None
            }
            (fg::OSERVICE, oservice::subgroup::USER_INFO_QUERY) => {
                Some(self.oservice.user_info_query(sess, frame))
            }
            (fg::OSERVICE, oservice::subgroup::IDLE_NOTIFICATION) => {
                let body = oservice::IdleNotification::decode(&mut body)?;
                self.oservice.idle_notification(sess, body)?;
                None
            }
            (fg::OSERVICE, oservice::subgroup::CLIENT_VERSIONS) => {
                let body = oservice::Versions::decode(&mut body)?;
                Some(self.oservice.client_versions(frame, body))
            }
            (fg::OSERVICE, oservice::subgroup::SET_USER_INFO_FIELDS) => {
                let body = oservice::SetUserInfoFields::decode(&mut body)?;
                Some(self.oservice.set_user_info_fields(sess, frame, body)?)
            }

            // Locate
            (fg::LOCATE, locate::subgroup::RIGHTS_QUERY) => Some(self.locate.rights_query(frame)),
            (fg::LOCATE, locate::subgroup::SET_INFO) => {
                let body = locate::SetInfo::decode(&mut body)?;
                self.locate.set_info(sess, body)?;
                None
            }
            (fg::LOCATE, locate::subgroup::USER_INFO_QUERY) => {
                let body = locate::UserInfoQuery::decode(&mut body)?;
                Some(self.locate.user_info_query(sess, frame, body)?)
            }
            (fg::LOCATE, locate::subgroup::SET_DIR_INFO) => {
                let body = locate::SetDirInfo::decode(&mut body)?;
                Some(self.locate.set_dir_info(sess, frame, body)?)
            }
            (fg::LOCATE, locate::subgroup::GET_DIR_INFO) => {
                let body = locate::GetDirInfo::decode(&mut body)?;
                Some(self.locate.get_dir_info(frame, body)?)
            }

            // Buddy
            (fg::BUDDY, buddy::subgroup::RIGHTS_QUERY) => Some(self.buddy.rights_query(frame)),
            (fg::BUDDY, buddy::subgroup::ADD_BUDDIES) => {
                let body = buddy::AddBuddies::decode(&mut body)?;
                self.buddy.add_buddies(sess, body)?;
                None
            }
            (fg::BUDDY, buddy::subgroup::DEL_BUDDIES) => {
                let body = buddy::DelBuddies::decode(&mut body)?;
                self.buddy.del_buddies(sess, body);
                None
            }

            // ICBM
            (fg::ICBM, icbm::subgroup::ADD_PARAMETERS) => {
                let body = icbm::AddParameters::decode(&mut body)?;
                self.icbm.add_parameters(body);
                None
            }
            (fg::ICBM, icbm::subgroup::PARAMETER_QUERY) => Some(self.icbm.parameter_query(frame)),
            (fg::ICBM, icbm::subgroup::CHANNEL_MSG_TO_HOST) => {
                let body = icbm::ChannelMsgToHost::decode(&mut body)?;
                self.icbm.channel_msg_to_host(sess, frame, body)?
            }
            (fg::ICBM, icbm::subgroup::EVIL_REQUEST) => {
                let body = icbm::EvilRequest::decode(&mut body)?;
                Some(self.icbm.evil_request(sess, frame, body)?)
            }

            // Permit/Deny
            (fg::PERMIT_DENY, permit_deny::subgroup::RIGHTS_QUERY) => {
                Some(self.permit_deny.rights_query(frame))
            }
            (fg::PERMIT_DENY, permit_deny::subgroup::ADD_PERMIT_ENTRIES) => {
                let body = permit_deny::ListEntries::decode(&mut body)?;
                self.permit_deny.add_permit_entries(sess, body)?;
                None
            }
            (fg::PERMIT_DENY, permit_deny::subgroup::DEL_PERMIT_ENTRIES) => {
                let body = permit_deny::ListEntries::decode(&mut body)?;
                self.permit_deny.del_permit_entries(sess, body)?;
                None
            }
            (fg::PERMIT_DENY, permit_deny::subgroup::ADD_DENY_ENTRIES) => {
                let body = permit_deny::ListEntries::decode(&mut body)?;
                self.permit_deny.add_deny_entries(sess, body)?;
                None
            }
            (fg::PERMIT_DENY, permit_deny::subgroup::DEL_DENY_ENTRIES) => {
                let body = permit_deny::ListEntries::decode(&mut body)?;
                self.permit_deny.del_deny_entries(sess, body)?;
                None
            }

            // ChatNav
            (fg::CHAT_NAV, chat_nav::subgroup::REQUEST_CHAT_RIGHTS) => {
                Some(self.chat_nav.request_chat_rights(frame))
            }
            (fg::CHAT_NAV, chat_nav::subgroup::REQUEST_ROOM_INFO) => {
                let body = chat_nav::RequestRoomInfo::decode(&mut body)?;
                Some(self.chat_nav.request_room_info(frame, body)?)
            }
            (fg::CHAT_NAV, chat_nav::subgroup::CREATE_ROOM) => {
                let body = chat::RoomInfoUpdate::decode(&mut body)?;
                Some(self.chat_nav.create_room(sess, frame, body)?)
            }

            // Chat
            (fg::CHAT, chat::subgroup::CHANNEL_MSG_TO_HOST) => {
                let body = chat::ChannelMsgToHost::decode(&mut body)?;
                self.chat.channel_msg_to_host(sess, frame, body)?
            }

            // Feedbag
            (fg::FEEDBAG, feedbag::subgroup::RIGHTS_QUERY) => {
                Some(self.feedbag.rights_query(frame))
            }
            (fg::FEEDBAG, feedbag::subgroup::QUERY) => Some(self.feedbag.query(sess, frame)?),
            (fg::FEEDBAG, feedbag::subgroup::QUERY_IF_MODIFIED) => {
                let body = feedbag::QueryIfModified::decode(&mut body)?;
                Some(self.feedbag.query_if_modified(sess, frame, body)?)
            }
            (fg::FEEDBAG, feedbag::subgroup::INSERT_ITEM)
            | (fg::FEEDBAG, feedbag::subgroup::UPDATE_ITEM) => {
                let body = feedbag::ItemMutation::decode(&mut body)?;
                Some(self.feedbag.upsert_item(sess, frame, body)?)
            }
            (fg::FEEDBAG, feedbag::subgroup::DELETE_ITEM) => {
                let body = feedbag::ItemMutation::decode(&mut body)?;
                Some(self.feedbag.delete_item(sess, frame, body)?)
            }
            (fg::FEEDBAG, feedbag::subgroup::USE)
            | (fg::FEEDBAG, feedbag::subgroup::START_CLUSTER)
            | (fg::FEEDBAG, feedbag::subgroup::END_CLUSTER) => {
                self.feedbag.no_op();
                None
            }

            // BART
            (fg::BART, bart::subgroup::UPLOAD_QUERY) => {
                let body = bart::UploadQuery::decode(&mut body)?;
                Some(self.bart.upload(frame, body).await?)
            }
            (fg::BART, bart::subgroup::DOWNLOAD_QUERY) => {
                let body = bart::DownloadQuery::decode(&mut body)?;
                Some(self.bart.download(frame, body).await?)
            }

            // Admin
            (fg::ADMIN, admin::subgroup::INFO_QUERY) => {
                let body = admin::InfoRequest::decode(&mut body)?;
                Some(self.admin.info_query(sess, frame, body)?)
            }
            (fg::ADMIN, admin::subgroup::INFO_CHANGE_REQUEST) => {
                let body = admin::InfoRequest::decode(&mut body)?;
                Some(self.admin.info_change_request(sess, frame, body)?)
            }
            (fg::ADMIN, admin::subgroup::CONFIRM_REQUEST) => {
                Some(self.admin.confirm_request(sess, frame)?)
            }

            (food_group, sub_group) => {
                tracing::debug!(
                    food_group = format_args!("{food_group:#06X}"),
                    sub_group = format_args!("{sub_group:#06X}"),
                    "unsupported SNAC"
                );
                Some(not_supported(frame))
            }
        };
        Ok(reply)
    }
}

fn not_supported(frame: SnacFrame) -> SnacMessage {
    let mut body = Vec::new();
    SnacError::new(errcode::NOT_SUPPORTED_BY_HOST).encode(&mut body);
    SnacMessage::new(SnacFrame::reply_to(frame, 0x0001), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testutil::test_deps;
    use parlor_shared::DisplayScreenName;

    #[tokio::test]
    async fn test_unknown_snac_is_nonfatal_error() {
        let (deps, _dir) = test_deps().await;
        let dispatcher = Dispatcher::new(deps.clone(), Endpoint::Bos);
        let sess = deps.sessions.add_session(DisplayScreenName::new("alice"));

        let frame = SnacFrame::new(0x0045, 0x0099);
        let reply = dispatcher
            .dispatch(&sess, frame, Bytes::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.frame.food_group, 0x0045);
        assert_eq!(reply.frame.sub_group, 0x0001);
        let err = SnacError::decode(&mut Bytes::from(reply.body)).unwrap();
        assert_eq!(err.code, errcode::NOT_SUPPORTED_BY_HOST);
    }

    #[tokio::test]
    async fn test_rate_params_routed() {
        let (deps, _dir) = test_deps().await;
        let dispatcher = Dispatcher::new(deps.clone(), Endpoint::Bos);
        let sess = deps.sessions.add_session(DisplayScreenName::new("alice"));

        let frame = SnacFrame::new(foodgroup::OSERVICE, oservice::subgroup::RATE_PARAMS_QUERY);
        let reply = dispatcher
            .dispatch(&sess, frame, Bytes::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.frame.sub_group, oservice::subgroup::RATE_PARAMS_REPLY);
    }

    #[tokio::test]
    async fn test_malformed_body_is_fatal() {
        let (deps, _dir) = test_deps().await;
        let dispatcher = Dispatcher::new(deps.clone(), Endpoint::Bos);
        let sess = deps.sessions.add_session(DisplayScreenName::new("alice"));

        // EvilRequest promises a screen name that isn't there
        let frame = SnacFrame::new(foodgroup::ICBM, icbm::subgroup::EVIL_REQUEST);
        let result = dispatcher
            .dispatch(&sess, frame, Bytes::from_static(&[0x00, 0x00, 0x20]))
            .await;
        assert!(result.is_err());
    }
}
