//! Locate food group: profiles, away messages, capabilities, directory.

use std::sync::Arc;

use parlor_shared::wire::bodies::locate::{
    self, dirtag, querytype, subgroup, tag, GetDirInfo, GetDirReply, SetDirInfo, SetDirReply,
    SetInfo, UserInfoQuery, UserInfoReply,
};
use parlor_shared::wire::snac::{errcode, SnacError};
use parlor_shared::wire::tlv::{Tlv, TlvBlock};
use parlor_shared::wire::userinfo::TlvUserInfo;
use parlor_shared::wire::{SnacFrame, SnacMessage};
use parlor_shared::IdentScreenName;
use parlor_store::{DirInfo, StoreError};

use crate::error::Result;
use crate::services::buddy::{blocked_between, BuddyService};
use crate::services::Deps;
use crate::session::Session;

const PROFILE_MIME: &str = "text/aolrtf; charset=\"us-ascii\"";

pub struct LocateService {
    deps: Deps,
    buddy: BuddyService,
}

impl LocateService {
    pub fn new(deps: Deps) -> Self {
        Self {
            buddy: BuddyService::new(deps.clone()),
            deps,
        }
    }

    /// SNAC(0x02,0x02).
    pub fn rights_query(&self, frame: SnacFrame) -> SnacMessage {
        let mut reply = locate::RightsReply::default();
        // max profile length, max capabilities
        reply.tlvs.append(Tlv::u16(0x0001, 4096));
        reply.tlvs.append(Tlv::u16(0x0002, 16));
        let mut body = Vec::new();
        reply.encode(&mut body);
        SnacMessage::new(SnacFrame::reply_to(frame, subgroup::RIGHTS_REPLY), body)
    }

    /// SNAC(0x02,0x04): profile, away message, and capability updates all
    /// arrive through the same TLV list.
    pub fn set_info(&self, sess: &Arc<Session>, body: SetInfo) -> Result<()> {
        if let Some(profile) = body.tlvs.string(tag::SIG_DATA) {
            match self.deps.db.set_profile(sess.ident(), &profile) {
                Ok(()) | Err(StoreError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }

        if let Some(away) = body.tlvs.string(tag::UNAVAILABLE_DATA) {
            sess.set_away_message(if away.is_empty() { None } else { Some(away) });
            // away state is presence-visible
            if sess.signon_complete() {
                self.buddy.broadcast_arrival(sess)?;
            }
        }

        if let Some(caps) = body.tlvs.bytes(tag::CAPABILITIES) {
            let parsed: Vec<[u8; 16]> = caps
                .chunks_exact(16)
                .map(|c| {
                    let mut uuid = [0u8; 16];
                    uuid.copy_from_slice(c);
                    uuid
                })
                .collect();
            sess.set_capabilities(parsed);
        }
        Ok(())
    }

    /// SNAC(0x02,0x05): another user's profile or away message. Blocked
    /// pairs and unknown accounts look identical to the requester.
    pub fn user_info_query(
        &self,
        sess: &Arc<Session>,
        frame: SnacFrame,
        body: UserInfoQuery,
    ) -> Result<SnacMessage> {
        let target_ident = IdentScreenName::new(&body.screen_name);
        if blocked_between(&self.deps, sess.ident(), &target_ident)? {
            return Ok(error_reply(frame, errcode::NOT_LOGGED_IN));
        }
        let Some(user) = self.deps.db.user(&target_ident)? else {
            return Ok(error_reply(frame, errcode::NOT_LOGGED_IN));
        };

        let target_sess = self.deps.sessions.retrieve(&target_ident);
        let user_info = match &target_sess {
            Some(online) => online.user_info(),
            None => TlvUserInfo::new(user.display.as_str(), 0),
        };

        let mut locate_info = TlvBlock::default();
        if body.request_type & querytype::PROFILE != 0 {
            locate_info.append(Tlv::string(tag::SIG_MIME, PROFILE_MIME));
            locate_info.append(Tlv::string(tag::SIG_DATA, &user.profile));
        }
        if body.request_type & querytype::AWAY_MESSAGE != 0 {
            let away = target_sess.and_then(|s| s.away_message()).unwrap_or_default();
            locate_info.append(Tlv::string(tag::UNAVAILABLE_MIME, PROFILE_MIME));
            locate_info.append(Tlv::string(tag::UNAVAILABLE_DATA, &away));
        }

        let reply = UserInfoReply {
            user_info,
            locate_info,
        };
        let mut payload = Vec::new();
        reply.encode(&mut payload);
        Ok(SnacMessage::new(
            SnacFrame::reply_to(frame, subgroup::USER_INFO_REPLY),
            payload,
        ))
    }

    /// SNAC(0x02,0x09).
    pub fn set_dir_info(
        &self,
        sess: &Arc<Session>,
        frame: SnacFrame,
        body: SetDirInfo,
    ) -> Result<SnacMessage> {
        let info = DirInfo {
            first_name: body.tlvs.string(dirtag::FIRST_NAME).unwrap_or_default(),
            middle_name: body.tlvs.string(dirtag::MIDDLE_NAME).unwrap_or_default(),
            last_name: body.tlvs.string(dirtag::LAST_NAME).unwrap_or_default(),
            maiden_name: body.tlvs.string(dirtag::MAIDEN_NAME).unwrap_or_default(),
            email: body.tlvs.string(dirtag::EMAIL).unwrap_or_default(),
            country: body.tlvs.string(dirtag::COUNTRY).unwrap_or_default(),
            state: body.tlvs.string(dirtag::STATE).unwrap_or_default(),
            city: body.tlvs.string(dirtag::CITY).unwrap_or_default(),
        };
        self.deps.db.set_dir_info(sess.ident(), &info)?;

        let mut payload = Vec::new();
        SetDirReply { result: 1 }.encode(&mut payload);
        Ok(SnacMessage::new(
            SnacFrame::reply_to(frame, subgroup::SET_DIR_REPLY),
            payload,
        ))
    }

    /// SNAC(0x02,0x0B).
    pub fn get_dir_info(&self, frame: SnacFrame, body: GetDirInfo) -> Result<SnacMessage> {
        let target = IdentScreenName::new(&body.screen_name);
        let info = self.deps.db.dir_info(&target)?.unwrap_or_default();

        let mut fields = TlvBlock::default();
        fields.append(Tlv::string(dirtag::FIRST_NAME, &info.first_name));
        fields.append(Tlv::string(dirtag::MIDDLE_NAME, &info.middle_name));
        fields.append(Tlv::string(dirtag::LAST_NAME, &info.last_name));
        fields.append(Tlv::string(dirtag::MAIDEN_NAME, &info.maiden_name));
        fields.append(Tlv::string(dirtag::COUNTRY, &info.country));
        fields.append(Tlv::string(dirtag::STATE, &info.state));
        fields.append(Tlv::string(dirtag::CITY, &info.city));

        let reply = GetDirReply { status: 1, fields };
        let mut payload = Vec::new();
        reply.encode(&mut payload);
        Ok(SnacMessage::new(
            SnacFrame::reply_to(frame, subgroup::GET_DIR_REPLY),
            payload,
        ))
    }
}

fn error_reply(frame: SnacFrame, code: u16) -> SnacMessage {
    let mut body = Vec::new();
    SnacError::new(code).encode(&mut body);
    SnacMessage::new(SnacFrame::reply_to(frame, subgroup::ERR), body)
}
