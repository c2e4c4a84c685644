//! Admin food group: account info and confirmation.

use std::sync::Arc;

use parlor_shared::wire::bodies::admin::{
    self, confirmstatus, subgroup, ConfirmReply, InfoReply, InfoRequest,
};
use parlor_shared::wire::snac::{errcode, SnacError};
use parlor_shared::wire::tlv::Tlv;
use parlor_shared::wire::{SnacFrame, SnacMessage};

use crate::error::Result;
use crate::services::Deps;
use crate::session::Session;

pub struct AdminService {
    deps: Deps,
}

impl AdminService {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    /// SNAC(0x07,0x02): return the requested account fields.
    pub fn info_query(
        &self,
        sess: &Arc<Session>,
        frame: SnacFrame,
        body: InfoRequest,
    ) -> Result<SnacMessage> {
        let Some(user) = self.deps.db.user(sess.ident())? else {
            return Ok(error_reply(frame, errcode::NOT_LOGGED_IN));
        };

        let mut reply = InfoReply {
            permissions: 3,
            tlvs: Default::default(),
        };
        for tlv in &body.tlvs.tlvs {
            match tlv.tag {
                admin::tag::SCREEN_NAME => reply
                    .tlvs
                    .append(Tlv::string(admin::tag::SCREEN_NAME, user.display.as_str())),
                admin::tag::EMAIL => {
                    reply.tlvs.append(Tlv::string(admin::tag::EMAIL, &user.email))
                }
                admin::tag::REG_STATUS => reply
                    .tlvs
                    .append(Tlv::u16(admin::tag::REG_STATUS, user.reg_status)),
                _ => {}
            }
        }

        let mut payload = Vec::new();
        reply.encode(&mut payload);
        Ok(SnacMessage::new(
            SnacFrame::reply_to(frame, subgroup::INFO_REPLY),
            payload,
        ))
    }

    /// SNAC(0x07,0x04): only the email field is mutable here.
    pub fn info_change_request(
        &self,
        sess: &Arc<Session>,
        frame: SnacFrame,
        body: InfoRequest,
    ) -> Result<SnacMessage> {
        if let Some(email) = body.tlvs.string(admin::tag::EMAIL) {
            self.deps.db.set_email(sess.ident(), &email)?;
        }
        let mut reply = self.info_query(sess, frame, body)?;
        reply.frame.sub_group = subgroup::INFO_CHANGE_REPLY;
        Ok(reply)
    }

    /// SNAC(0x07,0x06): there is no mail loop; confirmation is immediate.
    pub fn confirm_request(&self, sess: &Arc<Session>, frame: SnacFrame) -> Result<SnacMessage> {
        let already = self.deps.db.confirmed(sess.ident()).unwrap_or(false);
        let status = if already {
            confirmstatus::ALREADY_CONFIRMED
        } else {
            self.deps.db.set_confirmed(sess.ident(), true)?;
            confirmstatus::CONFIRMED
        };
        let mut payload = Vec::new();
        ConfirmReply { status }.encode(&mut payload);
        Ok(SnacMessage::new(
            SnacFrame::reply_to(frame, subgroup::CONFIRM_REPLY),
            payload,
        ))
    }
}

fn error_reply(frame: SnacFrame, code: u16) -> SnacMessage {
    let mut body = Vec::new();
    SnacError::new(code).encode(&mut body);
    SnacMessage::new(SnacFrame::reply_to(frame, subgroup::ERR), body)
}
