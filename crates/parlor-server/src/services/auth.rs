//! Client login and session management. Supports BUCP (AIM 3.5-5.9)
//! challenge/response, FLAP roasted-password login (AIM 1.0-3.0, ICQ), and
//! the TOC roasting variant.

use std::sync::Arc;

use parlor_shared::cookie::{BosCookie, ChatLoginCookie};
use parlor_shared::wire::bodies::auth::{
    loginerr, subgroup, tag, BucpChallengeRequest, BucpChallengeResponse, BucpLoginRequest,
    BucpLoginResponse,
};
use parlor_shared::wire::flap::FlapSignonFrame;
use parlor_shared::wire::snac::foodgroup;
use parlor_shared::wire::tlv::{Tlv, TlvBlock};
use parlor_shared::wire::{SnacFrame, SnacMessage};
use parlor_shared::{DisplayScreenName, IdentScreenName};
use parlor_store::User;

use crate::error::{Result, ServerError};
use crate::services::buddy::BuddyService;
use crate::services::{chat, Deps};
use crate::session::Session;

/// Password assigned to accounts auto-created in DisableAuth mode.
const STUB_PASSWORD: &str = "welcome1";

pub struct AuthService {
    deps: Deps,
    buddy: BuddyService,
}

struct LoginProperties {
    screen_name: DisplayScreenName,
    client_id: String,
    password_hash: Option<Vec<u8>>,
    roasted_pass: Option<Vec<u8>>,
    is_toc_auth: bool,
}

impl LoginProperties {
    fn from_tlvs(tlvs: &TlvBlock) -> Result<Self> {
        let screen_name = tlvs
            .string(tag::SCREEN_NAME)
            .ok_or(parlor_shared::WireError::MissingTlv(tag::SCREEN_NAME))?;

        // older clients send a roasted password, newer clients a hash. ICQ
        // may omit the password TLV entirely when none is saved client-side.
        let mut roasted_pass = tlvs.bytes(tag::ROASTED_PASSWORD).map(|b| b.to_vec());
        let mut is_toc_auth = false;
        if let Some(toc_pass) = tlvs.bytes(tag::ROASTED_TOC_PASSWORD) {
            roasted_pass = Some(toc_pass.to_vec());
            is_toc_auth = true;
        }

        Ok(Self {
            screen_name: DisplayScreenName::new(screen_name),
            client_id: tlvs.string(tag::CLIENT_IDENTITY).unwrap_or_default(),
            password_hash: tlvs.bytes(tag::PASSWORD_HASH).map(|b| b.to_vec()),
            roasted_pass,
            is_toc_auth,
        })
    }
}

impl AuthService {
    pub fn new(deps: Deps) -> Self {
        Self {
            buddy: BuddyService::new(deps.clone()),
            deps,
        }
    }

    /// SNAC(0x17,0x06): hand out the MD5 salt for the requested account.
    /// Unknown accounts short-circuit to a login error unless auth is
    /// disabled, in which case a throwaway salt keeps the flow going.
    pub fn bucp_challenge(&self, body: BucpChallengeRequest) -> Result<SnacMessage> {
        let screen_name = body
            .tlvs
            .string(tag::SCREEN_NAME)
            .ok_or(parlor_shared::WireError::MissingTlv(tag::SCREEN_NAME))?;
        let ident = IdentScreenName::new(&screen_name);

        let auth_key = match self.deps.db.user(&ident)? {
            Some(user) => user.auth_key,
            None if self.deps.config.disable_auth => uuid::Uuid::new_v4().to_string(),
            None => {
                let mut tlvs = TlvBlock::default();
                tlvs.append(Tlv::u16(
                    tag::ERROR_SUBCODE,
                    loginerr::INVALID_USERNAME_OR_PASSWORD,
                ));
                let mut out = Vec::new();
                BucpLoginResponse { tlvs }.encode(&mut out);
                return Ok(SnacMessage::new(
                    SnacFrame::new(foodgroup::BUCP, subgroup::LOGIN_RESPONSE),
                    out,
                ));
            }
        };

        let mut out = Vec::new();
        BucpChallengeResponse { auth_key }.encode(&mut out);
        Ok(SnacMessage::new(
            SnacFrame::new(foodgroup::BUCP, subgroup::CHALLENGE_RESPONSE),
            out,
        ))
    }

    /// SNAC(0x17,0x02): validate the salted hash and mint a BOS cookie.
    pub fn bucp_login(&self, body: BucpLoginRequest) -> Result<SnacMessage> {
        let tlvs = self.login(&body.tlvs)?;
        let mut out = Vec::new();
        BucpLoginResponse { tlvs }.encode(&mut out);
        Ok(SnacMessage::new(
            SnacFrame::new(foodgroup::BUCP, subgroup::LOGIN_RESPONSE),
            out,
        ))
    }

    /// FLAP channel-1 login for AIM 1.0-3.0, ICQ, and TOC. The reply TLVs
    /// ride back on a signoff frame.
    pub fn flap_login(&self, signon: &FlapSignonFrame) -> Result<TlvBlock> {
        self.login(&signon.tlvs)
    }

    fn login(&self, tlvs: &TlvBlock) -> Result<TlvBlock> {
        let props = LoginProperties::from_tlvs(tlvs)?;
        let ident = props.screen_name.ident();

        let Some(user) = self.deps.db.user(&ident)? else {
            if self.deps.config.disable_auth {
                return self.create_stub_user(props);
            }
            let code = if props.screen_name.is_uin() {
                loginerr::ICQ_USER_ERR
            } else {
                loginerr::INVALID_USERNAME_OR_PASSWORD
            };
            return Ok(login_failure(&props, code));
        };

        if self.deps.config.disable_auth {
            return self.login_success(&props);
        }

        let login_ok = if let Some(hash) = &props.password_hash {
            user.validate_hash(hash)
        } else if props.is_toc_auth {
            props
                .roasted_pass
                .as_deref()
                .is_some_and(|p| user.validate_roasted_toc_pass(p))
        } else {
            props
                .roasted_pass
                .as_deref()
                .is_some_and(|p| user.validate_roasted_pass(p))
        };

        if !login_ok {
            return Ok(login_failure(&props, loginerr::INVALID_PASSWORD));
        }
        self.login_success(&props)
    }

    fn create_stub_user(&self, props: LoginProperties) -> Result<TlvBlock> {
        let validation = if props.screen_name.is_uin() {
            props.screen_name.validate_uin()
        } else {
            props.screen_name.validate_aim_handle()
        };
        if validation.is_err() {
            let code = if props.screen_name.is_uin() {
                loginerr::ICQ_USER_ERR
            } else {
                loginerr::INVALID_USERNAME_OR_PASSWORD
            };
            return Ok(login_failure(&props, code));
        }

        let user = User::new(
            props.screen_name.clone(),
            STUB_PASSWORD,
            uuid::Uuid::new_v4().to_string(),
        );
        self.deps.db.insert_user(&user)?;
        tracing::info!(ident = %user.ident, "auto-registered stub user");
        self.login_success(&props)
    }

    fn login_success(&self, props: &LoginProperties) -> Result<TlvBlock> {
        let cookie = BosCookie {
            screen_name: props.screen_name.clone(),
            client_id: props.client_id.clone(),
        };
        let token = self.deps.baker.issue_payload(&cookie)?;

        let mut tlvs = TlvBlock::default();
        tlvs.append(Tlv::string(tag::SCREEN_NAME, props.screen_name.as_str()));
        tlvs.append(Tlv::string(tag::RECONNECT_HERE, &self.deps.config.bos_addr()));
        tlvs.append(Tlv::new(tag::AUTHORIZATION_COOKIE, token));
        Ok(tlvs)
    }

    /// Verify a BOS cookie and install a session in the registry.
    pub fn register_bos_session(&self, token: &[u8]) -> Result<Arc<Session>> {
        let cookie: BosCookie = self.deps.baker.crack_payload(token)?;
        let ident = cookie.screen_name.ident();
        let user = self
            .deps
            .db
            .user(&ident)?
            .ok_or_else(|| ServerError::UserNotFound(ident.to_string()))?;

        let sess = self.deps.sessions.add_session(user.display.clone());
        if !user.confirmed {
            sess.set_base_flag(parlor_shared::wire::userinfo::userflag::UNCONFIRMED);
        }
        if user.display.is_uin() {
            sess.set_base_flag(parlor_shared::wire::userinfo::userflag::ICQ);
        }
        sess.set_client_id(cookie.client_id);
        Ok(sess)
    }

    /// Verify a BOS cookie for a secondary service (chat nav, BART, admin)
    /// without touching the BOS registry. The returned session exists only
    /// for the lifetime of that connection.
    pub fn detached_session(&self, token: &[u8]) -> Result<Arc<Session>> {
        let cookie: BosCookie = self.deps.baker.crack_payload(token)?;
        Ok(Arc::new(Session::new(cookie.screen_name)))
    }

    /// Verify a chat login cookie and join the user to its room. The room
    /// and user are trusted implicitly; the cookie was signed by
    /// ServiceRequest.
    pub fn register_chat_session(&self, token: &[u8]) -> Result<Arc<Session>> {
        let cookie: ChatLoginCookie = self.deps.baker.crack_payload(token)?;
        Ok(self
            .deps
            .chat
            .add_session(&cookie.chat_cookie, cookie.screen_name))
    }

    /// Remove the session and notify watchers. Idempotent; departure
    /// broadcast is best effort.
    pub fn signout(&self, sess: &Arc<Session>) {
        if let Err(e) = self.buddy.broadcast_departure(sess) {
            tracing::error!(ident = %sess.ident(), error = %e, "departure broadcast failed");
        }
        self.deps.sessions.remove_session(sess);
    }

    /// Remove a chat participant and tell the room.
    pub fn signout_chat(&self, sess: &Arc<Session>) {
        chat::alert_user_left(&self.deps, sess);
        self.deps.chat.remove_session(sess);
    }
}

fn login_failure(props: &LoginProperties, code: u16) -> TlvBlock {
    let mut tlvs = TlvBlock::default();
    tlvs.append(Tlv::string(tag::SCREEN_NAME, props.screen_name.as_str()));
    tlvs.append(Tlv::u16(tag::ERROR_SUBCODE, code));
    tlvs
}
