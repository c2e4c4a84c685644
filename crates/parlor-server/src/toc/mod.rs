//! The TOC endpoint: newline-terminated text commands from light clients,
//! proxied onto the OSCAR food-group services.

pub mod parse;
pub mod proxy;

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use parlor_shared::wire::bodies::{buddy, icbm, oservice};
use parlor_shared::wire::snac::foodgroup;
use parlor_shared::wire::userinfo::{infotag, userflag, TlvUserInfo};
use parlor_shared::wire::SnacMessage;
use parlor_shared::wire::bodies::chat;

use crate::error::Result;
use crate::services::Deps;
use crate::session::Session;
use crate::toc::parse::tokenize;
use crate::toc::proxy::{chat_in_line, decode_chat_invite, ChatIdRegistry, OscarProxy};

/// Outbound line buffer per TOC connection.
const OUTBOUND_LINES: usize = 256;

pub async fn run_toc_listener(
    deps: Deps,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "TOC listener started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(error = %e, "accept failed");
                        continue;
                    }
                };
                debug!(%peer, "accepted TOC connection");
                let deps = deps.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_toc_connection(deps, stream).await {
                        info!(%peer, error = %e, "TOC connection ended");
                    }
                });
            }
        }
    }
    Ok(())
}

async fn handle_toc_connection(deps: Deps, stream: TcpStream) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    // single consumer of the outbound channel; lines leave in write order
    let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_LINES);
    let writer_task = tokio::spawn(async move {
        while let Some(line) = out_rx.recv().await {
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if write_half.write_all(b"\n").await.is_err() {
                break;
            }
        }
    });

    let proxy = OscarProxy::new(deps.clone());
    let registry = Arc::new(ChatIdRegistry::new());

    // the first real command must be toc_signon; tolerate the FLAPON
    // preamble some clients send
    let sess = loop {
        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with("FLAPON") {
            continue;
        }
        let tokens = tokenize(line);
        if tokens.first().map(String::as_str) != Some("toc_signon") {
            let _ = out_tx.send(proxy::ERR_INTERNAL.to_string()).await;
            return Ok(());
        }
        match proxy.signon(&tokens) {
            Ok((sess, replies)) => {
                for reply in replies {
                    let _ = out_tx.send(reply).await;
                }
                break sess;
            }
            Err(error_line) => {
                let _ = out_tx.send(error_line).await;
                return Ok(());
            }
        }
    };
    info!(ident = %sess.ident(), "TOC session signed on");

    // async server-to-client traffic rides the BOS session queue
    tokio::spawn(pump_bos(
        deps.clone(),
        sess.clone(),
        registry.clone(),
        out_tx.clone(),
    ));

    loop {
        let line = tokio::select! {
            _ = sess.closed() => break,
            line = lines.next_line() => line,
        };
        let Some(line) = line? else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let tokens = tokenize(line);
        let cmd = tokens.first().map(String::as_str).unwrap_or("");
        debug!(ident = %sess.ident(), command = cmd, "client request");

        let reply = match cmd {
            "toc_init_done" => proxy.init_done(&sess),
            "toc_send_im" => proxy.send_im(&sess, &tokens),
            "toc_add_buddy" => proxy.add_buddy(&sess, &tokens),
            "toc_remove_buddy" => proxy.remove_buddy(&sess, &tokens),
            "toc_add_permit" => proxy.add_permit(&sess, &tokens),
            "toc_add_deny" => proxy.add_deny(&sess, &tokens),
            "toc_set_away" => proxy.set_away(&sess, &tokens),
            "toc_set_info" => proxy.set_info(&sess, &tokens),
            "toc_set_caps" => proxy.set_caps(&sess, &tokens),
            "toc_set_idle" => proxy.set_idle(&sess, &tokens),
            "toc_set_dir" => proxy.set_dir(&sess, &tokens),
            "toc_set_config" => proxy.set_config(&sess, &tokens),
            "toc_evil" => proxy.evil(&sess, &tokens),
            "toc_get_info" => proxy.get_info_url(&sess, &tokens),
            "toc_get_dir" => proxy.get_dir_url(&sess, &tokens),
            "toc_dir_search" => proxy.dir_search_url(&sess, &tokens),
            "toc_chat_send" => proxy.chat_send(&registry, &tokens),
            "toc_chat_leave" => proxy.chat_leave(&registry, &tokens),
            "toc_chat_invite" => proxy.chat_invite(&sess, &registry, &tokens),
            "toc_chat_join" | "toc_chat_accept" => {
                let (chat_id, reply) = if cmd == "toc_chat_join" {
                    proxy.chat_join(&sess, &registry, &tokens)
                } else {
                    proxy.chat_accept(&sess, &registry, &tokens)
                };
                if let Some(id) = chat_id {
                    if let Some(chat_sess) = registry.session(id) {
                        tokio::spawn(pump_chat(id, chat_sess, out_tx.clone()));
                    }
                }
                reply
            }
            other => {
                warn!(command = other, "unsupported TOC command");
                None
            }
        };
        if let Some(reply) = reply {
            if !reply.is_empty() && out_tx.send(reply).await.is_err() {
                break;
            }
        }
    }

    proxy.signout(&sess, &registry);
    sess.close();
    drop(out_tx);
    let _ = writer_task.await;
    Ok(())
}

/// Translate SNACs arriving on the BOS session into TOC lines.
async fn pump_bos(
    deps: Deps,
    sess: Arc<Session>,
    registry: Arc<ChatIdRegistry>,
    out_tx: mpsc::Sender<String>,
) {
    let mut rx = sess.take_receiver();
    loop {
        let msg = tokio::select! {
            _ = sess.closed() => break,
            maybe = rx.recv() => match maybe {
                Some(msg) => msg,
                None => break,
            },
        };
        for line in translate_bos(&deps, &registry, &msg) {
            if out_tx.send(line).await.is_err() {
                return;
            }
        }
    }
}

fn translate_bos(deps: &Deps, registry: &ChatIdRegistry, msg: &SnacMessage) -> Vec<String> {
    match (msg.frame.food_group, msg.frame.sub_group) {
        (foodgroup::BUDDY, buddy::subgroup::ARRIVED) => {
            match buddy::Arrived::decode(&mut Bytes::copy_from_slice(&msg.body)) {
                Ok(body) => vec![update_buddy_line(&body.user_info, true)],
                Err(_) => Vec::new(),
            }
        }
        (foodgroup::BUDDY, buddy::subgroup::DEPARTED) => {
            match buddy::Departed::decode(&mut Bytes::copy_from_slice(&msg.body)) {
                Ok(body) => vec![update_buddy_line(&body.user_info, false)],
                Err(_) => Vec::new(),
            }
        }
        (foodgroup::ICBM, icbm::subgroup::CHANNEL_MSG_TO_CLIENT) => {
            let Ok(body) = icbm::ChannelMsgToClient::decode(&mut Bytes::copy_from_slice(&msg.body))
            else {
                return Vec::new();
            };
            match body.channel {
                icbm::channel::IM => {
                    let Some(raw) = body.tlvs.bytes(icbm::tag::AIM_DATA) else {
                        return Vec::new();
                    };
                    let Ok(text) = icbm::decode_im_text(raw) else {
                        return Vec::new();
                    };
                    let auto = if body.tlvs.has(icbm::tag::AUTO_RESPONSE) { "T" } else { "F" };
                    vec![format!("IM_IN:{}:{auto}:{text}", body.sender_info.screen_name)]
                }
                icbm::channel::RENDEZVOUS => {
                    let Some(raw) = body.tlvs.bytes(icbm::tag::DATA) else {
                        return Vec::new();
                    };
                    let Ok((room, invite_msg)) = decode_chat_invite(raw) else {
                        return Vec::new();
                    };
                    let name = deps
                        .db
                        .chat_room_by_cookie(&room.cookie)
                        .ok()
                        .flatten()
                        .map(|r| r.name)
                        .unwrap_or_default();
                    let chat_id = registry.add(room);
                    vec![format!(
                        "CHAT_INVITE:{name}:{chat_id}:{}:{invite_msg}",
                        body.sender_info.screen_name
                    )]
                }
                _ => Vec::new(),
            }
        }
        (foodgroup::OSERVICE, oservice::subgroup::EVIL_NOTIFICATION) => {
            match oservice::EvilNotification::decode(&mut Bytes::copy_from_slice(&msg.body)) {
                Ok(body) => {
                    let snitcher = body
                        .snitcher
                        .map(|s| s.screen_name)
                        .unwrap_or_default();
                    vec![format!("EVILED:{}:{snitcher}", body.new_evil / 10)]
                }
                Err(_) => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

/// `UPDATE_BUDDY:<name>:<online>:<evil %>:<signon>:<idle mins>:<UC>`.
fn update_buddy_line(info: &TlvUserInfo, online: bool) -> String {
    let flags = info.tlvs.u16(infotag::USER_FLAGS).unwrap_or(0);
    let signon = info.tlvs.u32(infotag::SIGNON_TIME).unwrap_or(0);
    let idle = info.tlvs.u16(infotag::IDLE_TIME).unwrap_or(0);

    let mut class = String::new();
    class.push(if flags & userflag::AOL != 0 { 'A' } else { ' ' });
    class.push(if flags & userflag::UNCONFIRMED != 0 { 'U' } else { 'O' });
    if flags & userflag::UNAVAILABLE != 0 {
        class.push('U');
    }

    format!(
        "UPDATE_BUDDY:{}:{}:{}:{signon}:{idle}:{class}",
        info.screen_name,
        if online { "T" } else { "F" },
        info.warning_level / 10,
    )
}

/// Translate SNACs arriving on a chat session into CHAT_* lines.
async fn pump_chat(chat_id: usize, sess: Arc<Session>, out_tx: mpsc::Sender<String>) {
    let mut rx = sess.take_receiver();
    loop {
        let msg = tokio::select! {
            _ = sess.closed() => break,
            maybe = rx.recv() => match maybe {
                Some(msg) => msg,
                None => break,
            },
        };
        if let Some(line) = translate_chat(chat_id, &msg) {
            if out_tx.send(line).await.is_err() {
                return;
            }
        }
    }
}

fn translate_chat(chat_id: usize, msg: &SnacMessage) -> Option<String> {
    match (msg.frame.food_group, msg.frame.sub_group) {
        (foodgroup::CHAT, chat::subgroup::CHANNEL_MSG_TO_CLIENT) => {
            chat_in_line(chat_id, &msg.body).ok()
        }
        (foodgroup::CHAT, chat::subgroup::USERS_JOINED)
        | (foodgroup::CHAT, chat::subgroup::USERS_LEFT) => {
            let body = chat::Occupants::decode(&mut Bytes::copy_from_slice(&msg.body)).ok()?;
            let joined = msg.frame.sub_group == chat::subgroup::USERS_JOINED;
            let names: Vec<String> = body.users.into_iter().map(|u| u.screen_name).collect();
            if names.is_empty() {
                return None;
            }
            Some(format!(
                "CHAT_UPDATE_BUDDY:{chat_id}:{}:{}",
                if joined { "T" } else { "F" },
                names.join(":")
            ))
        }
        _ => None,
    }
}
