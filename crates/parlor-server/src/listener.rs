//! TCP accept loops and per-connection reader/writer tasks for the OSCAR
//! endpoints.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncRead;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, info};

use parlor_shared::wire::bodies::auth::{self as auth_bodies, subgroup as bucp};
use parlor_shared::wire::flap::{FlapChannel, FlapSignonFrame};
use parlor_shared::wire::snac::{errcode, foodgroup, SnacError};
use parlor_shared::wire::{SnacFrame, SnacMessage};

use crate::dispatch::Dispatcher;
use crate::error::{Result, ServerError};
use crate::frame::{FlapReader, FlapWriter};
use crate::services::auth::AuthService;
use crate::services::oservice::Endpoint;
use crate::services::Deps;
use crate::session::Session;

/// How long a client has to complete the signon handshake.
const SIGNON_TIMEOUT: Duration = Duration::from_secs(30);

/// Initial outbound FLAP sequence number.
const START_SEQUENCE: u16 = 100;

pub async fn run_auth_listener(
    deps: Deps,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "auth listener started");

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
                debug!(%peer, "accepted auth connection");
                let deps = deps.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_auth_connection(deps, stream).await {
                        info!(%peer, error = %e, "auth connection failed");
                    }
                });
            }
        }
    }
    Ok(())
}

async fn handle_auth_connection(deps: Deps, stream: TcpStream) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    let mut reader = FlapReader::new(read_half);
    let mut writer = FlapWriter::new(write_half, START_SEQUENCE);

    writer.write_signon(&FlapSignonFrame::default()).await?;
    let signon = read_signon(&mut reader).await?;

    let auth = AuthService::new(deps);

    // the presence of the screen-name TLV distinguishes FLAP from BUCP
    // auth; the roasted-password TLV is unreliable because some ICQ
    // clients omit it when no password is saved.
    if signon.tlvs.has(auth_bodies::tag::SCREEN_NAME) {
        let tlvs = auth.flap_login(&signon)?;
        return writer.write_signoff(&tlvs).await;
    }

    // BUCP: challenge round
    let (frame, body) = read_snac(&mut reader).await?;
    if (frame.food_group, frame.sub_group) != (foodgroup::BUCP, bucp::CHALLENGE_REQUEST) {
        return Err(ServerError::Handshake("expected BUCP challenge request"));
    }
    let challenge = auth_bodies::BucpChallengeRequest::decode(&mut body.clone())?;
    let reply = auth.bucp_challenge(challenge)?;
    let challenge_failed = reply.frame.sub_group == bucp::LOGIN_RESPONSE;
    writer.write_snac(&reply).await?;
    if challenge_failed {
        // account does not exist
        return Ok(());
    }

    // BUCP: login round
    let (frame, body) = read_snac(&mut reader).await?;
    if (frame.food_group, frame.sub_group) != (foodgroup::BUCP, bucp::LOGIN_REQUEST) {
        return Err(ServerError::Handshake("expected BUCP login request"));
    }
    let login = auth_bodies::BucpLoginRequest::decode(&mut body.clone())?;
    let reply = auth.bucp_login(login)?;
    writer.write_snac(&reply).await
}

pub async fn run_service_listener(
    deps: Deps,
    endpoint: Endpoint,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, ?endpoint, "service listener started");

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
                debug!(%peer, ?endpoint, "accepted connection");
                let deps = deps.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_service_connection(deps, endpoint, stream).await {
                        info!(%peer, error = %e, "connection ended");
                    }
                });
            }
        }
    }
    Ok(())
}

async fn handle_service_connection(deps: Deps, endpoint: Endpoint, stream: TcpStream) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    let mut reader = FlapReader::new(read_half);
    let mut writer = FlapWriter::new(write_half, START_SEQUENCE);

    writer.write_signon(&FlapSignonFrame::default()).await?;
    let signon = read_signon(&mut reader).await?;
    let token = signon
        .tlvs
        .bytes(auth_bodies::tag::AUTHORIZATION_COOKIE)
        .ok_or(ServerError::Handshake("missing authorization cookie"))?;

    let auth = AuthService::new(deps.clone());
    let sess = match endpoint {
        Endpoint::Bos => auth.register_bos_session(token)?,
        Endpoint::Chat => auth.register_chat_session(token)?,
        _ => auth.detached_session(token)?,
    };
    info!(ident = %sess.ident(), ?endpoint, "session registered");

    // all writes funnel through the session queue so the writer task is the
    // only thing touching the socket's write half
    let dispatcher = Dispatcher::new(deps, endpoint);
    sess.relay(dispatcher.host_online());

    let writer_task = {
        let sess = sess.clone();
        let mut rx = sess.take_receiver();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sess.closed() => break,
                    maybe = rx.recv() => match maybe {
                        Some(msg) => {
                            if writer.write_snac(&msg).await.is_err() {
                                sess.close();
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        })
    };

    let result = read_loop(&mut reader, &sess, &dispatcher).await;

    match endpoint {
        Endpoint::Bos => auth.signout(&sess),
        Endpoint::Chat => auth.signout_chat(&sess),
        _ => {}
    }
    sess.close();
    let _ = writer_task.await;
    result
}

async fn read_loop<R: AsyncRead + Unpin>(
    reader: &mut FlapReader<R>,
    sess: &Arc<Session>,
    dispatcher: &Dispatcher,
) -> Result<()> {
    loop {
        let frame = tokio::select! {
            _ = sess.closed() => return Ok(()),
            frame = reader.read_frame() => frame,
        };
        let frame = match frame {
            Ok(frame) => frame,
            Err(ServerError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e),
        };

        match frame.channel {
            FlapChannel::Keepalive => continue,
            FlapChannel::Signoff => return Ok(()),
            FlapChannel::Data => {
                let mut payload = Bytes::from(frame.payload);
                let snac_frame = SnacFrame::decode(&mut payload)?;
                match dispatcher.dispatch(sess, snac_frame, payload).await {
                    Ok(Some(reply)) => {
                        sess.relay(reply);
                    }
                    Ok(None) => {}
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        // transient: the client gets a generic service
                        // error and the session survives
                        tracing::warn!(ident = %sess.ident(), error = %e, "handler error");
                        let mut body = Vec::new();
                        SnacError::new(errcode::SERVICE_UNAVAILABLE).encode(&mut body);
                        sess.relay(SnacMessage::new(
                            SnacFrame::reply_to(snac_frame, 0x0001),
                            body,
                        ));
                    }
                }
            }
            FlapChannel::Signon | FlapChannel::Error => {
                debug!(channel = ?frame.channel, "ignoring unexpected frame");
            }
        }
    }
}

async fn read_signon<R: AsyncRead + Unpin>(reader: &mut FlapReader<R>) -> Result<FlapSignonFrame> {
    let frame = timeout(SIGNON_TIMEOUT, reader.read_frame())
        .await
        .map_err(|_| ServerError::SignonTimeout)??;
    if frame.channel != FlapChannel::Signon {
        return Err(ServerError::Handshake("expected signon frame"));
    }
    FlapSignonFrame::decode(&mut Bytes::from(frame.payload)).map_err(Into::into)
}

async fn read_snac<R: AsyncRead + Unpin>(
    reader: &mut FlapReader<R>,
) -> Result<(SnacFrame, Bytes)> {
    loop {
        let frame = timeout(SIGNON_TIMEOUT, reader.read_frame())
            .await
            .map_err(|_| ServerError::SignonTimeout)??;
        match frame.channel {
            FlapChannel::Keepalive => continue,
            FlapChannel::Data => {
                let mut payload = Bytes::from(frame.payload);
                let snac_frame = SnacFrame::decode(&mut payload)?;
                return Ok((snac_frame, payload));
            }
            _ => return Err(ServerError::Handshake("expected data frame")),
        }
    }
}
