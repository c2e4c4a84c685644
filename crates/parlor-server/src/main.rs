mod bart_store;
mod chat_registry;
mod config;
mod dispatch;
mod error;
mod frame;
mod http;
mod listener;
mod registry;
mod services;
mod session;
mod toc;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use parlor_shared::cookie::CookieBaker;
use parlor_store::Database;

use crate::bart_store::BartStore;
use crate::chat_registry::ChatRegistry;
use crate::config::ServerConfig;
use crate::registry::SessionRegistry;
use crate::services::oservice::Endpoint;
use crate::services::Deps;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parlor_server=debug")),
        )
        .init();

    info!("Starting parlor server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    if config.disable_auth {
        info!("auth is DISABLED: unknown screen names are auto-registered");
    }

    let db = Arc::new(Database::open_at(&config.db_path)?);
    let bart = Arc::new(BartStore::new(config.bart_path.clone()).await?);
    let baker = match config.cookie_key {
        Some(key) => CookieBaker::new(key),
        None => CookieBaker::with_random_key(),
    };

    let deps = Deps {
        config: Arc::new(config.clone()),
        db,
        baker,
        sessions: Arc::new(SessionRegistry::new()),
        chat: Arc::new(ChatRegistry::new()),
        bart,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut tasks = Vec::new();
    tasks.push(tokio::spawn(listener::run_auth_listener(
        deps.clone(),
        config.auth_port,
        shutdown_rx.clone(),
    )));
    for (endpoint, port) in [
        (Endpoint::Bos, config.bos_port),
        (Endpoint::Chat, config.chat_port),
        (Endpoint::ChatNav, config.chat_nav_port),
        (Endpoint::Bart, config.bart_port),
        (Endpoint::Admin, config.admin_port),
    ] {
        tasks.push(tokio::spawn(listener::run_service_listener(
            deps.clone(),
            endpoint,
            port,
            shutdown_rx.clone(),
        )));
    }
    tasks.push(tokio::spawn(toc::run_toc_listener(
        deps.clone(),
        config.toc_port,
        shutdown_rx.clone(),
    )));
    tasks.push(tokio::spawn(http::serve(
        deps.clone(),
        config.http_port,
        shutdown_rx,
    )));

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down");
    let _ = shutdown_tx.send(true);

    // close every live session so connection tasks drain promptly
    for sess in deps.sessions.all_sessions() {
        sess.close();
    }

    for task in tasks {
        match tokio::time::timeout(Duration::from_secs(5), task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => error!(error = %e, "listener exited with error"),
            Ok(Err(e)) => error!(error = %e, "listener task panicked"),
            Err(_) => error!("listener did not stop within the grace period"),
        }
    }

    info!("shutdown complete");
    Ok(())
}
