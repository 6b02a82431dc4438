//! Feed monitor
//!
//! Connects the sync engine to the configured feeds and logs every notice.
//! Useful for watching a backend's presence/typing/call traffic without the
//! desktop front-end attached.

use std::sync::Arc;

use labsync_common::{init_tracing, SyncConfig};
use labsync_core::UserId;
use labsync_engine::{
    DetachedCommandChannel, EngineIdentity, SyncEngine, WsDialer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = SyncConfig::from_env()?;
    let identity = EngineIdentity {
        user_id: UserId(
            std::env::var("LABSYNC_USER_ID")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
        ),
        user_name: std::env::var("LABSYNC_USER_NAME").unwrap_or_else(|_| "monitor".to_string()),
    };

    tracing::info!(
        chat_url = %config.chat_feed.url,
        call_url = %config.call_feed.url,
        user_id = %identity.user_id,
        "Starting feed monitor"
    );

    let (engine, handle) = SyncEngine::new(
        config,
        identity,
        Arc::new(WsDialer),
        Arc::new(WsDialer),
        Arc::new(DetachedCommandChannel),
    );

    let mut notices = handle.subscribe();
    tokio::spawn(engine.run());

    let watcher = tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) => tracing::info!(notice = ?notice, "Engine notice"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "Notice stream lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    handle.shutdown().await.ok();
    watcher.abort();

    Ok(())
}
