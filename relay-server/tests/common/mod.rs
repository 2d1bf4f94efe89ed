#![allow(dead_code)]

use relay_core::WsMessage;
use relay_server::read_tracking::ReadTracker;
use relay_server::registry::ChannelSubscriber;
use relay_server::store::{MessageStore, DEFAULT_RETENTION};
use relay_server::{build_state, config::Config, connect_pool_with_timeout, run_migrations, sqlite_url_for_path, AppState};
use sqlx::pool::PoolConnection;
use sqlx::Sqlite;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Stato applicativo su un database SQLite temporaneo.
/// Il TempDir va tenuto in vita per tutta la durata del test.
pub async fn setup() -> anyhow::Result<(TempDir, Arc<AppState>)> {
    setup_with(Config::default()).await
}

pub async fn setup_with(config: Config) -> anyhow::Result<(TempDir, Arc<AppState>)> {
    let td = TempDir::new()?;
    let url = sqlite_url_for_path(&td.path().join("relay.db"))?;
    let config = Config { database_url: url, ..config };
    let state = build_state(&config).await?;
    Ok((td, state))
}

/// Stato su un database in memoria con una sola connessione, già presa e restituita al
/// chiamante: ogni scrittura resta in attesa finché la connessione non viene rilasciata
/// (o scade `timeout`). Condivide il coordinator di `shared`.
pub async fn stalled_state(
    shared: &AppState,
    timeout: Duration,
) -> anyhow::Result<(Arc<AppState>, PoolConnection<Sqlite>)> {
    let pool = connect_pool_with_timeout("sqlite::memory:", timeout).await?;
    run_migrations(&pool).await?;
    let held = pool.acquire().await?;

    let store = MessageStore::new(pool.clone(), DEFAULT_RETENTION, timeout);
    let coordinator = Arc::clone(&shared.coordinator);
    let state = AppState {
        pool,
        read_tracker: ReadTracker::new(store.clone(), Arc::clone(&coordinator)),
        store,
        coordinator,
        ws_send_queue: shared.ws_send_queue,
        ws_heartbeat: shared.ws_heartbeat,
    };
    Ok((Arc::new(state), held))
}

/// Registra un subscriber in-process e restituisce la sua coda di eventi.
pub fn attach_subscriber(state: &AppState) -> mpsc::Receiver<String> {
    let (subscriber, rx) = ChannelSubscriber::channel(64);
    state.coordinator.registry().on_connect(Arc::new(subscriber));
    rx
}

/// Tutti gli eventi già in coda, senza attendere.
pub fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<WsMessage> {
    let mut events = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        events.push(serde_json::from_str(&frame).expect("valid event frame"));
    }
    events
}
