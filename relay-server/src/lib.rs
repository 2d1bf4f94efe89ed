use anyhow::Context;
use axum::http::StatusCode;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::broadcast::BroadcastCoordinator;
use crate::config::Config;
use crate::read_tracking::ReadTracker;
use crate::store::{MessageStore, DEFAULT_STORE_TIMEOUT};

pub mod broadcast;
pub mod config;
pub mod controllers;
pub mod error;
pub mod expiry;
pub mod read_tracking;
pub mod registry;
pub mod routes;
pub mod store;

const MEMORY_URL: &str = "sqlite::memory:";

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub store: MessageStore,
    /// Possiede il registro delle connessioni WS e diffonde gli eventi.
    pub coordinator: Arc<BroadcastCoordinator>,
    pub read_tracker: ReadTracker,
    pub ws_send_queue: usize,
    pub ws_heartbeat: Duration,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: &Config) -> Self {
        let store = MessageStore::new(pool.clone(), config.retention, config.store_timeout);
        let coordinator = Arc::new(BroadcastCoordinator::new());
        let read_tracker = ReadTracker::new(store.clone(), Arc::clone(&coordinator));
        Self {
            pool,
            store,
            coordinator,
            read_tracker,
            ws_send_queue: config.ws_send_queue,
            ws_heartbeat: config.ws_heartbeat,
        }
    }
}

// Dato un percorso di file, restituisce un URL SQLite valido. Crea le directory genitrici se non esistono.
pub fn sqlite_url_for_path(p: &Path) -> anyhow::Result<String> {
    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };
    if let Some(parent) = abs.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent dirs for {:?}", parent))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&abs)
        .with_context(|| format!("create/open sqlite file {:?}", abs))?;
    let s = abs.to_string_lossy().replace('\\', "/");
    // su unix il percorso assoluto porta già lo slash iniziale
    if s.starts_with('/') {
        Ok(format!("sqlite://{}", s))
    } else {
        Ok(format!("sqlite:///{}", s))
    }
}

/// Crea un DB URL SQLite a partire dal valore configurato (DATABASE_URL).
/// Accetta sia un percorso di file sia un URL "sqlite://...".
pub fn build_sqlite_url(raw: &str) -> anyhow::Result<String> {
    if raw == MEMORY_URL {
        return Ok(raw.to_string());
    }
    // Rimuovi il prefisso "sqlite://" (o "sqlite:") se presente, per ottenere il percorso del file.
    // "sqlite:///abs/path" conserva così lo slash iniziale del percorso assoluto.
    let path_part = raw
        .strip_prefix("sqlite://")
        .or_else(|| raw.strip_prefix("sqlite:"))
        .unwrap_or(raw);
    let path = PathBuf::from(path_part);
    sqlite_url_for_path(&path)
}

// Connect to the database and return a connection pool.
pub async fn connect_pool(db_url: &str) -> anyhow::Result<SqlitePool> {
    connect_pool_with_timeout(db_url, DEFAULT_STORE_TIMEOUT).await
}

/// Come `connect_pool`, con `timeout` come limite sia per ottenere una connessione dal pool
/// sia per l'attesa del lock di scrittura di SQLite (`busy_timeout`).
pub async fn connect_pool_with_timeout(db_url: &str, timeout: Duration) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(db_url)
        .with_context(|| format!("parse sqlite url {}", db_url))?
        .create_if_missing(true)
        .busy_timeout(timeout);

    let pool = if db_url == MEMORY_URL {
        // ogni connessione in-memory è un database a sé: una sola connessione, mai chiusa
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(timeout)
            .connect_with(options)
            .await
    } else {
        SqlitePoolOptions::new()
            .acquire_timeout(timeout)
            .connect_with(options.journal_mode(SqliteJournalMode::Wal))
            .await
    };
    pool.with_context(|| format!("connect to sqlite via {}", db_url))
}

// Esegue le migrazioni del database. Crea le tabelle se non esistono.
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    let stmts = [
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id                     TEXT PRIMARY KEY,
            text                   TEXT NOT NULL,
            read                   BOOLEAN NOT NULL DEFAULT 0,
            created_at             INTEGER NOT NULL,
            read_at                INTEGER,
            read_notification_sent BOOLEAN NOT NULL DEFAULT 0,
            CHECK ((read = 0 AND read_at IS NULL AND read_notification_sent = 0)
                OR (read = 1 AND read_at IS NOT NULL))
        );"#,
        // usato sia dal filtro di scadenza sia dallo sweep periodico
        r#"
        CREATE INDEX IF NOT EXISTS idx_messages_created_at ON messages (created_at);"#,
    ];
    // applica ogni statement di migrazione
    for s in &stmts {
        sqlx::query(s)
            .execute(pool)
            .await
            .with_context(|| format!("apply migration: {}", &s[..s.len().min(40)].replace('\n', " ")))?;
    }
    Ok(())
}

/// Connessione, migrazioni e stato condiviso a partire dalla configurazione.
pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let db_url = build_sqlite_url(&config.database_url).context("build sqlite DATABASE_URL")?;
    tracing::info!(database_url = %db_url, "using database");
    let pool = connect_pool_with_timeout(&db_url, config.store_timeout)
        .await
        .context("connect to sqlite")?;
    run_migrations(&pool).await.context("run migrations")?;
    Ok(Arc::new(AppState::new(pool, config)))
}

/// Controlla lo stato di salute del database tentando di acquisire una connessione dal pool.
pub async fn health_with_pool(pool: &SqlitePool) -> StatusCode {
    match pool.acquire().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
