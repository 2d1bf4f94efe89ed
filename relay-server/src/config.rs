use anyhow::anyhow;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::store::{DEFAULT_RETENTION, DEFAULT_STORE_TIMEOUT};

/// Configurazione del server, letta dalle variabili d'ambiente (ed eventualmente da `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    /// Percorso del file SQLite oppure URL "sqlite://..."
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Finestra di conservazione: oltre questa età un messaggio è scaduto.
    pub retention: Duration,
    pub sweep_interval: Duration,
    /// Tempo massimo per ogni operazione sullo store.
    pub store_timeout: Duration,
    /// Capacità della coda di invio di ogni client WS.
    pub ws_send_queue: usize,
    pub ws_heartbeat: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "relay.db".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            retention: DEFAULT_RETENTION,
            sweep_interval: Duration::from_secs(60),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            ws_send_queue: 256,
            ws_heartbeat: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Legge la configurazione dall'ambiente. Un file `.env` nella directory corrente,
    /// se presente, viene caricato prima.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Come `from_env`, ma con una sorgente arbitraria (usata nei test).
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: parse_var(&lookup, "BIND_ADDR", defaults.bind_addr)?,
            retention: secs_var(&lookup, "MESSAGE_RETENTION_SECS", defaults.retention)?,
            sweep_interval: secs_var(&lookup, "EXPIRY_SWEEP_INTERVAL_SECS", defaults.sweep_interval)?,
            store_timeout: parse_var(&lookup, "STORE_TIMEOUT_MS", defaults.store_timeout.as_millis() as u64)
                .map(Duration::from_millis)?,
            ws_send_queue: parse_var(&lookup, "WS_SEND_QUEUE", defaults.ws_send_queue)?,
            ws_heartbeat: secs_var(&lookup, "WS_HEARTBEAT_SECS", defaults.ws_heartbeat)?,
        };
        if config.ws_send_queue == 0 {
            return Err(anyhow!("WS_SEND_QUEUE must be greater than zero"));
        }
        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid {}={:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}

fn secs_var<F>(lookup: &F, key: &str, default: Duration) -> anyhow::Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_var(lookup, key, default.as_secs())?;
    if secs == 0 {
        return Err(anyhow!("{} must be greater than zero", key));
    }
    Ok(Duration::from_secs(secs))
}
