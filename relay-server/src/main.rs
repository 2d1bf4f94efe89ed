use anyhow::Context;

// ri-utilizziamo le funzioni e strutture definite in lib.rs
use relay_server::{build_state, config::Config, expiry::start_expiry_sweeper, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging: livello da RUST_LOG, default info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Configurazione da ambiente (.env opzionale)
    let config = Config::from_env().context("load configuration")?;
    // Connessione al database, migrazioni e stato condiviso
    let state = build_state(&config).await?;
    // Sweep periodico dei messaggi scaduti
    let _sweeper = start_expiry_sweeper(state.store.clone(), config.sweep_interval);
    // Configura le rotte dell'applicazione
    let app = routes::router(state);

    // Crea il listener TCP, un socket tcp e lo lega all'indirizzo configurato
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .context("bind tcp listener")?;
    tracing::info!(addr = %config.bind_addr, "Server running");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server shutdown")?;

    tracing::info!("Shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl+c");
        std::future::pending::<()>().await;
    }
}
