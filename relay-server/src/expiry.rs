use std::time::Duration;

use crate::store::MessageStore;

/// Avvia il task che rimuove periodicamente i messaggi scaduti.
///
/// Fra uno sweep e l'altro i messaggi scaduti sono già invisibili (lo store li filtra),
/// quindi l'intervallo incide solo sullo spazio occupato.
pub fn start_expiry_sweeper(store: MessageStore, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed = removed, "expired messages purged"),
                Err(e) => tracing::warn!(error = %e, "expiry sweep failed"),
            }
        }
    })
}
