//! Macchina a stati della lettura: Unread -> Read, una sola volta per messaggio.
//!
//! Il segnale arriva dalla WS ed è fire-and-forget: chi lo invia non riceve mai
//! risposta, neanche in caso di errore.

use relay_core::{now_utc, EventKind, Message};
use std::sync::Arc;

use crate::broadcast::BroadcastCoordinator;
use crate::error::{AppError, AppResult};
use crate::store::MessageStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Transizione avvenuta ora; il record aggiornato è stato diffuso.
    Transitioned(Message),
    /// Già letto (o un segnale concorrente ha vinto): nessuna scrittura, nessun broadcast.
    AlreadyRead,
    /// Id sconosciuto o scaduto.
    Unknown,
}

#[derive(Clone)]
pub struct ReadTracker {
    store: MessageStore,
    coordinator: Arc<BroadcastCoordinator>,
}

impl ReadTracker {
    pub fn new(store: MessageStore, coordinator: Arc<BroadcastCoordinator>) -> Self {
        Self { store, coordinator }
    }

    pub async fn mark_read(&self, id: &str) -> AppResult<ReadOutcome> {
        let current = match self.store.get_by_id(id).await {
            Ok(message) => message,
            Err(AppError::NotFound) => return Ok(ReadOutcome::Unknown),
            Err(e) => return Err(e),
        };
        if current.read {
            return Ok(ReadOutcome::AlreadyRead);
        }

        // la scrittura è condizionata a read = 0: fra due segnali concorrenti ne passa uno solo
        match self.store.mark_read(id, now_utc()).await? {
            Some(updated) => {
                self.coordinator.broadcast(EventKind::MessageRead, &updated);
                Ok(ReadOutcome::Transitioned(updated))
            }
            None => Ok(ReadOutcome::AlreadyRead),
        }
    }

    /// Gestione del segnale `readMessage`: gli errori finiscono solo nei log.
    pub async fn handle_signal(&self, id: &str) {
        match self.mark_read(id).await {
            Ok(ReadOutcome::Transitioned(message)) => {
                tracing::info!(message_id = %message.id, "message marked as read");
            }
            Ok(ReadOutcome::AlreadyRead) => {
                tracing::debug!(message_id = %id, "read signal ignored, already read");
            }
            Ok(ReadOutcome::Unknown) => {
                tracing::debug!(message_id = %id, "read signal ignored, unknown message");
            }
            Err(e) => {
                tracing::warn!(message_id = %id, error = %e, "read signal failed");
            }
        }
    }
}
