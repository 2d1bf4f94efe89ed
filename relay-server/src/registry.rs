use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identificativo di una connessione WS, valido finché la connessione resta aperta.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Consegna fallita verso un singolo subscriber.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("send queue full")]
    QueueFull,
    #[error("subscriber disconnected")]
    Closed,
}

/// Destinatario degli eventi diffusi dal server.
///
/// `send` non deve mai bloccare: un client lento perde l'evento invece di
/// rallentare gli altri.
pub trait Subscriber: Send + Sync {
    fn id(&self) -> SubscriberId;
    fn send(&self, frame: &str) -> Result<(), DeliveryError>;
}

/// Subscriber basato su una coda mpsc limitata; l'altra estremità è il task che scrive sulla socket.
pub struct ChannelSubscriber {
    id: SubscriberId,
    tx: mpsc::Sender<String>,
}

impl ChannelSubscriber {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                id: SubscriberId::new(),
                tx,
            },
            rx,
        )
    }
}

impl Subscriber for ChannelSubscriber {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn send(&self, frame: &str) -> Result<(), DeliveryError> {
        self.tx.try_send(frame.to_string()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// Insieme dei subscriber attualmente connessi. Solo in memoria, nessuno storico.
pub struct ConnectionRegistry {
    subscribers: DashMap<SubscriberId, Arc<dyn Subscriber>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    pub fn on_connect(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let id = subscriber.id();
        self.subscribers.insert(id, subscriber);
        tracing::debug!(subscriber_id = %id, connected = self.subscribers.len(), "subscriber registered");
        id
    }

    /// Restituisce false se il subscriber non era (più) registrato.
    pub fn on_disconnect(&self, id: &SubscriberId) -> bool {
        let removed = self.subscribers.remove(id).is_some();
        if removed {
            tracing::debug!(subscriber_id = %id, connected = self.subscribers.len(), "subscriber removed");
        }
        removed
    }

    /// Copia dei subscriber presenti in questo istante; nessun lock resta attivo dopo il ritorno.
    pub fn snapshot(&self) -> Vec<Arc<dyn Subscriber>> {
        self.subscribers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.subscribers.contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.subscribers.len()
    }
}
