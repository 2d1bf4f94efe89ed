/* Questo file definisce come i dati "viaggiano" sulla web socket.
    WsMessage è l'envelope { type, payload } con tutte le varianti:
    ReadMessage -> segnale dal client (id del messaggio letto), fire-and-forget
    ReceiveMessage -> evento dal server, nuovo messaggio creato
    MessageReadNotification -> evento dal server, messaggio appena segnato come letto
    Error -> per frame non interpretabili
*/
use serde::{Deserialize, Serialize};

use crate::{error::Error, models::Message};

/// Messaggio WS con envelope { type, payload }.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum WsMessage {
    /// Client → Server: il messaggio con questo id è stato letto.
    #[serde(rename = "readMessage")]
    ReadMessage(String),
    /// Server → Client: nuovo messaggio.
    #[serde(rename = "receiveMessage")]
    ReceiveMessage(Message),
    /// Server → Client: messaggio passato allo stato letto.
    #[serde(rename = "messageReadNotification")]
    MessageReadNotification(Message),
    /// Server → Client: errore fuori banda.
    #[serde(rename = "error")]
    Error(Error),
}

/// Tipi di evento che il server diffonde a tutti i client connessi.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MessageCreated,
    MessageRead,
}

impl EventKind {
    /// Costruisce l'envelope WS per questo evento.
    pub fn into_ws(self, message: Message) -> WsMessage {
        match self {
            EventKind::MessageCreated => WsMessage::ReceiveMessage(message),
            EventKind::MessageRead => WsMessage::MessageReadNotification(message),
        }
    }

    /// Nome dell'evento sul wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::MessageCreated => "receiveMessage",
            EventKind::MessageRead => "messageReadNotification",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
