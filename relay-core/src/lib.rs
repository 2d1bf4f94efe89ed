//! relay-core: tipi condivisi tra client e server (modello Message, DTO HTTP, eventi WS, errori).
//! Niente I/O o dipendenze non compatibili con WASM.

pub mod models;
pub mod protocol;
pub mod error;
pub mod utils;

// Re-export utili per ridurre i percorsi nei crate client/server
pub use error::Error;
pub use models::message::Message;
pub use protocol::ws::{EventKind, WsMessage};
pub use protocol::http::{CreateMessageRequest, UpdateMessageRequest};
pub use utils::{from_unix_millis, new_message_id, now_utc, to_unix_millis};
