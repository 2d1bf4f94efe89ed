pub mod ws;
pub mod http;

// Re-export comodi
pub use ws::{EventKind, WsMessage};
pub use http::{CreateMessageRequest, UpdateMessageRequest};
