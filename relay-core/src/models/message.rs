use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Messaggio persistito dal server e notificato via WS.
///
/// Lo stato di lettura è monotono: `read` passa da false a true una sola volta,
/// e in quel momento vengono valorizzati anche `read_at` e `read_notification_sent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub text: String,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub read_at: Option<OffsetDateTime>,
    pub read_notification_sent: bool,
}

impl Message {
    /// Nuovo messaggio non letto.
    pub fn new(id: String, text: String, created_at: OffsetDateTime) -> Self {
        Self {
            id,
            text,
            read: false,
            created_at,
            read_at: None,
            read_notification_sent: false,
        }
    }

    /// `read_at` presente se e solo se `read`, e la notifica solo dopo la lettura.
    pub fn read_state_is_consistent(&self) -> bool {
        self.read == self.read_at.is_some() && (self.read || !self.read_notification_sent)
    }
}
