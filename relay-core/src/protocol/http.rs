use serde::{Deserialize, Serialize};
/*
    dto per le richieste http su /api/messages.
    Solo `text` è modificabile dai client: read, readAt e readNotificationSent non fanno parte
    dei DTO, quindi eventuali campi extra nel body vengono ignorati e lo stato di lettura
    cambia soltanto tramite il segnale readMessage.
*/

// Create
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageRequest {
    /// Payload libero; se assente vale stringa vuota
    #[serde(default)]
    pub text: String,
}

// Update (merge parziale: i campi assenti restano invariati)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMessageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl UpdateMessageRequest {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
    }
}
