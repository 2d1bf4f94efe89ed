use relay_core::{EventKind, Message};
use std::sync::{Mutex, PoisonError};

use crate::registry::{ConnectionRegistry, DeliveryError};

/// Esito di un broadcast, usato solo per log e test.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Diffonde gli eventi di creazione e lettura a tutti i client connessi.
pub struct BroadcastCoordinator {
    registry: ConnectionRegistry,
    // copre solo il fan-out (sincrono, nessun await): due broadcast concorrenti non si
    // intrecciano, quindi tutti i subscriber vedono gli eventi nella stessa sequenza
    order: Mutex<()>,
}

impl Default for BroadcastCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastCoordinator {
    pub fn new() -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            order: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Invia `message` a ogni subscriber presente. Non attende nessuno: le code piene
    /// o chiuse perdono l'evento, e i subscriber chiusi vengono rimossi dal registro.
    /// Va chiamato dopo il commit della scrittura che ha prodotto l'evento.
    pub fn broadcast(&self, kind: EventKind, message: &Message) -> DeliveryReport {
        let frame = match serde_json::to_string(&kind.into_ws(message.clone())) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(event = %kind, message_id = %message.id, error = %e, "cannot serialize event");
                return DeliveryReport::default();
            }
        };

        let _order = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        let mut report = DeliveryReport::default();
        for subscriber in self.registry.snapshot() {
            match subscriber.send(&frame) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    report.dropped += 1;
                    tracing::warn!(
                        subscriber_id = %subscriber.id(),
                        event = %kind,
                        message_id = %message.id,
                        error = %err,
                        "delivery dropped"
                    );
                    if err == DeliveryError::Closed {
                        self.registry.on_disconnect(&subscriber.id());
                    }
                }
            }
        }

        tracing::debug!(
            event = %kind,
            message_id = %message.id,
            delivered = report.delivered,
            dropped = report.dropped,
            "broadcast done"
        );
        report
    }
}
