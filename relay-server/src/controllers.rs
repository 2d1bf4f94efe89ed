use axum::extract::ws::{Message as WsFrame, WebSocket};
use axum::{
    extract::{Extension, Path, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use futures_util::{SinkExt, StreamExt};
use relay_core::{CreateMessageRequest, EventKind, Message, UpdateMessageRequest, WsMessage};
use std::sync::Arc;

use crate::error::AppResult;
use crate::registry::{ChannelSubscriber, Subscriber};
use crate::AppState;

/// Handler per GET /api/messages
pub async fn list_messages(
    Extension(state): Extension<Arc<AppState>>,
) -> AppResult<Json<Vec<Message>>> {
    let messages = state.store.list().await?;
    Ok(Json(messages))
}

/// Handler per POST /api/messages
pub async fn create_message(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<CreateMessageRequest>,
) -> AppResult<Json<Message>> {
    // se la scrittura fallisce si esce con ? e non parte nessun broadcast
    let message = state.store.create(req).await?;
    let report = state.coordinator.broadcast(EventKind::MessageCreated, &message);
    tracing::info!(
        message_id = %message.id,
        delivered = report.delivered,
        dropped = report.dropped,
        "message created"
    );
    Ok(Json(message))
}

/// Handler per PUT /api/messages/:id
/// Nessun broadcast: solo creazione e lettura vengono notificate.
pub async fn update_message(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateMessageRequest>,
) -> AppResult<Json<Message>> {
    let message = state.store.update(&id, req).await?;
    Ok(Json(message))
}

/// Handler per DELETE /api/messages/:id
pub async fn delete_message(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.store.delete(&id).await?;
    tracing::info!(message_id = %id, "message deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Handler per /ws
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    // Il subscriber è la coda di uscita di questa sessione: il coordinator ci scrive
    // gli eventi, il task di forward li inoltra alla socket.
    let (subscriber, mut rx) = ChannelSubscriber::channel(state.ws_send_queue);
    let subscriber = Arc::new(subscriber);
    let subscriber_id = state.coordinator.registry().on_connect(subscriber.clone());
    tracing::info!(
        subscriber_id = %subscriber_id,
        connected = state.coordinator.registry().count(),
        "A user connected"
    );

    /* socket.split() divide l'oggetto WebSocket in due metà indipendenti:
        sender (un Sink) usato per inviare messaggi verso il client,
        receiver (uno Stream) usato per ricevere messaggi dal client. */
    let (mut sender, mut receiver) = socket.split();

    // Task: forward messages from rx -> websocket, con ping periodico
    let heartbeat = state.ws_heartbeat;
    let forward_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(heartbeat);
        ping.tick().await; // il primo tick è immediato
        loop {
            tokio::select! {
                frame = rx.recv() => match frame {
                    Some(text) => {
                        if sender.send(WsFrame::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = ping.tick() => {
                    if sender.send(WsFrame::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            WsFrame::Text(t) => handle_frame(&state, subscriber.as_ref(), &t).await,
            WsFrame::Close(_) => break,
            _ => {}
        }
    }

    // cleanup
    state.coordinator.registry().on_disconnect(&subscriber_id);
    forward_task.abort();
    tracing::info!(
        subscriber_id = %subscriber_id,
        connected = state.coordinator.registry().count(),
        "A user disconnected"
    );
}

async fn handle_frame(state: &AppState, subscriber: &ChannelSubscriber, text: &str) {
    match serde_json::from_str::<WsMessage>(text) {
        Ok(WsMessage::ReadMessage(message_id)) => {
            state.read_tracker.handle_signal(&message_id).await;
        }
        Ok(other) => {
            // eventi server -> client rimandati indietro: ignorati
            tracing::debug!(subscriber_id = %subscriber.id(), frame = ?other, "unexpected frame from client");
        }
        Err(e) => {
            tracing::debug!(subscriber_id = %subscriber.id(), error = %e, "unparseable frame");
            let err = WsMessage::Error(relay_core::Error::new("bad_frame", format!("invalid frame: {}", e)));
            if let Ok(frame) = serde_json::to_string(&err) {
                let _ = subscriber.send(&frame);
            }
        }
    }
}
