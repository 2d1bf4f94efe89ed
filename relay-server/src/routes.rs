use axum::{routing::{get, put}, Router, Extension};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::{AppState, health_with_pool};
use crate::controllers;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|Extension(state): Extension<Arc<AppState>>| async move {
            health_with_pool(&state.pool).await
        }))
        .route("/api/messages", get(controllers::list_messages).post(controllers::create_message))
        .route("/api/messages/:id", put(controllers::update_message).delete(controllers::delete_message))
        .route("/ws", get(controllers::ws_handler))
        .layer(Extension(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
