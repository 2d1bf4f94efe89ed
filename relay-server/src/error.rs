use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::time::Duration;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Errori delle operazioni sullo store, esposti alle richieste HTTP.
#[derive(Debug, Error)]
pub enum AppError {
    /// Id sconosciuto oppure messaggio scaduto.
    #[error("message not found")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Storage(_) | AppError::Timeout(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::Storage(_) => "storage_error",
            AppError::Timeout(_) => "storage_timeout",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = relay_core::Error::new(self.code(), self.to_string());
        (status, Json(body)).into_response()
    }
}
