use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::multipart::MultipartError;
use crate::store::StoreError;

pub const UNAUTHORIZED_MESSAGE: &str = "API key inválida o faltante";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("API key inválida o faltante")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("Método no permitido")]
    MethodNotAllowed,

    #[error("La imagen supera el tamaño máximo permitido ({} MB).", .limit / (1024 * 1024))]
    PayloadTooLarge { limit: usize },

    #[error("Error procesando el formulario de subida: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Error interno del servidor")]
    Store(#[source] StoreError),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(public_id) => AppError::NotFound(format!("Foto no encontrada: {public_id}")),
            other => AppError::Store(other),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Unauthorized => json!({ "message": UNAUTHORIZED_MESSAGE }),
            AppError::Store(source) if cfg!(debug_assertions) => json!({
                "error": self.to_string(),
                "details": source.to_string(),
            }),
            _ => json!({ "error": self.to_string() }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}
