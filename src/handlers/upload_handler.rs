use actix_web::{http::header, http::StatusCode, web, HttpRequest, HttpResponse};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;
use crate::handlers::auth_handler::require_api_key;
use crate::lifecycle::{UploadRequest, Uploaded};
use crate::message::AppSuccess;
use crate::models::EventId;
use crate::multipart;
use crate::state::AppState;

const BASE64_DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Serialize)]
struct UploadResponse {
    message: String,
    #[serde(flatten)]
    uploaded: Uploaded,
}

impl From<Uploaded> for UploadResponse {
    fn from(uploaded: Uploaded) -> Self {
        UploadResponse {
            message: AppSuccess::UploadedPhoto.message(),
            uploaded,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Base64UploadRequest {
    #[serde(alias = "file")]
    pub image_base64: String,
    pub event_id: Option<String>,
    pub message: Option<String>,
    pub filename: Option<String>,
}

fn body_error(err: actix_web::Error, limit: usize) -> AppError {
    if err.as_response_error().status_code() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit }
    } else {
        AppError::BadRequest(format!("No se pudo leer el cuerpo de la petición: {err}"))
    }
}

/// `POST /upload`, a `multipart/form-data` form with `photo`, `eventId` and
/// `message`.
pub async fn upload(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: Result<web::Bytes, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    require_api_key(&req, &state.config.api_key)?;

    let limit = state.lifecycle.max_upload_bytes();
    let body = body.map_err(|e| body_error(e, limit))?;

    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let boundary = multipart::boundary_from_content_type(content_type)?;
    let form = multipart::decode(&body, &boundary)?;

    debug!(
        "Received {} ({}, {} bytes) in field `{}`",
        form.file.filename,
        form.file.content_type,
        form.file.data.len(),
        form.file.field
    );

    let request = UploadRequest {
        event_id: EventId::from_param(form.field("eventId")),
        message: form.field("message").map(str::to_string),
        filename: form.file.filename,
        content_type: form.file.content_type,
        data: form.file.data,
    };

    let uploaded = state.lifecycle.upload(request).await?;
    Ok(HttpResponse::Ok().json(UploadResponse::from(uploaded)))
}

/// `POST /upload-base64`, JSON with a data URL or bare base64 image.
pub async fn upload_base64(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<Base64UploadRequest>,
) -> Result<HttpResponse, AppError> {
    require_api_key(&req, &state.config.api_key)?;

    let payload = payload.into_inner();
    let (content_type, data) = decode_image(&payload.image_base64)?;

    let request = UploadRequest {
        event_id: EventId::from_param(payload.event_id.as_deref()),
        message: payload.message,
        filename: payload.filename.unwrap_or_default(),
        content_type,
        data,
    };

    let uploaded = state.lifecycle.upload(request).await?;
    Ok(HttpResponse::Ok().json(UploadResponse::from(uploaded)))
}

/// Splits `data:<mime>;base64,<data>` or takes bare base64 as JPEG.
fn decode_image(encoded: &str) -> Result<(String, Vec<u8>), AppError> {
    let encoded = encoded.trim();

    let (content_type, data) = match encoded.strip_prefix("data:") {
        Some(rest) => {
            let (meta, data) = rest
                .split_once(',')
                .ok_or_else(|| AppError::BadRequest("Data URL sin contenido".to_string()))?;
            let content_type = meta.strip_suffix(";base64").ok_or_else(|| {
                AppError::BadRequest("La imagen debe estar codificada en base64".to_string())
            })?;
            (content_type.to_string(), data)
        }
        None => (BASE64_DEFAULT_CONTENT_TYPE.to_string(), encoded),
    };

    let bytes = BASE64
        .decode(data)
        .map_err(|e| AppError::BadRequest(format!("Base64 inválido: {e}")))?;

    Ok((content_type, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_data_url() {
        let (content_type, data) = decode_image("data:image/png;base64,AAEC/w==").unwrap();
        assert_eq!(content_type, "image/png");
        assert_eq!(data, vec![0, 1, 2, 255]);
    }

    #[test]
    fn test_decode_bare_base64() {
        let (content_type, data) = decode_image("  AAEC/w==\n").unwrap();
        assert_eq!(content_type, "image/jpeg");
        assert_eq!(data, vec![0, 1, 2, 255]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_image("data:image/png,abc"), Err(AppError::BadRequest(_))));
        assert!(matches!(decode_image("data:image/png;base64"), Err(AppError::BadRequest(_))));
        assert!(matches!(decode_image("no es base64!"), Err(AppError::BadRequest(_))));
    }
}
