use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::handlers::auth_handler::require_api_key;
use crate::handlers::photo_handler::EventQuery;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ShareQuery {
    #[serde(rename = "photoId", alias = "public_id")]
    pub photo_id: Option<String>,
}

/// `GET /social-share?photoId=`. Public: links shared on social networks
/// carry no key.
pub async fn social_share(
    state: web::Data<AppState>,
    query: web::Query<ShareQuery>,
) -> Result<HttpResponse, AppError> {
    let photo_id = query.photo_id.as_deref().unwrap_or_default();
    let photo = state.lifecycle.lookup(photo_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "url": photo.secure_url,
        "message": photo.message,
        "eventId": photo.event_id,
    })))
}

/// `GET /get-event-photos-urls?eventId=`, download list for the approved photos.
pub async fn get_event_photos_urls(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<EventQuery>,
) -> Result<HttpResponse, AppError> {
    require_api_key(&req, &state.config.api_key)?;

    let event_id = query.event_id();
    let photos = state.lifecycle.event_downloads(&event_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "eventId": event_id,
        "totalPhotos": photos.len(),
        "photos": photos,
    })))
}

/// `GET /download-all-photos`, download list for every uploaded photo with
/// its caption.
pub async fn download_all_photos(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_api_key(&req, &state.config.api_key)?;

    let photos = state.lifecycle.download_all_live().await?;

    Ok(HttpResponse::Ok().json(json!({
        "totalPhotos": photos.len(),
        "photos": photos,
    })))
}

/// `GET /media/{public_id}`, the stored bytes behind a photo URL. Public like
/// the URLs themselves.
pub async fn serve_media(
    state: web::Data<AppState>,
    public_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let content = state.lifecycle.content(&public_id).await?;

    Ok(HttpResponse::Ok()
        .content_type(content.content_type)
        .body(content.data))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "ok": true, "time": Utc::now() }))
}

pub async fn method_not_allowed() -> Result<HttpResponse, AppError> {
    Err(AppError::MethodNotAllowed)
}

pub async fn not_found(req: HttpRequest) -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound(format!("Ruta no encontrada: {}", req.path())))
}
