use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;
use crate::handlers::auth_handler::require_api_key;
use crate::message::AppSuccess;
use crate::models::{EventId, Photo};
use crate::state::AppState;

pub const DEFAULT_PAGE_LIMIT: usize = 20;

#[derive(Deserialize)]
pub struct EventQuery {
    #[serde(rename = "eventId")]
    pub event_id: Option<String>,
}

impl EventQuery {
    pub fn event_id(&self) -> EventId {
        EventId::from_param(self.event_id.as_deref())
    }

    /// The event id, or 400 when the caller left it out.
    pub fn required_event_id(&self) -> Result<EventId, AppError> {
        match self.event_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Ok(EventId::new(id)),
            _ => Err(AppError::BadRequest("Se requiere eventId".to_string())),
        }
    }
}

#[derive(Deserialize)]
pub struct ApprovedQuery {
    #[serde(rename = "eventId")]
    pub event_id: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct ModerationRequest {
    #[serde(alias = "photoId", alias = "publicId")]
    pub public_id: Option<String>,
    #[serde(rename = "eventId")]
    pub event_id: Option<String>,
}

#[derive(Serialize)]
struct ModerationResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo: Option<Photo>,
}

/// `GET /get-photos?eventId=`
pub async fn get_photos(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<EventQuery>,
) -> Result<HttpResponse, AppError> {
    require_api_key(&req, &state.config.api_key)?;

    let photos = state.lifecycle.list_pending(&query.event_id()).await?;
    Ok(HttpResponse::Ok().json(photos))
}

/// `GET /get-approved-photos?eventId=&page=&limit=`
pub async fn get_approved_photos(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<ApprovedQuery>,
) -> Result<HttpResponse, AppError> {
    require_api_key(&req, &state.config.api_key)?;

    let event_id = EventId::from_param(query.event_id.as_deref());
    let page = state
        .lifecycle
        .list_approved(
            &event_id,
            query.page.unwrap_or(1),
            query.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        )
        .await?;

    Ok(HttpResponse::Ok().json(page))
}

/// `GET /get-demo-photos?eventId=`, every photo of the event whatever its state.
pub async fn get_demo_photos(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<EventQuery>,
) -> Result<HttpResponse, AppError> {
    require_api_key(&req, &state.config.api_key)?;

    let photos = state.lifecycle.list_event_photos(&query.event_id()).await?;
    Ok(HttpResponse::Ok().json(photos))
}

/// Public id from the body, and its event. Without an `eventId` the photo's
/// own event is used.
async fn moderation_target(
    state: &AppState,
    payload: ModerationRequest,
) -> Result<(String, EventId), AppError> {
    let public_id = payload
        .public_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Se requiere public_id de la foto".to_string()))?;

    let event_id = match payload.event_id.as_deref() {
        Some(id) if !id.trim().is_empty() => EventId::new(id.trim()),
        _ => {
            let photo = state.lifecycle.lookup(&public_id).await?;
            debug!("No eventId for {public_id}, using {:?}", photo.event_id);
            photo.event_id.unwrap_or_default()
        }
    };

    Ok((public_id, event_id))
}

/// `POST /approve-photo`
pub async fn approve_photo(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<ModerationRequest>,
) -> Result<HttpResponse, AppError> {
    require_api_key(&req, &state.config.api_key)?;

    let (public_id, event_id) = moderation_target(&state, payload.into_inner()).await?;
    let photo = state.lifecycle.approve(&public_id, &event_id).await?;

    Ok(HttpResponse::Ok().json(ModerationResponse {
        message: AppSuccess::Approved.message(),
        photo: Some(photo),
    }))
}

/// `POST /reject-photo`. The photo is deleted.
pub async fn reject_photo(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<ModerationRequest>,
) -> Result<HttpResponse, AppError> {
    require_api_key(&req, &state.config.api_key)?;

    let (public_id, event_id) = moderation_target(&state, payload.into_inner()).await?;
    state.lifecycle.reject(&public_id, &event_id).await?;

    Ok(HttpResponse::Ok().json(ModerationResponse {
        message: AppSuccess::Rejected.message(),
        photo: None,
    }))
}
