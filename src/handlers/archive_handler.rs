use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AppError;
use crate::handlers::auth_handler::require_api_key;
use crate::handlers::photo_handler::EventQuery;
use crate::message::AppSuccess;
use crate::models::{BatchReport, EventId};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ArchivedPhotoRequest {
    #[serde(alias = "photoId", alias = "publicId")]
    pub public_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_id: Option<EventId>,
    #[serde(flatten)]
    report: BatchReport,
}

/// `GET|POST /archive-event?eventId=`
pub async fn archive_event(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<EventQuery>,
) -> Result<HttpResponse, AppError> {
    require_api_key(&req, &state.config.api_key)?;

    let event_id = query.required_event_id()?;
    let report = state.lifecycle.archive_event(&event_id).await?;

    Ok(HttpResponse::Ok().json(BatchResponse {
        message: AppSuccess::ArchivedEvent {
            archived: report.succeeded,
        }
        .message(),
        event_id: Some(event_id),
        report,
    }))
}

/// `GET /get-archived-photos`
pub async fn get_archived_photos(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_api_key(&req, &state.config.api_key)?;

    let photos = state.lifecycle.list_archived().await?;
    Ok(HttpResponse::Ok().json(json!({
        "total": photos.len(),
        "photos": photos,
    })))
}

/// `POST /delete-single-archived-photo`
pub async fn delete_single_archived_photo(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<ArchivedPhotoRequest>,
) -> Result<HttpResponse, AppError> {
    require_api_key(&req, &state.config.api_key)?;

    let public_id = payload.into_inner().public_id.unwrap_or_default();
    let filename = state.lifecycle.delete_archived(&public_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": AppSuccess::DeletedArchived { filename }.message(),
        "public_id": public_id,
    })))
}

/// `POST /delete-archived-event`, `eventId` from the JSON body or the query.
pub async fn delete_archived_event(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<EventQuery>,
    payload: Option<web::Json<EventQuery>>,
) -> Result<HttpResponse, AppError> {
    require_api_key(&req, &state.config.api_key)?;

    let event_id = match payload {
        Some(body) if body.event_id.is_some() => body.required_event_id()?,
        _ => query.required_event_id()?,
    };
    let report = state.lifecycle.delete_event(&event_id).await?;

    Ok(HttpResponse::Ok().json(BatchResponse {
        message: AppSuccess::DeletedEvent(event_id.clone()).message(),
        event_id: Some(event_id),
        report,
    }))
}

/// `POST /delete-all-photos`, everything in the upload folder.
pub async fn delete_all_photos(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_api_key(&req, &state.config.api_key)?;

    let report = state.lifecycle.delete_all_live().await?;

    Ok(HttpResponse::Ok().json(BatchResponse {
        message: AppSuccess::DeletedAll {
            deleted: report.succeeded,
        }
        .message(),
        event_id: None,
        report,
    }))
}

/// `POST /cleanup-demo`
pub async fn cleanup_demo(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    require_api_key(&req, &state.config.api_key)?;

    let cleanup = state.lifecycle.cleanup_demo().await?;
    let message = if cleanup.total_cleaned_events == 0 {
        AppSuccess::NothingToClean
    } else {
        AppSuccess::CleanedDemo
    };

    Ok(HttpResponse::Ok().json(json!({
        "message": message.message(),
        "totalCleanedPhotos": cleanup.total_cleaned_photos,
        "totalCleanedEvents": cleanup.total_cleaned_events,
        "cleanedEvents": cleanup.cleaned_events,
    })))
}
