//! Photo lifecycle: pending → approved → archived, or deleted.
//!
//! State lives in the tags and folder of each stored object; [`Tag`] and
//! [`PhotoStatus`] are the typed view of it. Every store call is independent,
//! so two moderators acting on the same photo race and the last write wins.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Folders;
use crate::error::AppError;
use crate::models::photo::basename;
use crate::models::tag::{event_of, initial_tags, message_of};
use crate::models::{BatchReport, EventId, ItemOutcome, Photo, Tag};
use crate::store::{
    MediaContent, MediaStore, NewMedia, SearchQuery, SortKey, StoredMedia, MAX_SEARCH_RESULTS,
};
use crate::utils::image_probe;

pub const PENDING_LIMIT: usize = 50;
pub const APPROVED_PAGE_LIMIT: usize = 50;
pub const ARCHIVED_LIMIT: usize = 500;
pub const EVENT_PREVIEW_LIMIT: usize = 10;
const DOWNLOAD_CAPTION_CHARS: usize = 30;

pub const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/heic",
    "image/heif",
    "image/avif",
];

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub event_id: EventId,
    pub message: Option<String>,
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Serialize, Debug, Clone)]
pub struct Uploaded {
    pub public_id: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    #[serde(rename = "eventId")]
    pub event_id: EventId,
    pub tags: Vec<String>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedPage {
    pub photos: Vec<Photo>,
    pub page: usize,
    pub limit: usize,
    pub has_more: bool,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DemoEventCleanup {
    pub event_id: EventId,
    pub total_photos: usize,
    pub deleted_photos: usize,
    pub failed_deletes: usize,
    pub items: Vec<ItemOutcome>,
}

#[derive(Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DemoCleanup {
    pub total_cleaned_photos: usize,
    pub total_cleaned_events: usize,
    pub cleaned_events: Vec<DemoEventCleanup>,
}

#[derive(Serialize, Debug, Clone)]
pub struct DownloadEntry {
    pub id: String,
    pub url: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DownloadEntry {
    /// `foto_<n>_<name>[_<caption>].<format>`, `n` counting from 1.
    fn numbered(n: usize, photo: StoredMedia) -> Self {
        let message = message_of(&photo.tags);
        let caption: String = message
            .as_deref()
            .unwrap_or_default()
            .chars()
            .take(DOWNLOAD_CAPTION_CHARS)
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();

        let mut filename = format!("foto_{n}_{}", basename(&photo.public_id));
        if !caption.is_empty() {
            filename.push('_');
            filename.push_str(&caption);
        }
        filename.push('.');
        filename.push_str(photo.format.as_deref().unwrap_or("jpg"));

        DownloadEntry {
            id: photo.public_id,
            url: photo.url,
            filename,
            message,
            created_at: photo.created_at,
        }
    }
}

/// Issues one operation per item concurrently and collects every outcome.
pub async fn fan_out<T, F, Fut>(items: Vec<T>, op: F) -> BatchReport
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = ItemOutcome>,
{
    join_all(items.into_iter().map(op))
        .await
        .into_iter()
        .collect()
}

pub struct PhotoLifecycle {
    store: Arc<dyn MediaStore>,
    folders: Folders,
    max_upload_bytes: usize,
}

impl PhotoLifecycle {
    pub fn new(store: Arc<dyn MediaStore>, folders: Folders, max_upload_bytes: usize) -> Self {
        PhotoLifecycle {
            store,
            folders,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    fn view(&self, media: StoredMedia) -> Photo {
        Photo::from_media(media, &self.folders.archive)
    }

    fn is_archived(&self, public_id: &str) -> bool {
        public_id
            .strip_prefix(self.folders.archive.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Stores a new photo as pending for its event.
    pub async fn upload(&self, request: UploadRequest) -> Result<Uploaded, AppError> {
        if request.data.is_empty() {
            return Err(AppError::BadRequest("No se recibió ningún archivo.".to_string()));
        }
        if request.data.len() > self.max_upload_bytes {
            return Err(AppError::PayloadTooLarge {
                limit: self.max_upload_bytes,
            });
        }

        let content_type = normalize_content_type(&request.content_type).ok_or_else(|| {
            AppError::BadRequest(
                "Tipo de archivo no permitido. Formatos admitidos: JPEG, PNG, GIF, WEBP, HEIC/HEIF, AVIF."
                    .to_string(),
            )
        })?;

        let info = image_probe::probe(&request.data, &content_type);
        let public_id = format!(
            "{}/{}",
            self.folders.live,
            unique_name(&request.filename)
        );
        let tags = initial_tags(&request.event_id, request.message.as_deref());

        let stored = self
            .store
            .upload(NewMedia {
                public_id,
                folder: self.folders.live.clone(),
                content_type,
                data: request.data,
                format: info.format,
                width: info.width,
                height: info.height,
                tags,
            })
            .await?;

        info!(
            "Uploaded {} for event {} ({} bytes)",
            stored.public_id, request.event_id, stored.bytes
        );

        Ok(Uploaded {
            public_id: stored.public_id,
            image_url: stored.url,
            event_id: request.event_id,
            tags: stored.tags,
        })
    }

    /// Loads a photo that is about to be moderated for `event_id`.
    async fn moderatable(&self, public_id: &str, event_id: &EventId) -> Result<StoredMedia, AppError> {
        if public_id.trim().is_empty() {
            return Err(AppError::BadRequest("Se requiere public_id de la foto".to_string()));
        }

        let media = self.store.resource(public_id).await?;

        if media.folder == self.folders.archive {
            return Err(AppError::BadRequest(
                "Las fotos archivadas no se pueden moderar".to_string(),
            ));
        }
        if let Some(owner) = event_of(&media.tags) {
            if owner != *event_id {
                return Err(AppError::BadRequest(format!(
                    "La foto pertenece al evento {owner}, no a {event_id}"
                )));
            }
        }

        Ok(media)
    }

    pub async fn approve(&self, public_id: &str, event_id: &EventId) -> Result<Photo, AppError> {
        let media = self.moderatable(public_id, event_id).await?;
        let ids = [media.public_id];

        self.store
            .remove_tag(&Tag::Pending(event_id.clone()).to_string(), &ids)
            .await?;
        for tag in [
            Tag::Approved(event_id.clone()),
            Tag::Moderated,
            Tag::LegacyApproved,
        ] {
            self.store.add_tag(&tag.to_string(), &ids).await?;
        }

        info!("Approved {} for event {event_id}", ids[0]);

        let approved = self.store.resource(&ids[0]).await?;
        Ok(self.view(approved))
    }

    /// Rejection is permanent: the photo is deleted from the store.
    pub async fn reject(&self, public_id: &str, event_id: &EventId) -> Result<(), AppError> {
        let media = self.moderatable(public_id, event_id).await?;
        let ids = [media.public_id];

        self.store
            .remove_tag(&Tag::Pending(event_id.clone()).to_string(), &ids)
            .await?;
        self.store.destroy(&ids[0]).await?;

        info!("Rejected and deleted {} for event {event_id}", ids[0]);
        Ok(())
    }

    /// Moves every pending or approved photo of the event to the archive
    /// folder and strips its tags.
    pub async fn archive_event(&self, event_id: &EventId) -> Result<BatchReport, AppError> {
        let query = SearchQuery::in_folder(&self.folders.live)
            .with_tag(Tag::Approved(event_id.clone()).to_string())
            .with_tag(Tag::Pending(event_id.clone()).to_string())
            .max_results(MAX_SEARCH_RESULTS);
        let photos = self.store.search(&query).await?;

        info!("Archiving {} photos of event {event_id}", photos.len());

        let report = fan_out(photos, |photo| async move {
            let target = format!("{}/{}", self.folders.archive, basename(&photo.public_id));

            let moved = match self.store.rename(&photo.public_id, &target).await {
                Ok(moved) => moved,
                Err(e) => {
                    warn!("Failed to archive {}: {e}", photo.public_id);
                    return ItemOutcome::failed(photo.public_id, e);
                }
            };

            match self.store.remove_all_tags(&moved.public_id).await {
                Ok(()) => ItemOutcome::moved(photo.public_id, moved.public_id),
                Err(e) => {
                    warn!("Archived {} but could not strip its tags: {e}", moved.public_id);
                    ItemOutcome::failed(photo.public_id, e)
                }
            }
        })
        .await;

        info!(
            "Event {event_id} archived: {}/{} photos",
            report.succeeded, report.total
        );
        Ok(report)
    }

    /// Permanently deletes one archived photo. Returns its file name.
    pub async fn delete_archived(&self, public_id: &str) -> Result<String, AppError> {
        if public_id.trim().is_empty() {
            return Err(AppError::BadRequest("Se requiere public_id de la foto".to_string()));
        }
        if !self.is_archived(public_id) {
            return Err(AppError::BadRequest(
                "Solo se pueden eliminar fotos archivadas".to_string(),
            ));
        }

        self.store.destroy(public_id).await?;

        info!("Deleted archived photo {public_id}");
        Ok(basename(public_id).to_string())
    }

    /// Permanently deletes every photo still tagged with the event.
    pub async fn delete_event(&self, event_id: &EventId) -> Result<BatchReport, AppError> {
        let query = SearchQuery::all().with_tag(Tag::Event(event_id.clone()).to_string());
        let photos = self.store.search(&query).await?;

        let report = self.destroy_all(photos).await;
        info!(
            "Event {event_id} deleted: {}/{} photos",
            report.succeeded, report.total
        );
        Ok(report)
    }

    /// Permanently deletes every photo in the upload folder.
    pub async fn delete_all_live(&self) -> Result<BatchReport, AppError> {
        let photos = self
            .store
            .search(&SearchQuery::in_folder(&self.folders.live))
            .await?;

        let report = self.destroy_all(photos).await;
        info!(
            "Deleted {}/{} photos from {}",
            report.succeeded, report.total, self.folders.live
        );
        Ok(report)
    }

    /// Deletes every photo of every `DEMO_` event, however recent.
    pub async fn cleanup_demo(&self) -> Result<DemoCleanup, AppError> {
        let photos = self
            .store
            .search(&SearchQuery::in_folder(&self.folders.live))
            .await?;

        let mut groups: BTreeMap<EventId, Vec<StoredMedia>> = BTreeMap::new();
        for photo in photos {
            if let Some(event_id) = photo.tags.iter().find_map(|tag| Tag::demo_event(tag)) {
                groups.entry(event_id).or_default().push(photo);
            }
        }

        let mut cleanup = DemoCleanup::default();
        for (event_id, photos) in groups {
            let report = self.destroy_all(photos).await;
            info!(
                "Demo event {event_id}: {}/{} photos deleted",
                report.succeeded, report.total
            );

            cleanup.total_cleaned_photos += report.succeeded;
            cleanup.cleaned_events.push(DemoEventCleanup {
                event_id,
                total_photos: report.total,
                deleted_photos: report.succeeded,
                failed_deletes: report.failed,
                items: report.items,
            });
        }
        cleanup.total_cleaned_events = cleanup.cleaned_events.len();

        Ok(cleanup)
    }

    async fn destroy_all(&self, photos: Vec<StoredMedia>) -> BatchReport {
        fan_out(photos, |photo| async move {
            match self.store.destroy(&photo.public_id).await {
                Ok(()) => ItemOutcome::done(photo.public_id),
                Err(e) => {
                    warn!("Failed to delete {}: {e}", photo.public_id);
                    ItemOutcome::failed(photo.public_id, e)
                }
            }
        })
        .await
    }

    pub async fn list_pending(&self, event_id: &EventId) -> Result<Vec<Photo>, AppError> {
        let query = SearchQuery::in_folder(&self.folders.live)
            .with_tag(Tag::Pending(event_id.clone()).to_string())
            .max_results(PENDING_LIMIT);

        let photos = self.store.search(&query).await?;
        Ok(photos.into_iter().map(|media| self.view(media)).collect())
    }

    /// Newest first. `page` starts at 1; `limit` is clamped to 1..=50.
    pub async fn list_approved(
        &self,
        event_id: &EventId,
        page: usize,
        limit: usize,
    ) -> Result<ApprovedPage, AppError> {
        let page = page.max(1);
        let limit = limit.clamp(1, APPROVED_PAGE_LIMIT);

        let query = SearchQuery::in_folder(&self.folders.live)
            .with_tag(Tag::Approved(event_id.clone()).to_string())
            .sort_by(SortKey::CreatedAt)
            .offset(page.saturating_sub(1).saturating_mul(limit))
            .max_results(limit + 1);

        let mut photos = self.store.search(&query).await?;
        let has_more = photos.len() > limit;
        photos.truncate(limit);

        Ok(ApprovedPage {
            photos: photos.into_iter().map(|media| self.view(media)).collect(),
            page,
            limit,
            has_more,
        })
    }

    /// Most recently archived first.
    pub async fn list_archived(&self) -> Result<Vec<Photo>, AppError> {
        let query = SearchQuery::in_folder(&self.folders.archive)
            .sort_by(SortKey::UploadedAt)
            .max_results(ARCHIVED_LIMIT);

        let photos = self.store.search(&query).await?;
        Ok(photos.into_iter().map(|media| self.view(media)).collect())
    }

    /// A few recent photos of the event, whatever their status.
    pub async fn list_event_photos(&self, event_id: &EventId) -> Result<Vec<Photo>, AppError> {
        let query = SearchQuery::in_folder(&self.folders.live)
            .with_tag(Tag::Event(event_id.clone()).to_string())
            .max_results(EVENT_PREVIEW_LIMIT);

        let photos = self.store.search(&query).await?;
        Ok(photos.into_iter().map(|media| self.view(media)).collect())
    }

    pub async fn lookup(&self, public_id: &str) -> Result<Photo, AppError> {
        if public_id.trim().is_empty() {
            return Err(AppError::BadRequest("photoId es requerido".to_string()));
        }

        let media = self.store.resource(public_id).await?;
        Ok(self.view(media))
    }

    pub async fn content(&self, public_id: &str) -> Result<MediaContent, AppError> {
        Ok(self.store.fetch(public_id).await?)
    }

    /// Download list for every approved photo of the event.
    pub async fn event_downloads(&self, event_id: &EventId) -> Result<Vec<DownloadEntry>, AppError> {
        if event_id.is_default() {
            return Err(AppError::BadRequest("EventId es requerido".to_string()));
        }

        let query = SearchQuery::in_folder(&self.folders.live)
            .with_tag(Tag::Approved(event_id.clone()).to_string())
            .sort_by(SortKey::CreatedAt)
            .max_results(MAX_SEARCH_RESULTS);
        let photos = self.store.search(&query).await?;

        if photos.is_empty() {
            return Err(AppError::NotFound(format!(
                "No se encontraron fotos aprobadas para el evento {event_id}"
            )));
        }

        Ok(photos
            .into_iter()
            .enumerate()
            .map(|(i, photo)| DownloadEntry::numbered(i + 1, photo))
            .collect())
    }

    /// Download list for every photo in the upload folder, any status.
    pub async fn download_all_live(&self) -> Result<Vec<DownloadEntry>, AppError> {
        let query = SearchQuery::in_folder(&self.folders.live)
            .sort_by(SortKey::CreatedAt)
            .max_results(MAX_SEARCH_RESULTS);
        let photos = self.store.search(&query).await?;

        if photos.is_empty() {
            return Err(AppError::NotFound("No hay fotos para descargar".to_string()));
        }

        info!("Preparing {} photos from {} for download", photos.len(), self.folders.live);
        Ok(photos
            .into_iter()
            .enumerate()
            .map(|(i, photo)| DownloadEntry::numbered(i + 1, photo))
            .collect())
    }
}

/// Essence of an allowed image MIME type, lowercased.
fn normalize_content_type(content_type: &str) -> Option<String> {
    let parsed: mime::Mime = content_type.trim().parse().ok()?;
    let essence = parsed.essence_str().to_ascii_lowercase();

    ALLOWED_IMAGE_TYPES
        .contains(&essence.as_str())
        .then_some(essence)
}

/// `<uuid>-<stem>`, with the stem reduced to `[A-Za-z0-9_-]`.
fn unique_name(filename: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();

    let name = filename.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    let stem: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(40)
        .collect();

    if stem.trim_matches('_').is_empty() {
        id
    } else {
        format!("{id}-{stem}")
    }
}
