use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::Serialize;
use serde_with::skip_serializing_none;

use super::event::EventId;
use super::tag::{event_of, message_of, Tag};
use crate::store::StoredMedia;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
pub enum PhotoStatus {
    #[display(fmt = "pending")]
    Pending,
    #[display(fmt = "approved")]
    Approved,
    #[display(fmt = "archived")]
    Archived,
    /// Lives in the upload folder without any moderation tag.
    #[display(fmt = "unmoderated")]
    Unmoderated,
}

impl PhotoStatus {
    pub fn of(media: &StoredMedia, archive_folder: &str) -> Self {
        if media.folder == archive_folder {
            return PhotoStatus::Archived;
        }

        let event = event_of(&media.tags);
        let mut status = PhotoStatus::Unmoderated;

        for tag in media.tags.iter().map(|raw| Tag::parse(raw)) {
            match tag {
                Tag::Approved(id) if event.as_ref().map_or(true, |event| *event == id) => {
                    return PhotoStatus::Approved;
                }
                Tag::Pending(id) if event.as_ref().map_or(true, |event| *event == id) => {
                    status = PhotoStatus::Pending;
                }
                _ => {}
            }
        }

        status
    }
}

#[skip_serializing_none]
#[derive(Serialize, Debug, Clone)]
pub struct Photo {
    pub public_id: String,
    pub filename: String,
    pub secure_url: String,
    pub folder: String,
    #[serde(rename = "eventId")]
    pub event_id: Option<EventId>,
    pub status: PhotoStatus,
    pub message: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub uploaded_at: DateTime<Utc>,
    pub bytes: u64,
    pub size_mb: String,
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Photo {
    pub fn from_media(media: StoredMedia, archive_folder: &str) -> Self {
        Photo {
            filename: basename(&media.public_id).to_string(),
            status: PhotoStatus::of(&media, archive_folder),
            event_id: event_of(&media.tags),
            message: message_of(&media.tags),
            size_mb: format!("{:.2}", media.bytes as f64 / (1024.0 * 1024.0)),
            public_id: media.public_id,
            secure_url: media.url,
            folder: media.folder,
            tags: media.tags,
            created_at: media.created_at,
            uploaded_at: media.uploaded_at,
            bytes: media.bytes,
            format: media.format,
            width: media.width,
            height: media.height,
        }
    }
}

/// Last path segment of a public id.
pub fn basename(public_id: &str) -> &str {
    public_id.rsplit('/').next().unwrap_or(public_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(folder: &str, tags: &[&str]) -> StoredMedia {
        StoredMedia {
            public_id: format!("{folder}/abc"),
            folder: folder.to_string(),
            url: format!("memory://media/{folder}/abc"),
            content_type: "image/jpeg".to_string(),
            bytes: 1536 * 1024,
            format: Some("jpeg".to_string()),
            width: Some(10),
            height: Some(20),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created_at: Utc::now(),
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_from_tags() {
        let live = "momentos-en-vivo";
        let archive = "archived";

        assert_eq!(
            PhotoStatus::of(&media(live, &["event_E1", "pending_E1"]), archive),
            PhotoStatus::Pending
        );
        assert_eq!(
            PhotoStatus::of(
                &media(live, &["event_E1", "approved_E1", "moderated", "approved"]),
                archive
            ),
            PhotoStatus::Approved
        );
        assert_eq!(PhotoStatus::of(&media(live, &["event_E1"]), archive), PhotoStatus::Unmoderated);
        assert_eq!(PhotoStatus::of(&media(archive, &[]), archive), PhotoStatus::Archived);
        // State tags of another event do not count.
        assert_eq!(
            PhotoStatus::of(&media(live, &["event_E1", "approved_E2"]), archive),
            PhotoStatus::Unmoderated
        );
    }

    #[test]
    fn test_photo_view() {
        let photo = Photo::from_media(media("momentos-en-vivo", &["event_E1", "msg:hola%20mundo"]), "archived");

        assert_eq!(photo.filename, "abc");
        assert_eq!(photo.event_id, Some(EventId::new("E1")));
        assert_eq!(photo.message.as_deref(), Some("hola mundo"));
        assert_eq!(photo.size_mb, "1.50");
        assert_eq!(photo.status.to_string(), "unmoderated");
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("archived/foto.jpg"), "foto.jpg");
        assert_eq!(basename("foto.jpg"), "foto.jpg");
    }
}
