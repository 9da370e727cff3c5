use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod cloud;
pub mod memory;

pub use cloud::CloudMediaStore;
pub use memory::InMemoryMediaStore;

/// Upper bound the store accepts for a single search.
pub const MAX_SEARCH_RESULTS: usize = 500;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("object storage error: {0}")]
    ObjectStorage(String),
}

/// Everything needed to create a stored object.
#[derive(Debug, Clone)]
pub struct NewMedia {
    pub public_id: String,
    pub folder: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub tags: Vec<String>,
}

/// Metadata of a stored object. The bytes stay in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMedia {
    pub public_id: String,
    pub folder: String,
    pub url: String,
    pub content_type: String,
    pub bytes: u64,
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Last time the object was written, renames included.
    pub uploaded_at: DateTime<Utc>,
}

impl StoredMedia {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    CreatedAt,
    UploadedAt,
}

/// Folder/tag filtered search. Results are always newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub folder: Option<String>,
    /// Matches objects carrying at least one of these tags. Empty matches all.
    pub any_tags: Vec<String>,
    pub sort_by: SortKey,
    pub max_results: usize,
    pub offset: usize,
}

impl SearchQuery {
    pub fn all() -> Self {
        SearchQuery {
            folder: None,
            any_tags: Vec::new(),
            sort_by: SortKey::default(),
            max_results: MAX_SEARCH_RESULTS,
            offset: 0,
        }
    }

    pub fn in_folder(folder: impl Into<String>) -> Self {
        SearchQuery {
            folder: Some(folder.into()),
            ..SearchQuery::all()
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.any_tags.push(tag.into());
        self
    }

    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.sort_by = key;
        self
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.min(MAX_SEARCH_RESULTS);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn matches(&self, media: &StoredMedia) -> bool {
        let in_folder = self
            .folder
            .as_deref()
            .map_or(true, |folder| media.folder == folder);
        let tagged = self.any_tags.is_empty() || self.any_tags.iter().any(|tag| media.has_tag(tag));

        in_folder && tagged
    }
}

/// Stored bytes with the type they were uploaded as.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaContent {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// The external media store: owns the bytes, the tags and the folders.
///
/// Every call is independent; nothing here is transactional across calls.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, media: NewMedia) -> Result<StoredMedia, StoreError>;

    async fn resource(&self, public_id: &str) -> Result<StoredMedia, StoreError>;

    async fn fetch(&self, public_id: &str) -> Result<MediaContent, StoreError>;

    /// Unknown ids are skipped.
    async fn add_tag(&self, tag: &str, public_ids: &[String]) -> Result<(), StoreError>;

    /// Unknown ids are skipped.
    async fn remove_tag(&self, tag: &str, public_ids: &[String]) -> Result<(), StoreError>;

    async fn remove_all_tags(&self, public_id: &str) -> Result<(), StoreError>;

    /// Moves an object, keeping its tags and creation time.
    async fn rename(&self, from: &str, to: &str) -> Result<StoredMedia, StoreError>;

    async fn destroy(&self, public_id: &str) -> Result<(), StoreError>;

    async fn search(&self, query: &SearchQuery) -> Result<Vec<StoredMedia>, StoreError>;

    fn public_url(&self, public_id: &str) -> String;
}

/// Folder part of a path-like public id.
pub fn folder_of(public_id: &str) -> &str {
    public_id.rsplit_once('/').map_or("", |(folder, _)| folder)
}
