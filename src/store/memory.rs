use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{
    folder_of, MediaContent, MediaStore, NewMedia, SearchQuery, SortKey, StoreError, StoredMedia,
};

struct Entry {
    media: StoredMedia,
    data: Vec<u8>,
}

/// Process-local store, used by tests and `STORE_BACKEND=memory` runs.
/// Object URLs point at `base_url`, which the server answers on `/media`.
pub struct InMemoryMediaStore {
    base_url: String,
    objects: RwLock<HashMap<String, Entry>>,
}

impl InMemoryMediaStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        InMemoryMediaStore {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryMediaStore {
    fn default() -> Self {
        InMemoryMediaStore::new("memory://media")
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn upload(&self, media: NewMedia) -> Result<StoredMedia, StoreError> {
        let mut objects = self.objects.write().await;

        if objects.contains_key(&media.public_id) {
            return Err(StoreError::AlreadyExists(media.public_id));
        }

        let now = Utc::now();
        let mut tags = Vec::with_capacity(media.tags.len());
        for tag in media.tags {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        let stored = StoredMedia {
            url: self.public_url(&media.public_id),
            public_id: media.public_id.clone(),
            folder: media.folder,
            content_type: media.content_type,
            bytes: media.data.len() as u64,
            format: media.format,
            width: media.width,
            height: media.height,
            tags,
            created_at: now,
            uploaded_at: now,
        };

        objects.insert(
            media.public_id,
            Entry {
                media: stored.clone(),
                data: media.data,
            },
        );

        Ok(stored)
    }

    async fn resource(&self, public_id: &str) -> Result<StoredMedia, StoreError> {
        self.objects
            .read()
            .await
            .get(public_id)
            .map(|entry| entry.media.clone())
            .ok_or_else(|| StoreError::NotFound(public_id.to_string()))
    }

    async fn fetch(&self, public_id: &str) -> Result<MediaContent, StoreError> {
        self.objects
            .read()
            .await
            .get(public_id)
            .map(|entry| MediaContent {
                content_type: entry.media.content_type.clone(),
                data: entry.data.clone(),
            })
            .ok_or_else(|| StoreError::NotFound(public_id.to_string()))
    }

    async fn add_tag(&self, tag: &str, public_ids: &[String]) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;

        for public_id in public_ids {
            if let Some(entry) = objects.get_mut(public_id) {
                if !entry.media.has_tag(tag) {
                    entry.media.tags.push(tag.to_string());
                }
            }
        }

        Ok(())
    }

    async fn remove_tag(&self, tag: &str, public_ids: &[String]) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;

        for public_id in public_ids {
            if let Some(entry) = objects.get_mut(public_id) {
                entry.media.tags.retain(|t| t != tag);
            }
        }

        Ok(())
    }

    async fn remove_all_tags(&self, public_id: &str) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;

        match objects.get_mut(public_id) {
            Some(entry) => {
                entry.media.tags.clear();
                Ok(())
            }
            None => Err(StoreError::NotFound(public_id.to_string())),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<StoredMedia, StoreError> {
        let mut objects = self.objects.write().await;

        if objects.contains_key(to) {
            return Err(StoreError::AlreadyExists(to.to_string()));
        }

        let mut entry = objects
            .remove(from)
            .ok_or_else(|| StoreError::NotFound(from.to_string()))?;

        entry.media.public_id = to.to_string();
        entry.media.folder = folder_of(to).to_string();
        entry.media.url = self.public_url(to);
        entry.media.uploaded_at = Utc::now();

        let renamed = entry.media.clone();
        objects.insert(to.to_string(), entry);

        Ok(renamed)
    }

    async fn destroy(&self, public_id: &str) -> Result<(), StoreError> {
        self.objects
            .write()
            .await
            .remove(public_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(public_id.to_string()))
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<StoredMedia>, StoreError> {
        let objects = self.objects.read().await;

        let mut found: Vec<StoredMedia> = objects
            .values()
            .filter(|entry| query.matches(&entry.media))
            .map(|entry| entry.media.clone())
            .collect();

        found.sort_by(|a, b| {
            let (a_at, b_at) = match query.sort_by {
                SortKey::CreatedAt => (a.created_at, b.created_at),
                SortKey::UploadedAt => (a.uploaded_at, b.uploaded_at),
            };
            b_at.cmp(&a_at).then_with(|| a.public_id.cmp(&b.public_id))
        });

        Ok(found
            .into_iter()
            .skip(query.offset)
            .take(query.max_results)
            .collect())
    }

    fn public_url(&self, public_id: &str) -> String {
        format!("{}/{}", self.base_url, public_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(public_id: &str, tags: &[&str]) -> NewMedia {
        NewMedia {
            public_id: public_id.to_string(),
            folder: folder_of(public_id).to_string(),
            content_type: "image/png".to_string(),
            data: vec![1, 2, 3],
            format: Some("png".to_string()),
            width: None,
            height: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_upload_rejects_duplicate_ids() {
        let store = InMemoryMediaStore::default();
        store.upload(media("live/a", &[])).await.unwrap();

        let result = store.upload(media("live/a", &[])).await;
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_rename_keeps_tags_and_moves_folder() {
        let store = InMemoryMediaStore::default();
        store.upload(media("live/a", &["event_E1"])).await.unwrap();

        let renamed = store.rename("live/a", "archived/a").await.unwrap();

        assert_eq!(renamed.folder, "archived");
        assert_eq!(renamed.tags, vec!["event_E1"]);
        assert_eq!(renamed.url, "memory://media/archived/a");
        assert!(matches!(store.resource("live/a").await, Err(StoreError::NotFound(_))));
        assert_eq!(store.fetch("archived/a").await.unwrap().data, vec![1, 2, 3]);
        assert!(matches!(store.fetch("live/a").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_search_filters_by_folder_and_any_tag() {
        let store = InMemoryMediaStore::default();
        store.upload(media("live/a", &["pending_E1"])).await.unwrap();
        store.upload(media("live/b", &["approved_E1"])).await.unwrap();
        store.upload(media("live/c", &["pending_E2"])).await.unwrap();
        store.upload(media("other/d", &["pending_E1"])).await.unwrap();

        let query = SearchQuery::in_folder("live")
            .with_tag("pending_E1")
            .with_tag("approved_E1");
        let mut ids: Vec<String> = store
            .search(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.public_id)
            .collect();
        ids.sort();

        assert_eq!(ids, vec!["live/a", "live/b"]);

        let past_end = SearchQuery::in_folder("live").offset(usize::MAX);
        assert!(store.search(&past_end).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tag_mutations_skip_unknown_ids() {
        let store = InMemoryMediaStore::default();
        store.upload(media("live/a", &["pending_E1"])).await.unwrap();

        let ids = vec!["live/a".to_string(), "live/missing".to_string()];
        store.add_tag("approved_E1", &ids).await.unwrap();
        store.add_tag("approved_E1", &ids).await.unwrap();
        store.remove_tag("pending_E1", &ids).await.unwrap();

        let photo = store.resource("live/a").await.unwrap();
        assert_eq!(photo.tags, vec!["approved_E1"]);
    }
}
