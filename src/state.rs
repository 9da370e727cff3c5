use std::sync::Arc;

use crate::config::{Config, StoreBackend};
use crate::lifecycle::PhotoLifecycle;
use crate::store::{CloudMediaStore, InMemoryMediaStore, MediaStore, StoreError};

/// Shared with every handler through `web::Data`.
pub struct AppState {
    pub config: Config,
    pub lifecycle: PhotoLifecycle,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn MediaStore>) -> Self {
        let lifecycle = PhotoLifecycle::new(store, config.folders.clone(), config.max_upload_bytes);
        AppState { config, lifecycle }
    }

    /// Connects the store selected by `STORE_BACKEND`.
    pub async fn connect(config: Config) -> Result<Self, StoreError> {
        let store: Arc<dyn MediaStore> = match &config.backend {
            StoreBackend::Cloud { database_url, s3 } => {
                Arc::new(CloudMediaStore::connect(database_url, s3).await?)
            }
            StoreBackend::Memory => Arc::new(InMemoryMediaStore::new(config.media_base_url())),
        };

        Ok(AppState::new(config, store))
    }
}
