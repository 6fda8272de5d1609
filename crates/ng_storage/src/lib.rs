use async_trait::async_trait;
use ng_core::{ArticleStore, Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

pub mod backends;

pub use backends::*;

#[async_trait]
pub trait StorageBackend: ArticleStore {
    fn get_error_message() -> &'static str
    where
        Self: Sized;

    /// Open the backend at its default location.
    async fn new() -> Result<Self>
    where
        Self: Sized;
}

/// Open a store by name (`memory` or `sqlite`), optionally at `location`.
///
/// The memory backend has no location; one passed for it is ignored.
pub async fn create_storage(kind: &str, location: Option<&str>) -> Result<Arc<dyn ArticleStore>> {
    let storage: Arc<dyn ArticleStore> = match kind {
        "memory" => {
            if let Some(location) = location {
                debug!(location, "Memory storage keeps nothing on disk, ignoring location");
            }
            Arc::new(InMemoryStorage::new().await?)
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => match location {
            Some(path) => Arc::new(SQLiteStorage::new_with_path(std::path::Path::new(path)).await?),
            None => Arc::new(<SQLiteStorage as StorageBackend>::new().await.map_err(|e| {
                Error::Storage(format!("{} ({})", SQLiteStorage::get_error_message(), e))
            })?),
        },
        other => {
            return Err(Error::Config(format!("Unknown storage backend: {}", other)));
        }
    };
    info!(backend = kind, location = location.unwrap_or("default"), "Opened article store");
    Ok(storage)
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, StorageBackend};
}
