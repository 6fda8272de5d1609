use async_trait::async_trait;
use ng_core::{ArticleFilter, ArticleRecord, ArticleStore, InsertOutcome, Result, TitleLookup};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use crate::StorageBackend;

/// Articles keyed by title.
#[derive(Default)]
pub struct MemoryStore {
    articles: HashMap<String, ArticleRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_by_title(&self, title: &str) -> TitleLookup {
        match self.articles.get(title) {
            Some(record) => TitleLookup::Present(record.clone()),
            None => TitleLookup::Absent,
        }
    }

    pub fn insert_if_absent(&mut self, record: &ArticleRecord) -> InsertOutcome {
        match self.articles.entry(record.title.clone()) {
            Entry::Occupied(_) => InsertOutcome::Duplicate,
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                InsertOutcome::Inserted
            }
        }
    }

    pub fn retrieve(&self, filter: &ArticleFilter) -> Vec<ArticleRecord> {
        self.articles
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

/// Process-local store. The check and the insert happen under one write
/// lock, so concurrent writers cannot both claim a title.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl InMemoryStorage {
    pub async fn new() -> Result<Self> {
        Ok(Self::default())
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }

    async fn new() -> Result<Self> {
        Self::new().await
    }
}

#[async_trait]
impl ArticleStore for InMemoryStorage {
    async fn find_by_title(&self, title: &str) -> Result<TitleLookup> {
        let store = self.store.read().await;
        Ok(store.find_by_title(title))
    }

    async fn insert_if_absent(&self, record: &ArticleRecord) -> Result<InsertOutcome> {
        let mut store = self.store.write().await;
        let outcome = store.insert_if_absent(record);
        match outcome {
            InsertOutcome::Inserted => info!(title = %record.title, "Article stored"),
            _ => debug!(title = %record.title, "Article with the same title already stored, skipping"),
        }
        Ok(outcome)
    }

    async fn retrieve(&self, filter: &ArticleFilter) -> Result<Vec<ArticleRecord>> {
        let store = self.store.read().await;
        Ok(store.retrieve(filter))
    }
}
