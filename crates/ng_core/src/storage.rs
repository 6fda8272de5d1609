use async_trait::async_trait;
use crate::types::{ArticleFilter, ArticleRecord, InsertOutcome, TitleLookup};
use crate::Result;

/// Document store holding scraped articles, keyed by title.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Look up the record stored under `title` (case-sensitive exact match).
    async fn find_by_title(&self, title: &str) -> Result<TitleLookup>;

    /// Store `record` unless a record with the same title exists.
    ///
    /// Implementations must enforce title uniqueness at the store level so
    /// that concurrent calls for one title leave exactly one record.
    async fn insert_if_absent(&self, record: &ArticleRecord) -> Result<InsertOutcome>;

    /// Return every record matching `filter`, in no particular order.
    async fn retrieve(&self, filter: &ArticleFilter) -> Result<Vec<ArticleRecord>>;

    /// Release the underlying connection.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
