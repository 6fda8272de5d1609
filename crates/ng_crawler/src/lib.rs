pub mod classifier;
pub mod extractor;
pub mod fetcher;
pub mod jsonld;
pub mod logging;
pub mod orchestrator;
pub mod tasks;

pub use classifier::{is_article_link, LinkClassifier};
pub use extractor::{extract_article, ArticleDraft, ArticleExtractor, Extraction, PageVisit};
pub use fetcher::{FetchedPage, HttpFetcher, BROWSER_USER_AGENT};
pub use logging::init_logging;
pub use orchestrator::{CrawlOrchestrator, CrawlReport};
pub use tasks::{PersistenceTasks, WriteSummary};

pub mod prelude {
    pub use super::{CrawlOrchestrator, CrawlReport};
    pub use ng_core::{ArticleRecord, ArticleStore, CrawlConfig, Error, Result};
}
