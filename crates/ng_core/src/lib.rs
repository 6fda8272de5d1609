pub mod config;
pub mod error;
pub mod storage;
pub mod types;

pub use config::{AllowedDomains, CrawlConfig};
pub use error::{Error, Result};
pub use storage::ArticleStore;
pub use types::{ArticleFilter, ArticleRecord, InsertOutcome, TitleLookup};
