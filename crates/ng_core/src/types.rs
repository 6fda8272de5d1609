use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fully extracted article, as persisted in the store.
///
/// Field names on the wire follow the store schema (`datePublished`,
/// `articleURL`, `Content`, `scrapedAt`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: String,
    /// Calendar date (`YYYY-MM-DD`), empty when the page had no usable metadata.
    #[serde(rename = "datePublished", default)]
    pub date_published: String,
    #[serde(rename = "articleURL", default)]
    pub article_url: String,
    #[serde(rename = "Content")]
    pub content: String,
    #[serde(rename = "scrapedAt")]
    pub scraped_at: DateTime<Utc>,
}

/// Selects records on retrieval. The default filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFilter {
    pub date_published: Option<String>,
}

impl ArticleFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_date(date: impl Into<String>) -> Self {
        Self {
            date_published: Some(date.into()),
        }
    }

    /// Builds a filter from free-form user input: blank means no filter.
    pub fn from_input(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            Self::all()
        } else {
            Self::by_date(input)
        }
    }

    pub fn matches(&self, record: &ArticleRecord) -> bool {
        match &self.date_published {
            Some(date) => record.date_published == *date,
            None => true,
        }
    }
}

/// Result of looking up a title in the store.
#[derive(Debug, Clone)]
pub enum TitleLookup {
    Absent,
    Present(ArticleRecord),
    /// A document with this title exists but could not be decoded.
    Undecodable(String),
}

/// What `insert_if_absent` did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A record with the same title already exists; nothing was written.
    Duplicate,
    /// The title slot is taken by a document that cannot be decoded; nothing was written.
    ExistingUndecodable,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: &str) -> ArticleRecord {
        ArticleRecord {
            title: "Test Article".to_string(),
            date_published: date.to_string(),
            article_url: "https://example.com/news/articles/1".to_string(),
            content: "Body".to_string(),
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn test_filter_matches_exact_date() {
        let filter = ArticleFilter::by_date("2024-05-01");
        assert!(filter.matches(&record("2024-05-01")));
        assert!(!filter.matches(&record("2024-05-02")));
        assert!(!filter.matches(&record("")));
    }

    #[test]
    fn test_filter_from_input() {
        assert_eq!(ArticleFilter::from_input("   "), ArticleFilter::all());
        assert_eq!(
            ArticleFilter::from_input(" 2024-05-01\n"),
            ArticleFilter::by_date("2024-05-01")
        );
        assert!(ArticleFilter::all().matches(&record("")));
    }

    #[test]
    fn test_record_uses_store_field_names() {
        let json = serde_json::to_value(record("2024-05-01")).unwrap();
        assert_eq!(json["datePublished"], "2024-05-01");
        assert_eq!(json["articleURL"], "https://example.com/news/articles/1");
        assert_eq!(json["Content"], "Body");
        assert!(json.get("scrapedAt").is_some());
    }
}
