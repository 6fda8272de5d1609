//! Per-page extraction of an [`ArticleRecord`].
//!
//! Each article page gets its own [`PageVisit`]. Handlers fire in document
//! order for `<title>`, JSON-LD scripts and `<article>` elements, filling
//! the visit's [`ArticleDraft`]. Nothing is shared between visits, so no
//! field can leak from one article into the next.

use chrono::Utc;
use ng_core::{ArticleRecord, Error, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::jsonld::{parse_structured_block, StructuredMetadata, JSON_LD_SELECTOR};

/// Record under construction for a single page.
#[derive(Debug, Clone, Default)]
pub struct ArticleDraft {
    pub title: Option<String>,
    pub date_published: Option<String>,
    pub article_url: Option<String>,
    pub content: Option<String>,
}

/// Outcome of extracting one page.
#[derive(Debug, Clone)]
pub enum Extraction {
    Complete(ArticleRecord),
    /// The page had no non-empty `<article>` container.
    NoContent,
    /// Content was found but the page had no usable title to key it by.
    Untitled,
}

impl ArticleDraft {
    /// Turns the draft into a record, stamping `scraped_at` with the current time.
    pub fn finish(self) -> Extraction {
        let Some(content) = self.content else {
            return Extraction::NoContent;
        };
        let Some(title) = self.title else {
            return Extraction::Untitled;
        };
        Extraction::Complete(ArticleRecord {
            title,
            date_published: self.date_published.unwrap_or_default(),
            article_url: self.article_url.unwrap_or_default(),
            content,
            scraped_at: Utc::now(),
        })
    }
}

/// Extraction state for one article page.
#[derive(Debug, Default)]
pub struct PageVisit {
    draft: ArticleDraft,
    title_seen: bool,
    metadata: StructuredMetadata,
}

impl PageVisit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the first non-empty title on a page counts.
    pub fn on_title(&mut self, text: &str) {
        if self.title_seen {
            return;
        }
        let title = text.trim();
        if title.is_empty() {
            return;
        }
        debug!(title, "Found title");
        self.draft.title = Some(title.to_string());
        self.title_seen = true;
    }

    /// Malformed blocks are logged and ignored.
    pub fn on_structured_data(&mut self, text: &str) {
        match parse_structured_block(text) {
            Ok(metadata) => self.metadata.merge(metadata),
            Err(e) => warn!(error = %e, "Error unmarshalling structured data"),
        }
    }

    pub fn on_article(&mut self, text: &str) {
        if self.draft.content.is_some() {
            return;
        }
        let content = text.trim();
        if content.is_empty() {
            return;
        }
        debug!(bytes = content.len(), "Found article content");
        self.draft.content = Some(content.to_string());
    }

    fn dispatch(&mut self, element: ElementRef<'_>) {
        let text = element.text().collect::<String>();
        match element.value().name() {
            "title" => self.on_title(&text),
            "script" => self.on_structured_data(&text),
            "article" => self.on_article(&text),
            _ => {}
        }
    }

    pub fn draft(&self) -> &ArticleDraft {
        &self.draft
    }

    /// Ends the visit. Dropping the visit is what resets per-page state.
    pub fn finish(mut self) -> Extraction {
        self.draft.date_published = self.metadata.date_published.take();
        self.draft.article_url = self.metadata.main_entity_of_page.take();
        if self.draft.date_published.is_none() {
            debug!("Can't retrieve publication date");
        }
        self.draft.finish()
    }
}

/// Holds the page selector so it is parsed once per crawl, not per page.
#[derive(Debug, Clone)]
pub struct ArticleExtractor {
    selector: Selector,
}

impl ArticleExtractor {
    pub fn new() -> Result<Self> {
        let selector = Selector::parse(&format!("title, {}, article", JSON_LD_SELECTOR))
            .map_err(|e| Error::Scraping(format!("Invalid selector: {}", e)))?;
        Ok(Self { selector })
    }

    /// Runs a full visit over an article page's HTML.
    pub fn extract(&self, html: &str) -> Extraction {
        let document = Html::parse_document(html);

        let mut visit = PageVisit::new();
        for element in document.select(&self.selector) {
            visit.dispatch(element);
        }
        visit.finish()
    }
}

/// One-off extraction; fails only if the selector cannot be built.
pub fn extract_article(html: &str) -> Result<Extraction> {
    Ok(ArticleExtractor::new()?.extract(html))
}
