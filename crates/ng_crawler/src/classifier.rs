//! Decides which hrefs on a listing page point at article pages.

use ng_core::config::DEFAULT_ARTICLE_MARKER;

/// Returns true if `link` is non-empty and contains the default article
/// path marker (`/news/articles/`).
pub fn is_article_link(link: &str) -> bool {
    contains_marker(link, DEFAULT_ARTICLE_MARKER)
}

fn contains_marker(link: &str, marker: &str) -> bool {
    !link.is_empty() && link.contains(marker)
}

/// Link predicate with a configurable path marker.
///
/// Links are matched as written in the page; resolving them against the
/// page URL is up to the caller.
#[derive(Debug, Clone)]
pub struct LinkClassifier {
    marker: String,
}

impl LinkClassifier {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn is_article_link(&self, link: &str) -> bool {
        contains_marker(link, &self.marker)
    }
}

impl Default for LinkClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_ARTICLE_MARKER)
    }
}
