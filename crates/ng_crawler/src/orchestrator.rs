use ng_core::{ArticleStore, CrawlConfig, Error, Result};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use url::Url;

use crate::classifier::LinkClassifier;
use crate::extractor::{ArticleExtractor, Extraction};
use crate::fetcher::{FetchedPage, HttpFetcher};
use crate::tasks::{expiry, PersistenceTasks};

/// Counters for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub links_discovered: usize,
    pub articles_visited: usize,
    pub fetch_failures: usize,
    pub incomplete_pages: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub undecodable_existing: usize,
    pub write_failures: usize,
}

impl CrawlReport {
    /// True when every completed article reached a terminal store outcome.
    pub fn is_clean(&self) -> bool {
        self.write_failures == 0
    }
}

pub struct CrawlOrchestrator {
    config: CrawlConfig,
    store: Arc<dyn ArticleStore>,
    fetcher: HttpFetcher,
    classifier: LinkClassifier,
    extractor: ArticleExtractor,
    link_selector: Selector,
}

impl CrawlOrchestrator {
    pub fn new(config: CrawlConfig, store: Arc<dyn ArticleStore>) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.allowed_domains.clone(), config.request_timeout)?;
        let classifier = LinkClassifier::new(config.article_marker.clone());
        let link_selector = Selector::parse("a[href]")
            .map_err(|e| Error::Scraping(format!("Invalid selector: {}", e)))?;
        Ok(Self {
            config,
            store,
            fetcher,
            classifier,
            extractor: ArticleExtractor::new()?,
            link_selector,
        })
    }

    pub async fn run(&self) -> Result<CrawlReport> {
        self.run_until_cancelled(CancellationToken::new()).await
    }

    /// Crawls the listing page and its articles, then waits for every write.
    ///
    /// Only returns `Ok` after all persistence tasks have finished.
    pub async fn run_until_cancelled(&self, token: CancellationToken) -> Result<CrawlReport> {
        let deadline = self.config.run_deadline.map(|d| Instant::now() + d);
        let mut report = CrawlReport::default();
        let mut tasks = PersistenceTasks::new(self.store.clone());

        info!(
            listing = %self.config.target_url,
            domains = ?self.fetcher.allowed_domains().domains(),
            "Starting crawl"
        );

        // Dropping `tasks` on an early return aborts whatever was spawned.
        tokio::select! {
            _ = token.cancelled() => {
                warn!("Run cancelled during crawl");
                return Err(Error::Cancelled);
            }
            _ = expiry(deadline) => {
                warn!("Run deadline reached during crawl");
                return Err(Error::Timeout("deadline reached while crawling".to_string()));
            }
            crawled = self.crawl(&mut report, &mut tasks) => crawled?,
        }

        info!(pending = tasks.pending(), "Crawl finished, waiting for pending writes");
        let writes = tasks.join_all(&token, deadline).await?;
        report.inserted = writes.inserted;
        report.duplicates = writes.duplicates;
        report.undecodable_existing = writes.undecodable_existing;
        report.write_failures = writes.failures;

        info!(?report, "Run complete");
        Ok(report)
    }

    async fn crawl(&self, report: &mut CrawlReport, tasks: &mut PersistenceTasks) -> Result<()> {
        let listing = self
            .fetcher
            .fetch(&self.config.target_url)
            .instrument(info_span!("listing", url = %self.config.target_url))
            .await?;

        let links = self.discover_links(&listing);
        report.links_discovered = links.len();
        info!(count = links.len(), "Discovered article links");

        for link in links {
            let span = info_span!("article", url = %link);
            self.visit_article(&link, report, tasks).instrument(span).await;
        }
        Ok(())
    }

    /// Article links on `page`, resolved against its final URL without
    /// fragments, in first-seen order.
    pub fn discover_links(&self, page: &FetchedPage) -> Vec<Url> {
        let document = Html::parse_document(&page.body);

        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for href in document
            .select(&self.link_selector)
            .filter_map(|a| a.value().attr("href"))
        {
            if !self.classifier.is_article_link(href) {
                continue;
            }
            match page.url.join(href) {
                Ok(mut url) => {
                    url.set_fragment(None);
                    if seen.insert(url.clone()) {
                        debug!(%url, "Found article link");
                        links.push(url);
                    }
                }
                Err(e) => debug!(href, error = %e, "Skipping unresolvable link"),
            }
        }
        links
    }

    async fn visit_article(&self, url: &Url, report: &mut CrawlReport, tasks: &mut PersistenceTasks) {
        let page = match self.fetcher.fetch(url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(error = %e, "Error fetching article");
                report.fetch_failures += 1;
                return;
            }
        };
        report.articles_visited += 1;

        match self.extractor.extract(&page.body) {
            Extraction::Complete(record) => {
                info!(title = %record.title, "Scraped article");
                tasks.spawn(record);
            }
            Extraction::NoContent => {
                debug!("No article content on page");
                report.incomplete_pages += 1;
            }
            Extraction::Untitled => {
                warn!("Article has no title, not saving it");
                report.incomplete_pages += 1;
            }
        }
    }
}
