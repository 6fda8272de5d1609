//! Crawl configuration, sourced from the environment.

use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::{Error, Result};

pub const TARGET_URL_VAR: &str = "TARGET_URL";
pub const ALLOWED_DOMAINS_VAR: &str = "ALLOWED_DOMAINS";
pub const ARTICLE_MARKER_VAR: &str = "ARTICLE_PATH_MARKER";
pub const REQUEST_TIMEOUT_VAR: &str = "REQUEST_TIMEOUT_SECS";
pub const RUN_DEADLINE_VAR: &str = "RUN_DEADLINE_SECS";

pub const DEFAULT_ARTICLE_MARKER: &str = "/news/articles/";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Hosts the crawler may send requests to. Matching is exact on the host,
/// ignoring ASCII case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedDomains(Vec<String>);

impl AllowedDomains {
    /// Parses a comma-separated list, dropping blank entries.
    pub fn parse(list: &str) -> Self {
        Self(
            list.split(',')
                .map(|d| d.trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn domains(&self) -> &[String] {
        &self.0
    }

    pub fn allows(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) => self.0.iter().any(|d| d.eq_ignore_ascii_case(host)),
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub target_url: Url,
    pub allowed_domains: AllowedDomains,
    pub article_marker: String,
    pub request_timeout: Duration,
    /// Upper bound on the whole run, crawl and pending writes included.
    pub run_deadline: Option<Duration>,
}

impl CrawlConfig {
    pub fn new(target_url: Url, allowed_domains: AllowedDomains) -> Self {
        Self {
            target_url,
            allowed_domains,
            article_marker: DEFAULT_ARTICLE_MARKER.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            run_deadline: None,
        }
    }

    pub fn with_article_marker(mut self, marker: impl Into<String>) -> Self {
        self.article_marker = marker.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_run_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.run_deadline = deadline;
        self
    }

    /// Reads the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::Config(format!("{} is not set", key)))
        };

        let target = required(TARGET_URL_VAR)?;
        let target_url = Url::parse(&target)
            .map_err(|e| Error::InvalidUrl(format!("{}={}: {}", TARGET_URL_VAR, target, e)))?;

        let allowed_domains = AllowedDomains::parse(&required(ALLOWED_DOMAINS_VAR)?);
        if allowed_domains.is_empty() {
            return Err(Error::Config(format!(
                "{} does not name any domain",
                ALLOWED_DOMAINS_VAR
            )));
        }

        let mut config = Self::new(target_url, allowed_domains);

        if let Some(marker) = lookup(ARTICLE_MARKER_VAR) {
            if marker.trim().is_empty() {
                return Err(Error::Config(format!("{} is empty", ARTICLE_MARKER_VAR)));
            }
            config.article_marker = marker.trim().to_string();
        }
        if let Some(secs) = parse_secs(&lookup, REQUEST_TIMEOUT_VAR)? {
            config.request_timeout = secs;
        }
        config.run_deadline = parse_secs(&lookup, RUN_DEADLINE_VAR)?;

        debug!(?config, "Loaded crawl configuration");
        Ok(config)
    }
}

fn parse_secs<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|s| Some(Duration::from_secs(s)))
            .map_err(|e| Error::Config(format!("{}={}: {}", key, raw, e))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_with_defaults() {
        let config = CrawlConfig::from_lookup(lookup(&[
            (TARGET_URL_VAR, "https://news.example.com/latest"),
            (ALLOWED_DOMAINS_VAR, " news.example.com , , Example.com"),
        ]))
        .unwrap();

        assert_eq!(config.target_url.as_str(), "https://news.example.com/latest");
        assert_eq!(
            config.allowed_domains.domains(),
            &["news.example.com".to_string(), "example.com".to_string()]
        );
        assert_eq!(config.article_marker, DEFAULT_ARTICLE_MARKER);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(config.run_deadline.is_none());
    }

    #[test]
    fn test_missing_required_variables() {
        let err = CrawlConfig::from_lookup(lookup(&[(ALLOWED_DOMAINS_VAR, "example.com")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains(TARGET_URL_VAR)));

        let err = CrawlConfig::from_lookup(lookup(&[(TARGET_URL_VAR, "https://example.com")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains(ALLOWED_DOMAINS_VAR)));

        let err = CrawlConfig::from_lookup(lookup(&[
            (TARGET_URL_VAR, "https://example.com"),
            (ALLOWED_DOMAINS_VAR, " , "),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_values() {
        let err = CrawlConfig::from_lookup(lookup(&[
            (TARGET_URL_VAR, "not a url"),
            (ALLOWED_DOMAINS_VAR, "example.com"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));

        let err = CrawlConfig::from_lookup(lookup(&[
            (TARGET_URL_VAR, "https://example.com"),
            (ALLOWED_DOMAINS_VAR, "example.com"),
            (REQUEST_TIMEOUT_VAR, "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_optional_overrides() {
        let config = CrawlConfig::from_lookup(lookup(&[
            (TARGET_URL_VAR, "https://example.com"),
            (ALLOWED_DOMAINS_VAR, "example.com"),
            (ARTICLE_MARKER_VAR, "/story/"),
            (REQUEST_TIMEOUT_VAR, "5"),
            (RUN_DEADLINE_VAR, "120"),
        ]))
        .unwrap();
        assert_eq!(config.article_marker, "/story/");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.run_deadline, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_allowed_domains_matching() {
        let domains = AllowedDomains::parse("news.example.com");
        assert!(domains.allows(&Url::parse("https://NEWS.example.com/a").unwrap()));
        assert!(!domains.allows(&Url::parse("https://example.com/a").unwrap()));
        assert!(!domains.allows(&Url::parse("https://evil.news.example.com/a").unwrap()));
    }
}
