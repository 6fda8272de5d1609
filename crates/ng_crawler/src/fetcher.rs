use ng_core::{AllowedDomains, Error, Result};
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// User agent sent with every request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects; relative links resolve against it.
    pub url: Url,
    pub body: String,
}

/// HTTP client restricted to the configured domains.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    allowed_domains: AllowedDomains,
}

impl HttpFetcher {
    pub fn new(allowed_domains: AllowedDomains, timeout: Duration) -> Result<Self> {
        let redirect_domains = allowed_domains.clone();
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .redirect(Policy::custom(move |attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS {
                    attempt.error("too many redirects")
                } else if !redirect_domains.allows(attempt.url()) {
                    let message = format!("redirect to disallowed domain: {}", attempt.url());
                    attempt.error(message)
                } else {
                    attempt.follow()
                }
            }))
            .build()?;
        Ok(Self {
            client,
            allowed_domains,
        })
    }

    pub fn allowed_domains(&self) -> &AllowedDomains {
        &self.allowed_domains
    }

    /// Rejects URLs outside the allowed domains before any request is made.
    pub fn check_allowed(&self, url: &Url) -> Result<()> {
        if self.allowed_domains.allows(url) {
            Ok(())
        } else {
            Err(Error::DomainNotAllowed(url.to_string()))
        }
    }

    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        self.check_allowed(url)?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;
        let final_url = response.url().clone();
        let body = response.text().await?;

        debug!(bytes = body.len(), final_url = %final_url, "Fetched page");
        Ok(FetchedPage {
            url: final_url,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(AllowedDomains::parse("127.0.0.1"), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_sends_browser_user_agent() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/news")
            .match_header("user-agent", BROWSER_USER_AGENT)
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body>listing</body></html>")
            .expect(1)
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/news", server.url())).unwrap();
        let page = fetcher().fetch(&url).await.unwrap();
        assert_eq!(page.url, url);
        assert!(page.body.contains("listing"));

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_disallowed_domain_is_not_requested() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/news")
            .with_status(200)
            .expect(0)
            .create_async()
            .await;

        let fetcher = HttpFetcher::new(
            AllowedDomains::parse("news.example.com"),
            Duration::from_secs(5),
        )
        .unwrap();
        let url = Url::parse(&format!("{}/news", server.url())).unwrap();
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, Error::DomainNotAllowed(_)));

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_redirect_to_disallowed_domain_is_not_followed() {
        let mut server = Server::new_async().await;
        let port = server.socket_address().port();
        let redirect = server
            .mock("GET", "/r")
            .with_status(302)
            .with_header("location", &format!("http://localhost:{}/x", port))
            .expect(1)
            .create_async()
            .await;
        let target = server.mock("GET", "/x").expect(0).create_async().await;

        let url = Url::parse(&format!("{}/r", server.url())).unwrap();
        let err = fetcher().fetch(&url).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
        assert!(format!("{:?}", err).contains("redirect to disallowed domain"));

        redirect.assert_async().await;
        target.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/missing", server.url())).unwrap();
        assert!(matches!(fetcher().fetch(&url).await, Err(Error::Http(_))));
    }
}
