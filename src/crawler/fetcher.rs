//! Static HTTP fetcher
//!
//! Fetches a page with a plain GET, follows redirects, accepts any status
//! code and any content type, and parses links only out of HTML bodies.

use crate::config::CrawlerConfig;
use crate::crawler::parser::{parse_html, truncate_chars};
use crate::crawler::PageSnapshot;
use crate::StateTrailError;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The crawler configuration (user agent and timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.request_timeout_secs))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetch strategy that uses plain HTTP and HTML parsing
#[derive(Debug, Clone)]
pub struct StaticFetcher {
    client: Client,
    max_body_chars: usize,
}

impl StaticFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self, StateTrailError> {
        Ok(Self {
            client: build_http_client(config)?,
            max_body_chars: config.max_body_chars,
        })
    }

    /// Fetches a URL
    ///
    /// Non-2xx responses are not errors: they still produce a snapshot with
    /// their status code. Only transport failures are returned as
    /// `StateTrailError::Fetch`.
    pub async fn fetch(&self, url: &Url) -> Result<PageSnapshot, StateTrailError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| fetch_error(url, &e))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await.map_err(|e| fetch_error(url, &e))?;

        let is_html = content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"));

        let parsed = if is_html {
            parse_html(&body, &final_url)
        } else {
            debug!("Skipping link extraction for {} ({:?})", url, content_type);
            Default::default()
        };

        Ok(PageSnapshot {
            final_url: final_url.to_string(),
            status: Some(status),
            content_type,
            title: parsed.title,
            html_snapshot: Some(truncate_chars(&body, self.max_body_chars)),
            links: parsed.links,
            ..Default::default()
        })
    }
}

fn fetch_error(url: &Url, error: &reqwest::Error) -> StateTrailError {
    let message = if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        "Connection refused".to_string()
    } else {
        error.to_string()
    };
    StateTrailError::Fetch {
        url: url.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> CrawlerConfig {
        CrawlerConfig {
            max_body_chars: 50,
            ..Default::default()
        }
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&CrawlerConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(
                        r#"<html><head><title>Home</title></head><body><a href="/b">B</a></body></html>"#,
                    )
                    .insert_header("content-type", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let fetcher = StaticFetcher::new(&CrawlerConfig::default()).unwrap();
        let url = Url::parse(&format!("{}/", server.uri())).unwrap();
        let snapshot = fetcher.fetch(&url).await.unwrap();

        assert_eq!(snapshot.status, Some(200));
        assert_eq!(snapshot.title.as_deref(), Some("Home"));
        assert_eq!(snapshot.links.len(), 1);
        assert_eq!(snapshot.links[0].url, format!("{}/b", server.uri()));
        assert!(snapshot.ui_signature.is_none());
    }

    #[tokio::test]
    async fn test_fetch_tolerates_errors_and_non_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_string("<a href=\"/x\">x</a>")
                    .insert_header("content-type", "text/plain"),
            )
            .mount(&server)
            .await;

        let fetcher = StaticFetcher::new(&config()).unwrap();
        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let snapshot = fetcher.fetch(&url).await.unwrap();

        assert_eq!(snapshot.status, Some(404));
        assert_eq!(snapshot.content_type.as_deref(), Some("text/plain"));
        assert!(snapshot.links.is_empty());
        assert_eq!(snapshot.html_snapshot.as_deref(), Some("<a href=\"/x\">x</a>"));
    }

    #[tokio::test]
    async fn test_snapshot_is_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("y".repeat(500))
                    .insert_header("content-type", "text/html"),
            )
            .mount(&server)
            .await;

        let fetcher = StaticFetcher::new(&config()).unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let snapshot = fetcher.fetch(&url).await.unwrap();
        assert_eq!(snapshot.html_snapshot.map(|s| s.len()), Some(50));
    }

    #[tokio::test]
    async fn test_connection_failure_is_fetch_error() {
        let fetcher = StaticFetcher::new(&CrawlerConfig::default()).unwrap();
        let url = Url::parse("http://127.0.0.1:1/").unwrap();
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert_eq!(err.kind(), "FetchError");
    }
}
