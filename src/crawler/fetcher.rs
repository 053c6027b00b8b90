//! HTTP fetcher implementation
//!
//! This module handles all page requests for the crawler, including:
//! - Building the session HTTP client (user agent, cookie jar, timeouts)
//! - GET requests for listing and detail pages
//! - Retry with exponential backoff for transient failures
//! - Error classification

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::{Client, StatusCode};
use thiserror::Error;

/// Statuses worth retrying: transient server-side failures.
const RETRYABLE_STATUSES: [u16; 3] = [500, 502, 504];

/// First backoff delay; doubles on every retry.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// A page fetch failure, classified for the caller.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-retryable HTTP status (4xx other than auth trouble)
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    /// The server demands a session this client does not have
    #[error("Login required for {url}")]
    AuthRequired { url: String },

    /// Transient failures exhausted the retry budget
    #[error("Giving up on {url} after {attempts} attempts: {reason}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        reason: String,
    },
}

/// Builds the session HTTP client shared by every request
///
/// The client carries a fixed user agent, the imported cookie jar when one
/// was supplied, and bounded timeouts so no request can hang a crawl.
pub fn build_http_client(
    user_agent: &str,
    cookie_jar: Option<Arc<Jar>>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(user_agent.to_string())
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    if let Some(jar) = cookie_jar {
        builder = builder.cookie_provider(jar);
    }

    builder.build()
}

/// Fetches listing and detail pages with bounded retry.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    base_url: String,
    retries: u32,
}

impl Fetcher {
    pub fn new(client: Client, base_url: String, retries: u32) -> Self {
        Fetcher {
            client,
            base_url,
            retries,
        }
    }

    /// Fetches a site path (e.g. `/view/12345678/`) relative to the base URL.
    ///
    /// Absolute URLs are passed through untouched.
    pub async fn fetch_page(&self, path: &str) -> Result<String, FetchError> {
        let url = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        };
        self.fetch_url(&url).await
    }

    /// Fetches a URL, retrying transient failures with exponential backoff.
    ///
    /// # Retry Logic
    ///
    /// | Condition            | Action                         |
    /// |----------------------|--------------------------------|
    /// | HTTP 500/502/504     | Retry with backoff             |
    /// | Timeout / connection | Retry with backoff             |
    /// | HTTP 401/403         | Immediate `AuthRequired`       |
    /// | Other non-2xx        | Immediate `Status`             |
    /// | Retries exhausted    | `RetriesExhausted`             |
    pub async fn fetch_url(&self, url: &str) -> Result<String, FetchError> {
        let mut delay = INITIAL_BACKOFF;
        let mut last_reason = String::new();

        for attempt in 0..=self.retries {
            if attempt > 0 {
                tracing::debug!(
                    "Retrying {} (attempt {}/{}) after {:?}",
                    url,
                    attempt + 1,
                    self.retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        match response.text().await {
                            Ok(body) => return Ok(body),
                            Err(e) => {
                                // Body read failures are transport errors too
                                last_reason = e.to_string();
                                continue;
                            }
                        }
                    }

                    if RETRYABLE_STATUSES.contains(&status.as_u16()) {
                        last_reason = format!("HTTP {}", status.as_u16());
                        continue;
                    }

                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        return Err(FetchError::AuthRequired {
                            url: url.to_string(),
                        });
                    }

                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }
                Err(e) => {
                    // Connection refused, reset, timeout: all transient
                    last_reason = e.to_string();
                }
            }
        }

        Err(FetchError::RetriesExhausted {
            url: url.to_string(),
            attempts: self.retries + 1,
            reason: last_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher_for(server: &MockServer, retries: u32) -> Fetcher {
        let client = build_http_client("TestAgent/1.0", None).unwrap();
        Fetcher::new(client, server.uri(), retries)
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client("TestAgent/1.0", None).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let body = fetcher_for(&server, 0).fetch_page("/page").await.unwrap();
        assert_eq!(body, "hello");
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&server)
            .await;

        let body = fetcher_for(&server, 2).fetch_page("/flaky").await.unwrap();
        assert_eq!(body, "recovered");
    }

    #[tokio::test]
    async fn test_client_error_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = fetcher_for(&server, 3).fetch_page("/gone").await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_forbidden_maps_to_auth_required() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/private"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = fetcher_for(&server, 1)
            .fetch_page("/private")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::AuthRequired { .. }));
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let err = fetcher_for(&server, 2).fetch_page("/down").await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::RetriesExhausted { attempts: 3, .. }
        ));
    }
}
