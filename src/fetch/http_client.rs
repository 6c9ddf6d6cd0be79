//! HTTP client with identity rotation and bounded retry.
//!
//! Statuses are returned to the caller rather than raised: some strategies
//! need to see a 500 and retry the whole strategy, not just the transport
//! call. Connection-level failures are treated as a stronger blocking signal
//! than an error status and trigger a session reset.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::TrackError;

use super::backoff::{jitter, BackoffPolicy};
use super::headers::{seed_cookies, HeaderProfile};

/// Response from one fetch, regardless of HTTP status.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
    /// URL after redirects settled.
    pub final_url: String,
}

/// HTTP client with rotating header profiles and pre-seeded session cookies.
pub struct FetchClient {
    client: Mutex<Client>,
    policy: BackoffPolicy,
    timeout: Duration,
    /// Pre-request delay range, anti-fingerprinting.
    request_delay: (Duration, Duration),
    /// Store domains that receive plausible session cookies.
    cookie_domains: Vec<String>,
}

impl FetchClient {
    pub fn new(
        policy: BackoffPolicy,
        timeout: Duration,
        request_delay: (Duration, Duration),
        cookie_domains: Vec<String>,
    ) -> Result<Self, TrackError> {
        let client = build_client(timeout, &cookie_domains)?;
        Ok(Self {
            client: Mutex::new(client),
            policy,
            timeout,
            request_delay,
            cookie_domains,
        })
    }

    /// Discard the current session and start over with fresh cookies.
    pub async fn reset_session(&self) -> Result<(), TrackError> {
        debug!("Resetting HTTP session with fresh identity");
        let fresh = build_client(self.timeout, &self.cookie_domains)?;
        *self.client.lock().await = fresh;
        Ok(())
    }

    /// Make a GET request with a randomly selected header profile.
    ///
    /// Retries {429, 500, 502, 503, 504} with exponential backoff (honoring
    /// Retry-After on 429); never errors on other HTTP statuses.
    pub async fn fetch(
        &self,
        url: &str,
        referer: Option<&str>,
    ) -> Result<FetchResponse, TrackError> {
        let mut attempt: u32 = 0;

        loop {
            // Human-like pause before every request.
            tokio::time::sleep(jitter(self.request_delay.0, self.request_delay.1)).await;

            let profile = HeaderProfile::random();
            let client = self.client.lock().await.clone();

            let mut request = client
                .get(url)
                .header("User-Agent", profile.user_agent)
                .header("Accept", profile.accept)
                .header("Accept-Language", profile.accept_language);
            for (name, value) in HeaderProfile::common_headers() {
                request = request.header(*name, *value);
            }
            if let Some(referer) = referer {
                request = request.header("Referer", referer);
            }

            let outcome = match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let retry_after = parse_retry_after(response.headers());
                    let final_url = response.url().to_string();
                    response
                        .text()
                        .await
                        .map(|body| (status, body, final_url, retry_after))
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok((status, body, final_url, retry_after)) => {
                    if self.policy.is_retryable_status(status) && self.policy.should_retry(attempt)
                    {
                        let wait = match (status, retry_after) {
                            (429, Some(after)) => after,
                            _ => self.policy.delay_for(attempt),
                        };
                        debug!("HTTP {} from {}, retrying in {:?}", status, url, wait);
                        tokio::time::sleep(wait).await;
                        attempt += 1;
                        continue;
                    }

                    return Ok(FetchResponse {
                        status,
                        body,
                        final_url,
                    });
                }
                Err(e) => {
                    attempt += 1;
                    if !self.policy.should_retry(attempt) {
                        return Err(TrackError::TransientNetwork(format!("{}: {}", url, e)));
                    }

                    // Connection resets and timeouts read as blocking, not
                    // load: back off longer and present a new identity.
                    let wait = self.policy.delay_for(attempt).saturating_mul(2);
                    warn!(
                        "Transport error fetching {} (attempt {}): {}, new session in {:?}",
                        url, attempt, e, wait
                    );
                    tokio::time::sleep(wait).await;
                    self.reset_session().await?;
                }
            }
        }
    }

    /// Resolve a redirect-shortened URL by following redirects with a short
    /// timeout and reading back the settled URL.
    pub async fn resolve_url(&self, url: &str) -> Result<String, TrackError> {
        let profile = HeaderProfile::random();
        let client = self.client.lock().await.clone();

        let response = client
            .get(url)
            .header("User-Agent", profile.user_agent)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| TrackError::TransientNetwork(format!("{}: {}", url, e)))?;

        Ok(response.url().to_string())
    }
}

fn build_client(timeout: Duration, cookie_domains: &[String]) -> Result<Client, TrackError> {
    let jar = Jar::default();
    for domain in cookie_domains {
        if let Ok(base) = format!("https://www.{}/", domain).parse::<url::Url>() {
            for cookie in seed_cookies(domain) {
                jar.add_cookie_str(&cookie, &base);
            }
        }
    }

    Client::builder()
        .cookie_provider(Arc::new(jar))
        .timeout(timeout)
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(|e| TrackError::Fatal(format!("failed to build HTTP client: {}", e)))
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
