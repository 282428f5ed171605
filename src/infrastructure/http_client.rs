//! HTTP client for crawling with rate limiting and typed error mapping.
//!
//! A token-bucket rate limiter guards every request on top of the engine's
//! inter-request politeness delay. Blocking responses (403/429) are surfaced
//! as their own error kind so the controller can stop safely instead of
//! treating them as a generic failure.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use tracing::debug;

use crate::adapters::{FetchError, FetchedPage, PageFetcher, PageRequest, RequestMethod};
use crate::infrastructure::config::HttpConfig;

/// HTTP client configuration for crawling.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub accept_language: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    pub follow_redirects: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        let http = HttpConfig::default();
        Self::from(&http)
    }
}

impl From<&HttpConfig> for HttpClientConfig {
    fn from(config: &HttpConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            accept_language: config.accept_language.clone(),
            timeout_seconds: config.timeout_seconds,
            max_requests_per_second: config.max_requests_per_second.max(1),
            follow_redirects: true,
        }
    }
}

pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: HttpClientConfig,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("invalid user agent")?,
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language).context("invalid accept-language")?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .cookie_store(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .context("failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("rate limit must be greater than 0")?,
        );
        let rate_limiter = RateLimiter::direct(quota);

        Ok(Self {
            client,
            rate_limiter,
            config,
        })
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    async fn send(&self, request: &PageRequest) -> Result<reqwest::Response, FetchError> {
        self.rate_limiter.until_ready().await;
        debug!(url = %request.url, "fetching");

        let mut builder = match &request.method {
            RequestMethod::Get => self.client.get(&request.url),
            RequestMethod::PostJson(body) => self.client.post(&request.url).json(body),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|err| FetchError::Network {
            url: request.url.clone(),
            reason: err.to_string(),
        })?;

        let status = response.status().as_u16();
        match status {
            403 | 429 => Err(FetchError::Blocked {
                url: request.url.clone(),
                status,
            }),
            s if s >= 400 => Err(FetchError::Status {
                url: request.url.clone(),
                status,
            }),
            _ => Ok(response),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch(&self, request: &PageRequest) -> Result<FetchedPage, FetchError> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|err| FetchError::Network {
            url: request.url.clone(),
            reason: err.to_string(),
        })?;
        debug!(url = %final_url, status, bytes = body.len(), "fetched");
        Ok(FetchedPage {
            url: final_url,
            status,
            body,
        })
    }

    async fn fetch_bytes(&self, request: &PageRequest) -> Result<Vec<u8>, FetchError> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await.map_err(|err| FetchError::Network {
            url: request.url.clone(),
            reason: err.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn client_creation_with_defaults() {
        let client = HttpClient::new(HttpClientConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn zero_rate_limit_is_rejected() {
        let config = HttpClientConfig {
            max_requests_per_second: 0,
            ..Default::default()
        };
        assert!(HttpClient::new(config).is_err());
    }
}
