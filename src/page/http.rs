use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::AcquisitionConfig;

const USER_AGENT: &str = concat!("transcript-gate/", env!("CARGO_PKG_VERSION"));

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
}

/// Status and body text of a completed request
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub status: u16,
    pub body: String,
}

impl FetchedBody {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound GET requests issued on behalf of the page
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<FetchedBody, FetchError>;
}

/// reqwest-backed fetcher. Bounded only by the client's own timeout.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Fetcher with a hard cap on every request
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Capped when `request_timeout_secs` is configured, otherwise bounded
    /// only by the network stack
    pub fn for_config(config: &AcquisitionConfig) -> Result<Self, FetchError> {
        match config.request_timeout() {
            Some(timeout) => Self::with_timeout(timeout),
            None => Ok(Self::new()),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<FetchedBody, FetchError> {
        url::Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

        tracing::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(FetchedBody { status, body })
    }
}
