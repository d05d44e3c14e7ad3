use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::timeout;
use uuid::Uuid;

pub mod responder;

pub use responder::{Responder, ResponderFactory, ResponderHost};

use crate::page::PageError;
use crate::pipeline::AnalysisReport;

/// Requests a control surface can send to the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PageRequest {
    /// Start an acquire-and-classify pass; acknowledged immediately
    CheckVideo,
    /// Full round trip returning an `AnalysisReport` or `{error}`
    GetTranscript {
        #[serde(rename = "apiKey")]
        api_key: String,
    },
}

/// Acknowledgement of `checkVideo`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckAck {
    pub status: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ChannelError {
    #[error("Could not establish connection. Receiving end does not exist.")]
    NoReceiver,

    #[error("page reload failed: {0}")]
    Reload(#[from] PageError),
}

/// Transport between a control surface and the page-resident responder
#[async_trait]
pub trait PageChannel: Send + Sync {
    /// Deliver `request`; `None` when the page answered with nothing
    async fn send(&self, request: &PageRequest) -> Result<Option<Value>, ChannelError>;

    /// Force a full reload of the target page
    async fn reload(&self) -> Result<(), ChannelError>;
}

/// Suspension point for protocol delays, swappable in tests
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub response_timeout: Duration,
    pub reload_wait: Duration,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            response_timeout: Duration::from_secs(30),
            reload_wait: Duration::from_secs(3),
            backoff_step: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Linear backoff after a failed attempt
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// Why one attempt of an exchange failed
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    #[error("Timeout waiting for response")]
    Timeout,

    #[error("{0}")]
    Channel(String),

    #[error("Empty response received")]
    EmptyResponse,

    #[error("Malformed response: {0}")]
    Malformed(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Every attempt failed; carries the most recent failure
    #[error("{last}")]
    Exhausted { attempts: u32, last: AttemptFailure },

    #[error("Failed to get transcript after all retries")]
    NoAttempts,

    /// The responder ran and reported an error of its own
    #[error("{0}")]
    Responder(String),
}

/// Bookkeeping for one outstanding exchange
#[derive(Debug, Clone, PartialEq)]
pub struct RetryEnvelope {
    pub exchange_id: Uuid,
    pub attempt: u32,
    pub max_attempts: u32,
    pub last_error: Option<AttemptFailure>,
}

impl RetryEnvelope {
    fn new(max_attempts: u32) -> Self {
        Self {
            exchange_id: Uuid::new_v4(),
            attempt: 0,
            max_attempts,
            last_error: None,
        }
    }
}

/// Request/response exchange with bounded retries, forcing a page reload
/// before every attempt after the first. Attempts never overlap.
pub struct RetryProtocol {
    channel: Arc<dyn PageChannel>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl RetryProtocol {
    pub fn new(channel: Arc<dyn PageChannel>, policy: RetryPolicy) -> Self {
        Self::with_clock(channel, policy, Arc::new(TokioClock))
    }

    pub fn with_clock(channel: Arc<dyn PageChannel>, policy: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { channel, policy, clock }
    }

    pub async fn request_transcript(&self, api_key: &str) -> Result<AnalysisReport, ProtocolError> {
        self.exchange(&PageRequest::GetTranscript {
            api_key: api_key.to_string(),
        })
        .await
    }

    pub async fn check_video(&self) -> Result<CheckAck, ProtocolError> {
        self.exchange(&PageRequest::CheckVideo).await
    }

    /// Send `request` until a well-formed reply decodes into `T`
    pub async fn exchange<T: DeserializeOwned>(&self, request: &PageRequest) -> Result<T, ProtocolError> {
        let mut envelope = RetryEnvelope::new(self.policy.max_attempts);

        for attempt in 1..=self.policy.max_attempts {
            envelope.attempt = attempt;
            tracing::debug!(
                "Exchange {}: attempt {}/{}",
                envelope.exchange_id,
                attempt,
                envelope.max_attempts
            );

            if attempt > 1 {
                self.force_reload().await;
            }

            match self.attempt_once(request).await {
                Ok(Ok(reply)) => return Ok(reply),
                Ok(Err(message)) => {
                    tracing::warn!("Responder reported an error: {}", message);
                    return Err(ProtocolError::Responder(message));
                }
                Err(failure) => {
                    tracing::warn!("Attempt {} failed: {}", attempt, failure);
                    envelope.last_error = Some(failure);

                    if attempt < self.policy.max_attempts {
                        self.clock.sleep(self.policy.backoff_after(attempt)).await;
                    }
                }
            }
        }

        let error = match envelope.last_error {
            Some(last) => ProtocolError::Exhausted {
                attempts: envelope.max_attempts,
                last,
            },
            None => ProtocolError::NoAttempts,
        };
        tracing::error!("Exchange {} failed: {}", envelope.exchange_id, error);
        Err(error)
    }

    async fn force_reload(&self) {
        tracing::info!("Reloading target page before retrying");
        if let Err(e) = self.channel.reload().await {
            tracing::warn!("Page reload failed: {}", e);
        }
        self.clock.sleep(self.policy.reload_wait).await;
    }

    /// Outer error: the attempt failed. Inner error: the responder answered
    /// with `{error}`.
    async fn attempt_once<T: DeserializeOwned>(&self, request: &PageRequest) -> Result<Result<T, String>, AttemptFailure> {
        let reply = match timeout(self.policy.response_timeout, self.channel.send(request)).await {
            Err(_) => return Err(AttemptFailure::Timeout),
            Ok(Err(e)) => return Err(AttemptFailure::Channel(e.to_string())),
            Ok(Ok(None)) | Ok(Ok(Some(Value::Null))) => return Err(AttemptFailure::EmptyResponse),
            Ok(Ok(Some(reply))) => reply,
        };

        if let Some(message) = reply.get("error").and_then(Value::as_str) {
            return Ok(Err(message.to_string()));
        }

        serde_json::from_value(reply)
            .map(Ok)
            .map_err(|e| AttemptFailure::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_use_action_tags() {
        assert_eq!(serde_json::to_value(PageRequest::CheckVideo).unwrap(), json!({"action": "checkVideo"}));
        assert_eq!(
            serde_json::to_value(PageRequest::GetTranscript { api_key: "k".into() }).unwrap(),
            json!({"action": "getTranscript", "apiKey": "k"})
        );
        let parsed: PageRequest = serde_json::from_value(json!({"action": "getTranscript", "apiKey": "k2"})).unwrap();
        assert_eq!(parsed, PageRequest::GetTranscript { api_key: "k2".into() });
    }

    #[test]
    fn backoff_is_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_after(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff_after(2), Duration::from_millis(2000));
    }

    #[test]
    fn exhausted_error_shows_last_reason() {
        let err = ProtocolError::Exhausted { attempts: 3, last: AttemptFailure::Timeout };
        assert_eq!(err.to_string(), "Timeout waiting for response");
    }
}
