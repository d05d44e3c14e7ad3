use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod gemini;

pub use gemini::GeminiBackend;

use crate::config::ClassifierConfig;
use crate::utils::{first_json_object, truncate_chars};

/// Structured outcome of classifying one video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationVerdict {
    pub is_productive: bool,
    pub reason: String,
    /// Reported by the service in [0, 1]; passed through unclamped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl ClassificationVerdict {
    pub fn content_type(&self) -> &'static str {
        if self.is_productive {
            "Productive Content"
        } else {
            "Non-Productive Content"
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ClassifyError {
    #[error("no API key configured for the classification service")]
    MissingApiKey,

    #[error("classification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("classification service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("classification service reply contained no text")]
    EmptyReply,

    #[error("no JSON object found in classification reply")]
    NoJsonObject,

    #[error("classification verdict could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClassifyError {
    /// Whether the reply arrived but could not be turned into a verdict
    pub fn is_parse_error(&self) -> bool {
        matches!(self, ClassifyError::NoJsonObject | ClassifyError::Decode(_))
    }
}

/// One prompt plus its generation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

/// The external text-generation service: prompt in, free-form text out
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, api_key: &str, request: &GenerationRequest) -> Result<String, ClassifyError>;
}

/// Build the single combined classification prompt
pub fn build_prompt(title: &str, description: &str, transcript_excerpt: &str) -> String {
    format!(
        "Analyze this YouTube video content and determine if it's productive content \
(educational, informative, skill-building) or non-productive content (entertainment, \
casual vlogs, product reviews). Here's the information:

Title: {title}
Description: {description}
Transcript: {transcript_excerpt}

Respond with only a JSON object with the following structure:
{{
  \"isProductive\": boolean,
  \"reason\": \"brief explanation of why this content is considered productive or not\"
}}"
    )
}

/// Extract and decode the first JSON object in a free-form reply
pub fn parse_verdict(reply: &str) -> Result<ClassificationVerdict, ClassifyError> {
    let object = first_json_object(reply).ok_or(ClassifyError::NoJsonObject)?;
    Ok(serde_json::from_str(object)?)
}

/// Sends title, description and a bounded transcript excerpt for classification
pub struct ClassificationAdapter {
    backend: Arc<dyn CompletionBackend>,
    config: ClassifierConfig,
}

impl ClassificationAdapter {
    pub fn new(backend: Arc<dyn CompletionBackend>, config: ClassifierConfig) -> Self {
        Self { backend, config }
    }

    pub fn request_for(&self, title: &str, description: &str, transcript: &str) -> GenerationRequest {
        let excerpt = truncate_chars(transcript, self.config.transcript_char_limit);
        GenerationRequest {
            prompt: build_prompt(title, description, &excerpt),
            temperature: self.config.temperature,
            top_k: self.config.top_k,
            top_p: self.config.top_p,
            max_output_tokens: self.config.max_output_tokens,
        }
    }

    /// One call to the service; failures are returned as-is, never retried
    pub async fn classify(
        &self,
        api_key: &str,
        title: &str,
        description: &str,
        transcript: &str,
    ) -> Result<ClassificationVerdict, ClassifyError> {
        if api_key.trim().is_empty() {
            return Err(ClassifyError::MissingApiKey);
        }

        let request = self.request_for(title, description, transcript);
        tracing::info!("Requesting classification ({} prompt chars)", request.prompt.chars().count());

        let reply = self.backend.complete(api_key, &request).await?;
        tracing::debug!("Classification reply: {}", reply);

        let verdict = parse_verdict(&reply)?;
        tracing::info!("Classified as {}: {}", verdict.content_type(), verdict.reason);
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn parses_verdict_after_leading_prose() {
        let reply = "Based on the title this is clearly fun.\n{\"isProductive\": false, \"reason\": \"entertainment\"}";
        let verdict = parse_verdict(reply).unwrap();
        assert!(!verdict.is_productive);
        assert_eq!(verdict.reason, "entertainment");
        assert_eq!(verdict.confidence, None);
    }

    #[test]
    fn parses_fenced_reply_with_confidence() {
        let reply = "```json\n{\"isProductive\": true, \"reason\": \"a {lecture}\", \"confidence\": 0.9}\n```";
        let verdict = parse_verdict(reply).unwrap();
        assert!(verdict.is_productive);
        assert_eq!(verdict.reason, "a {lecture}");
        assert_eq!(verdict.confidence, Some(0.9));
    }

    #[test]
    fn reply_without_object_is_a_parse_error() {
        let err = parse_verdict("I cannot decide.").unwrap_err();
        assert!(matches!(err, ClassifyError::NoJsonObject));
        assert!(err.is_parse_error());
    }

    #[test]
    fn missing_or_malformed_fields_fail_to_decode() {
        assert!(matches!(parse_verdict("{\"reason\": \"no flag\"}"), Err(ClassifyError::Decode(_))));
        assert!(matches!(
            parse_verdict("{\"isProductive\": true, \"reason\": \"x\", \"confidence\": \"high\"}"),
            Err(ClassifyError::Decode(_))
        ));
    }

    #[test]
    fn long_transcripts_are_truncated() {
        let adapter = ClassificationAdapter::new(Arc::new(MockCompletionBackend::new()), ClassifierConfig::default());
        let transcript = "w".repeat(1500);

        let request = adapter.request_for("T", "D", &transcript);

        assert!(request.prompt.contains(&format!("Transcript: {}...", "w".repeat(1000))));
        assert!(!request.prompt.contains(&"w".repeat(1001)));
        assert_eq!(request.temperature, 0.1);
        assert_eq!(request.max_output_tokens, 1024);
    }

    #[tokio::test]
    async fn classify_calls_backend_once() {
        let mut backend = MockCompletionBackend::new();
        backend
            .expect_complete()
            .with(eq("key"), mockall::predicate::always())
            .times(1)
            .returning(|_, request| {
                assert!(request.prompt.contains("Title: Intro to Rust"));
                assert!(request.prompt.contains("Transcript: short transcript\n"));
                Ok("{\"isProductive\": true, \"reason\": \"tutorial\"}".to_string())
            });
        let adapter = ClassificationAdapter::new(Arc::new(backend), ClassifierConfig::default());

        let verdict = adapter.classify("key", "Intro to Rust", "", "short transcript").await.unwrap();

        assert!(verdict.is_productive);
        assert_eq!(verdict.content_type(), "Productive Content");
    }

    #[tokio::test]
    async fn backend_failures_are_not_retried() {
        let mut backend = MockCompletionBackend::new();
        backend
            .expect_complete()
            .times(1)
            .returning(|_, _| Err(ClassifyError::Status { status: 503, body: "overloaded".into() }));
        let adapter = ClassificationAdapter::new(Arc::new(backend), ClassifierConfig::default());

        let err = adapter.classify("key", "t", "d", "text").await.unwrap_err();
        assert!(matches!(err, ClassifyError::Status { status: 503, .. }));
        assert!(!err.is_parse_error());
    }

    #[tokio::test]
    async fn missing_key_skips_the_call() {
        let mut backend = MockCompletionBackend::new();
        backend.expect_complete().never();
        let adapter = ClassificationAdapter::new(Arc::new(backend), ClassifierConfig::default());

        let err = adapter.classify("  ", "t", "d", "text").await.unwrap_err();
        assert!(matches!(err, ClassifyError::MissingApiKey));
    }
}
