use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ClassifyError, CompletionBackend, GenerationRequest};
use crate::config::ClassifierConfig;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    fn first_text(self) -> Option<String> {
        self.candidates?
            .into_iter()
            .next()?
            .content?
            .parts?
            .into_iter()
            .next()?
            .text
    }
}

/// Google generative-language `generateContent` client
pub struct GeminiBackend {
    client: Client,
    endpoint: String,
    model: String,
}

impl GeminiBackend {
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifyError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

fn request_body(request: &GenerationRequest) -> GenerateContentRequest<'_> {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![Part { text: &request.prompt }],
        }],
        generation_config: GenerationConfig {
            temperature: request.temperature,
            top_k: request.top_k,
            top_p: request.top_p,
            max_output_tokens: request.max_output_tokens,
        },
    }
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    async fn complete(&self, api_key: &str, request: &GenerationRequest) -> Result<String, ClassifyError> {
        let response = self
            .client
            .post(self.url())
            .query(&[("key", api_key)])
            .json(&request_body(request))
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Classification service response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        parsed.first_text().ok_or(ClassifyError::EmptyReply)
    }
}
