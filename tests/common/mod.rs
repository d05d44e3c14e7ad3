#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use transcript_gate::classify::{ClassifyError, CompletionBackend, GenerationRequest};
use transcript_gate::page::{Fetch, FetchError, FetchedBody};
use transcript_gate::protocol::Clock;

/// Fetcher answering from a fixed table of URL substrings; anything else is a 404
#[derive(Default)]
pub struct RoutedFetcher {
    routes: Vec<(String, u16, String)>,
    pub requested: Mutex<Vec<String>>,
}

impl RoutedFetcher {
    pub fn route(mut self, needle: &str, status: u16, body: &str) -> Self {
        self.routes.push((needle.to_string(), status, body.to_string()));
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetch for RoutedFetcher {
    async fn get_text(&self, url: &str) -> Result<FetchedBody, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        let (status, body) = self
            .routes
            .iter()
            .find(|(needle, _, _)| url.contains(needle.as_str()))
            .map(|(_, status, body)| (*status, body.clone()))
            .unwrap_or((404, String::new()));
        Ok(FetchedBody { status, body })
    }
}

/// Classification backend that records every request and answers with a fixed reply
pub struct RecordingBackend {
    reply: String,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl RecordingBackend {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for RecordingBackend {
    async fn complete(&self, _api_key: &str, request: &GenerationRequest) -> Result<String, ClassifyError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.reply.clone())
    }
}

/// Clock that returns immediately and remembers what it was asked to sleep
#[derive(Default)]
pub struct RecordingClock {
    pub sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

pub fn timed_text(lines: &[&str]) -> String {
    let nodes: String = lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("<text start=\"{}\" dur=\"2.5\">{}</text>", i * 3, line))
        .collect();
    format!("<?xml version=\"1.0\" encoding=\"utf-8\" ?><transcript>{}</transcript>", nodes)
}
