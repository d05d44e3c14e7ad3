use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::acquisition::interactive::UiTimings;
use crate::pipeline::SettingsStore;
use crate::protocol::RetryPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External classification service
    pub classifier: ClassifierConfig,

    /// Transcript acquisition strategies
    pub acquisition: AcquisitionConfig,

    /// Cross-context request/response retries
    pub protocol: ProtocolConfig,

    /// Page-readiness watcher
    pub watcher: WatcherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// API key for the classification service
    pub api_key: Option<String>,

    /// Classify videos automatically on navigation
    pub enabled: bool,

    /// Base URL of the generative language API
    pub endpoint: String,

    pub model: String,

    pub temperature: f32,

    pub top_k: u32,

    pub top_p: f32,

    pub max_output_tokens: u32,

    /// Transcript characters sent with each request
    pub transcript_char_limit: usize,

    /// Optional hard cap on the classification request
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Public timed-text endpoint
    pub timedtext_url: String,

    /// Caption language requested from the timed-text endpoint
    pub language: String,

    pub menu_settle_ms: u64,

    pub dismiss_settle_ms: u64,

    pub panel_settle_ms: u64,

    pub ui_retry_pause_ms: u64,

    pub ui_attempts: u32,

    /// Optional hard cap on each caption and page request
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub max_attempts: u32,

    pub response_timeout_secs: u64,

    /// Wait after forcing a page reload
    pub reload_wait_secs: u64,

    /// Backoff after attempt N is N times this step
    pub backoff_step_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// How long to wait for the primary heading after a navigation
    pub anchor_timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            enabled: true,
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.0-flash".to_string(),
            temperature: 0.1,
            top_k: 40,
            top_p: 0.8,
            max_output_tokens: 1024,
            transcript_char_limit: 1000,
            request_timeout_secs: None,
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        let timings = UiTimings::default();
        Self {
            timedtext_url: "https://www.youtube.com/api/timedtext".to_string(),
            language: "en".to_string(),
            menu_settle_ms: timings.menu_settle.as_millis() as u64,
            dismiss_settle_ms: timings.dismiss_settle.as_millis() as u64,
            panel_settle_ms: timings.panel_settle.as_millis() as u64,
            ui_retry_pause_ms: timings.retry_pause.as_millis() as u64,
            ui_attempts: timings.attempts,
            request_timeout_secs: None,
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            response_timeout_secs: 30,
            reload_wait_secs: 3,
            backoff_step_ms: 1000,
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self { anchor_timeout_secs: 5 }
    }
}

impl AcquisitionConfig {
    pub fn ui_timings(&self) -> UiTimings {
        UiTimings {
            menu_settle: Duration::from_millis(self.menu_settle_ms),
            dismiss_settle: Duration::from_millis(self.dismiss_settle_ms),
            panel_settle: Duration::from_millis(self.panel_settle_ms),
            retry_pause: Duration::from_millis(self.ui_retry_pause_ms),
            attempts: self.ui_attempts,
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl ProtocolConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            response_timeout: Duration::from_secs(self.response_timeout_secs),
            reload_wait: Duration::from_secs(self.reload_wait_secs),
            backoff_step: Duration::from_millis(self.backoff_step_ms),
        }
    }
}

impl WatcherConfig {
    pub fn anchor_timeout(&self) -> Duration {
        Duration::from_secs(self.anchor_timeout_secs)
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            tracing::debug!("Wrote default configuration to {}", config_path.display());
            Ok(config)
        }
    }

    /// Load and validate a specific configuration file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content)
            .context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("transcript-gate.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("transcript-gate").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.classifier.temperature) {
            anyhow::bail!("Classifier temperature must be between 0 and 2");
        }

        if self.classifier.transcript_char_limit == 0 {
            anyhow::bail!("Transcript character limit must be greater than zero");
        }

        if self.protocol.max_attempts == 0 {
            anyhow::bail!("Protocol max_attempts must be at least 1");
        }

        if self.acquisition.request_timeout_secs == Some(0) {
            anyhow::bail!("Acquisition request timeout must be greater than zero");
        }

        if self.acquisition.ui_attempts == 0 {
            anyhow::bail!("UI extraction attempts must be at least 1");
        }

        url::Url::parse(&self.acquisition.timedtext_url)
            .context("Invalid timed-text endpoint URL")?;
        url::Url::parse(&self.classifier.endpoint)
            .context("Invalid classifier endpoint URL")?;

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!(
            "  API Key: {}",
            if self.classifier.api_key.is_some() { "set" } else { "not set" }
        );
        println!("  Auto-classify: {}", self.classifier.enabled);
        println!("  Model: {}", self.classifier.model);
        println!("  Transcript Limit: {} chars", self.classifier.transcript_char_limit);
        println!("  Caption Language: {}", self.acquisition.language);
        println!(
            "  Retries: {} attempts, {}s response timeout",
            self.protocol.max_attempts, self.protocol.response_timeout_secs
        );
    }

    /// Copy with the API key overridden from the command line or environment
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.classifier.api_key = Some(key);
        }
        self
    }
}

impl SettingsStore for Config {
    fn api_key(&self) -> Option<String> {
        self.classifier.api_key.clone()
    }

    fn enabled(&self) -> bool {
        self.classifier.enabled
    }
}
