//! Transcript Gate - acquire YouTube transcripts and classify videos
//!
//! Transcripts are obtained through an ordered chain of extraction strategies
//! (caption endpoints, embedded player data, the page's own transcript panel)
//! and handed to a generative-language service that decides whether the
//! video is productive content.

pub mod acquisition;
pub mod classify;
pub mod cli;
pub mod config;
pub mod output;
pub mod page;
pub mod pipeline;
pub mod protocol;
pub mod utils;
pub mod watcher;

pub use acquisition::{AcquisitionResult, StrategyKind, TranscriptAcquirer, VideoId};
pub use classify::{ClassificationAdapter, ClassificationVerdict, GeminiBackend};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use page::{HttpFetcher, MemoryPage, PageSurface, SnapshotPage};
pub use pipeline::{AnalysisReport, VideoAnalyzer};
pub use protocol::{PageRequest, ResponderHost, RetryPolicy, RetryProtocol};
pub use watcher::PageWatcher;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
