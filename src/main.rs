use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use transcript_gate::classify::CompletionBackend;
use transcript_gate::cli::{Cli, Commands};
use transcript_gate::config::Config;
use transcript_gate::output::{self, Rendered};
use transcript_gate::page::Fetch;
use transcript_gate::pipeline::{CollectingExecutor, LoggingExecutor, SettingsStore, SideEffectExecutor};
use transcript_gate::protocol::{Responder, ResponderFactory};
use transcript_gate::utils::validate_watch_url;
use transcript_gate::{
    ClassificationAdapter, GeminiBackend, HttpFetcher, PageSurface, PageWatcher, ResponderHost, RetryProtocol,
    SnapshotPage, StrategyKind, TranscriptAcquirer, VideoAnalyzer, VideoId,
};

fn init_tracing(verbose: bool, log_json: bool) {
    let default_filter = if verbose { "transcript_gate=debug" } else { "transcript_gate=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn spinner(quiet: bool, message: &'static str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress.set_message(message);
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}

fn build_responder(
    page: Arc<dyn PageSurface>,
    fetcher: Arc<dyn Fetch>,
    backend: Arc<dyn CompletionBackend>,
    config: &Config,
    executor: Arc<dyn SideEffectExecutor>,
) -> Responder {
    let analyzer = VideoAnalyzer::new(
        page,
        TranscriptAcquirer::new(fetcher, &config.acquisition),
        ClassificationAdapter::new(backend, config.classifier.clone()),
    );
    let settings: Arc<dyn SettingsStore> = Arc::new(config.clone());
    Responder::new(
        analyzer,
        PageWatcher::new(String::new(), config.watcher.anchor_timeout()),
        settings,
        executor,
    )
}

/// Builds a fresh responder, with its own watcher, for every page load
fn responder_factory(fetcher: Arc<dyn Fetch>, backend: Arc<dyn CompletionBackend>, config: Config) -> ResponderFactory {
    Box::new(move |page: Arc<dyn PageSurface>| {
        Arc::new(build_responder(page, fetcher.clone(), backend.clone(), &config, Arc::new(LoggingExecutor)))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    if let Commands::Strategies = cli.command {
        println!("Transcript strategies, in the order they are tried:");
        for (position, kind) in StrategyKind::PRIORITY.iter().enumerate() {
            println!("  {}. {:<22} {}", position + 1, kind.as_str(), kind.description());
        }
        return Ok(());
    }

    let config = Config::load().await?;

    match cli.command {
        Commands::Acquire { url, output, format } => {
            let url = validate_watch_url(&url)?;
            let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::for_config(&config.acquisition)?);

            let progress = spinner(cli.quiet, "Acquiring transcript...");
            let page = SnapshotPage::load(fetcher.clone(), url.as_str()).await?;
            let video_id = VideoId::from_location(url.as_str())
                .ok_or_else(|| anyhow::anyhow!("Could not find video ID in {}", url))?;
            let acquirer = TranscriptAcquirer::new(fetcher, &config.acquisition);
            let result = acquirer.acquire(&video_id, &page).await;
            progress.finish_and_clear();

            match output {
                Some(path) => {
                    output::save_to_file(Rendered::Acquisition(&result), &path, &format)?;
                    println!("Transcript saved to: {}", path.display());
                }
                None => output::print_to_console(Rendered::Acquisition(&result), &format)?,
            }
        }
        Commands::Analyze { url, api_key, output, format } => {
            let config = config.with_api_key(api_key);
            let Some(key) = config.api_key() else {
                anyhow::bail!("No API key found. Set GEMINI_API_KEY or classifier.api_key in the configuration");
            };
            let url = validate_watch_url(&url)?;

            let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::for_config(&config.acquisition)?);
            let backend: Arc<dyn CompletionBackend> = Arc::new(GeminiBackend::new(&config.classifier)?);

            let progress = spinner(cli.quiet, "Analyzing video...");
            let page: Arc<dyn PageSurface> = Arc::new(SnapshotPage::load(fetcher.clone(), url.as_str()).await?);
            let host = ResponderHost::attached(page, responder_factory(fetcher, backend, config.clone()));
            let protocol = RetryProtocol::new(Arc::new(host), config.protocol.retry_policy());

            let outcome = protocol.request_transcript(&key).await;
            progress.finish_and_clear();

            match outcome {
                Ok(report) => match output {
                    Some(path) => {
                        output::save_to_file(Rendered::Report(&report), &path, &format)?;
                        println!("Report saved to: {}", path.display());
                    }
                    None => output::print_to_console(Rendered::Report(&report), &format)?,
                },
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Watch { url, api_key, format } => {
            let config = config.with_api_key(api_key);
            let url = validate_watch_url(&url)?;

            let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::for_config(&config.acquisition)?);
            let backend: Arc<dyn CompletionBackend> = Arc::new(GeminiBackend::new(&config.classifier)?);

            let progress = spinner(cli.quiet, "Waiting for the video page...");
            let page: Arc<dyn PageSurface> = Arc::new(SnapshotPage::load(fetcher.clone(), url.as_str()).await?);
            let collector = Arc::new(CollectingExecutor::default());
            let responder = build_responder(page, fetcher, backend, &config, collector.clone());
            responder.check_video().await;
            progress.finish_and_clear();

            let reports = collector.reports();
            if reports.is_empty() {
                println!("No automatic pass ran (disabled, no API key, or the page never became ready)");
            }
            for report in &reports {
                output::print_to_console(Rendered::Report(report), &format)?;
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("Configuration file: {}", Config::config_path()?.display());
            }
        }
        Commands::Strategies => {}
    }

    Ok(())
}
