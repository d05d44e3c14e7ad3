use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "transcript-gate",
    about = "Transcript Gate - Fetch YouTube transcripts and classify videos as productive or not",
    version,
    long_about = "Acquires a video's transcript through a chain of fallback strategies (caption tracks, embedded player data, the transcript panel) and asks a generative-language service whether the video is productive content."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Acquire the transcript of a video page without classifying it
    Acquire {
        /// Watch page URL (https://www.youtube.com/watch?v=...)
        #[arg(value_name = "URL")]
        url: String,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Acquire the transcript and classify the video
    Analyze {
        /// Watch page URL (https://www.youtube.com/watch?v=...)
        #[arg(value_name = "URL")]
        url: String,

        /// API key for the classification service (overrides the configuration)
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Wait for the page to become ready and run the automatic pass with the stored settings
    Watch {
        /// Watch page URL (https://www.youtube.com/watch?v=...)
        #[arg(value_name = "URL")]
        url: String,

        /// API key for the classification service (overrides the configuration)
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show or initialize the configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List transcript strategies in the order they are tried
    Strategies,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON report
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_analyze_with_key() {
        let cli = Cli::try_parse_from([
            "transcript-gate",
            "analyze",
            "https://www.youtube.com/watch?v=abc",
            "--api-key",
            "k",
            "-f",
            "json",
        ])
        .unwrap();

        match cli.command {
            Commands::Analyze { url, api_key, format, output } => {
                assert_eq!(url, "https://www.youtube.com/watch?v=abc");
                assert_eq!(api_key.as_deref(), Some("k"));
                assert_eq!(format.to_string(), "json");
                assert!(output.is_none());
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn parses_watch_without_key() {
        let cli = Cli::try_parse_from(["transcript-gate", "watch", "https://www.youtube.com/watch?v=abc"]).unwrap();

        match cli.command {
            Commands::Watch { url, format, .. } => {
                assert_eq!(url, "https://www.youtube.com/watch?v=abc");
                assert_eq!(format.to_string(), "text");
            }
            _ => panic!("expected watch"),
        }
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from(["transcript-gate", "strategies", "--quiet", "--log-json"]).unwrap();
        assert!(cli.quiet);
        assert!(cli.log_json);
        assert!(!cli.verbose);
    }
}
