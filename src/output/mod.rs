use anyhow::Result;
use std::path::Path;

use crate::acquisition::AcquisitionResult;
use crate::cli::OutputFormat;
use crate::pipeline::AnalysisReport;

/// Anything the CLI can print or save
pub enum Rendered<'a> {
    Acquisition(&'a AcquisitionResult),
    Report(&'a AnalysisReport),
}

pub fn format_acquisition_text(result: &AcquisitionResult) -> String {
    match result {
        AcquisitionResult::Success { text, source } => {
            format!("Source: {}\n\n{}", source, text)
        }
        AcquisitionResult::Degraded { text } if text.is_empty() => {
            "No transcript available and no title found".to_string()
        }
        AcquisitionResult::Degraded { text } => {
            format!("No transcript available, using title\n\n{}", text)
        }
        AcquisitionResult::Failure { reason } => format!("Error: {}", reason),
    }
}

pub fn format_report_text(report: &AnalysisReport) -> String {
    let mut lines = vec![
        format!("Video:      {}", report.video_id),
        format!("Title:      {}", report.title),
        format!("Transcript: {}", report.acquisition.label()),
        format!("Verdict:    {}", report.content_type),
    ];
    if let Some(confidence) = report.verdict.confidence {
        lines.push(format!("Confidence: {:.2}", confidence));
    }
    lines.push(format!("Reason:     {}", report.verdict.reason));
    if report.blocked {
        lines.push("Action:     would block".to_string());
    }
    lines.join("\n")
}

pub fn render(item: Rendered<'_>, format: &OutputFormat) -> Result<String> {
    Ok(match (item, format) {
        (Rendered::Acquisition(result), OutputFormat::Text) => format_acquisition_text(result),
        (Rendered::Acquisition(result), OutputFormat::Json) => serde_json::to_string_pretty(result)?,
        (Rendered::Report(report), OutputFormat::Text) => format_report_text(report),
        (Rendered::Report(report), OutputFormat::Json) => serde_json::to_string_pretty(report)?,
    })
}

/// Save a rendered result to file
pub fn save_to_file(item: Rendered<'_>, path: &Path, format: &OutputFormat) -> Result<()> {
    let content = render(item, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print a rendered result to console
pub fn print_to_console(item: Rendered<'_>, format: &OutputFormat) -> Result<()> {
    println!("{}", render(item, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{StrategyKind, VideoId};
    use crate::classify::ClassificationVerdict;

    fn report() -> AnalysisReport {
        AnalysisReport::new(
            VideoId::new("abc123"),
            "Cat videos".into(),
            AcquisitionResult::Degraded { text: "Cat videos".into() },
            ClassificationVerdict {
                is_productive: false,
                reason: "entertainment".into(),
                confidence: Some(0.85),
            },
        )
    }

    #[test]
    fn text_report_lists_verdict() {
        let text = format_report_text(&report());
        assert!(text.contains("Video:      abc123"));
        assert!(text.contains("Verdict:    Non-Productive Content"));
        assert!(text.contains("Confidence: 0.85"));
        assert!(text.contains("would block"));
    }

    #[test]
    fn acquisition_text_names_source() {
        let result = AcquisitionResult::Success { text: "hello world".into(), source: StrategyKind::DirectTrack };
        assert_eq!(format_acquisition_text(&result), "Source: direct-track\n\nhello world");
        assert_eq!(
            format_acquisition_text(&AcquisitionResult::Degraded { text: String::new() }),
            "No transcript available and no title found"
        );
    }

    #[test]
    fn json_report_uses_camel_case() {
        let json = render(Rendered::Report(&report()), &OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["videoId"], "abc123");
        assert_eq!(value["verdict"]["isProductive"], false);
        assert_eq!(value["acquisition"]["status"], "degraded");
    }

    #[test]
    fn saves_rendered_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        save_to_file(Rendered::Report(&report()), &path, &OutputFormat::Json).unwrap();

        let saved = fs_err::read_to_string(&path).unwrap();
        assert!(saved.contains("\"contentType\": \"Non-Productive Content\""));
    }
}
