pub mod markdown;
pub mod reporter;
pub mod types;

pub use markdown::render_markdown;
pub use reporter::{DeviationReporter, Observation};
pub use types::{DeviationReport, ReportSummary, StepOutcome, StepResult, VideoAnalysisSummary};

use std::fs;
use std::path::{Path, PathBuf};

/// File name of the JSON report
pub const JSON_REPORT_NAME: &str = "deviation_report.json";

/// File name of the markdown report
pub const MARKDOWN_REPORT_NAME: &str = "deviation_report.md";

/// Paths of the files written by [`write_report`]
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

/// Write both report renderings into `dir`, creating it if needed.
///
/// Both renderings are produced before anything touches the filesystem.
pub fn write_report(dir: &Path, report: &DeviationReport) -> std::io::Result<ReportPaths> {
    let json = serde_json::to_string_pretty(report)?;
    let markdown = render_markdown(report);

    fs::create_dir_all(dir)?;

    let paths = ReportPaths {
        json: dir.join(JSON_REPORT_NAME),
        markdown: dir.join(MARKDOWN_REPORT_NAME),
    };

    fs::write(&paths.json, json)?;
    fs::write(&paths.markdown, markdown)?;

    Ok(paths)
}
