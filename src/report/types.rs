use serde::{Deserialize, Serialize};
use std::fmt;

use crate::output::TestResult;

/// Per-step verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepResult {
    Observed,
    Deviation,
}

impl StepResult {
    /// Label used in the markdown table
    pub fn label(&self) -> &'static str {
        match self {
            StepResult::Observed => "✅ Observed",
            StepResult::Deviation => "❌ Deviation",
        }
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome for exactly one planned step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step_number: usize,
    pub description: String,
    pub result: StepResult,
    pub notes: String,
    pub confidence: f64,

    /// Advisory visual cues from the annotator, when one ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_cues: Option<String>,
}

/// Headline numbers of a report.
///
/// `observed_steps + deviation_count == total_steps` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_steps: usize,
    pub observed_steps: usize,
    pub deviation_count: usize,
    pub status: String,
}

impl ReportSummary {
    pub fn new(total_steps: usize, deviation_count: usize) -> Self {
        let status = if deviation_count == 0 {
            "No deviations detected".to_string()
        } else {
            format!("{} deviation(s) found", deviation_count)
        };
        Self {
            total_steps,
            observed_steps: total_steps - deviation_count,
            deviation_count,
            status,
        }
    }
}

/// Video counts carried into the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoAnalysisSummary {
    pub video_count: usize,
    pub total_events: usize,
}

/// The full deviation report, as written to `deviation_report.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationReport {
    pub summary: ReportSummary,
    pub steps: Vec<StepOutcome>,
    pub test_result: TestResult,
    pub video_analysis: VideoAnalysisSummary,
    /// RFC 3339 creation time
    pub generated_at: String,
}

impl DeviationReport {
    /// Process exit code: 0 without deviations, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.summary.deviation_count == 0 { 0 } else { 1 }
    }
}
