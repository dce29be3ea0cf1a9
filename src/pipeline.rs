//! End-to-end run: parse the plan, scan the video, read the result, report.
//!
//! The three producers are independent and each degrades to an empty or
//! neutral value on bad input, so a run always yields a report.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::annotate::StepAnnotator;
use crate::config::Config;
use crate::output::{TestResult, compare_output};
use crate::plan::{PlannedStep, PlanningLogParser};
use crate::report::{DeviationReport, DeviationReporter};
use crate::video::{VideoAnalysis, VideoAnalyzer};

/// Input files for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineInputs {
    /// Planning log JSON
    pub planning_log: PathBuf,

    /// A video file or a directory of videos
    pub video: PathBuf,

    /// JUnit XML or HTML result
    pub test_output: PathBuf,
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub steps: Vec<PlannedStep>,
    pub video_analysis: VideoAnalysis,
    pub test_result: TestResult,
    pub report: DeviationReport,
}

/// Run every stage with the given analyzer and annotator
pub fn run_pipeline(
    inputs: &PipelineInputs,
    config: &Config,
    analyzer: &VideoAnalyzer,
    annotator: &dyn StepAnnotator,
) -> PipelineOutcome {
    let steps = load_steps(inputs, config);
    let video_analysis = analyzer.analyze(&inputs.video);
    let test_result = compare_output(&inputs.test_output);

    tracing::info!(
        steps = steps.len(),
        videos = video_analysis.video_count,
        events = video_analysis.total_events,
        status = %test_result.status,
        "inputs collected"
    );

    let report = DeviationReporter::new(&steps, &video_analysis, &test_result)
        .annotator(annotator)
        .max_events_per_step(config.analysis.max_events_per_step)
        .generate_report();

    PipelineOutcome {
        steps,
        video_analysis,
        test_result,
        report,
    }
}

/// Parse the planning log; a missing or malformed log yields no steps
pub fn load_steps(inputs: &PipelineInputs, config: &Config) -> Vec<PlannedStep> {
    let parser = PlanningLogParser::new(&inputs.planning_log).planner_key(&config.analysis.planner_key);
    match parser.extract_steps() {
        Ok(steps) => steps,
        Err(e) => {
            tracing::warn!(
                path = %parser.path().display(),
                error = %e,
                "could not load planning log, continuing without planned steps"
            );
            Vec::new()
        }
    }
}
