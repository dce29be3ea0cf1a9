//! Plan Vision - compare a UI test run's plan against its recording.
//!
//! This crate provides:
//! - Planning log parsing into typed, numbered steps
//! - Scene-change detection in recorded videos by frame differencing
//! - JUnit XML / HTML result parsing
//! - A deviation report (JSON and markdown) matching steps to video evidence
//! - Optional language-model annotations describing expected visual cues
//!
//! # Example
//!
//! ```rust,no_run
//! use plan_vision::{Config, NoopAnnotator, PipelineInputs, VideoAnalyzer, run_pipeline, write_report};
//! use std::path::Path;
//!
//! let config = Config::defaults();
//! let inputs = PipelineInputs {
//!     planning_log: "logs/agent_inner_thoughts.json".into(),
//!     video: "videos/".into(),
//!     test_output: "results/test_result.xml".into(),
//! };
//! let analyzer = VideoAnalyzer::new(config.analysis.clone());
//! let outcome = run_pipeline(&inputs, &config, &analyzer, &NoopAnnotator);
//! write_report(Path::new("output"), &outcome.report).unwrap();
//! ```

pub mod annotate;
pub mod config;
pub mod output;
pub mod pipeline;
pub mod plan;
pub mod report;
pub mod video;

// Re-export configuration
pub use config::{AnalysisSettings, AnnotationSettings, Config, ConfigError, ConfigResult};

// Re-export parsing types
pub use output::{TestResult, TestStatus, compare_output};
pub use plan::{ActionType, PlanError, PlanResult, PlannedStep, PlanningLogParser};

// Re-export video analysis
pub use video::{
    EventType, FfmpegDecoder, FrameDecoder, FrameSource, SyntheticDecoder, SyntheticVideo,
    VideoAnalysis, VideoAnalyzer, VideoError, VideoEvent, VideoResult,
};

// Re-export reporting and the pipeline
pub use annotate::{AnnotationError, AnnotationResult, ChatAnnotator, NoopAnnotator, StepAnnotator, annotator_from_settings};
pub use pipeline::{PipelineInputs, PipelineOutcome, run_pipeline};
pub use report::{DeviationReport, DeviationReporter, ReportPaths, StepOutcome, StepResult, render_markdown, write_report};
