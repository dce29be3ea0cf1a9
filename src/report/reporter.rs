//! Step-by-step comparison of the plan against video evidence.
//!
//! The walk is a plain loop over planned steps with an explicit accumulator:
//! `initialize -> (per step: annotate, select events, classify) -> finalize`.
//!
//! Matching is deliberately coarse. Every step is matched against the same
//! global pool of scene changes, regardless of its action type, and the final
//! assembly marks any step without an explicit deviation record as observed.

use std::collections::HashMap;

use super::types::{DeviationReport, ReportSummary, StepOutcome, StepResult, VideoAnalysisSummary};
use crate::annotate::{NoopAnnotator, StepAnnotator};
use crate::config::DEFAULT_MAX_EVENTS_PER_STEP;
use crate::output::TestResult;
use crate::plan::PlannedStep;
use crate::video::{VideoAnalysis, VideoEvent};

const DEVIATION_CONFIDENCE: f64 = 0.8;
const OBSERVED_CONFIDENCE: f64 = 0.7;
const DEVIATION_NOTE: &str = "Step not visibly executed in video";
const OBSERVED_NOTE: &str = "Evidence found in video";

/// Evidence gathered for one step during the walk
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub step_number: usize,
    pub event_count: usize,
}

/// Accumulator threaded through the walk
#[derive(Debug, Default)]
struct AnalysisState {
    index: usize,
    deviations: Vec<StepOutcome>,
    observations: Vec<Observation>,
    visual_cues: HashMap<usize, String>,
}

/// Builds a [`DeviationReport`] from the three independent inputs
pub struct DeviationReporter<'a> {
    steps: &'a [PlannedStep],
    analysis: &'a VideoAnalysis,
    test_result: &'a TestResult,
    annotator: &'a dyn StepAnnotator,
    max_events_per_step: usize,
}

impl<'a> DeviationReporter<'a> {
    pub fn new(steps: &'a [PlannedStep], analysis: &'a VideoAnalysis, test_result: &'a TestResult) -> Self {
        Self {
            steps,
            analysis,
            test_result,
            annotator: &NoopAnnotator,
            max_events_per_step: DEFAULT_MAX_EVENTS_PER_STEP,
        }
    }

    /// Attach an annotator for advisory visual cues
    pub fn annotator(mut self, annotator: &'a dyn StepAnnotator) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn max_events_per_step(mut self, max_events: usize) -> Self {
        self.max_events_per_step = max_events;
        self
    }

    /// Run the walk and assemble the report
    pub fn generate_report(&self) -> DeviationReport {
        let mut state = AnalysisState::default();

        while state.index < self.steps.len() {
            let step = &self.steps[state.index];
            self.annotate_step(step, &mut state);
            let relevant = self.relevant_events(step);
            state.observations.push(Observation {
                step_number: step.step_number,
                event_count: relevant.len(),
            });
            self.classify(step, &mut state);
            state.index += 1;
        }

        let summary = ReportSummary::new(self.steps.len(), state.deviations.len());

        DeviationReport {
            summary,
            steps: self.assemble(state),
            test_result: self.test_result.clone(),
            video_analysis: VideoAnalysisSummary {
                video_count: self.analysis.video_count,
                total_events: self.analysis.total_events,
            },
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    fn annotate_step(&self, step: &PlannedStep, state: &mut AnalysisState) {
        match self.annotator.annotate(step) {
            Ok(Some(cues)) => {
                state.visual_cues.insert(step.step_number, cues);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(step = step.step_number, error = %e, "step annotation failed");
            }
        }
    }

    /// Up to `max_events_per_step` scene changes from the global pool
    fn relevant_events(&self, _step: &PlannedStep) -> Vec<&'a VideoEvent> {
        self.analysis
            .scene_changes()
            .take(self.max_events_per_step)
            .collect()
    }

    fn classify(&self, step: &PlannedStep, state: &mut AnalysisState) {
        let event_count = state
            .observations
            .last()
            .map(|o| o.event_count)
            .unwrap_or(0);

        if event_count == 0 {
            tracing::debug!(step = step.step_number, "no video evidence for step");
            state.deviations.push(StepOutcome {
                step_number: step.step_number,
                description: step.description.clone(),
                result: StepResult::Deviation,
                notes: DEVIATION_NOTE.to_string(),
                confidence: DEVIATION_CONFIDENCE,
                visual_cues: None,
            });
        } else {
            tracing::debug!(
                step = step.step_number,
                "detected {} relevant event(s)",
                event_count
            );
        }
    }

    /// One outcome per step: its deviation record if any, otherwise observed
    fn assemble(&self, mut state: AnalysisState) -> Vec<StepOutcome> {
        self.steps
            .iter()
            .map(|step| {
                let mut outcome = state
                    .deviations
                    .iter()
                    .find(|d| d.step_number == step.step_number)
                    .cloned()
                    .unwrap_or_else(|| StepOutcome {
                        step_number: step.step_number,
                        description: step.description.clone(),
                        result: StepResult::Observed,
                        notes: OBSERVED_NOTE.to_string(),
                        confidence: OBSERVED_CONFIDENCE,
                        visual_cues: None,
                    });
                outcome.visual_cues = state.visual_cues.remove(&step.step_number);
                outcome
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{AnnotationError, AnnotationResult};
    use crate::output::TestStatus;
    use crate::video::EventType;
    use crate::plan::classify_step;
    use pretty_assertions::assert_eq;

    fn steps() -> Vec<PlannedStep> {
        vec![
            classify_step("Navigate to https://www.converse.com/", 1),
            classify_step("Click the search icon", 2),
            classify_step("Enter \"Chuck 70\" in search box", 3),
        ]
    }

    fn passed() -> TestResult {
        crate::output::parse_html("PASSED")
    }

    fn scene_change(video: &str, timestamp: f64) -> VideoEvent {
        VideoEvent {
            video: video.to_string(),
            timestamp,
            event_type: EventType::SceneChange,
            description: "Significant UI change detected".to_string(),
            confidence: 0.9,
        }
    }

    fn analysis(events: Vec<VideoEvent>) -> VideoAnalysis {
        VideoAnalysis {
            video_count: 1,
            total_events: events.len(),
            detected_events: events,
            videos: Vec::new(),
        }
    }

    #[test]
    fn test_no_events_marks_every_step_deviation() {
        let steps = steps();
        let analysis = analysis(Vec::new());
        let result = passed();
        let report = DeviationReporter::new(&steps, &analysis, &result).generate_report();

        assert_eq!(report.summary, ReportSummary::new(3, 3));
        assert_eq!(report.summary.status, "3 deviation(s) found");
        assert!(report.steps.iter().all(|s| s.result == StepResult::Deviation));
        assert!(report.steps.iter().all(|s| s.confidence == 0.8));
        assert_eq!(report.steps[0].notes, "Step not visibly executed in video");
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_events_mark_every_step_observed() {
        let steps = steps();
        let analysis = analysis(vec![scene_change("a.webm", 1.0)]);
        let result = passed();
        let report = DeviationReporter::new(&steps, &analysis, &result).generate_report();

        assert_eq!(report.summary.observed_steps, 3);
        assert_eq!(report.summary.deviation_count, 0);
        assert_eq!(report.summary.status, "No deviations detected");
        let numbers: Vec<usize> = report.steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(report.steps.iter().all(|s| s.notes == "Evidence found in video"));
        assert!(report.steps.iter().all(|s| s.confidence == 0.7));
        assert_eq!(report.video_analysis.total_events, 1);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_relevant_events_capped() {
        let steps = steps();
        let events = (0..5).map(|i| scene_change("a.webm", i as f64)).collect();
        let analysis = analysis(events);
        let result = passed();
        let reporter = DeviationReporter::new(&steps, &analysis, &result);
        assert_eq!(reporter.relevant_events(&steps[0]).len(), 2);
        assert_eq!(reporter.max_events_per_step(4).relevant_events(&steps[0]).len(), 4);
    }

    #[test]
    fn test_empty_plan_is_valid() {
        let analysis = analysis(vec![scene_change("a.webm", 1.0)]);
        let result = TestResult {
            status: TestStatus::Unknown,
            name: None,
            time: None,
            message: None,
            source: None,
        };
        let report = DeviationReporter::new(&[], &analysis, &result).generate_report();
        assert_eq!(report.summary, ReportSummary::new(0, 0));
        assert!(report.steps.is_empty());
        assert_eq!(report.exit_code(), 0);
    }

    struct FixedAnnotator;

    impl StepAnnotator for FixedAnnotator {
        fn annotate(&self, step: &PlannedStep) -> AnnotationResult<Option<String>> {
            if step.step_number == 2 {
                Err(AnnotationError::ConnectionFailed("offline".to_string()))
            } else {
                Ok(Some(format!("cue for {}", step.step_number)))
            }
        }
    }

    #[test]
    fn test_annotations_never_change_classification() {
        let steps = steps();
        let analysis = analysis(Vec::new());
        let result = passed();

        let plain = DeviationReporter::new(&steps, &analysis, &result).generate_report();
        let annotated = DeviationReporter::new(&steps, &analysis, &result)
            .annotator(&FixedAnnotator)
            .generate_report();

        assert_eq!(plain.summary, annotated.summary);
        for (a, b) in plain.steps.iter().zip(&annotated.steps) {
            assert_eq!((a.result, a.confidence, &a.notes), (b.result, b.confidence, &b.notes));
        }
        assert_eq!(annotated.steps[0].visual_cues.as_deref(), Some("cue for 1"));
        assert_eq!(annotated.steps[1].visual_cues, None);
        assert!(plain.steps.iter().all(|s| s.visual_cues.is_none()));
    }
}
