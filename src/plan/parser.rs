//! Planning log parsing.
//!
//! A planning log is a JSON object whose planner key holds role-tagged
//! messages. Assistant messages with structured content may carry a
//! multi-line `plan` and a single `next_step`; both become [`PlannedStep`]s,
//! numbered in encounter order.

use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::types::{ActionType, PlanResult, PlannedStep};
use crate::config::DEFAULT_PLANNER_KEY;

/// Characters stripped from the front of a plan line
const LIST_MARKERS: &[char] = &['0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '.', '-', ')', ' '];

fn url_pattern() -> &'static Regex {
    static URL: OnceLock<Regex> = OnceLock::new();
    URL.get_or_init(|| Regex::new(r"https?://\S+").expect("valid url pattern"))
}

fn quoted_pattern() -> &'static Regex {
    static QUOTED: OnceLock<Regex> = OnceLock::new();
    QUOTED.get_or_init(|| Regex::new(r#""([^"]+)"|'([^']+)'"#).expect("valid quote pattern"))
}

/// Loads a planning log from disk and extracts its steps
#[derive(Debug, Clone)]
pub struct PlanningLogParser {
    path: PathBuf,
    planner_key: String,
}

impl PlanningLogParser {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            planner_key: DEFAULT_PLANNER_KEY.to_string(),
        }
    }

    /// Read planner messages from a different top-level key
    pub fn planner_key(mut self, key: impl Into<String>) -> Self {
        self.planner_key = key.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the log and extract steps.
    ///
    /// Fails when the file is missing or not JSON. A log without the planner
    /// key yields an empty list.
    pub fn extract_steps(&self) -> PlanResult<Vec<PlannedStep>> {
        let raw = std::fs::read_to_string(&self.path)?;
        let log: Value = serde_json::from_str(&raw)?;
        Ok(extract_steps(&log, &self.planner_key))
    }
}

/// Extract planned steps from an already-parsed planning log
pub fn extract_steps(log: &Value, planner_key: &str) -> Vec<PlannedStep> {
    let Some(messages) = log.get(planner_key).and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut steps = Vec::new();

    for message in messages {
        if message.get("role").and_then(Value::as_str) != Some("assistant") {
            continue;
        }
        let Some(content) = message.get("content").and_then(Value::as_object) else {
            continue;
        };

        if let Some(plan) = content.get("plan").and_then(Value::as_str) {
            for line in plan_lines(plan) {
                let number = steps.len() + 1;
                steps.push(classify_step(line, number));
            }
        }

        if let Some(next_step) = content.get("next_step").and_then(Value::as_str) {
            if !next_step.is_empty() {
                let mut step = classify_step(next_step, steps.len() + 1);
                step.is_next_action = true;
                steps.push(step);
            }
        }
    }

    steps
}

/// List-item lines of a plan, with numbering and bullets removed.
///
/// Exported transcripts sometimes keep newlines as a literal `\n` escape, so
/// both forms separate lines.
fn plan_lines(plan: &str) -> Vec<&str> {
    plan.split('\n')
        .flat_map(|line| line.split("\\n"))
        .map(str::trim)
        .filter(|line| {
            line.chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit() || c == '-')
        })
        .map(|line| line.trim_start_matches(LIST_MARKERS).trim())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Classify a step description by keyword, in fixed priority order
pub fn classify_step(description: &str, step_number: usize) -> PlannedStep {
    let lower = description.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    let (action_type, target) = if has(&["navigate", "go to", "open"]) {
        let url = url_pattern()
            .find(description)
            .map(|m| m.as_str().to_string());
        (ActionType::Navigate, url)
    } else if has(&["click"]) {
        let target = if lower.contains("search icon") {
            Some("Search icon".to_string())
        } else if lower.contains("button") {
            Some("button".to_string())
        } else {
            None
        };
        (ActionType::Click, target)
    } else if has(&["enter", "type", "input"]) {
        (ActionType::EnterText, first_quoted(description))
    } else if has(&["filter", "select"]) {
        (ActionType::Filter, first_quoted(description))
    } else if has(&["assert", "verify", "confirm", "should see"]) {
        (ActionType::Assert, None)
    } else {
        (ActionType::Unknown, None)
    };

    tracing::debug!(step_number, %action_type, "classified planned step");

    PlannedStep {
        step_number,
        description: description.to_string(),
        action_type,
        target,
        expected_outcome: String::new(),
        is_next_action: false,
    }
}

fn first_quoted(text: &str) -> Option<String> {
    let captures = quoted_pattern().captures(text)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str().to_string())
}
