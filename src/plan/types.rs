use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of browser action a planned step describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Navigate,
    Click,
    EnterText,
    Filter,
    Assert,
    Unknown,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Navigate => "navigate",
            ActionType::Click => "click",
            ActionType::EnterText => "enter_text",
            ActionType::Filter => "filter",
            ActionType::Assert => "assert",
            ActionType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One atomic action or assertion extracted from a planner transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStep {
    /// 1-based position in discovery order
    pub step_number: usize,

    /// Plan line with numbering and bullets stripped
    pub description: String,

    /// Keyword-derived action kind
    pub action_type: ActionType,

    /// URL, element, or quoted text the action applies to
    pub target: Option<String>,

    /// Expected outcome text (planner logs do not carry one yet)
    pub expected_outcome: String,

    /// Whether this came from a `next_step` field rather than a plan line
    pub is_next_action: bool,
}

/// Result type for planning log operations
pub type PlanResult<T> = Result<T, PlanError>;

/// Errors raised while loading a planning log
#[derive(Debug, Error)]
pub enum PlanError {
    /// The log file could not be read
    #[error("failed to read planning log: {0}")]
    Io(#[from] std::io::Error),

    /// The log file is not valid JSON
    #[error("planning log is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
