pub mod parser;
pub mod types;

pub use parser::{PlanningLogParser, classify_step, extract_steps};
pub use types::{ActionType, PlanError, PlanResult, PlannedStep};
