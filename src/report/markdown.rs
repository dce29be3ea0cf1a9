use std::fmt::Write;

use super::types::DeviationReport;

const DESCRIPTION_WIDTH: usize = 50;

/// Render a report as markdown
pub fn render_markdown(report: &DeviationReport) -> String {
    let mut md = String::new();
    let summary = &report.summary;

    md.push_str("# Test Execution Deviation Report\n\n");
    md.push_str("## Summary\n\n");
    let _ = writeln!(md, "- **Total Steps**: {}", summary.total_steps);
    let _ = writeln!(md, "- **Observed Steps**: {}", summary.observed_steps);
    let _ = writeln!(md, "- **Deviations**: {}", summary.deviation_count);
    let _ = writeln!(md, "- **Status**: {}\n", summary.status);

    md.push_str("## Detailed Results\n\n");
    md.push_str("_Confidence Legend: 🟢 High (≥80%) | 🟡 Medium (60-79%) | 🔴 Low (<60%) | ⚪ N/A_\n\n");
    md.push_str("| Step | Description | Result | Confidence | Notes |\n");
    md.push_str("|------|-------------|--------|------------|-------|\n");

    for step in &report.steps {
        let _ = writeln!(
            md,
            "| {} | {}... | {} | {} | {} |",
            step.step_number,
            table_description(&step.description),
            step.result,
            confidence_badge(step.confidence),
            step.notes
        );
    }

    md.push_str("\n## Test Output\n\n");
    let _ = writeln!(md, "- **Status**: {}", report.test_result.status);

    md.push_str("\n## Video Analysis\n\n");
    let _ = writeln!(md, "- **Videos Analyzed**: {}", report.video_analysis.video_count);
    let _ = writeln!(md, "- **Events Detected**: {}", report.video_analysis.total_events);

    md
}

/// Single-line description cut to the table width
fn table_description(description: &str) -> String {
    description
        .replace(['\n', '\r'], " ")
        .chars()
        .take(DESCRIPTION_WIDTH)
        .collect()
}

/// Four-tier confidence marker: green >= 80%, yellow >= 60%, red > 0, else N/A
fn confidence_badge(confidence: f64) -> String {
    let percent = format!("{:.0}%", confidence * 100.0);
    if confidence >= 0.8 {
        format!("🟢 {}", percent)
    } else if confidence >= 0.6 {
        format!("🟡 {}", percent)
    } else if confidence > 0.0 {
        format!("🔴 {}", percent)
    } else {
        "⚪ N/A".to_string()
    }
}
