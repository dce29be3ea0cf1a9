//! Final test output parsing.
//!
//! Reads one result file and normalizes it into a [`TestResult`]:
//! - `.xml`: JUnit-style `testsuites > testsuite > testcase`
//! - `.html`: scanned for the literal `FAILED` / `PASSED` markers
//!
//! Nothing here returns an error. Unreadable or unparseable files become
//! `status = error`, unsupported extensions become `status = unknown`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Normalized status of the test run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Unknown,
    Error,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Unknown => "unknown",
            TestStatus::Error => "error",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed final test result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub status: TestStatus,

    /// `testcase` name attribute (XML only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// `testcase` time attribute (XML only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,

    /// Failure message, parse error, or explanation for `unknown`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Which parser produced the result (`xml` or `html`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl TestResult {
    fn with_status(status: TestStatus) -> Self {
        Self {
            status,
            name: None,
            time: None,
            message: None,
            source: None,
        }
    }

    fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }
}

/// Parse a result file, choosing the parser by extension
pub fn compare_output(path: &Path) -> TestResult {
    let result = match path.extension().and_then(|e| e.to_str()) {
        Some("xml") => parse_junit_file(path),
        Some("html") => parse_html_file(path),
        _ => TestResult::with_status(TestStatus::Unknown).message("Unsupported format"),
    };

    if matches!(result.status, TestStatus::Error) {
        tracing::warn!(
            path = %path.display(),
            detail = result.message.as_deref().unwrap_or(""),
            "could not parse test output"
        );
    }
    result
}

fn parse_junit_file(path: &Path) -> TestResult {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_junit(&text),
        Err(e) => TestResult::with_status(TestStatus::Error)
            .message(e.to_string())
            .source("xml"),
    }
}

/// Parse JUnit XML text. Only the first `testcase` is considered.
pub fn parse_junit(text: &str) -> TestResult {
    let doc = match roxmltree::Document::parse(text) {
        Ok(doc) => doc,
        Err(e) => {
            return TestResult::with_status(TestStatus::Error)
                .message(e.to_string())
                .source("xml");
        }
    };

    let Some(testcase) = doc
        .root_element()
        .descendants()
        .skip(1)
        .find(|n| n.has_tag_name("testcase"))
    else {
        return TestResult::with_status(TestStatus::Unknown).source("xml");
    };

    let failure = testcase
        .children()
        .find(|n| n.has_tag_name("failure"));

    let (status, message) = match failure {
        Some(failure) => (
            TestStatus::Failed,
            failure.attribute("message").unwrap_or("").to_string(),
        ),
        None => (TestStatus::Passed, String::new()),
    };

    TestResult {
        status,
        name: Some(testcase.attribute("name").unwrap_or("").to_string()),
        time: Some(testcase.attribute("time").unwrap_or("").to_string()),
        message: Some(message),
        source: Some("xml".to_string()),
    }
}

fn parse_html_file(path: &Path) -> TestResult {
    match std::fs::read(path) {
        Ok(bytes) => parse_html(&String::from_utf8_lossy(&bytes)),
        Err(e) => TestResult::with_status(TestStatus::Error)
            .message(e.to_string())
            .source("html"),
    }
}

/// Scan report text for pass/fail markers; `FAILED` wins over `PASSED`
pub fn parse_html(text: &str) -> TestResult {
    let status = if text.contains("FAILED") {
        TestStatus::Failed
    } else if text.contains("PASSED") {
        TestStatus::Passed
    } else {
        TestStatus::Unknown
    };
    TestResult::with_status(status).source("html")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSING: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<testsuites>
  <testsuite name="converse" tests="1">
    <testcase name="search_chuck_70" classname="converse" time="42.5"/>
  </testsuite>
</testsuites>"#;

    const FAILING: &str = r#"<testsuites>
  <testsuite name="levis">
    <testcase name="filter_jeans" time="12.0">
      <failure message="Expected filter chip 'Men' to be visible">trace</failure>
    </testcase>
    <testcase name="second" time="1.0"/>
  </testsuite>
</testsuites>"#;

    #[test]
    fn test_junit_passed() {
        let result = parse_junit(PASSING);
        assert_eq!(result.status, TestStatus::Passed);
        assert_eq!(result.name.as_deref(), Some("search_chuck_70"));
        assert_eq!(result.time.as_deref(), Some("42.5"));
        assert_eq!(result.message.as_deref(), Some(""));
    }

    #[test]
    fn test_junit_failure_message() {
        let result = parse_junit(FAILING);
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.name.as_deref(), Some("filter_jeans"));
        assert_eq!(
            result.message.as_deref(),
            Some("Expected filter chip 'Men' to be visible")
        );
    }

    #[test]
    fn test_junit_without_testcase_is_unknown() {
        let result = parse_junit("<testsuites><testsuite/></testsuites>");
        assert_eq!(result.status, TestStatus::Unknown);
    }

    #[test]
    fn test_junit_testcase_root_is_unknown() {
        let result = parse_junit(r#"<testcase name="lonely" time="1.0"/>"#);
        assert_eq!(result.status, TestStatus::Unknown);

        let nested = parse_junit(r#"<testsuite><testcase name="inner"/></testsuite>"#);
        assert_eq!(nested.status, TestStatus::Passed);
        assert_eq!(nested.name.as_deref(), Some("inner"));
    }

    #[test]
    fn test_junit_malformed_is_error() {
        let result = parse_junit("<testsuites><testcase>");
        assert_eq!(result.status, TestStatus::Error);
        assert!(result.message.is_some());
    }

    #[test]
    fn test_html_failed_checked_first() {
        assert_eq!(parse_html("<td>PASSED</td><td>FAILED</td>").status, TestStatus::Failed);
        assert_eq!(parse_html("<td>PASSED</td>").status, TestStatus::Passed);
        assert_eq!(parse_html("<td>passed</td>").status, TestStatus::Unknown);
    }

    #[test]
    fn test_compare_output_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let xml = dir.path().join("result.xml");
        std::fs::write(&xml, FAILING).unwrap();
        assert_eq!(compare_output(&xml).status, TestStatus::Failed);

        let html = dir.path().join("report.html");
        std::fs::write(&html, "<html><body>1 PASSED</body></html>").unwrap();
        let result = compare_output(&html);
        assert_eq!(result.status, TestStatus::Passed);
        assert_eq!(result.source.as_deref(), Some("html"));

        let txt = dir.path().join("result.txt");
        std::fs::write(&txt, "PASSED").unwrap();
        let result = compare_output(&txt);
        assert_eq!(result.status, TestStatus::Unknown);
        assert_eq!(result.message.as_deref(), Some("Unsupported format"));
    }

    #[test]
    fn test_compare_output_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(compare_output(&dir.path().join("gone.xml")).status, TestStatus::Error);
        assert_eq!(compare_output(&dir.path().join("gone.html")).status, TestStatus::Error);
        assert_eq!(compare_output(&dir.path().join("gone")).status, TestStatus::Unknown);
    }
}
