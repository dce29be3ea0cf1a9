//! Advisory step annotations from a language model.
//!
//! An annotation is one or two sentences describing what a recording should
//! show when a step runs. It is side-channel metadata only: it never feeds
//! classification or confidence.
//!
//! # Configuration
//!
//! Annotation is enabled only when a credential is configured
//! (`api_key` in the config file or `PLAN_VISION_API_KEY`). The client talks
//! to an OpenAI-compatible chat-completions endpoint through `curl`.

use std::io::Write;
use std::process::{Command, Stdio};
use thiserror::Error;

use crate::config::AnnotationSettings;
use crate::plan::PlannedStep;

/// Result type for annotation operations
pub type AnnotationResult<T> = Result<T, AnnotationError>;

/// Errors that can occur during an annotation request
#[derive(Debug, Error)]
pub enum AnnotationError {
    /// Failed to reach the endpoint
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid response from the endpoint
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces free-text visual cues for a planned step
pub trait StepAnnotator {
    /// `Ok(None)` means the annotator has nothing to add
    fn annotate(&self, step: &PlannedStep) -> AnnotationResult<Option<String>>;
}

/// Annotator used when no credential is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAnnotator;

impl StepAnnotator for NoopAnnotator {
    fn annotate(&self, _step: &PlannedStep) -> AnnotationResult<Option<String>> {
        Ok(None)
    }
}

/// Chat-completions client for step annotations
#[derive(Debug, Clone)]
pub struct ChatAnnotator {
    endpoint: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    connect_timeout: u64,
    request_timeout: u64,
}

impl ChatAnnotator {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        let defaults = AnnotationSettings::defaults();
        Self {
            endpoint: endpoint.into(),
            model: defaults.model,
            api_key: api_key.into(),
            max_tokens: defaults.max_tokens,
            connect_timeout: defaults.connect_timeout,
            request_timeout: defaults.request_timeout,
        }
    }

    /// Build a client from settings; `None` when no credential is set
    pub fn from_settings(settings: &AnnotationSettings) -> Option<Self> {
        if !settings.enabled() {
            return None;
        }
        Some(Self {
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone().unwrap_or_default(),
            max_tokens: settings.max_tokens,
            connect_timeout: settings.connect_timeout,
            request_timeout: settings.request_timeout,
        })
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn request_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout = seconds;
        self
    }

    fn request_body(&self, prompt: &str) -> AnnotationResult<String> {
        let request = serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": prompt
            }],
            "max_tokens": self.max_tokens
        });
        serde_json::to_string(&request).map_err(|e| AnnotationError::InvalidResponse(e.to_string()))
    }
}

impl StepAnnotator for ChatAnnotator {
    fn annotate(&self, step: &PlannedStep) -> AnnotationResult<Option<String>> {
        let body = self.request_body(&build_step_prompt(step))?;

        // Body goes through stdin so large prompts don't hit argv limits
        let mut child = Command::new("curl")
            .args([
                "-s",
                "-X", "POST",
                &self.endpoint,
                "-H", "Content-Type: application/json",
                "-H", &format!("Authorization: Bearer {}", self.api_key),
                "--data-binary", "@-",
                "--connect-timeout", &self.connect_timeout.to_string(),
                "--max-time", &self.request_timeout.to_string(),
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(body.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(AnnotationError::ConnectionFailed(format!(
                "curl exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_completion(&output.stdout).map(Some)
    }
}

/// Pick the annotator the settings call for
pub fn annotator_from_settings(settings: &AnnotationSettings) -> Box<dyn StepAnnotator> {
    match ChatAnnotator::from_settings(settings) {
        Some(client) => Box::new(client),
        None => Box::new(NoopAnnotator),
    }
}

/// Extract the reply text from a chat-completions response
fn parse_completion(body: &[u8]) -> AnnotationResult<String> {
    let response: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| AnnotationError::InvalidResponse(e.to_string()))?;

    if let Some(error) = response["error"]["message"].as_str() {
        return Err(AnnotationError::InvalidResponse(error.to_string()));
    }

    let message = &response["choices"][0]["message"];
    // Thinking models may only fill reasoning_content
    let content = message["content"]
        .as_str()
        .filter(|c| !c.trim().is_empty())
        .or_else(|| message["reasoning_content"].as_str())
        .ok_or_else(|| AnnotationError::InvalidResponse("no message content".to_string()))?;

    Ok(content.trim().to_string())
}

/// Build the prompt asking which visual cues confirm a step
pub fn build_step_prompt(step: &PlannedStep) -> String {
    format!(
        "Analyze this test step and describe what should be visible in a video recording:\n\n\
         Step: {}\n\
         Action Type: {}\n\
         Target: {}\n\n\
         Describe in 1-2 sentences what visual cues would confirm this step was executed.",
        step.description,
        step.action_type,
        step.target.as_deref().unwrap_or("N/A"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::classify_step;

    #[test]
    fn test_build_step_prompt() {
        let step = classify_step("Navigate to https://www.levi.com/", 1);
        let prompt = build_step_prompt(&step);
        assert!(prompt.contains("Step: Navigate to https://www.levi.com/"));
        assert!(prompt.contains("Action Type: navigate"));
        assert!(prompt.contains("Target: https://www.levi.com/"));
    }

    #[test]
    fn test_build_step_prompt_without_target() {
        let step = classify_step("Wait for results", 1);
        assert!(build_step_prompt(&step).contains("Target: N/A"));
    }

    #[test]
    fn test_parse_completion_content() {
        let body = br#"{"choices": [{"message": {"content": " The search results grid appears. "}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "The search results grid appears.");
    }

    #[test]
    fn test_parse_completion_reasoning_fallback() {
        let body = br#"{"choices": [{"message": {"content": "", "reasoning_content": "A page loads."}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "A page loads.");
    }

    #[test]
    fn test_parse_completion_errors() {
        assert!(parse_completion(br#"{"error": {"message": "bad key"}}"#).is_err());
        assert!(parse_completion(br#"{"choices": []}"#).is_err());
        assert!(parse_completion(b"<html>").is_err());
    }

    #[test]
    fn test_noop_annotator_adds_nothing() {
        let step = classify_step("Click the search icon", 1);
        assert_eq!(NoopAnnotator.annotate(&step).unwrap(), None);
    }

    #[test]
    fn test_annotator_requires_credential() {
        let mut settings = AnnotationSettings::defaults();
        assert!(ChatAnnotator::from_settings(&settings).is_none());
        settings.api_key = Some("key".to_string());
        let client = ChatAnnotator::from_settings(&settings).unwrap();
        assert_eq!(client.endpoint, settings.endpoint);
    }

    #[test]
    fn test_chat_annotator_builder() {
        let client = ChatAnnotator::new("http://localhost:8080/v1/chat/completions", "key")
            .model("llama3")
            .max_tokens(80)
            .request_timeout(5);
        assert_eq!(client.model, "llama3");
        assert_eq!(client.max_tokens, 80);
        assert_eq!(client.request_timeout, 5);
        let body = client.request_body("hello").unwrap();
        assert!(body.contains("\"llama3\""));
    }
}
