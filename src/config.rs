//! Configuration management with config file and environment variable support.
//!
//! The pipeline never reads process-wide state on its own: a [`Config`] is
//! built once (usually by the binary) and passed down explicitly.
//!
//! Sources, lowest to highest precedence:
//! - Built-in defaults
//! - An optional flat JSON config file (see [`ConfigFile`])
//! - Environment variables
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `PLAN_VISION_FRAME_SKIP` | Inspect every Nth video frame | `30` |
//! | `PLAN_VISION_SCENE_THRESHOLD` | Mean absolute pixel difference that counts as a scene change | `30` |
//! | `PLAN_VISION_VIDEO_EXTENSIONS` | Comma-separated video extension allow-list | `webm,mp4,avi,mov` |
//! | `PLAN_VISION_PLANNER_KEY` | Top-level key holding the planner messages | `planner_agent` |
//! | `PLAN_VISION_API_KEY` | Credential for the step annotation call | unset |
//! | `PLAN_VISION_ANNOTATION_ENDPOINT` | Chat-completions endpoint for annotations | `https://api.openai.com/v1/chat/completions` |
//! | `PLAN_VISION_ANNOTATION_MODEL` | Model name for annotations | `gpt-4o-mini` |
//!
//! # Example
//!
//! ```json
//! {
//!   "frame_skip": 15,
//!   "video_extensions": ["webm", "mp4"],
//!   "api_key": "sk-..."
//! }
//! ```

use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;

// ============================================================================
// Default Values
// ============================================================================

/// Default sample stride, in frames
pub const DEFAULT_FRAME_SKIP: usize = 30;

/// Default scene-change threshold on a 0-255 channel scale
pub const DEFAULT_SCENE_CHANGE_THRESHOLD: f64 = 30.0;

/// Default video extension allow-list
pub const DEFAULT_VIDEO_EXTENSIONS: [&str; 4] = ["webm", "mp4", "avi", "mov"];

/// Default number of scene changes matched against a single step
pub const DEFAULT_MAX_EVENTS_PER_STEP: usize = 2;

/// Default key holding planner messages in a planning log
pub const DEFAULT_PLANNER_KEY: &str = "planner_agent";

/// Default annotation endpoint
pub const DEFAULT_ANNOTATION_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Default annotation model
pub const DEFAULT_ANNOTATION_MODEL: &str = "gpt-4o-mini";

/// Default max tokens for annotation responses
pub const DEFAULT_ANNOTATION_MAX_TOKENS: u32 = 150;

/// Default annotation connection timeout (seconds)
pub const DEFAULT_ANNOTATION_CONNECT_TIMEOUT: u64 = 10;

/// Default annotation total request timeout (seconds)
pub const DEFAULT_ANNOTATION_REQUEST_TIMEOUT: u64 = 60;

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Environment variable for the frame sample stride
pub const ENV_FRAME_SKIP: &str = "PLAN_VISION_FRAME_SKIP";

/// Environment variable for the scene-change threshold
pub const ENV_SCENE_THRESHOLD: &str = "PLAN_VISION_SCENE_THRESHOLD";

/// Environment variable for the video extension allow-list
pub const ENV_VIDEO_EXTENSIONS: &str = "PLAN_VISION_VIDEO_EXTENSIONS";

/// Environment variable for the planner messages key
pub const ENV_PLANNER_KEY: &str = "PLAN_VISION_PLANNER_KEY";

/// Environment variable for the annotation credential
pub const ENV_API_KEY: &str = "PLAN_VISION_API_KEY";

/// Environment variable for the annotation endpoint
pub const ENV_ANNOTATION_ENDPOINT: &str = "PLAN_VISION_ANNOTATION_ENDPOINT";

/// Environment variable for the annotation model
pub const ENV_ANNOTATION_MODEL: &str = "PLAN_VISION_ANNOTATION_MODEL";

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading a config file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON or has wrongly typed keys
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Centralized configuration for the analysis pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Parsing and video analysis settings
    pub analysis: AnalysisSettings,
    /// Optional step annotation settings
    pub annotation: AnnotationSettings,
}

/// Settings that drive the deterministic part of the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    /// Only every Nth frame is inspected (0 behaves like 1)
    pub frame_skip: usize,
    /// Mean absolute difference above which a sample is a scene change
    pub scene_change_threshold: f64,
    /// Lowercase extensions, without the leading dot
    pub video_extensions: Vec<String>,
    /// Upper bound on scene changes matched to one step
    pub max_events_per_step: usize,
    /// Top-level planning log key holding planner messages
    pub planner_key: String,
}

/// Settings for the advisory annotation call
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationSettings {
    /// Credential; annotation is disabled when `None`
    pub api_key: Option<String>,
    /// Chat-completions endpoint URL
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// Maximum tokens in the response
    pub max_tokens: u32,
    /// Connection timeout (seconds)
    pub connect_timeout: u64,
    /// Whole-request timeout (seconds)
    pub request_timeout: u64,
}

/// On-disk config file shape. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub frame_skip: Option<usize>,
    pub scene_change_threshold: Option<f64>,
    pub video_extensions: Option<Vec<String>>,
    pub max_events_per_step: Option<usize>,
    pub planner_key: Option<String>,
    pub api_key: Option<String>,
    pub annotation_endpoint: Option<String>,
    pub annotation_model: Option<String>,
    pub annotation_max_tokens: Option<u32>,
}

impl Config {
    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            analysis: AnalysisSettings::defaults(),
            annotation: AnnotationSettings::defaults(),
        }
    }

    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::defaults();
        config.apply_overrides(|name| env::var(name).ok());
        config
    }

    /// Load defaults, then the config file if it exists, then the environment.
    ///
    /// A missing file is not an error. A file that exists but does not parse is.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = Self::defaults();
        if let Some(path) = path {
            if path.exists() {
                config.merge_file(read_config_file(path)?);
            } else {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
            }
        }
        config.apply_overrides(|name| env::var(name).ok());
        Ok(config)
    }

    /// Apply values present in a parsed config file
    pub fn merge_file(&mut self, file: ConfigFile) {
        let analysis = &mut self.analysis;
        if let Some(frame_skip) = file.frame_skip {
            analysis.frame_skip = frame_skip;
        }
        if let Some(threshold) = file.scene_change_threshold {
            analysis.scene_change_threshold = threshold;
        }
        if let Some(extensions) = file.video_extensions {
            analysis.video_extensions = normalize_extensions(extensions);
        }
        if let Some(max_events) = file.max_events_per_step {
            analysis.max_events_per_step = max_events;
        }
        if let Some(key) = file.planner_key {
            analysis.planner_key = key;
        }

        let annotation = &mut self.annotation;
        if let Some(api_key) = file.api_key.filter(|k| !k.trim().is_empty()) {
            annotation.api_key = Some(api_key);
        }
        if let Some(endpoint) = file.annotation_endpoint {
            annotation.endpoint = endpoint;
        }
        if let Some(model) = file.annotation_model {
            annotation.model = model;
        }
        if let Some(max_tokens) = file.annotation_max_tokens {
            annotation.max_tokens = max_tokens;
        }
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    ///
    /// Unparseable numeric values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let analysis = &mut self.analysis;
        if let Some(frame_skip) = lookup(ENV_FRAME_SKIP).and_then(|s| s.trim().parse().ok()) {
            analysis.frame_skip = frame_skip;
        }
        if let Some(threshold) = lookup(ENV_SCENE_THRESHOLD).and_then(|s| s.trim().parse().ok()) {
            analysis.scene_change_threshold = threshold;
        }
        if let Some(list) = lookup(ENV_VIDEO_EXTENSIONS) {
            analysis.video_extensions =
                normalize_extensions(list.split(',').map(str::to_string).collect());
        }
        if let Some(key) = lookup(ENV_PLANNER_KEY) {
            analysis.planner_key = key;
        }

        let annotation = &mut self.annotation;
        if let Some(api_key) = lookup(ENV_API_KEY).filter(|k| !k.trim().is_empty()) {
            annotation.api_key = Some(api_key);
        }
        if let Some(endpoint) = lookup(ENV_ANNOTATION_ENDPOINT) {
            annotation.endpoint = endpoint;
        }
        if let Some(model) = lookup(ENV_ANNOTATION_MODEL) {
            annotation.model = model;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl AnalysisSettings {
    /// Create analysis settings with defaults
    pub fn defaults() -> Self {
        Self {
            frame_skip: DEFAULT_FRAME_SKIP,
            scene_change_threshold: DEFAULT_SCENE_CHANGE_THRESHOLD,
            video_extensions: DEFAULT_VIDEO_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            max_events_per_step: DEFAULT_MAX_EVENTS_PER_STEP,
            planner_key: DEFAULT_PLANNER_KEY.to_string(),
        }
    }

    /// Sample stride with the zero case clamped to one
    pub fn stride(&self) -> usize {
        self.frame_skip.max(1)
    }

    /// Whether a file extension is on the allow-list (case-insensitive)
    pub fn accepts_extension(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.').to_lowercase();
        self.video_extensions.iter().any(|e| *e == extension)
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self::defaults()
    }
}

impl AnnotationSettings {
    /// Create annotation settings with defaults (annotation disabled)
    pub fn defaults() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ANNOTATION_ENDPOINT.to_string(),
            model: DEFAULT_ANNOTATION_MODEL.to_string(),
            max_tokens: DEFAULT_ANNOTATION_MAX_TOKENS,
            connect_timeout: DEFAULT_ANNOTATION_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_ANNOTATION_REQUEST_TIMEOUT,
        }
    }

    /// Annotation runs only when a credential is configured
    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for AnnotationSettings {
    fn default() -> Self {
        Self::defaults()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn read_config_file(path: &Path) -> ConfigResult<ConfigFile> {
    let display = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: display.clone(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: display,
        source,
    })
}

/// Lowercase, strip leading dots, drop blanks
fn normalize_extensions(extensions: Vec<String>) -> Vec<String> {
    extensions
        .into_iter()
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
