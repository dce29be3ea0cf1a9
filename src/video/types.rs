// Core types for video analysis

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of visual event detected in a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SceneChange,
}

/// A timestamped visual event in one video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoEvent {
    /// File name of the video the event came from
    pub video: String,

    /// Seconds from the start of that video, rounded to centiseconds
    pub timestamp: f64,

    #[serde(rename = "type")]
    pub event_type: EventType,

    pub description: String,

    /// Change score scaled into [0, 1]
    pub confidence: f64,
}

/// Stream properties reported by a decoder
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Frames per second; 0 when the container does not report a rate
    pub fps: f64,
    /// Frame count reported by the container; 0 when unknown
    pub frame_count: u64,
}

impl VideoInfo {
    /// Duration in seconds derived from the reported frame count
    pub fn duration(&self) -> f64 {
        if self.fps > 0.0 {
            self.frame_count as f64 / self.fps
        } else {
            0.0
        }
    }
}

/// Per-file outcome of an analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSummary {
    pub name: String,
    pub fps: f64,
    pub frame_count: u64,
    pub duration: f64,
    /// Frames actually compared (every Nth)
    pub sampled_frames: u64,
    pub event_count: usize,
    /// Set when the video could not be opened or decoding failed part way
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate output of the video analyzer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoAnalysis {
    /// Files resolved for analysis, including ones that failed to open
    pub video_count: usize,
    /// Events from every video, concatenated in processing order
    pub detected_events: Vec<VideoEvent>,
    pub total_events: usize,
    pub videos: Vec<VideoSummary>,
}

impl VideoAnalysis {
    /// Scene changes only, in detection order
    pub fn scene_changes(&self) -> impl Iterator<Item = &VideoEvent> {
        self.detected_events
            .iter()
            .filter(|e| e.event_type == EventType::SceneChange)
    }
}

/// Result type for video operations
pub type VideoResult<T> = Result<T, VideoError>;

/// Errors that can occur while opening or decoding a video
#[derive(Debug, Error)]
pub enum VideoError {
    /// The decoder could not open the file or read its stream properties
    #[error("could not open video: {0}")]
    Open(String),

    /// Frame data ended mid-frame or the decoder failed
    #[error("decode error: {0}")]
    Decode(String),

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
