//! Scene-change detection by frame differencing.
//!
//! Every Nth frame is compared against the previously sampled frame. When the
//! mean absolute per-channel difference crosses the threshold, a
//! `scene_change` event is recorded at that frame's timestamp. This is a
//! global brightness heuristic: a moving cursor and a full page load look the
//! same once they cross the threshold.

use image::RgbImage;
use std::path::{Path, PathBuf};

use super::frames::{FfmpegDecoder, FrameDecoder, FrameSource};
use super::types::{EventType, VideoAnalysis, VideoEvent, VideoSummary};
use crate::config::AnalysisSettings;

const SCENE_CHANGE_DESCRIPTION: &str = "Significant UI change detected";

/// Analyzes one video file or every video in a directory
pub struct VideoAnalyzer {
    settings: AnalysisSettings,
    decoder: Box<dyn FrameDecoder>,
}

impl VideoAnalyzer {
    /// Analyzer backed by the ffmpeg decoder
    pub fn new(settings: AnalysisSettings) -> Self {
        Self::with_decoder(settings, FfmpegDecoder::new())
    }

    pub fn with_decoder(settings: AnalysisSettings, decoder: impl FrameDecoder + 'static) -> Self {
        Self {
            settings,
            decoder: Box::new(decoder),
        }
    }

    /// Analyze every video under `path`.
    ///
    /// A video that fails to open or decode is logged and reported in its
    /// summary; the remaining videos are still processed.
    pub fn analyze(&self, path: &Path) -> VideoAnalysis {
        let videos = resolve_videos(path, &self.settings);
        let mut analysis = VideoAnalysis {
            video_count: videos.len(),
            ..Default::default()
        };

        for video in &videos {
            let (events, summary) = self.analyze_file(video);
            analysis.detected_events.extend(events);
            analysis.videos.push(summary);
        }

        analysis.total_events = analysis.detected_events.len();
        analysis
    }

    fn analyze_file(&self, path: &Path) -> (Vec<VideoEvent>, VideoSummary) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let mut source = match self.decoder.open(path) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(video = %path.display(), error = %e, "could not open video, skipping");
                let summary = VideoSummary {
                    name,
                    fps: 0.0,
                    frame_count: 0,
                    duration: 0.0,
                    sampled_frames: 0,
                    event_count: 0,
                    error: Some(e.to_string()),
                };
                return (Vec::new(), summary);
            }
        };

        let info = source.info();
        tracing::info!(
            video = %name,
            duration_secs = info.duration(),
            frames = info.frame_count,
            "analyzing video"
        );

        let scan = scan_source(&name, source.as_mut(), &self.settings);
        if let Some(error) = &scan.error {
            tracing::warn!(video = %name, %error, "error while decoding video, keeping events found so far");
        }

        let summary = VideoSummary {
            name,
            fps: info.fps,
            frame_count: info.frame_count,
            duration: info.duration(),
            sampled_frames: scan.sampled_frames,
            event_count: scan.events.len(),
            error: scan.error,
        };
        (scan.events, summary)
    }
}

/// Outcome of walking one frame source
#[derive(Debug, Clone, Default)]
pub struct SourceScan {
    pub events: Vec<VideoEvent>,
    pub sampled_frames: u64,
    /// Decode failure that ended the scan early
    pub error: Option<String>,
}

/// Walk a frame source and collect scene changes
pub fn scan_source(name: &str, source: &mut dyn FrameSource, settings: &AnalysisSettings) -> SourceScan {
    let fps = source.info().fps;
    let stride = settings.stride() as u64;
    let mut scan = SourceScan::default();
    let mut previous: Option<RgbImage> = None;
    let mut frame_index: u64 = 0;

    loop {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                scan.error = Some(e.to_string());
                break;
            }
        };

        if frame_index % stride == 0 {
            scan.sampled_frames += 1;
            if let Some(prev) = &previous {
                let change_score = mean_abs_diff(prev, &frame);
                if change_score > settings.scene_change_threshold {
                    scan.events.push(VideoEvent {
                        video: name.to_string(),
                        timestamp: timestamp_at(frame_index, fps),
                        event_type: EventType::SceneChange,
                        description: SCENE_CHANGE_DESCRIPTION.to_string(),
                        confidence: (change_score / 100.0).min(1.0),
                    });
                }
            }
            previous = Some(frame);
        }

        frame_index += 1;
    }

    scan
}

/// Mean absolute per-channel difference on a 0-255 scale.
///
/// Frames of different sizes score the maximum difference.
pub fn mean_abs_diff(a: &RgbImage, b: &RgbImage) -> f64 {
    if a.dimensions() != b.dimensions() {
        return 255.0;
    }
    let (a, b) = (a.as_raw(), b.as_raw());
    if a.is_empty() {
        return 0.0;
    }
    let total: u64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| u64::from(x.abs_diff(*y)))
        .sum();
    total as f64 / a.len() as f64
}

/// Seconds at a frame index, rounded to centiseconds; 0 when fps is unknown
fn timestamp_at(frame_index: u64, fps: f64) -> f64 {
    if fps > 0.0 {
        ((frame_index as f64 / fps) * 100.0).round() / 100.0
    } else {
        0.0
    }
}

/// Resolve a file or directory into the list of videos to analyze.
///
/// A file is taken as-is. A directory contributes its allow-listed files in
/// name order. Anything else yields nothing.
pub fn resolve_videos(path: &Path, settings: &AnalysisSettings) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    if !path.is_dir() {
        tracing::warn!(path = %path.display(), "video path does not exist");
        return Vec::new();
    }

    let entries = match std::fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not list video directory");
            return Vec::new();
        }
    };

    let mut videos: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| settings.accepts_extension(&ext.to_string_lossy()))
        })
        .collect();
    videos.sort();
    videos
}
