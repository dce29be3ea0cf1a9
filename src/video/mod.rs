pub mod analyzer;
pub mod frames;
pub mod types;

pub use analyzer::{SourceScan, VideoAnalyzer, mean_abs_diff, resolve_videos, scan_source};
pub use frames::{Canvas, FfmpegDecoder, FrameDecoder, FrameSource, SyntheticDecoder, SyntheticVideo};
pub use types::{EventType, VideoAnalysis, VideoError, VideoEvent, VideoInfo, VideoResult, VideoSummary};
