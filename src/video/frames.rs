//! Frame decoding abstraction.
//!
//! This module provides a unified interface over frame producers:
//! - `FfmpegDecoder` decodes real recordings through the `ffprobe`/`ffmpeg` binaries
//! - `SyntheticVideo` serves in-memory frames (tests and benchmarks)

use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{ImageBuffer, RgbImage};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use super::types::{VideoError, VideoInfo, VideoResult};

/// A stream of decoded RGB frames
pub trait FrameSource {
    /// Stream properties as reported when the video was opened
    fn info(&self) -> VideoInfo;

    /// Next frame in presentation order, or `None` at end of stream
    fn next_frame(&mut self) -> VideoResult<Option<RgbImage>>;
}

/// Opens a video file as a [`FrameSource`]
pub trait FrameDecoder {
    fn open(&self, path: &Path) -> VideoResult<Box<dyn FrameSource>>;
}

// =============================================================================
// ffmpeg-backed decoding
// =============================================================================

/// Decoder that shells out to `ffprobe` for stream metadata and to `ffmpeg`
/// for raw `rgb24` frames.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    ffmpeg: String,
    ffprobe: String,
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use specific binaries instead of the ones on `PATH`
    pub fn binaries(mut self, ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self.ffprobe = ffprobe.into();
        self
    }

    fn probe(&self, path: &Path) -> VideoResult<VideoInfo> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v", "error",
                "-select_streams", "v:0",
                "-show_entries", "stream=width,height,avg_frame_rate,r_frame_rate,nb_frames:format=duration",
                "-of", "json",
            ])
            .arg(path)
            .output()
            .map_err(|e| VideoError::Open(format!("failed to run {}: {}", self.ffprobe, e)))?;

        if !output.status.success() {
            return Err(VideoError::Open(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        parse_probe_output(&output.stdout)
    }
}

impl FrameDecoder for FfmpegDecoder {
    fn open(&self, path: &Path) -> VideoResult<Box<dyn FrameSource>> {
        let info = self.probe(path)?;

        let mut child = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| VideoError::Open(format!("failed to run {}: {}", self.ffmpeg, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VideoError::Open("failed to capture ffmpeg stdout".to_string()))?;

        Ok(Box::new(FfmpegSource {
            info,
            child,
            stdout,
            finished: false,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: u32,
    height: u32,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

fn parse_probe_output(stdout: &[u8]) -> VideoResult<VideoInfo> {
    let probe: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| VideoError::Open(format!("unreadable ffprobe output: {}", e)))?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| VideoError::Open("no video stream".to_string()))?;

    if stream.width == 0 || stream.height == 0 {
        return Err(VideoError::Open("video stream has zero size".to_string()));
    }

    let fps = [&stream.avg_frame_rate, &stream.r_frame_rate]
        .into_iter()
        .flatten()
        .map(|rate| parse_frame_rate(rate))
        .find(|fps| *fps > 0.0)
        .unwrap_or(0.0);

    // WebM rarely carries nb_frames; estimate from the container duration
    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .or_else(|| {
            let duration: f64 = probe.format.as_ref()?.duration.as_deref()?.trim().parse().ok()?;
            (duration > 0.0 && fps > 0.0).then(|| (duration * fps).round() as u64)
        })
        .unwrap_or(0);

    Ok(VideoInfo {
        width: stream.width,
        height: stream.height,
        fps,
        frame_count,
    })
}

/// Parse an ffprobe rate such as `30/1` or `30000/1001`; `0/0` yields 0
fn parse_frame_rate(rate: &str) -> f64 {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().unwrap_or(0.0);
            let den: f64 = den.trim().parse().unwrap_or(0.0);
            if den > 0.0 { num / den } else { 0.0 }
        }
        None => rate.trim().parse().unwrap_or(0.0),
    }
}

struct FfmpegSource {
    info: VideoInfo,
    child: Child,
    stdout: ChildStdout,
    finished: bool,
}

impl FfmpegSource {
    fn frame_len(&self) -> usize {
        self.info.width as usize * self.info.height as usize * 3
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn next_frame(&mut self) -> VideoResult<Option<RgbImage>> {
        if self.finished {
            return Ok(None);
        }

        if self.frame_len() == 0 {
            self.finished = true;
            let _ = self.child.kill();
            let _ = self.child.wait();
            return Err(VideoError::Decode("video stream has zero size".to_string()));
        }

        let mut buffer = vec![0u8; self.frame_len()];
        let mut filled = 0;
        while filled < buffer.len() {
            match self.stdout.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(VideoError::Io(e)),
            }
        }

        if filled < buffer.len() {
            self.finished = true;
            let status = self.child.wait()?;
            if filled > 0 {
                return Err(VideoError::Decode(format!(
                    "truncated frame: got {} of {} bytes",
                    filled,
                    buffer.len()
                )));
            }
            if !status.success() {
                return Err(VideoError::Decode(format!("ffmpeg exited with {}", status)));
            }
            return Ok(None);
        }

        ImageBuffer::from_raw(self.info.width, self.info.height, buffer)
            .map(Some)
            .ok_or_else(|| VideoError::Decode("frame buffer size mismatch".to_string()))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

// =============================================================================
// In-memory frames
// =============================================================================

/// An RGB canvas for building synthetic frames.
///
/// Provides a small drawing API for test fixtures:
/// - `fill()` - Fill the whole frame
/// - `draw_rect()` - Draw a filled rectangle
/// - `draw_text()` - Draw text using font8x8 glyphs
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    /// Create a black canvas
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbImage::new(width, height),
        }
    }

    /// Create a canvas filled with a color
    pub fn with_color(width: u32, height: u32, color: [u8; 3]) -> Self {
        let mut canvas = Self::new(width, height);
        canvas.fill(color);
        canvas
    }

    pub fn fill(&mut self, color: [u8; 3]) {
        for pixel in self.image.pixels_mut() {
            pixel.0 = color;
        }
    }

    /// Draw a filled rectangle, clipped to the canvas
    pub fn draw_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: [u8; 3]) {
        let (width, height) = self.image.dimensions();
        for py in y..(y + h).min(height) {
            for px in x..(x + w).min(width) {
                self.image.get_pixel_mut(px, py).0 = color;
            }
        }
    }

    /// Draw text using 8x8 glyphs. Text does not wrap.
    pub fn draw_text(&mut self, x: u32, y: u32, text: &str, fg: [u8; 3], bg: [u8; 3]) {
        let (width, height) = self.image.dimensions();
        let mut cursor_x = x;
        for ch in text.chars() {
            let glyph = BASIC_FONTS.get(ch).unwrap_or([0u8; 8]);
            for (row_idx, row) in glyph.iter().enumerate() {
                let py = y + row_idx as u32;
                if py >= height {
                    break;
                }
                for bit in 0..8u32 {
                    let px = cursor_x + bit;
                    if px >= width {
                        break;
                    }
                    let color = if row & (1 << bit) != 0 { fg } else { bg };
                    self.image.get_pixel_mut(px, py).0 = color;
                }
            }
            cursor_x += 8;
            if cursor_x >= width {
                break;
            }
        }
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.image.get_pixel(x, y).0
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

/// A video held entirely in memory
#[derive(Debug, Clone)]
pub struct SyntheticVideo {
    fps: f64,
    frames: Vec<RgbImage>,
    cursor: usize,
}

impl SyntheticVideo {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            frames: Vec::new(),
            cursor: 0,
        }
    }

    /// Append one frame
    pub fn frame(mut self, frame: RgbImage) -> Self {
        self.frames.push(frame);
        self
    }

    /// Append `count` copies of a frame
    pub fn repeat(mut self, frame: &RgbImage, count: usize) -> Self {
        self.frames
            .extend(std::iter::repeat_n(frame, count).cloned());
        self
    }

    /// Append `count` frames of a solid color
    pub fn solid(self, width: u32, height: u32, color: [u8; 3], count: usize) -> Self {
        let frame = Canvas::with_color(width, height, color).into_image();
        self.repeat(&frame, count)
    }

}

impl FrameSource for SyntheticVideo {
    fn info(&self) -> VideoInfo {
        let (width, height) = self
            .frames
            .first()
            .map(|f| f.dimensions())
            .unwrap_or((0, 0));
        VideoInfo {
            width,
            height,
            fps: self.fps,
            frame_count: self.frames.len() as u64,
        }
    }

    fn next_frame(&mut self) -> VideoResult<Option<RgbImage>> {
        let frame = self.frames.get(self.cursor).cloned();
        if frame.is_some() {
            self.cursor += 1;
        }
        Ok(frame)
    }
}

/// Decoder serving [`SyntheticVideo`]s by file name; unknown names fail to open
#[derive(Debug, Clone, Default)]
pub struct SyntheticDecoder {
    videos: HashMap<String, SyntheticVideo>,
}

impl SyntheticDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn video(mut self, file_name: impl Into<String>, video: SyntheticVideo) -> Self {
        self.videos.insert(file_name.into(), video);
        self
    }
}

impl FrameDecoder for SyntheticDecoder {
    fn open(&self, path: &Path) -> VideoResult<Box<dyn FrameSource>> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.videos
            .get(&name)
            .cloned()
            .map(|video| Box::new(video) as Box<dyn FrameSource>)
            .ok_or_else(|| VideoError::Open(format!("no synthetic video named {}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), 30.0);
        assert!((parse_frame_rate("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), 0.0);
        assert_eq!(parse_frame_rate("25"), 25.0);
        assert_eq!(parse_frame_rate("garbage"), 0.0);
    }

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{"streams": [{"width": 1280, "height": 720, "avg_frame_rate": "0/0", "r_frame_rate": "25/1", "nb_frames": "250"}]}"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.width, 1280);
        assert_eq!(info.height, 720);
        assert_eq!(info.fps, 25.0);
        assert_eq!(info.frame_count, 250);
        assert_eq!(info.duration(), 10.0);
    }

    #[test]
    fn test_parse_probe_output_without_frame_count() {
        let json = br#"{"streams": [{"width": 640, "height": 480, "avg_frame_rate": "30/1"}]}"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.frame_count, 0);
        assert_eq!(info.duration(), 0.0);
    }

    #[test]
    fn test_parse_probe_output_estimates_frames_from_duration() {
        let json = br#"{"streams": [{"width": 1280, "height": 720, "avg_frame_rate": "25/1"}], "format": {"duration": "12.040000"}}"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.frame_count, 301);
        assert!((info.duration() - 12.04).abs() < 1e-9);

        let no_rate = br#"{"streams": [{"width": 1280, "height": 720, "avg_frame_rate": "0/0"}], "format": {"duration": "12.0"}}"#;
        assert_eq!(parse_probe_output(no_rate).unwrap().frame_count, 0);
    }

    #[test]
    fn test_parse_probe_output_rejects_zero_size() {
        let json = br#"{"streams": [{"width": 0, "height": 0, "avg_frame_rate": "30/1"}]}"#;
        match parse_probe_output(json) {
            Err(VideoError::Open(message)) => assert!(message.contains("zero size")),
            other => panic!("expected open error, got {:?}", other.map(|_| ())),
        }

        let json = br#"{"streams": [{"width": 640, "height": 0, "avg_frame_rate": "30/1"}]}"#;
        assert!(parse_probe_output(json).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_zero_size_source_ends_instead_of_looping() {
        let mut child = Command::new("true").stdout(Stdio::piped()).spawn().unwrap();
        let stdout = child.stdout.take().unwrap();
        let mut source = FfmpegSource {
            info: VideoInfo {
                width: 0,
                height: 0,
                fps: 30.0,
                frame_count: 0,
            },
            child,
            stdout,
            finished: false,
        };

        assert!(matches!(source.next_frame(), Err(VideoError::Decode(_))));
        assert!(source.next_frame().unwrap().is_none());
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    #[cfg(unix)]
    #[test]
    fn test_ffmpeg_decoder_refuses_zero_size_stream() {
        let dir = tempfile::tempdir().unwrap();
        let ffprobe = write_script(
            dir.path(),
            "ffprobe",
            r#"echo '{"streams":[{"width":0,"height":0,"avg_frame_rate":"30/1"}]}'"#,
        );
        let ffmpeg = write_script(dir.path(), "ffmpeg", "exit 0");

        let decoder = FfmpegDecoder::new().binaries(ffmpeg, ffprobe);
        match decoder.open(&dir.path().join("clip.webm")) {
            Err(VideoError::Open(message)) => assert!(message.contains("zero size")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("zero-size stream should not open"),
        }
    }

    #[test]
    fn test_parse_probe_output_no_stream() {
        assert!(matches!(
            parse_probe_output(br#"{"streams": []}"#),
            Err(VideoError::Open(_))
        ));
        assert!(parse_probe_output(b"not json").is_err());
    }

    #[test]
    fn test_canvas_draw_rect_clips() {
        let mut canvas = Canvas::new(20, 20);
        canvas.draw_rect(15, 15, 10, 10, [255, 0, 0]);
        assert_eq!(canvas.get_pixel(19, 19), [255, 0, 0]);
        assert_eq!(canvas.get_pixel(14, 14), [0, 0, 0]);
    }

    #[test]
    fn test_canvas_draw_text_sets_foreground() {
        let mut canvas = Canvas::new(80, 16);
        canvas.draw_text(0, 0, "Hi", [255, 255, 255], [0, 0, 0]);
        let lit = (0..8)
            .flat_map(|y| (0..8).map(move |x| (x, y)))
            .any(|(x, y)| canvas.get_pixel(x, y) == [255, 255, 255]);
        assert!(lit, "Character 'H' should have some foreground pixels");
    }

    #[test]
    fn test_synthetic_video_yields_frames_in_order() {
        let mut video = SyntheticVideo::new(10.0)
            .solid(4, 4, [255, 255, 255], 2)
            .solid(4, 4, [0, 0, 0], 1);
        assert_eq!(video.info().frame_count, 3);
        assert_eq!(video.next_frame().unwrap().unwrap().get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(video.next_frame().unwrap().unwrap().get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(video.next_frame().unwrap().unwrap().get_pixel(0, 0).0, [0, 0, 0]);
        assert!(video.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_synthetic_decoder_unknown_name_fails() {
        let decoder = SyntheticDecoder::new().video("a.webm", SyntheticVideo::new(30.0));
        assert!(decoder.open(Path::new("/videos/a.webm")).is_ok());
        assert!(decoder.open(Path::new("/videos/b.webm")).is_err());
    }
}
