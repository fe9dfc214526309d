// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! Container metadata probing via ffprobe.
//!
//! Runs `ffprobe -print_format json -show_format -show_streams` and
//! parses the JSON with serde. When the container does not report a
//! frame count (common for MKV/WebM), it is estimated from duration
//! and frame rate.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;

use super::error::VideoError;

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    streams: Option<Vec<FfprobeStream>>,
}

/// Probed stream metadata for one input file.
#[derive(Debug, Clone)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
    /// Frame rate as a float, 0.0 when unknown.
    pub fps: f64,
    /// Frame rate as ffprobe's rational string (e.g. "30/1"), passed
    /// through to the encoder unchanged to avoid rounding drift.
    pub fps_rational: String,
    /// Exact when the container reports it, otherwise ceil(duration · fps).
    pub frame_count: u64,
    pub duration_s: f64,
    pub codec_name: Option<String>,
    pub has_video: bool,
    pub has_audio: bool,
    pub size: u64,
}

impl VideoMeta {
    /// True when every field the estimator needs is known.
    pub fn is_complete(&self) -> bool {
        self.has_video && self.width > 0 && self.height > 0 && self.fps > 0.0 && self.frame_count > 0
    }
}

/// Parse "num/den" (or a bare float) into frames per second.
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den == 0.0 {
            return None;
        }
        Some(num / den)
    } else {
        s.trim().parse().ok()
    }
}

/// Parse ffprobe JSON output into [`VideoMeta`].
pub fn parse_probe_json(json: &str) -> Result<VideoMeta, VideoError> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| VideoError::ProbeFailed(format!("unparseable ffprobe JSON: {e}")))?;

    let format = output.format.as_ref();
    let duration_s = format
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    let size = format
        .and_then(|f| f.size.as_ref())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let streams = output.streams.as_deref().unwrap_or(&[]);
    let video = streams.iter().find(|s| s.codec_type.as_deref() == Some("video"));
    let has_audio = streams.iter().any(|s| s.codec_type.as_deref() == Some("audio"));

    let width = video.and_then(|s| s.width).unwrap_or(0);
    let height = video.and_then(|s| s.height).unwrap_or(0);
    let fps_rational = video
        .and_then(|s| s.r_frame_rate.clone())
        .unwrap_or_else(|| "0/1".to_string());
    let fps = parse_frame_rate(&fps_rational).unwrap_or(0.0);

    let frame_count = video
        .and_then(|s| s.nb_frames.as_ref())
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|&n| n > 0)
        .unwrap_or_else(|| {
            if duration_s > 0.0 && fps > 0.0 {
                (duration_s * fps).ceil() as u64
            } else {
                0
            }
        });

    Ok(VideoMeta {
        width,
        height,
        fps,
        fps_rational,
        frame_count,
        duration_s,
        codec_name: video.and_then(|s| s.codec_name.clone()),
        has_video: video.is_some(),
        has_audio,
        size,
    })
}

/// Probe a video file with ffprobe.
///
/// # Errors
/// [`VideoError::ProbeFailed`] when ffprobe cannot be spawned, exits
/// non-zero, or emits unparseable output.
pub fn probe(path: &Path) -> Result<VideoMeta, VideoError> {
    let path_str = path.to_string_lossy();
    log::debug!(target: "vidmark::video::probe", "probing {path_str}");

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| VideoError::ProbeFailed(format!("could not run ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(VideoError::ProbeFailed(format!(
            "ffprobe exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let json = String::from_utf8_lossy(&output.stdout);
    parse_probe_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_metadata() {
        let json = r#"{
            "format": { "duration": "10.0", "size": "2000000" },
            "streams": [
                {
                    "codec_type": "video",
                    "codec_name": "h264",
                    "width": 640,
                    "height": 360,
                    "r_frame_rate": "30/1",
                    "nb_frames": "300"
                },
                { "codec_type": "audio", "codec_name": "aac" }
            ]
        }"#;
        let meta = parse_probe_json(json).unwrap();
        assert_eq!(meta.width, 640);
        assert_eq!(meta.height, 360);
        assert_eq!(meta.frame_count, 300);
        assert!((meta.fps - 30.0).abs() < 1e-9);
        assert_eq!(meta.fps_rational, "30/1");
        assert_eq!(meta.codec_name.as_deref(), Some("h264"));
        assert!(meta.has_video);
        assert!(meta.has_audio);
        assert!(meta.is_complete());
    }

    #[test]
    fn frame_count_falls_back_to_duration_times_fps() {
        let json = r#"{
            "format": { "duration": "2.5" },
            "streams": [
                { "codec_type": "video", "width": 320, "height": 240, "r_frame_rate": "24000/1001" }
            ]
        }"#;
        let meta = parse_probe_json(json).unwrap();
        // 2.5 s at 23.976 fps → ceil(59.94) = 60
        assert_eq!(meta.frame_count, 60);
    }

    #[test]
    fn ntsc_frame_rate_parsed() {
        assert!((parse_frame_rate("24000/1001").unwrap() - 23.976).abs() < 0.001);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("25"), Some(25.0));
    }

    #[test]
    fn audio_only_input_has_no_video() {
        let json = r#"{
            "format": { "duration": "3.0" },
            "streams": [ { "codec_type": "audio" } ]
        }"#;
        let meta = parse_probe_json(json).unwrap();
        assert!(!meta.has_video);
        assert!(meta.has_audio);
        assert_eq!(meta.width, 0);
        assert!(!meta.is_complete());
    }

    #[test]
    fn empty_output_yields_empty_meta() {
        let meta = parse_probe_json(r#"{"format": {}, "streams": []}"#).unwrap();
        assert!(!meta.has_video);
        assert_eq!(meta.frame_count, 0);
        assert_eq!(meta.duration_s, 0.0);
    }

    #[test]
    fn malformed_json_is_probe_failure() {
        assert!(matches!(
            parse_probe_json("not json"),
            Err(VideoError::ProbeFailed(_))
        ));
    }
}
