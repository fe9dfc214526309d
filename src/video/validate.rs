// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! Layered input validation.
//!
//! Four layers, cheap to expensive:
//!
//! 1. Path and size: existence, readability, non-zero, below the
//!    configured maximum.
//! 2. Magic bytes: container signature among the allow-list
//!    {MP4, AVI, MOV, MKV, WMV, FLV, WebM}.
//! 3. Decoder probe: stream metadata plus at least one decodable
//!    video frame.
//! 4. Sanity warnings: implausible frame rates, very long durations,
//!    tiny or odd dimensions.
//!
//! Errors reject the input; warnings ride along in the report.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::Command;

use serde::Serialize;

use super::probe;

/// How many leading bytes are examined for container signatures.
const HEADER_PROBE_LEN: usize = 4096;

/// ASF (WMV) header object GUID.
const ASF_GUID: [u8; 16] = [
    0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE,
    0x6C,
];

/// Recognized input containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Mp4,
    Mov,
    Avi,
    Mkv,
    WebM,
    Wmv,
    Flv,
}

impl Container {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
            Self::Avi => "avi",
            Self::Mkv => "mkv",
            Self::WebM => "webm",
            Self::Wmv => "wmv",
            Self::Flv => "flv",
        }
    }

    /// File extensions conventionally used for this container.
    fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Mp4 => &["mp4", "m4v"],
            Self::Mov => &["mov"],
            Self::Avi => &["avi"],
            Self::Mkv => &["mkv"],
            Self::WebM => &["webm"],
            Self::Wmv => &["wmv"],
            Self::Flv => &["flv"],
        }
    }
}

/// Identify a container from its leading bytes.
pub fn detect_container(header: &[u8]) -> Option<Container> {
    if header.len() >= 12 && &header[4..8] == b"ftyp" {
        return Some(if &header[8..12] == b"qt  " { Container::Mov } else { Container::Mp4 });
    }
    if header.len() >= 12 && &header[..4] == b"RIFF" && &header[8..12] == b"AVI " {
        return Some(Container::Avi);
    }
    if header.len() >= 4 && header[..4] == [0x1A, 0x45, 0xDF, 0xA3] {
        // EBML: the doctype string distinguishes WebM from Matroska.
        let is_webm = header.windows(4).any(|w| w == b"webm");
        return Some(if is_webm { Container::WebM } else { Container::Mkv });
    }
    if header.len() >= 16 && header[..16] == ASF_GUID {
        return Some(Container::Wmv);
    }
    if header.len() >= 3 && &header[..3] == b"FLV" {
        return Some(Container::Flv);
    }
    None
}

/// Structured validation result.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub exists: bool,
    pub readable: bool,
    pub size: u64,
    pub container: Option<Container>,
    pub has_video_stream: bool,
    pub has_audio_stream: bool,
    pub duration_s: f64,
    pub frame_count: u64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub codec_tag: Option<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn new() -> Self {
        Self {
            exists: false,
            readable: false,
            size: 0,
            container: None,
            has_video_stream: false,
            has_audio_stream: false,
            duration_s: 0.0,
            frame_count: 0,
            fps: 0.0,
            width: 0,
            height: 0,
            codec_tag: None,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Accepted for processing: no errors and a decodable video stream.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.has_video_stream
    }
}

/// Layers 1–2 only: path, size, and container signature. Fills
/// `exists`, `readable`, `size`, `container`, and any errors/warnings
/// those layers produce.
pub fn validate_shallow(path: &Path, max_file_size: u64) -> ValidationReport {
    let mut report = ValidationReport::new();

    report.exists = path.is_file();
    if !report.exists {
        report.errors.push(format!("file not found: {}", path.display()));
        return report;
    }

    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            report.errors.push(format!("file not readable: {e}"));
            return report;
        }
    };
    report.readable = true;

    report.size = file.metadata().map(|m| m.len()).unwrap_or(0);
    if report.size == 0 {
        report.errors.push("file is empty".to_string());
        return report;
    }
    if report.size > max_file_size {
        report.errors.push(format!(
            "file size {} exceeds the configured maximum of {} bytes",
            report.size, max_file_size
        ));
        return report;
    }

    let mut header = vec![0u8; HEADER_PROBE_LEN.min(report.size as usize)];
    if let Err(e) = file.read_exact(&mut header) {
        report.errors.push(format!("could not read file header: {e}"));
        return report;
    }

    match detect_container(&header) {
        Some(container) => {
            report.container = Some(container);
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase());
            match ext {
                Some(ext) if container.extensions().contains(&ext.as_str()) => {}
                // ftyp-based MOV/MP4 brands overlap in the wild; only warn.
                Some(ext) => report.warnings.push(format!(
                    "extension .{ext} does not match detected {} container",
                    container.as_str()
                )),
                None => report
                    .warnings
                    .push("file has no extension".to_string()),
            }
        }
        None => {
            report
                .errors
                .push("unrecognized container signature (allowed: mp4, avi, mov, mkv, wmv, flv, webm)".to_string());
        }
    }

    report
}

/// Decode a single frame to the null muxer. A container whose first
/// frame cannot be decoded is rejected even when probing succeeds.
fn first_frame_decodable(path: &Path) -> Result<(), String> {
    let output = Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args(["-frames:v", "1", "-f", "null", "-"])
        .output()
        .map_err(|e| format!("could not run ffmpeg: {e}"))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(stderr.trim().lines().next().unwrap_or("decode failed").to_string())
    }
}

/// Full four-layer validation.
pub fn validate(path: &Path, max_file_size: u64) -> ValidationReport {
    let mut report = validate_shallow(path, max_file_size);
    if !report.errors.is_empty() {
        return report;
    }

    // Layer 3: decoder probe.
    match probe::probe(path) {
        Ok(meta) => {
            report.has_video_stream = meta.has_video;
            report.has_audio_stream = meta.has_audio;
            report.duration_s = meta.duration_s;
            report.frame_count = meta.frame_count;
            report.fps = meta.fps;
            report.width = meta.width;
            report.height = meta.height;
            report.codec_tag = meta.codec_name;

            if !meta.has_video {
                report.errors.push("no video stream found".to_string());
            } else if let Err(reason) = first_frame_decodable(path) {
                report.has_video_stream = false;
                report.errors.push(format!("no decodable video frame: {reason}"));
            }
        }
        Err(e) => {
            report.errors.push(e.to_string());
            return report;
        }
    }

    if !report.errors.is_empty() {
        return report;
    }

    // Layer 4: sanity warnings.
    if report.fps < 1.0 || report.fps > 120.0 {
        report.warnings.push(format!("unusual frame rate: {:.3} fps", report.fps));
    }
    if report.duration_s > 3600.0 {
        report.warnings.push(format!(
            "duration {:.0} s exceeds one hour; processing will be slow",
            report.duration_s
        ));
    }
    if report.width < 64 || report.height < 64 {
        report.warnings.push(format!(
            "small dimensions {}x{}; watermark capacity is very limited",
            report.width, report.height
        ));
    }
    if report.width % 2 == 1 || report.height % 2 == 1 {
        report.warnings.push(format!(
            "odd dimensions {}x{}; edge pixels lose block alignment",
            report.width, report.height
        ));
    }

    log::debug!(
        target: "vidmark::video::validate",
        "validated {}: valid={}, {} warnings",
        path.display(),
        report.is_valid(),
        report.warnings.len()
    );

    report
}
