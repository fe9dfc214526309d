// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! Advisory processing-time estimation.
//!
//! Predicts the wall-clock cost of an embed job from frame count,
//! resolution, and payload length. The estimate never gates execution;
//! the adapter uses it to set user expectations before upload.

use serde::Serialize;

use super::probe::VideoMeta;

/// Frames per second a single reference core processes at 640×360.
const BASE_RATE: f64 = 30.0;

/// An advisory wall-clock estimate.
#[derive(Debug, Clone, Serialize)]
pub struct Estimate {
    /// Predicted processing time in seconds.
    pub seconds: f64,
    /// 0.7 when the video metadata is fully known, 0.4 otherwise.
    pub confidence: f64,
}

/// Resolution scaling relative to the 720p reference.
fn resolution_factor(width: u32, height: u32) -> f64 {
    let pixels = u64::from(width) * u64::from(height);
    if pixels <= 854 * 480 {
        0.5
    } else if pixels <= 1280 * 720 {
        1.0
    } else if pixels <= 1920 * 1080 {
        1.5
    } else if pixels <= 3840 * 2160 {
        3.0
    } else {
        5.0
    }
}

/// Payload scaling: longer payloads touch more blocks per frame.
fn payload_factor(payload_len: usize) -> f64 {
    0.5 + (payload_len as f64 / 32.0).min(1.5)
}

/// Estimate the processing time for an embed job.
pub fn estimate(meta: &VideoMeta, payload_len: usize) -> Estimate {
    let frames = meta.frame_count.max(1) as f64;
    let seconds =
        frames / BASE_RATE * resolution_factor(meta.width, meta.height) * payload_factor(payload_len);
    let confidence = if meta.is_complete() { 0.7 } else { 0.4 };
    Estimate { seconds, confidence }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(width: u32, height: u32, frames: u64) -> VideoMeta {
        VideoMeta {
            width,
            height,
            fps: 30.0,
            fps_rational: "30/1".to_string(),
            frame_count: frames,
            duration_s: frames as f64 / 30.0,
            codec_name: Some("h264".to_string()),
            has_video: true,
            has_audio: false,
            size: 1_000_000,
        }
    }

    #[test]
    fn resolution_tiers() {
        assert_eq!(resolution_factor(640, 480), 0.5);
        assert_eq!(resolution_factor(1280, 720), 1.0);
        assert_eq!(resolution_factor(1920, 1080), 1.5);
        assert_eq!(resolution_factor(3840, 2160), 3.0);
        assert_eq!(resolution_factor(7680, 4320), 5.0);
    }

    #[test]
    fn payload_factor_saturates() {
        assert_eq!(payload_factor(0), 0.5);
        assert_eq!(payload_factor(16), 1.0);
        assert_eq!(payload_factor(32), 1.5);
        assert_eq!(payload_factor(48), 2.0);
        assert_eq!(payload_factor(480), 2.0, "factor is capped");
    }

    #[test]
    fn reference_clip_estimate() {
        // 300 frames at 720p with a 16-byte payload:
        // 300 / 30 · 1.0 · 1.0 = 10 s.
        let e = estimate(&meta(1280, 720, 300), 16);
        assert!((e.seconds - 10.0).abs() < 1e-9);
        assert_eq!(e.confidence, 0.7);
    }

    #[test]
    fn incomplete_metadata_lowers_confidence() {
        let mut m = meta(1280, 720, 300);
        m.fps = 0.0;
        assert_eq!(estimate(&m, 16).confidence, 0.4);
    }

    #[test]
    fn estimate_monotone_in_size_and_payload() {
        let small = estimate(&meta(640, 360, 100), 8).seconds;
        let large = estimate(&meta(1920, 1080, 100), 8).seconds;
        assert!(large > small);
        let longer = estimate(&meta(640, 360, 100), 40).seconds;
        assert!(longer > small);
    }
}
