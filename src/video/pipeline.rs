// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! Per-frame embed and extract pipelines.
//!
//! The worker hands in an opaque [`ProgressSink`]; the pipeline
//! publishes every `progress_interval` frames plus exactly one 100%
//! event, and checks for cancellation between frames. Any failure
//! mid-encode deletes the partially written output before returning.

use std::fs;
use std::path::Path;

use crate::codec::{self, frame as wm, Confidence, VoteBoard, WatermarkParams};
use crate::codec::{MIN_CONFIDENT_AGREEMENT, MIN_CONFIDENT_VOTES};

use super::error::VideoError;
use super::io::{FrameDecoder, FrameEncoder, OutputCodec};
use super::probe;

/// Receives pipeline progress. The worker's sink forwards to the
/// progress bus; cancellation is polled at frame boundaries.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, frames_done: u64, frames_total: u64, percent: u8);

    fn cancelled(&self) -> bool {
        false
    }
}

/// Sink that discards everything. For callers without observers.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn publish(&self, _frames_done: u64, _frames_total: u64, _percent: u8) {}
}

/// Tuning knobs shared by both pipelines.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Publish a progress event every this many frames.
    pub progress_interval: u64,
    /// Upper bound on the frame prefix scanned during extraction.
    pub extract_frame_limit: u64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self { progress_interval: 10, extract_frame_limit: 90 }
    }
}

/// Result of a completed embed job.
#[derive(Debug, Clone)]
pub struct EmbedOutcome {
    pub frames: u64,
    pub output_size: u64,
}

/// Result of an extraction run.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: String,
    pub confidence: Confidence,
    pub agreement: f64,
    pub frames_used: u64,
}

/// Embed a payload bit stream into every frame of `input`, writing the
/// watermarked video to `output`.
///
/// The capacity precheck runs before any frame is decoded: the probed
/// dimensions already determine the block capacity, so an oversized
/// payload fails fast with `CapacityInsufficient`.
pub fn embed_video(
    input: &Path,
    output: &Path,
    bits: &[u8],
    params: &WatermarkParams,
    opts: &PipelineOptions,
    sink: &dyn ProgressSink,
) -> Result<EmbedOutcome, VideoError> {
    params.validate()?;
    let meta = probe::probe(input)?;
    if !meta.has_video || meta.width == 0 || meta.height == 0 {
        return Err(VideoError::InvalidInput("no decodable video stream".to_string()));
    }

    let capacity = wm::block_capacity(meta.width as usize, meta.height as usize, params.carriers);
    let needed = bits.len() * params.redundancy;
    if capacity < needed {
        return Err(VideoError::Capacity(codec::CodecError::CapacityInsufficient {
            needed,
            available: capacity,
        }));
    }

    log::info!(
        target: "vidmark::video::pipeline",
        "embedding {} bits into {} ({}x{}, ~{} frames)",
        bits.len(),
        input.display(),
        meta.width,
        meta.height,
        meta.frame_count
    );

    let mut decoder = FrameDecoder::open(input, meta.width, meta.height)?;
    let codec_choice = OutputCodec::select(meta.codec_name.as_deref());
    let encoder = FrameEncoder::create(
        output,
        meta.width,
        meta.height,
        &meta.fps_rational,
        input,
        codec_choice,
    );
    let mut encoder = match encoder {
        Ok(enc) => enc,
        Err(e) => {
            remove_partial(output);
            return Err(e);
        }
    };

    let total = meta.frame_count.max(1);
    let mut buf = vec![0u8; decoder.frame_len()];
    let mut frames: u64 = 0;

    loop {
        if sink.cancelled() {
            drop(encoder);
            remove_partial(output);
            return Err(VideoError::Shutdown);
        }

        let more = match decoder.next_frame(&mut buf) {
            Ok(more) => more,
            Err(e) => {
                drop(encoder);
                remove_partial(output);
                return Err(e);
            }
        };
        if !more {
            break;
        }

        let step = (|| -> Result<(), VideoError> {
            wm::embed_frame(
                &mut buf,
                meta.width as usize,
                meta.height as usize,
                bits,
                params,
            )
            .map_err(|e| VideoError::FrameProcessingFailed {
                frame: frames,
                reason: e.to_string(),
            })?;
            encoder.write_frame(&buf)
        })();
        if let Err(e) = step {
            drop(encoder);
            remove_partial(output);
            return Err(e);
        }

        frames += 1;
        if frames % opts.progress_interval == 0 {
            // Hold the bar below 100 until the container is finalized;
            // the probed total may undercount, so cap before casting.
            let percent = (frames * 100 / total).min(99) as u8;
            sink.publish(frames, total, percent);
        }
    }

    if let Err(e) = encoder.finish() {
        remove_partial(output);
        return Err(e);
    }

    if frames == 0 {
        remove_partial(output);
        return Err(VideoError::DecoderError("input contained no frames".to_string()));
    }

    let output_size = fs::metadata(output).map(|m| m.len()).unwrap_or(0);
    sink.publish(frames, total, 100);

    log::info!(
        target: "vidmark::video::pipeline",
        "embedded {} frames into {} ({} bytes)",
        frames,
        output.display(),
        output_size
    );

    Ok(EmbedOutcome { frames, output_size })
}

/// Extract a payload from a bounded prefix of the input's frames.
///
/// Without the sentinel, `n_bits` must be the exact embedded stream
/// length (the tiled copies only align at that length). With
/// `params.use_sentinel` set, `n_bits` is an upper bound: the real
/// stream length is discovered first by a raw single-copy scan for the
/// sentinel, and voting proceeds at the discovered length. Votes
/// accumulate across frames; once every bit has enough votes and
/// agreement the scan stops early.
pub fn extract_video(
    input: &Path,
    n_bits: usize,
    params: &WatermarkParams,
    opts: &PipelineOptions,
    sink: &dyn ProgressSink,
) -> Result<Extraction, VideoError> {
    params.validate()?;
    if n_bits == 0 {
        return Ok(Extraction {
            text: String::new(),
            confidence: Confidence::Low,
            agreement: 0.0,
            frames_used: 0,
        });
    }

    let meta = probe::probe(input)?;
    if !meta.has_video || meta.width == 0 || meta.height == 0 {
        return Err(VideoError::InvalidInput("no decodable video stream".to_string()));
    }
    let (width, height) = (meta.width as usize, meta.height as usize);

    let mut decoder = FrameDecoder::open(input, meta.width, meta.height)?;
    let mut buf = vec![0u8; decoder.frame_len()];
    // Without the sentinel the caller-supplied length is authoritative;
    // with it, the board is sized once the length is discovered.
    let mut board: Option<VoteBoard> =
        if params.use_sentinel { None } else { Some(VoteBoard::new(n_bits)) };

    let scan_limit = opts.extract_frame_limit.min(meta.frame_count.max(1)).max(1);
    let mut frames: u64 = 0;

    while frames < opts.extract_frame_limit {
        if sink.cancelled() {
            return Err(VideoError::Shutdown);
        }
        if !decoder.next_frame(&mut buf)? {
            break;
        }
        frames += 1;

        if board.is_none() {
            match wm::scan_stream_length(&buf, width, height, params, n_bits) {
                Some(len) => board = Some(VoteBoard::new(len)),
                None => continue, // sentinel not visible in this frame
            }
        }
        let board = board.as_mut().expect("board sized above");
        wm::extract_frame(&buf, width, height, params, board);

        if frames % opts.progress_interval == 0 {
            let percent = (frames * 100 / scan_limit).min(99) as u8;
            sink.publish(frames, scan_limit, percent);
        }

        if board.is_confident(MIN_CONFIDENT_VOTES, MIN_CONFIDENT_AGREEMENT) {
            break;
        }
    }

    if frames == 0 {
        return Err(VideoError::DecoderError("input contained no frames".to_string()));
    }

    // A required sentinel that never surfaced is a failed extraction.
    let Some(board) = board else {
        sink.publish(frames, scan_limit, 100);
        return Ok(Extraction {
            text: String::new(),
            confidence: Confidence::Low,
            agreement: 0.0,
            frames_used: frames,
        });
    };

    let agreement = board.mean_agreement();
    let decoded = codec::bits::decode(&board.decide(), agreement, params.use_sentinel);
    sink.publish(frames, scan_limit, 100);

    log::info!(
        target: "vidmark::video::pipeline",
        "extracted {:?} confidence payload from {} frames of {}",
        decoded.confidence,
        frames,
        input.display()
    );

    Ok(Extraction {
        text: decoded.text,
        confidence: decoded.confidence,
        agreement,
        frames_used: frames,
    })
}

fn remove_partial(output: &Path) {
    if output.exists() {
        log::debug!(
            target: "vidmark::video::pipeline",
            "removing partial output {}",
            output.display()
        );
        let _ = fs::remove_file(output);
    }
}
