// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! # vidmark-core
//!
//! DCT-based video watermarking engine. Embeds a short text payload
//! into the frequency domain of a video's luminance (optionally also
//! chrominance) samples so that it survives lossy re-encoding while
//! staying perceptually invisible, and recovers it later by majority
//! vote over redundant copies.
//!
//! Three layers:
//!
//! - [`codec`] — the pure frame-level algorithm: bit framing, 8×8
//!   block DCT with parity quantization, redundant placement, vote
//!   aggregation. No I/O.
//! - [`video`] — container handling over external FFmpeg: probing,
//!   layered validation, the per-frame embed/extract pipelines, and
//!   an advisory time estimator.
//! - [`jobs`] — the batch surface: a bounded FIFO queue, a fixed
//!   worker pool, live progress streaming, and a write-through
//!   registry contract, all owned by one [`Engine`](jobs::Engine).
//!
//! # Quick start
//!
//! ```rust,no_run
//! use vidmark_core::{Engine, EngineConfig, WatermarkOptions};
//!
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//! let job = engine
//!     .submit_embed(
//!         "clip.mp4".as_ref(),
//!         "Copyright 2026",
//!         0.1,
//!         &WatermarkOptions::default(),
//!     )
//!     .unwrap();
//!
//! let sub = engine.subscribe(&job).unwrap();
//! while let Some(event) = sub.recv() {
//!     println!("{}% {}", event.progress, event.message);
//! }
//! engine.shutdown();
//! ```
//!
//! Frame-level use without the engine:
//!
//! ```rust
//! use vidmark_core::codec::{self, frame, vote::VoteBoard, WatermarkParams};
//!
//! let params = WatermarkParams::default();
//! let bits = codec::payload_bits("Hi", &params);
//! let (w, h) = (128, 128);
//! let mut frame_buf = vec![128u8; w * h * 3];
//! frame::embed_frame(&mut frame_buf, w, h, &bits, &params).unwrap();
//!
//! let mut board = VoteBoard::new(bits.len());
//! frame::extract_frame(&frame_buf, w, h, &params, &mut board);
//! assert_eq!(board.decide(), bits);
//! ```

pub mod codec;
pub mod config;
pub mod jobs;
pub mod video;

pub use codec::{CarrierSet, CodecError, Confidence, WatermarkParams};
pub use config::EngineConfig;
pub use jobs::{
    CancelError, Engine, JobId, JobKind, JobResult, JobSnapshot, JobStatus, ProgressEvent,
    SubmitError, Subscription, WatermarkOptions,
};
pub use video::{Estimate, ValidationReport, VideoError};
