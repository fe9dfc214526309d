// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! Video I/O, validation, and the per-frame processing pipeline.
//!
//! Containers are read and written through external FFmpeg child
//! processes ([`io`]); metadata comes from ffprobe ([`probe`]).
//! Inputs pass a layered validator ([`validate`]) before any job is
//! accepted, and the embed/extract loops ([`pipeline`]) report through
//! an opaque progress sink. The [`estimate`] module predicts job cost
//! without gating anything.

pub mod error;
pub mod estimate;
pub mod io;
pub mod pipeline;
pub mod probe;
pub mod validate;

pub use error::VideoError;
pub use estimate::Estimate;
pub use pipeline::{
    EmbedOutcome, Extraction, NullSink, PipelineOptions, ProgressSink,
};
pub use probe::VideoMeta;
pub use validate::{Container, ValidationReport};
