// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! Error types for the video pipeline.

use core::fmt;

use crate::codec::CodecError;

/// Errors surfaced by probing, validation, and the frame pipeline.
#[derive(Debug)]
pub enum VideoError {
    /// Filesystem-level failure on the input or output path.
    Io(std::io::Error),
    /// The input failed validation before any processing started.
    InvalidInput(String),
    /// ffprobe failed or produced unusable metadata.
    ProbeFailed(String),
    /// Unrecoverable read from the input container.
    DecoderError(String),
    /// The output writer failed or exited with an error.
    EncoderError(String),
    /// Embedding or re-encoding failed on a specific frame.
    FrameProcessingFailed { frame: u64, reason: String },
    /// The frame cannot carry the payload at the requested redundancy.
    Capacity(CodecError),
    /// The worker was interrupted by engine shutdown.
    Shutdown,
    /// Unexpected invariant violation.
    Internal(String),
}

impl fmt::Display for VideoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "i/o error: {e}"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::ProbeFailed(msg) => write!(f, "probe failed: {msg}"),
            Self::DecoderError(msg) => write!(f, "decoder error: {msg}"),
            Self::EncoderError(msg) => write!(f, "encoder error: {msg}"),
            Self::FrameProcessingFailed { frame, reason } => {
                write!(f, "frame {frame} processing failed: {reason}")
            }
            Self::Capacity(e) => write!(f, "{e}"),
            Self::Shutdown => write!(f, "aborted by shutdown"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for VideoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Capacity(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for VideoError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<CodecError> for VideoError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::CapacityInsufficient { .. } => Self::Capacity(e),
            other => Self::InvalidInput(other.to_string()),
        }
    }
}
