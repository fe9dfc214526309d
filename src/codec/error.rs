// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! Error types for the watermark codec.
//!
//! [`CodecError`] covers parameter validation and per-frame embedding
//! failures. Video-level and job-level failures wrap these upward.

use core::fmt;

/// Errors that can occur while embedding or extracting a watermark
/// at the frame level.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// The frame does not have enough 8×8 blocks to carry the payload
    /// at the requested redundancy.
    CapacityInsufficient { needed: usize, available: usize },
    /// The payload exceeds the configured maximum length.
    PayloadTooLarge { len: usize, max: usize },
    /// Strength outside the accepted range [0.05, 0.30].
    InvalidStrength(f64),
    /// Redundancy factor must be at least 1.
    InvalidRedundancy(usize),
    /// The coefficient position lies outside the 8×8 DCT grid, or on
    /// the DC coefficient which cannot carry a bit.
    InvalidCoefficientPos(usize, usize),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityInsufficient { needed, available } => write!(
                f,
                "capacity insufficient: need {needed} blocks, frame provides {available}"
            ),
            Self::PayloadTooLarge { len, max } => {
                write!(f, "payload too large: {len} bytes (max {max})")
            }
            Self::InvalidStrength(s) => write!(f, "strength {s} outside [0.05, 0.30]"),
            Self::InvalidRedundancy(r) => write!(f, "redundancy {r} must be >= 1"),
            Self::InvalidCoefficientPos(r, c) => {
                write!(f, "coefficient position ({r}, {c}) not usable for embedding")
            }
        }
    }
}

impl std::error::Error for CodecError {}
