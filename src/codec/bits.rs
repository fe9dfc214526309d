// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! Payload bit codec.
//!
//! The embedded form of a payload is its UTF-8 bytes expanded to bits,
//! most significant bit first, optionally followed by a 16-bit
//! end-of-message sentinel:
//!
//! ```text
//! [8 bits]*   payload bytes, MSB first
//! [16 bits]   1111111111111110   (optional sentinel)
//! ```
//!
//! Decoding reverses the expansion, replaces invalid UTF-8 bytes with
//! U+FFFD, and grades the recovery with a qualitative confidence
//! derived from per-bit agreement among redundant copies.

use serde::{Deserialize, Serialize};

/// End-of-message sentinel: fifteen ones followed by a zero. The
/// pattern cannot occur inside UTF-8 text at a byte boundary (0xFF is
/// never a valid UTF-8 byte).
pub const SENTINEL: [u8; 16] = [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0];

/// Qualitative recovery confidence, derived from mean per-bit
/// agreement among redundant copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Grade a mean agreement ratio: `high` ≥ 0.9, `medium` ≥ 0.7,
    /// `low` otherwise.
    pub fn from_agreement(agreement: f64) -> Self {
        if agreement >= 0.9 {
            Self::High
        } else if agreement >= 0.7 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// A decoded payload with its confidence grade.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub text: String,
    pub confidence: Confidence,
}

impl Decoded {
    fn empty() -> Self {
        Self { text: String::new(), confidence: Confidence::Low }
    }
}

/// Expand a payload to its bit-serial form, MSB first.
pub fn text_to_bits(text: &str) -> Vec<u8> {
    let mut bits = Vec::with_capacity(text.len() * 8);
    for &byte in text.as_bytes() {
        for shift in (0..8).rev() {
            bits.push((byte >> shift) & 1);
        }
    }
    bits
}

/// Append the end-of-message sentinel.
pub fn append_sentinel(bits: &mut Vec<u8>) {
    bits.extend_from_slice(&SENTINEL);
}

/// Pack bits (MSB first) back into bytes. A trailing partial group is
/// discarded.
pub fn bits_to_bytes(bits: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(bits.len() / 8);
    for group in bits.chunks_exact(8) {
        let mut byte = 0u8;
        for &bit in group {
            byte = (byte << 1) | (bit & 1);
        }
        bytes.push(byte);
    }
    bytes
}

/// Find the sentinel at a byte-aligned offset. Returns the bit length
/// of the payload preceding it.
pub fn find_sentinel(bits: &[u8]) -> Option<usize> {
    let mut offset = 0;
    while offset + SENTINEL.len() <= bits.len() {
        if bits[offset..offset + SENTINEL.len()] == SENTINEL {
            return Some(offset);
        }
        offset += 8;
    }
    None
}

/// Decode a recovered bit stream into text.
///
/// `agreement` is the mean per-bit agreement ratio from the vote
/// accumulators and drives the confidence grade. `require_sentinel`
/// makes a missing sentinel a failure (empty text, `low`); when the
/// sentinel is found the payload is truncated at it either way.
///
/// A recovery whose decoded code points are mostly non-printable is
/// treated as a failed extraction and returns empty text with `low`
/// confidence.
pub fn decode(bits: &[u8], agreement: f64, require_sentinel: bool) -> Decoded {
    let payload_bits = match find_sentinel(bits) {
        Some(end) => &bits[..end],
        None if require_sentinel => return Decoded::empty(),
        None => bits,
    };

    if payload_bits.is_empty() {
        return Decoded::empty();
    }

    let bytes = bits_to_bytes(payload_bits);
    let text = String::from_utf8_lossy(&bytes).into_owned();

    if !mostly_printable(&text) {
        return Decoded::empty();
    }

    Decoded { text, confidence: Confidence::from_agreement(agreement) }
}

/// True when at least half of the code points are printable (not a
/// control character). Garbage recoveries decode to dense control
/// sequences and replacement characters.
fn mostly_printable(text: &str) -> bool {
    let total = text.chars().count();
    if total == 0 {
        return false;
    }
    let printable = text.chars().filter(|c| !c.is_control()).count();
    printable * 2 > total
}
