// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! The DCT watermarking codec.
//!
//! Pure frame-level embed/extract, no I/O:
//!
//! 1. The payload text expands to a bit stream ([`bits`]), optionally
//!    terminated by an end-of-message sentinel.
//! 2. Each bit is carried by the parity of one quantized mid-frequency
//!    DCT coefficient in an 8×8 luminance (or chrominance) block
//!    ([`dct`]).
//! 3. The stream is tiled `R` times over the frame's blocks in a fixed
//!    raster order ([`frame`]); extraction merges the redundant copies
//!    by majority vote ([`vote`]), optionally across many frames.
//!
//! The scheme is invariant under additive coefficient noise below half
//! the quantization step, which is what buys survival through lossy
//! re-encoding.

pub mod bits;
pub mod color;
pub mod dct;
pub mod error;
pub mod frame;
pub mod vote;

pub use bits::{Confidence, Decoded};
pub use error::CodecError;
pub use frame::{CarrierSet, WatermarkParams};
pub use vote::VoteBoard;

/// Weakest accepted embedding strength.
pub const MIN_STRENGTH: f64 = 0.05;

/// Strongest accepted embedding strength.
pub const MAX_STRENGTH: f64 = 0.30;

/// Default embedding strength: perceptually invisible on natural
/// frames, yet above the quantization floor's survival margin.
pub const DEFAULT_STRENGTH: f64 = 0.1;

/// Default number of blocks carrying each payload bit.
pub const DEFAULT_REDUNDANCY: usize = 3;

/// Default maximum payload length in bytes.
pub const MAX_PAYLOAD_LEN: usize = 50;

/// Votes per bit required before multi-frame extraction may stop early.
pub const MIN_CONFIDENT_VOTES: u32 = 9;

/// Mean agreement required before multi-frame extraction may stop early.
pub const MIN_CONFIDENT_AGREEMENT: f64 = 0.9;

/// Build the embedded bit stream for a payload: UTF-8 bytes MSB-first,
/// plus the sentinel when `params.use_sentinel` is set.
pub fn payload_bits(text: &str, params: &WatermarkParams) -> Vec<u8> {
    let mut stream = bits::text_to_bits(text);
    if params.use_sentinel && !stream.is_empty() {
        bits::append_sentinel(&mut stream);
    }
    stream
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_bits_appends_sentinel_when_enabled() {
        let params = WatermarkParams::default();
        let stream = payload_bits("Hi", &params);
        assert_eq!(stream.len(), 16 + 16);
        assert_eq!(&stream[16..], &bits::SENTINEL);
    }

    #[test]
    fn payload_bits_plain_when_disabled() {
        let params = WatermarkParams { use_sentinel: false, ..WatermarkParams::default() };
        assert_eq!(payload_bits("Hi", &params).len(), 16);
    }

    #[test]
    fn empty_payload_never_gets_sentinel() {
        let params = WatermarkParams::default();
        assert!(payload_bits("", &params).is_empty());
    }
}
