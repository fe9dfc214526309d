// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! Frame-level watermarking.
//!
//! Applies the block engine across a frame's carrier planes in a fixed
//! visiting order: channel-major (Y, then Cr, then Cb when enabled),
//! then 8×8 blocks in raster order within each plane. Partial blocks
//! at the right and bottom edges are discarded. The payload bit stream
//! is tiled R times across the visited blocks — copy j of bit i lands
//! in block `j·N + i` — so each logical bit occupies R well-separated
//! carriers.

use serde::{Deserialize, Serialize};

use super::color::{bgr_to_ycrcb, ycrcb_to_bgr};
use super::dct::{self, BLOCK_AREA, BLOCK_SIZE, DEFAULT_COEFF_POS};
use super::error::CodecError;
use super::vote::VoteBoard;
use super::{DEFAULT_REDUNDANCY, DEFAULT_STRENGTH, MAX_STRENGTH, MIN_STRENGTH};

/// Which color planes carry payload bits.
///
/// A closed enumeration resolved at job creation; `Luma` is the
/// default, `LumaChroma` triples capacity at a visibility cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarrierSet {
    Luma,
    LumaChroma,
}

impl CarrierSet {
    pub fn plane_count(self) -> usize {
        match self {
            Self::Luma => 1,
            Self::LumaChroma => 3,
        }
    }
}

/// Embedding parameters, fixed for the lifetime of a job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WatermarkParams {
    /// Coefficient modification strength, in [0.05, 0.30].
    pub strength: f64,
    /// Carrier plane selection.
    pub carriers: CarrierSet,
    /// Number of blocks carrying each payload bit.
    pub redundancy: usize,
    /// Embedding site within the 8×8 DCT grid.
    pub coeff_pos: (usize, usize),
    /// Append the end-of-message sentinel when embedding.
    pub use_sentinel: bool,
}

impl Default for WatermarkParams {
    fn default() -> Self {
        Self {
            strength: DEFAULT_STRENGTH,
            carriers: CarrierSet::Luma,
            redundancy: DEFAULT_REDUNDANCY,
            coeff_pos: DEFAULT_COEFF_POS,
            use_sentinel: true,
        }
    }
}

impl WatermarkParams {
    /// Validate parameter ranges.
    ///
    /// # Errors
    /// - [`CodecError::InvalidStrength`] outside [0.05, 0.30].
    /// - [`CodecError::InvalidRedundancy`] when zero.
    /// - [`CodecError::InvalidCoefficientPos`] outside the grid or on DC.
    pub fn validate(&self) -> Result<(), CodecError> {
        if !(MIN_STRENGTH..=MAX_STRENGTH).contains(&self.strength) {
            return Err(CodecError::InvalidStrength(self.strength));
        }
        if self.redundancy == 0 {
            return Err(CodecError::InvalidRedundancy(self.redundancy));
        }
        let (r, c) = self.coeff_pos;
        if r >= BLOCK_SIZE || c >= BLOCK_SIZE || (r == 0 && c == 0) {
            return Err(CodecError::InvalidCoefficientPos(r, c));
        }
        Ok(())
    }
}

/// Number of whole 8×8 blocks available across the carrier planes of
/// one frame. Partial edge blocks do not count.
pub fn block_capacity(width: usize, height: usize, carriers: CarrierSet) -> usize {
    (width / BLOCK_SIZE) * (height / BLOCK_SIZE) * carriers.plane_count()
}

/// Embed a bit stream into one `bgr24` frame, in place.
///
/// An empty bit stream is a no-op. Fails before touching the frame if
/// the block capacity cannot hold `redundancy` copies of every bit.
pub fn embed_frame(
    bgr: &mut [u8],
    width: usize,
    height: usize,
    bits: &[u8],
    params: &WatermarkParams,
) -> Result<(), CodecError> {
    if bits.is_empty() {
        return Ok(());
    }

    let per_plane = (width / BLOCK_SIZE) * (height / BLOCK_SIZE);
    let capacity = per_plane * params.carriers.plane_count();
    let needed = bits.len() * params.redundancy;
    if capacity < needed {
        return Err(CodecError::CapacityInsufficient { needed, available: capacity });
    }

    let q = dct::quant_step(params.strength);
    let blocks_wide = width / BLOCK_SIZE;
    let mut planes = bgr_to_ycrcb(bgr, width, height);
    let mut block = [0.0f64; BLOCK_AREA]; // reused across blocks

    for i in 0..needed {
        let bit = bits[i % bits.len()];
        let plane = planes.plane_mut(i / per_plane);
        let within = i % per_plane;
        let br = within / blocks_wide;
        let bc = within % blocks_wide;

        load_block(plane, width, br, bc, &mut block);
        dct::embed_bit(&mut block, bit, params.coeff_pos, q);
        store_block(plane, width, br, bc, &block);
    }

    ycrcb_to_bgr(&planes, bgr);
    Ok(())
}

/// Extract one vote per visited block from a `bgr24` frame into the
/// board.
///
/// Visits blocks `0..min(capacity, R·N)` in the same order as
/// [`embed_frame`]; block `i` votes into accumulator `i mod N`. The
/// board persists across frames, so calling this over a frame sequence
/// unions the per-frame votes.
pub fn extract_frame(
    bgr: &[u8],
    width: usize,
    height: usize,
    params: &WatermarkParams,
    board: &mut VoteBoard,
) {
    let n = board.len();
    if n == 0 {
        return;
    }

    let per_plane = (width / BLOCK_SIZE) * (height / BLOCK_SIZE);
    let capacity = per_plane * params.carriers.plane_count();
    let limit = capacity.min(n * params.redundancy);

    let q = dct::quant_step(params.strength);
    let blocks_wide = width / BLOCK_SIZE;
    let planes = bgr_to_ycrcb(bgr, width, height);
    let mut block = [0.0f64; BLOCK_AREA];

    for i in 0..limit {
        let plane = planes.plane(i / per_plane);
        let within = i % per_plane;
        let br = within / blocks_wide;
        let bc = within % blocks_wide;

        load_block(plane, width, br, bc, &mut block);
        let bit = dct::extract_bit(&block, params.coeff_pos, q);
        board.push(i % n, bit);
    }
}

/// Recover the embedded stream length from the sentinel.
///
/// Reads one raw bit per block over `0..min(capacity, max_bits)` —
/// no voting, so this sees the first tiled copy contiguously — and
/// looks for the end-of-message sentinel at a byte-aligned offset.
/// Returns the full stream length (payload plus sentinel), which is
/// the `N` the tiled copies were laid out with.
pub fn scan_stream_length(
    bgr: &[u8],
    width: usize,
    height: usize,
    params: &WatermarkParams,
    max_bits: usize,
) -> Option<usize> {
    let per_plane = (width / BLOCK_SIZE) * (height / BLOCK_SIZE);
    let capacity = per_plane * params.carriers.plane_count();
    let limit = capacity.min(max_bits);
    if limit < super::bits::SENTINEL.len() {
        return None;
    }

    let q = dct::quant_step(params.strength);
    let blocks_wide = width / BLOCK_SIZE;
    let planes = bgr_to_ycrcb(bgr, width, height);
    let mut block = [0.0f64; BLOCK_AREA];

    let mut raw = Vec::with_capacity(limit);
    for i in 0..limit {
        let plane = planes.plane(i / per_plane);
        let within = i % per_plane;
        load_block(plane, width, within / blocks_wide, within % blocks_wide, &mut block);
        raw.push(dct::extract_bit(&block, params.coeff_pos, q));
    }

    super::bits::find_sentinel(&raw).map(|end| end + super::bits::SENTINEL.len())
}

fn load_block(
    plane: &[f64],
    frame_width: usize,
    br: usize,
    bc: usize,
    out: &mut [f64; BLOCK_AREA],
) {
    for y in 0..BLOCK_SIZE {
        let row = (br * BLOCK_SIZE + y) * frame_width + bc * BLOCK_SIZE;
        out[y * BLOCK_SIZE..(y + 1) * BLOCK_SIZE].copy_from_slice(&plane[row..row + BLOCK_SIZE]);
    }
}

fn store_block(
    plane: &mut [f64],
    frame_width: usize,
    br: usize,
    bc: usize,
    block: &[f64; BLOCK_AREA],
) {
    for y in 0..BLOCK_SIZE {
        let row = (br * BLOCK_SIZE + y) * frame_width + bc * BLOCK_SIZE;
        plane[row..row + BLOCK_SIZE].copy_from_slice(&block[y * BLOCK_SIZE..(y + 1) * BLOCK_SIZE]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::bits;

    /// Deterministic textured frame; arbitrary but reproducible.
    fn test_frame(width: usize, height: usize) -> Vec<u8> {
        let mut frame = vec![0u8; width * height * 3];
        for y in 0..height {
            for x in 0..width {
                let i = (y * width + x) * 3;
                frame[i] = ((x * 7 + y * 3) % 200 + 20) as u8;
                frame[i + 1] = ((x * 5 + y * 11) % 180 + 40) as u8;
                frame[i + 2] = ((x * 13 + y * 2) % 160 + 60) as u8;
            }
        }
        frame
    }

    fn roundtrip(frame: &mut Vec<u8>, w: usize, h: usize, text: &str, params: &WatermarkParams) -> Vec<u8> {
        let stream = bits::text_to_bits(text);
        embed_frame(frame, w, h, &stream, params).unwrap();
        let mut board = VoteBoard::new(stream.len());
        extract_frame(frame, w, h, params, &mut board);
        board.decide()
    }

    #[test]
    fn capacity_counts_whole_blocks_only() {
        assert_eq!(block_capacity(128, 128, CarrierSet::Luma), 256);
        assert_eq!(block_capacity(128, 128, CarrierSet::LumaChroma), 768);
        // 130×70: partial right/bottom blocks discarded.
        assert_eq!(block_capacity(130, 70, CarrierSet::Luma), 16 * 8);
    }

    #[test]
    fn single_frame_roundtrip() {
        let (w, h) = (128, 128);
        let mut frame = test_frame(w, h);
        let params = WatermarkParams::default();
        let decided = roundtrip(&mut frame, w, h, "Hi", &params);
        assert_eq!(decided, bits::text_to_bits("Hi"));
    }

    #[test]
    fn multi_channel_roundtrip() {
        let (w, h) = (128, 96);
        let mut frame = test_frame(w, h);
        let params = WatermarkParams {
            carriers: CarrierSet::LumaChroma,
            ..WatermarkParams::default()
        };
        let decided = roundtrip(&mut frame, w, h, "abcdefgh", &params);
        assert_eq!(decided, bits::text_to_bits("abcdefgh"));
    }

    #[test]
    fn odd_dimensions_roundtrip() {
        // 133×71 leaves 5- and 7-pixel fringes that must be ignored.
        let (w, h) = (133, 71);
        let mut frame = test_frame(w, h);
        let params = WatermarkParams::default();
        let decided = roundtrip(&mut frame, w, h, "ok", &params);
        assert_eq!(decided, bits::text_to_bits("ok"));
    }

    #[test]
    fn empty_payload_is_noop() {
        let (w, h) = (64, 64);
        let mut frame = test_frame(w, h);
        let original = frame.clone();
        embed_frame(&mut frame, w, h, &[], &WatermarkParams::default()).unwrap();
        assert_eq!(frame, original);
    }

    #[test]
    fn over_capacity_rejected_without_touching_frame() {
        let (w, h) = (64, 64); // 64 luma blocks
        let mut frame = test_frame(w, h);
        let original = frame.clone();
        let stream = bits::text_to_bits("way too long for this frame"); // 27*8*3 > 64
        let err = embed_frame(&mut frame, w, h, &stream, &WatermarkParams::default()).unwrap_err();
        match err {
            CodecError::CapacityInsufficient { needed, available } => {
                assert_eq!(needed, stream.len() * 3);
                assert_eq!(available, 64);
            }
            other => panic!("expected CapacityInsufficient, got {other:?}"),
        }
        assert_eq!(frame, original, "failed embed must leave the frame untouched");
    }

    #[test]
    fn payload_at_capacity_limit_fits() {
        let (w, h) = (128, 128); // 256 luma blocks
        let mut frame = test_frame(w, h);
        // 256 / 3 = 85 blocks per copy → 10 bytes = 80 bits fits.
        let params = WatermarkParams { use_sentinel: false, ..WatermarkParams::default() };
        let decided = roundtrip(&mut frame, w, h, "0123456789", &params);
        assert_eq!(decided, bits::text_to_bits("0123456789"));
    }

    #[test]
    fn double_embed_same_payload_is_idempotent() {
        let (w, h) = (128, 128);
        let mut frame = test_frame(w, h);
        let params = WatermarkParams::default();
        let stream = bits::text_to_bits("Hi");
        embed_frame(&mut frame, w, h, &stream, &params).unwrap();
        let mut again = frame.clone();
        embed_frame(&mut again, w, h, &stream, &params).unwrap();

        let mut first = VoteBoard::new(stream.len());
        extract_frame(&frame, w, h, &params, &mut first);
        let mut second = VoteBoard::new(stream.len());
        extract_frame(&again, w, h, &params, &mut second);
        assert_eq!(first.decide(), second.decide());
        assert_eq!(second.decide(), stream);
    }

    #[test]
    fn votes_accumulate_across_frames() {
        let (w, h) = (128, 128);
        let params = WatermarkParams::default();
        let stream = bits::text_to_bits("Hi");
        let mut board = VoteBoard::new(stream.len());
        for seed in 0..3usize {
            let mut frame = test_frame(w, h);
            frame.rotate_left(seed * 3); // vary content between frames
            embed_frame(&mut frame, w, h, &stream, &params).unwrap();
            extract_frame(&frame, w, h, &params, &mut board);
        }
        // 3 copies per frame × 3 frames = 9 votes per bit.
        assert!(board.is_confident(9, 0.9));
        assert_eq!(board.decide(), stream);
    }

    #[test]
    fn stream_length_recovered_from_sentinel() {
        let (w, h) = (256, 256);
        let mut frame = test_frame(w, h);
        let params = WatermarkParams::default();
        let mut stream = bits::text_to_bits("short");
        bits::append_sentinel(&mut stream);
        embed_frame(&mut frame, w, h, &stream, &params).unwrap();

        // Caller only knows an upper bound on the stream length.
        let found = scan_stream_length(&frame, w, h, &params, 50 * 8 + 16);
        assert_eq!(found, Some(stream.len()));

        // A flat frame extracts zero parity everywhere: no sentinel.
        let flat = vec![128u8; w * h * 3];
        assert_eq!(scan_stream_length(&flat, w, h, &params, 50 * 8 + 16), None);
    }

    #[test]
    fn params_validation() {
        assert!(WatermarkParams::default().validate().is_ok());
        let bad = WatermarkParams { strength: 0.4, ..WatermarkParams::default() };
        assert!(matches!(bad.validate(), Err(CodecError::InvalidStrength(_))));
        let bad = WatermarkParams { strength: 0.01, ..WatermarkParams::default() };
        assert!(matches!(bad.validate(), Err(CodecError::InvalidStrength(_))));
        let bad = WatermarkParams { redundancy: 0, ..WatermarkParams::default() };
        assert!(matches!(bad.validate(), Err(CodecError::InvalidRedundancy(0))));
        let bad = WatermarkParams { coeff_pos: (0, 0), ..WatermarkParams::default() };
        assert!(matches!(bad.validate(), Err(CodecError::InvalidCoefficientPos(0, 0))));
        let bad = WatermarkParams { coeff_pos: (8, 3), ..WatermarkParams::default() };
        assert!(matches!(bad.validate(), Err(CodecError::InvalidCoefficientPos(8, 3))));
    }
}
