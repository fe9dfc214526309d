// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! 8×8 block DCT engine and parity-quantization bit carrier.
//!
//! Provides the separable orthonormal 2-D DCT-II / DCT-III pair used on
//! level-shifted pixel samples, plus the single-bit embed/extract
//! primitive: a chosen mid-frequency coefficient is snapped to the
//! nearest multiple of a quantization step whose parity encodes the
//! bit. The embedded parity survives any additive coefficient noise of
//! magnitude below half the step.

use std::sync::OnceLock;

/// Side length of one carrier block.
pub const BLOCK_SIZE: usize = 8;

/// Samples per block.
pub const BLOCK_AREA: usize = BLOCK_SIZE * BLOCK_SIZE;

/// Default embedding site: mid-frequency, away from both the DC corner
/// and the highest-frequency corner.
pub const DEFAULT_COEFF_POS: (usize, usize) = (4, 3);

/// Pre-computed 8×8 cosine table.
/// `COSINE[u][x] = cos((2*x + 1) * u * PI / 16)`
static COSINE: OnceLock<[[f64; 8]; 8]> = OnceLock::new();

/// Normalization constants: C(0) = 1/sqrt(8), C(u>0) = 1/2.
static NORM: OnceLock<[f64; 8]> = OnceLock::new();

fn cosine_table() -> &'static [[f64; 8]; 8] {
    COSINE.get_or_init(|| {
        let mut table = [[0.0f64; 8]; 8];
        for u in 0..8 {
            for x in 0..8 {
                table[u][x] =
                    ((2 * x + 1) as f64 * u as f64 * std::f64::consts::PI / 16.0).cos();
            }
        }
        table
    })
}

fn norm_table() -> &'static [f64; 8] {
    NORM.get_or_init(|| {
        let mut n = [0.5f64; 8];
        n[0] = 1.0 / (8.0f64).sqrt();
        n
    })
}

/// Quantization step for a given embedding strength.
///
/// `q = round(max(10, 25·s))`. Monotone in `s`, floored at 10 so that
/// even the weakest setting survives mild recompression noise.
pub fn quant_step(strength: f64) -> f64 {
    (25.0 * strength).max(10.0).round()
}

/// Forward 8×8 DCT-II of pixel samples (expected ~0–255).
///
/// Applies the −128 level shift, then the separable orthonormal
/// transform: rows first, then columns.
pub fn forward(samples: &[f64; BLOCK_AREA]) -> [f64; BLOCK_AREA] {
    let cos = cosine_table();
    let c = norm_table();

    let mut shifted = [0.0f64; BLOCK_AREA];
    for i in 0..BLOCK_AREA {
        shifted[i] = samples[i] - 128.0;
    }

    // Rows.
    let mut temp = [0.0f64; BLOCK_AREA];
    for row in 0..8 {
        for u in 0..8 {
            let mut sum = 0.0;
            for x in 0..8 {
                sum += shifted[row * 8 + x] * cos[u][x];
            }
            temp[row * 8 + u] = c[u] * sum;
        }
    }

    // Columns.
    let mut coeffs = [0.0f64; BLOCK_AREA];
    for col in 0..8 {
        for v in 0..8 {
            let mut sum = 0.0;
            for y in 0..8 {
                sum += temp[y * 8 + col] * cos[v][y];
            }
            coeffs[v * 8 + col] = c[v] * sum;
        }
    }

    coeffs
}

/// Inverse 8×8 DCT (DCT-III) back to pixel samples.
///
/// Columns first, then rows, then the +128 level shift. The caller
/// clamps and rounds when writing back into integer planes.
pub fn inverse(coeffs: &[f64; BLOCK_AREA]) -> [f64; BLOCK_AREA] {
    let cos = cosine_table();
    let c = norm_table();

    // Columns.
    let mut temp = [0.0f64; BLOCK_AREA];
    for col in 0..8 {
        for y in 0..8 {
            let mut sum = 0.0;
            for v in 0..8 {
                sum += c[v] * coeffs[v * 8 + col] * cos[v][y];
            }
            temp[y * 8 + col] = sum;
        }
    }

    // Rows.
    let mut samples = [0.0f64; BLOCK_AREA];
    for row in 0..8 {
        for x in 0..8 {
            let mut sum = 0.0;
            for u in 0..8 {
                sum += c[u] * temp[row * 8 + u] * cos[u][x];
            }
            samples[row * 8 + x] = sum + 128.0;
        }
    }

    samples
}

/// Embed one bit into a block of pixel samples, in place.
///
/// Forward transform, snap the coefficient at `pos` to `k·q` where the
/// parity of `k` encodes the bit (odd = 1, even = 0), inverse
/// transform. When the parity must be forced, `k` moves by ±1 toward
/// the original coefficient value to minimize distortion; exact ties
/// go up.
pub fn embed_bit(samples: &mut [f64; BLOCK_AREA], bit: u8, pos: (usize, usize), q: f64) {
    debug_assert!(bit <= 1);
    debug_assert!(pos.0 < 8 && pos.1 < 8);

    let mut coeffs = forward(samples);
    let idx = pos.0 * 8 + pos.1;
    let original = coeffs[idx];

    let mut k = (original / q).round() as i64;
    if (k.rem_euclid(2) as u8) != bit {
        // k·q sits on the wrong lattice; step toward the original value.
        let quantized = k as f64 * q;
        if original > quantized {
            k += 1;
        } else if original < quantized {
            k -= 1;
        } else {
            k += 1; // tie
        }
    }
    coeffs[idx] = k as f64 * q;

    *samples = inverse(&coeffs);
}

/// Extract one bit from a block of pixel samples.
///
/// `k = round(Y[pos] / q)`; the bit is `k mod 2`.
pub fn extract_bit(samples: &[f64; BLOCK_AREA], pos: (usize, usize), q: f64) -> u8 {
    debug_assert!(pos.0 < 8 && pos.1 < 8);
    let coeffs = forward(samples);
    let k = (coeffs[pos.0 * 8 + pos.1] / q).round() as i64;
    k.rem_euclid(2) as u8
}
