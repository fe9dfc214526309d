// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! BGR ↔ YCrCb conversion for carrier-plane decomposition.
//!
//! Full-range BT.601 with the constants OpenCV uses for `COLOR_BGR2YCrCb`,
//! so frames round-trip against material produced by the reference
//! tooling. Planes are kept in `f64` between decomposition and
//! reassembly; quantization to `u8` happens exactly once, on the way
//! back to the interleaved frame.

/// One frame decomposed into full-resolution luma/chroma planes.
///
/// Plane order matches the carrier walk: Y, then Cr, then Cb.
#[derive(Debug, Clone)]
pub struct YCrCbPlanes {
    pub width: usize,
    pub height: usize,
    pub y: Vec<f64>,
    pub cr: Vec<f64>,
    pub cb: Vec<f64>,
}

impl YCrCbPlanes {
    /// Borrow the plane at `index` (0 = Y, 1 = Cr, 2 = Cb).
    pub fn plane(&self, index: usize) -> &[f64] {
        match index {
            0 => &self.y,
            1 => &self.cr,
            2 => &self.cb,
            _ => panic!("plane index {index} out of range"),
        }
    }

    /// Mutably borrow the plane at `index` (0 = Y, 1 = Cr, 2 = Cb).
    pub fn plane_mut(&mut self, index: usize) -> &mut [f64] {
        match index {
            0 => &mut self.y,
            1 => &mut self.cr,
            2 => &mut self.cb,
            _ => panic!("plane index {index} out of range"),
        }
    }
}

/// Decompose an interleaved `bgr24` frame into YCrCb planes.
///
/// `bgr.len()` must be exactly `width * height * 3`.
pub fn bgr_to_ycrcb(bgr: &[u8], width: usize, height: usize) -> YCrCbPlanes {
    assert_eq!(bgr.len(), width * height * 3, "frame buffer size mismatch");

    let n = width * height;
    let mut y = vec![0.0f64; n];
    let mut cr = vec![0.0f64; n];
    let mut cb = vec![0.0f64; n];

    for i in 0..n {
        let b = bgr[i * 3] as f64;
        let g = bgr[i * 3 + 1] as f64;
        let r = bgr[i * 3 + 2] as f64;

        let luma = 0.299 * r + 0.587 * g + 0.114 * b;
        y[i] = luma;
        cr[i] = (r - luma) * 0.713 + 128.0;
        cb[i] = (b - luma) * 0.564 + 128.0;
    }

    YCrCbPlanes { width, height, y, cr, cb }
}

/// Reassemble YCrCb planes into an interleaved `bgr24` frame.
///
/// `out.len()` must be exactly `width * height * 3`. Each channel is
/// clamped to [0, 255] and rounded once.
pub fn ycrcb_to_bgr(planes: &YCrCbPlanes, out: &mut [u8]) {
    let n = planes.width * planes.height;
    assert_eq!(out.len(), n * 3, "frame buffer size mismatch");

    for i in 0..n {
        let y = planes.y[i];
        let cr = planes.cr[i] - 128.0;
        let cb = planes.cb[i] - 128.0;

        let r = y + 1.403 * cr;
        let g = y - 0.714 * cr - 0.344 * cb;
        let b = y + 1.773 * cb;

        out[i * 3] = b.clamp(0.0, 255.0).round() as u8;
        out[i * 3 + 1] = g.clamp(0.0, 255.0).round() as u8;
        out[i * 3 + 2] = r.clamp(0.0, 255.0).round() as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(bgr: &[u8], w: usize, h: usize) -> Vec<u8> {
        let planes = bgr_to_ycrcb(bgr, w, h);
        let mut out = vec![0u8; bgr.len()];
        ycrcb_to_bgr(&planes, &mut out);
        out
    }

    #[test]
    fn primaries_roundtrip_within_one_lsb() {
        let frame: Vec<u8> = vec![
            0, 0, 0, // black
            255, 255, 255, // white
            255, 0, 0, // blue
            0, 255, 0, // green
            0, 0, 255, // red
            128, 128, 128, // gray
        ];
        let out = roundtrip(&frame, 6, 1);
        for (i, (&a, &b)) in frame.iter().zip(out.iter()).enumerate() {
            let diff = (a as i16 - b as i16).abs();
            assert!(diff <= 1, "channel {i}: {a} -> {b} (diff {diff})");
        }
    }

    #[test]
    fn gray_maps_to_neutral_chroma() {
        let frame = vec![77u8, 77, 77];
        let planes = bgr_to_ycrcb(&frame, 1, 1);
        assert!((planes.y[0] - 77.0).abs() < 1e-9);
        assert!((planes.cr[0] - 128.0).abs() < 1e-9);
        assert!((planes.cb[0] - 128.0).abs() < 1e-9);
    }

    #[test]
    fn plane_accessors_cover_carrier_order() {
        let frame = vec![10u8, 20, 30];
        let mut planes = bgr_to_ycrcb(&frame, 1, 1);
        assert_eq!(planes.plane(0).len(), 1);
        planes.plane_mut(1)[0] = 99.0;
        assert_eq!(planes.cr[0], 99.0);
        planes.plane_mut(2)[0] = 42.0;
        assert_eq!(planes.cb[0], 42.0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn plane_index_out_of_range_panics() {
        let planes = bgr_to_ycrcb(&[0, 0, 0], 1, 1);
        let _ = planes.plane(3);
    }
}
