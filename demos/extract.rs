// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! Example: recover a payload from a watermarked video.
use std::path::Path;

use vidmark_core::video::{pipeline, NullSink, PipelineOptions};
use vidmark_core::{codec, WatermarkParams};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: extract <input.mp4> [max_payload_len]");
        std::process::exit(1);
    }

    let max_len: usize = args
        .get(2)
        .map(|s| s.parse().expect("bad length"))
        .unwrap_or(codec::MAX_PAYLOAD_LEN);
    let params = WatermarkParams::default();
    let n_bits = max_len * 8 + 16; // sentinel-terminated stream

    match pipeline::extract_video(
        Path::new(&args[1]),
        n_bits,
        &params,
        &PipelineOptions::default(),
        &NullSink,
    ) {
        Ok(extraction) => {
            println!("Payload:    {:?}", extraction.text);
            println!("Confidence: {:?}", extraction.confidence);
            println!(
                "Agreement:  {:.1}% over {} frames",
                extraction.agreement * 100.0,
                extraction.frames_used
            );
        }
        Err(e) => {
            eprintln!("Extract failed: {e}");
            std::process::exit(1);
        }
    }
}
