// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! Example: embed a text payload into a video file.
use std::path::Path;

use vidmark_core::video::{pipeline, NullSink, PipelineOptions};
use vidmark_core::{codec, WatermarkParams};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: embed <input.mp4> <output.mp4> <text> [strength]");
        std::process::exit(1);
    }

    let strength: f64 = args.get(4).map(|s| s.parse().expect("bad strength")).unwrap_or(0.1);
    let params = WatermarkParams { strength, ..WatermarkParams::default() };
    let bits = codec::payload_bits(&args[3], &params);

    match pipeline::embed_video(
        Path::new(&args[1]),
        Path::new(&args[2]),
        &bits,
        &params,
        &PipelineOptions::default(),
        &NullSink,
    ) {
        Ok(outcome) => {
            println!("Embedded {} bits into {} frames", bits.len(), outcome.frames);
            println!("Output: {} ({} bytes)", args[2], outcome.output_size);
        }
        Err(e) => {
            eprintln!("Embed failed: {e}");
            std::process::exit(1);
        }
    }
}
