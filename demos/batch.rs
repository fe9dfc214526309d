// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! Example: watermark several videos concurrently through the engine,
//! watching live progress for each job.
use std::path::Path;
use std::thread;

use vidmark_core::{Engine, EngineConfig, WatermarkOptions};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: batch <text> <input.mp4> [more inputs...]");
        std::process::exit(1);
    }

    let engine = Engine::new(EngineConfig::default()).expect("engine init failed");
    let payload = &args[1];

    let mut watchers = Vec::new();
    for input in &args[2..] {
        let id = match engine.submit_embed(
            Path::new(input),
            payload,
            0.1,
            &WatermarkOptions::default(),
        ) {
            Ok(id) => id,
            Err(e) => {
                eprintln!("{input}: rejected ({e})");
                continue;
            }
        };
        println!("{input}: queued as {id}");

        let sub = engine.subscribe(&id).expect("job just submitted");
        let name = input.clone();
        watchers.push(thread::spawn(move || {
            while let Some(event) = sub.recv() {
                println!("{name}: {:?} {}% {}", event.status, event.progress, event.message);
            }
        }));
    }

    for watcher in watchers {
        let _ = watcher.join();
    }
    engine.shutdown();
}
