// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! Engine configuration.
//!
//! Defaults mirror the reference deployment: up to four workers, a
//! 100-job queue, 500 MB uploads, 50-byte payloads, and a progress
//! event every ten frames.

use std::path::PathBuf;

use crate::codec::MAX_PAYLOAD_LEN;

/// Configuration for [`Engine`](crate::jobs::Engine) construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker pool size. Compute-bound; should not exceed physical cores.
    pub workers: usize,
    /// Maximum number of queued (not yet started) jobs.
    pub queue_capacity: usize,
    /// Directory for in-flight outputs.
    pub work_dir: PathBuf,
    /// Directory finished outputs are moved into.
    pub output_dir: PathBuf,
    /// Maximum accepted input size in bytes.
    pub max_file_size: u64,
    /// Maximum payload length in bytes.
    pub max_payload_len: usize,
    /// Publish a progress event every this many frames.
    pub progress_interval: u64,
    /// Upper bound on the frame prefix scanned during extraction.
    pub extract_frame_limit: u64,
    /// Run the layered validator before accepting a submission. The
    /// adapter may disable this when it has already validated the
    /// upload itself.
    pub validate_on_submit: bool,
}

/// Number of cores available, capped at 4: watermarking saturates a
/// core per job and more workers only add contention.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(4)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: 100,
            work_dir: PathBuf::from("work"),
            output_dir: PathBuf::from("processed"),
            max_file_size: 500 * 1024 * 1024,
            max_payload_len: MAX_PAYLOAD_LEN,
            progress_interval: 10,
            extract_frame_limit: 90,
            validate_on_submit: true,
        }
    }
}

impl EngineConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_dirs(mut self, work_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn with_validate_on_submit(mut self, validate: bool) -> Self {
        self.validate_on_submit = validate;
        self
    }
}
