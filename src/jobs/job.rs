// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! The per-video job record and its lifecycle.
//!
//! Status moves along a single path with no reversals and no skips:
//!
//! ```text
//! queued ──▶ processing ──▶ completed
//!                 └───────▶ error
//! ```
//!
//! Once a worker owns a job, that worker is the only mutator until the
//! terminal transition. Progress is non-decreasing while processing.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::codec::Confidence;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Opaque job identifier: 32 hex characters of process-local entropy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        let raw: u128 = rand::thread_rng().gen();
        Self(format!("{raw:032x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What kind of work the job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Embed,
    Extract,
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Terminal payload of a successful job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum JobResult {
    Embedded {
        output_path: PathBuf,
        size: u64,
    },
    Extracted {
        text: String,
        confidence: Confidence,
        agreement: f64,
    },
}

/// One job's mutable record, owned by the job table.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub input_path: PathBuf,
    pub original_name: String,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub finished_at: Option<u64>,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

/// Immutable, serializable view handed to status readers.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub kind: JobKind,
    pub original_name: String,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub finished_at: Option<u64>,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

impl Job {
    pub fn new(id: JobId, kind: JobKind, input_path: PathBuf, original_name: String) -> Self {
        Self {
            id,
            kind,
            input_path,
            original_name,
            status: JobStatus::Queued,
            progress: 0,
            message: "Queued for processing".to_string(),
            created_at: now_millis(),
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
        }
    }

    /// Queued → Processing; driven by the worker that dequeued the job.
    pub fn start(&mut self) {
        debug_assert_eq!(self.status, JobStatus::Queued);
        self.status = JobStatus::Processing;
        self.started_at = Some(now_millis());
        self.message = "Processing".to_string();
    }

    /// Update observable progress. Monotone: regressions are clamped.
    pub fn set_progress(&mut self, percent: u8, message: String) {
        debug_assert_eq!(self.status, JobStatus::Processing);
        self.progress = self.progress.max(percent.min(100));
        self.message = message;
    }

    /// Processing → Completed.
    pub fn complete(&mut self, result: JobResult) {
        debug_assert_eq!(self.status, JobStatus::Processing);
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.message = "Completed".to_string();
        self.finished_at = Some(now_millis());
        self.result = Some(result);
    }

    /// Processing → Error.
    pub fn fail(&mut self, error: String) {
        debug_assert_eq!(self.status, JobStatus::Processing);
        self.status = JobStatus::Error;
        self.message = format!("Failed: {error}");
        self.finished_at = Some(now_millis());
        self.error = Some(error);
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            kind: self.kind,
            original_name: self.original_name.clone(),
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }
}
