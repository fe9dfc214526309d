// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! Write-through contract with the storage collaborator.
//!
//! The engine never owns registry state: on completion it hands a
//! [`CompletionRecord`] to whatever [`RegistrySink`] it was
//! constructed with, and the collaborator persists the id → artifact
//! mapping however it likes.

use std::path::PathBuf;

use serde::Serialize;

use super::job::JobId;

/// Everything the storage collaborator needs to register one finished
/// output.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRecord {
    pub job_id: JobId,
    pub original_name: String,
    pub output_path: PathBuf,
    pub size: u64,
    pub finished_at: u64,
}

/// Receives completion records. Implementations must not block the
/// calling worker for long.
pub trait RegistrySink: Send + Sync {
    fn job_completed(&self, record: &CompletionRecord);
}

/// Discards records; the default when no storage collaborator is
/// attached.
pub struct NullRegistry;

impl RegistrySink for NullRegistry {
    fn job_completed(&self, _record: &CompletionRecord) {}
}
