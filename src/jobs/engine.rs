// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! The owning object behind the batch surface.
//!
//! One [`Engine`] holds the job table, the bounded queue, the progress
//! bus, and a fixed worker pool. Submissions validate and enqueue;
//! workers dequeue, drive the video pipeline, and perform the terminal
//! transition. All shared state lives behind this object — workers get
//! a handle at spawn time and there are no ambient statics.
//!
//! Locking policy: the job table is one mutex with O(1) critical
//! sections; the bus has its own locks and is never published to while
//! the table lock is held.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::codec::{self, CarrierSet, WatermarkParams};
use crate::config::EngineConfig;
use crate::video::{
    self, estimate::Estimate, pipeline, validate, Extraction, PipelineOptions, ProgressSink,
    ValidationReport, VideoError,
};

use super::bus::{ProgressBus, ProgressEvent, Subscription};
use super::job::{now_millis, Job, JobId, JobKind, JobResult, JobSnapshot, JobStatus};
use super::queue::{JobQueue, PushError};
use super::registry::{CompletionRecord, NullRegistry, RegistrySink};

/// Submission failures, surfaced before a job id exists.
#[derive(Debug)]
pub enum SubmitError {
    /// The queue already holds `queue_capacity` pending jobs.
    QueueFull,
    /// The input or parameters failed validation.
    InvalidInput(String),
    /// The engine is shutting down and accepts nothing new.
    Shutdown,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "queue full"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::Shutdown => write!(f, "engine is shutting down"),
        }
    }
}

impl std::error::Error for SubmitError {}

/// Cancellation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelError {
    /// No job with that id.
    NotFound,
    /// The job already left the queue; in-flight work is not
    /// interruptible.
    NotCancellable,
}

impl fmt::Display for CancelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "job not found"),
            Self::NotCancellable => write!(f, "job is not cancellable"),
        }
    }
}

impl std::error::Error for CancelError {}

/// Caller-facing embed options beyond payload and strength.
#[derive(Debug, Clone)]
pub struct WatermarkOptions {
    /// Carry bits in chrominance as well as luminance.
    pub multi_channel: bool,
    /// Blocks per payload bit.
    pub redundancy: usize,
    /// Append the end-of-message sentinel.
    pub use_sentinel: bool,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            multi_channel: false,
            redundancy: codec::DEFAULT_REDUNDANCY,
            use_sentinel: true,
        }
    }
}

impl WatermarkOptions {
    fn to_params(&self, strength: f64) -> WatermarkParams {
        WatermarkParams {
            strength,
            carriers: if self.multi_channel { CarrierSet::LumaChroma } else { CarrierSet::Luma },
            redundancy: self.redundancy,
            use_sentinel: self.use_sentinel,
            ..WatermarkParams::default()
        }
    }
}

/// The work a job performs, fixed at submission.
#[derive(Debug, Clone)]
pub(crate) enum JobRequest {
    Embed {
        input: PathBuf,
        payload: String,
        params: WatermarkParams,
    },
    Extract {
        input: PathBuf,
        expected_len: usize,
        params: WatermarkParams,
    },
}

/// Executes one dequeued job. The production runner drives the video
/// pipeline; tests substitute a stub to exercise queue and lifecycle
/// semantics without FFmpeg.
pub(crate) trait JobRunner: Send + Sync + 'static {
    fn run(
        &self,
        request: &JobRequest,
        work_path: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<JobResult, VideoError>;
}

struct PipelineRunner {
    opts: PipelineOptions,
}

impl JobRunner for PipelineRunner {
    fn run(
        &self,
        request: &JobRequest,
        work_path: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<JobResult, VideoError> {
        match request {
            JobRequest::Embed { input, payload, params } => {
                let bits = codec::payload_bits(payload, params);
                let outcome = pipeline::embed_video(input, work_path, &bits, params, &self.opts, sink)?;
                Ok(JobResult::Embedded {
                    output_path: work_path.to_path_buf(),
                    size: outcome.output_size,
                })
            }
            JobRequest::Extract { input, expected_len, params } => {
                let n_bits = expected_len * 8 + if params.use_sentinel { 16 } else { 0 };
                let extraction: Extraction =
                    pipeline::extract_video(input, n_bits, params, &self.opts, sink)?;
                Ok(JobResult::Extracted {
                    text: extraction.text,
                    confidence: extraction.confidence,
                    agreement: extraction.agreement,
                })
            }
        }
    }
}

struct TableEntry {
    job: Job,
    request: JobRequest,
}

struct Shared {
    cfg: EngineConfig,
    table: Mutex<HashMap<JobId, TableEntry>>,
    queue: JobQueue,
    bus: ProgressBus,
    registry: Box<dyn RegistrySink>,
    runner: Box<dyn JobRunner>,
    stop: AtomicBool,
}

/// The batch-processing surface: submit, observe, cancel, shut down.
pub struct Engine {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Build an engine with the production pipeline runner and no
    /// registry collaborator.
    pub fn new(cfg: EngineConfig) -> std::io::Result<Self> {
        Self::with_registry(cfg, Box::new(NullRegistry))
    }

    /// Build an engine that write-throughs completions to `registry`.
    pub fn with_registry(
        cfg: EngineConfig,
        registry: Box<dyn RegistrySink>,
    ) -> std::io::Result<Self> {
        let opts = PipelineOptions {
            progress_interval: cfg.progress_interval,
            extract_frame_limit: cfg.extract_frame_limit,
        };
        Self::with_runner(cfg, Box::new(PipelineRunner { opts }), registry)
    }

    pub(crate) fn with_runner(
        cfg: EngineConfig,
        runner: Box<dyn JobRunner>,
        registry: Box<dyn RegistrySink>,
    ) -> std::io::Result<Self> {
        fs::create_dir_all(&cfg.work_dir)?;
        fs::create_dir_all(&cfg.output_dir)?;
        sweep_work_dir(&cfg.work_dir);

        let worker_count = cfg.workers.max(1);
        let shared = Arc::new(Shared {
            queue: JobQueue::new(cfg.queue_capacity),
            cfg,
            table: Mutex::new(HashMap::new()),
            bus: ProgressBus::new(),
            registry,
            runner,
            stop: AtomicBool::new(false),
        });

        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("vidmark-worker-{i}"))
                .spawn(move || worker_loop(shared))?;
            workers.push(handle);
        }

        log::info!(
            target: "vidmark::jobs::engine",
            "engine up: {} workers, queue capacity {}",
            worker_count,
            shared.cfg.queue_capacity
        );

        Ok(Self { shared, workers: Mutex::new(workers) })
    }

    /// Submit an embed job.
    pub fn submit_embed(
        &self,
        input: &Path,
        payload: &str,
        strength: f64,
        options: &WatermarkOptions,
    ) -> Result<JobId, SubmitError> {
        if payload.len() > self.shared.cfg.max_payload_len {
            return Err(SubmitError::InvalidInput(format!(
                "payload too long: {} bytes (max {})",
                payload.len(),
                self.shared.cfg.max_payload_len
            )));
        }
        let params = options.to_params(strength);
        params
            .validate()
            .map_err(|e| SubmitError::InvalidInput(e.to_string()))?;

        self.submit(input, JobKind::Embed, |input| JobRequest::Embed {
            input,
            payload: payload.to_string(),
            params,
        })
    }

    /// Submit an extract job expecting a payload of `expected_len`
    /// bytes (the maximum length when the sentinel is in use).
    pub fn submit_extract(
        &self,
        input: &Path,
        expected_len: usize,
        options: &WatermarkOptions,
    ) -> Result<JobId, SubmitError> {
        if expected_len == 0 || expected_len > self.shared.cfg.max_payload_len {
            return Err(SubmitError::InvalidInput(format!(
                "expected payload length {} outside 1..={}",
                expected_len, self.shared.cfg.max_payload_len
            )));
        }
        let params = options.to_params(codec::DEFAULT_STRENGTH);
        self.submit(input, JobKind::Extract, |input| JobRequest::Extract {
            input,
            expected_len,
            params,
        })
    }

    fn submit(
        &self,
        input: &Path,
        kind: JobKind,
        make_request: impl FnOnce(PathBuf) -> JobRequest,
    ) -> Result<JobId, SubmitError> {
        if self.shared.stop.load(Ordering::SeqCst) {
            return Err(SubmitError::Shutdown);
        }

        if self.shared.cfg.validate_on_submit {
            let report = validate::validate(input, self.shared.cfg.max_file_size);
            if !report.is_valid() {
                return Err(SubmitError::InvalidInput(report.errors.join("; ")));
            }
        }

        let id = JobId::generate();
        let original_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        let job = Job::new(id.clone(), kind, input.to_path_buf(), original_name);
        let queued_event = progress_event(&job);
        let entry = TableEntry { job, request: make_request(input.to_path_buf()) };

        self.shared.table.lock().insert(id.clone(), entry);
        if let Err(e) = self.shared.queue.push(id.clone()) {
            self.shared.table.lock().remove(&id);
            return Err(match e {
                PushError::Full => SubmitError::QueueFull,
                PushError::Closed => SubmitError::Shutdown,
            });
        }

        self.shared.bus.publish(queued_event);
        log::info!(
            target: "vidmark::jobs::engine",
            "submitted {kind:?} job {id} for {}",
            input.display()
        );
        Ok(id)
    }

    /// Validate an input without submitting anything.
    pub fn validate(&self, input: &Path) -> ValidationReport {
        validate::validate(input, self.shared.cfg.max_file_size)
    }

    /// Advisory processing-time estimate for an embed of `payload_len`
    /// bytes at `strength`. Strength does not enter the cost model
    /// today (the per-block work is strength-independent) but is part
    /// of the call contract.
    pub fn estimate(
        &self,
        input: &Path,
        payload_len: usize,
        _strength: f64,
    ) -> Result<Estimate, VideoError> {
        let meta = video::probe::probe(input)?;
        Ok(video::estimate::estimate(&meta, payload_len))
    }

    /// Snapshot one job's observable state.
    pub fn get_job(&self, id: &JobId) -> Option<JobSnapshot> {
        self.shared.table.lock().get(id).map(|entry| entry.job.snapshot())
    }

    /// Snapshot every known job, newest first.
    pub fn list_jobs(&self) -> Vec<JobSnapshot> {
        let mut snapshots: Vec<JobSnapshot> = self
            .shared
            .table
            .lock()
            .values()
            .map(|entry| entry.job.snapshot())
            .collect();
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        snapshots
    }

    /// Open a progress stream for a job. The current state is seeded
    /// immediately, so late subscribers of a finished job still see
    /// its terminal event.
    pub fn subscribe(&self, id: &JobId) -> Option<Subscription> {
        let current = {
            let table = self.shared.table.lock();
            progress_event(&table.get(id)?.job)
        };
        let subscription = self.shared.bus.subscribe(id);
        self.shared.bus.publish(current);
        Some(subscription)
    }

    /// Cancel a queued job, removing it from queue and table. Jobs
    /// that a worker already owns cannot be cancelled.
    pub fn cancel(&self, id: &JobId) -> Result<(), CancelError> {
        let mut table = self.shared.table.lock();
        let entry = table.get(id).ok_or(CancelError::NotFound)?;
        if entry.job.status != JobStatus::Queued {
            return Err(CancelError::NotCancellable);
        }
        if !self.shared.queue.remove(id) {
            // A worker grabbed it between the status read and here.
            return Err(CancelError::NotCancellable);
        }
        table.remove(id);
        drop(table);

        // Terminate open streams; the record itself is gone.
        self.shared.bus.publish(ProgressEvent::new(
            id.clone(),
            JobStatus::Error,
            0,
            "cancelled before processing".to_string(),
        ));
        log::info!(target: "vidmark::jobs::engine", "cancelled queued job {id}");
        Ok(())
    }

    /// Graceful shutdown: stop intake, let in-flight jobs wind down at
    /// the next frame boundary, join all workers, flush the bus.
    /// Idempotent.
    pub fn shutdown(&self) {
        if self.shared.stop.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!(target: "vidmark::jobs::engine", "shutting down");
        self.shared.queue.close();
        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
        self.shared.bus.close_all();
        log::info!(target: "vidmark::jobs::engine", "shutdown complete");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Forwards pipeline progress into the table and the bus. Never holds
/// the table lock while publishing.
struct WorkerSink<'a> {
    shared: &'a Shared,
    id: JobId,
}

impl ProgressSink for WorkerSink<'_> {
    fn publish(&self, frames_done: u64, frames_total: u64, percent: u8) {
        let message = format!("Processing frame {frames_done}/{frames_total}... {percent}%");
        let event = {
            let mut table = self.shared.table.lock();
            let Some(entry) = table.get_mut(&self.id) else { return };
            entry.job.set_progress(percent, message);
            progress_event(&entry.job)
        };
        self.shared.bus.publish(event);
    }

    fn cancelled(&self) -> bool {
        self.shared.stop.load(Ordering::SeqCst)
    }
}

fn progress_event(job: &Job) -> ProgressEvent {
    ProgressEvent::new(job.id.clone(), job.status, job.progress, job.message.clone())
}

fn worker_loop(shared: Arc<Shared>) {
    while let Some(id) = shared.queue.pop() {
        let started = {
            let mut table = shared.table.lock();
            match table.get_mut(&id) {
                Some(entry) => {
                    entry.job.start();
                    Some((entry.request.clone(), progress_event(&entry.job)))
                }
                None => None,
            }
        };
        let Some((request, event)) = started else { continue };
        shared.bus.publish(event);

        let work_path = work_path_for(&shared.cfg.work_dir, &id, &request);
        let sink = WorkerSink { shared: &shared, id: id.clone() };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            shared.runner.run(&request, &work_path, &sink)
        }));
        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                log::error!(
                    target: "vidmark::jobs::engine",
                    "worker panicked while processing job {id}"
                );
                let _ = fs::remove_file(&work_path);
                Err(VideoError::Internal("worker panicked".to_string()))
            }
        };

        finalize(&shared, &id, result);
    }
    log::debug!(target: "vidmark::jobs::engine", "worker exiting");
}

fn work_path_for(work_dir: &Path, id: &JobId, request: &JobRequest) -> PathBuf {
    let original = match request {
        JobRequest::Embed { input, .. } | JobRequest::Extract { input, .. } => input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output.mp4".to_string()),
    };
    work_dir.join(format!("{id}_watermarked_{original}"))
}

/// Terminal transition: move a finished output into the finalized
/// directory, update the table, publish the terminal event, and
/// write-through to the registry. Filesystem work happens outside the
/// table lock.
fn finalize(shared: &Shared, id: &JobId, result: Result<JobResult, VideoError>) {
    let result = result.and_then(|job_result| match job_result {
        JobResult::Embedded { output_path: work, size } => {
            let name = work
                .file_name()
                .ok_or_else(|| VideoError::Internal("work output has no file name".to_string()))?;
            let final_path = shared.cfg.output_dir.join(name);
            fs::rename(&work, &final_path).map_err(|e| {
                let _ = fs::remove_file(&work);
                VideoError::Internal(format!("could not finalize output: {e}"))
            })?;
            Ok(JobResult::Embedded { output_path: final_path, size })
        }
        other => Ok(other),
    });

    let (event, completion) = {
        let mut table = shared.table.lock();
        let Some(entry) = table.get_mut(id) else { return };
        let completion = match result {
            Ok(job_result) => {
                let completion = match &job_result {
                    JobResult::Embedded { output_path, size } => Some(CompletionRecord {
                        job_id: id.clone(),
                        original_name: entry.job.original_name.clone(),
                        output_path: output_path.clone(),
                        size: *size,
                        finished_at: now_millis(),
                    }),
                    JobResult::Extracted { .. } => None,
                };
                entry.job.complete(job_result);
                completion
            }
            Err(e) => {
                entry.job.fail(e.to_string());
                None
            }
        };
        (progress_event(&entry.job), completion)
    };

    shared.bus.publish(event);
    if let Some(record) = completion {
        shared.registry.job_completed(&record);
    }
    log::info!(target: "vidmark::jobs::engine", "job {id} finished");
}

/// Best-effort removal of in-flight leftovers from a previous run.
fn sweep_work_dir(work_dir: &Path) {
    let Ok(entries) = fs::read_dir(work_dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() {
            log::debug!(
                target: "vidmark::jobs::engine",
                "sweeping stale work file {}",
                path.display()
            );
            let _ = fs::remove_file(&path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Runner that simulates work: a few progress steps with a short
    /// sleep each, honoring cancellation. Behavior is keyed on the
    /// payload text.
    struct StubRunner {
        step: Duration,
    }

    impl JobRunner for StubRunner {
        fn run(
            &self,
            request: &JobRequest,
            work_path: &Path,
            sink: &dyn ProgressSink,
        ) -> Result<JobResult, VideoError> {
            let payload = match request {
                JobRequest::Embed { payload, .. } => payload.clone(),
                JobRequest::Extract { expected_len, .. } => format!("x{expected_len}"),
            };
            for step in 1..=4u64 {
                if sink.cancelled() {
                    return Err(VideoError::Shutdown);
                }
                thread::sleep(self.step);
                sink.publish(step, 4, (step * 25).min(99) as u8);
            }
            if payload == "fail" {
                return Err(VideoError::FrameProcessingFailed {
                    frame: 2,
                    reason: "stub failure".to_string(),
                });
            }
            if payload == "panic" {
                panic!("stub panic");
            }
            match request {
                JobRequest::Embed { .. } => {
                    fs::write(work_path, b"stub output").map_err(VideoError::Io)?;
                    Ok(JobResult::Embedded { output_path: work_path.to_path_buf(), size: 11 })
                }
                JobRequest::Extract { .. } => Ok(JobResult::Extracted {
                    text: "stub".to_string(),
                    confidence: crate::codec::Confidence::High,
                    agreement: 1.0,
                }),
            }
        }
    }

    /// Registry sink that records completion order.
    #[derive(Default)]
    struct RecordingRegistry {
        completed: StdMutex<Vec<JobId>>,
    }

    impl RegistrySink for RecordingRegistry {
        fn job_completed(&self, record: &CompletionRecord) {
            self.completed.lock().unwrap().push(record.job_id.clone());
        }
    }

    struct Fixture {
        engine: Engine,
        registry: Arc<RecordingRegistry>,
        input: PathBuf,
        _dir: tempfile::TempDir,
    }

    fn fixture(workers: usize, queue_capacity: usize, step_ms: u64) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        fs::write(&input, b"not really a video").unwrap();
        let cfg = EngineConfig::default()
            .with_workers(workers)
            .with_queue_capacity(queue_capacity)
            .with_dirs(dir.path().join("work"), dir.path().join("processed"))
            .with_validate_on_submit(false);
        let registry = Arc::new(RecordingRegistry::default());

        struct ArcRegistry(Arc<RecordingRegistry>);
        impl RegistrySink for ArcRegistry {
            fn job_completed(&self, record: &CompletionRecord) {
                self.0.job_completed(record);
            }
        }

        let engine = Engine::with_runner(
            cfg,
            Box::new(StubRunner { step: Duration::from_millis(step_ms) }),
            Box::new(ArcRegistry(Arc::clone(&registry))),
        )
        .unwrap();
        Fixture { engine, registry, input, _dir: dir }
    }

    fn wait_for_status(engine: &Engine, id: &JobId, status: JobStatus) -> JobSnapshot {
        for _ in 0..200 {
            if let Some(snap) = engine.get_job(id) {
                if snap.status == status {
                    return snap;
                }
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("job {id} never reached {status:?}");
    }

    #[test]
    fn embed_job_completes_and_registers() {
        let fx = fixture(1, 10, 1);
        let id = fx
            .engine
            .submit_embed(&fx.input, "hello", 0.1, &WatermarkOptions::default())
            .unwrap();

        let snap = wait_for_status(&fx.engine, &id, JobStatus::Completed);
        assert_eq!(snap.progress, 100);
        match snap.result.unwrap() {
            JobResult::Embedded { output_path, size } => {
                assert!(output_path.starts_with(fx._dir.path().join("processed")));
                assert!(output_path.exists(), "finalized output must exist");
                assert_eq!(size, 11);
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(fx.registry.completed.lock().unwrap().as_slice(), &[id]);
    }

    #[test]
    fn failed_job_reports_structured_error() {
        let fx = fixture(1, 10, 1);
        let id = fx
            .engine
            .submit_embed(&fx.input, "fail", 0.1, &WatermarkOptions::default())
            .unwrap();
        let snap = wait_for_status(&fx.engine, &id, JobStatus::Error);
        assert!(snap.error.unwrap().contains("frame 2"));
        assert!(fx.registry.completed.lock().unwrap().is_empty());
    }

    #[test]
    fn panicking_job_becomes_internal_error_and_worker_survives() {
        let fx = fixture(1, 10, 1);
        let bad = fx
            .engine
            .submit_embed(&fx.input, "panic", 0.1, &WatermarkOptions::default())
            .unwrap();
        let snap = wait_for_status(&fx.engine, &bad, JobStatus::Error);
        assert!(snap.error.unwrap().contains("internal"));

        // The same worker must still process subsequent jobs.
        let good = fx
            .engine
            .submit_embed(&fx.input, "ok", 0.1, &WatermarkOptions::default())
            .unwrap();
        wait_for_status(&fx.engine, &good, JobStatus::Completed);
    }

    #[test]
    fn fifo_completion_with_single_worker() {
        let fx = fixture(1, 10, 2);
        let ids: Vec<JobId> = (0..4)
            .map(|i| {
                fx.engine
                    .submit_embed(&fx.input, &format!("job{i}"), 0.1, &WatermarkOptions::default())
                    .unwrap()
            })
            .collect();
        for id in &ids {
            wait_for_status(&fx.engine, id, JobStatus::Completed);
        }
        assert_eq!(fx.registry.completed.lock().unwrap().as_slice(), ids.as_slice());
    }

    #[test]
    fn queue_full_rejects_and_leaves_table_unchanged() {
        let fx = fixture(1, 1, 50);
        // First job occupies the worker, second fills the queue.
        let a = fx.engine.submit_embed(&fx.input, "a", 0.1, &WatermarkOptions::default()).unwrap();
        wait_for_status(&fx.engine, &a, JobStatus::Processing);
        let _b = fx.engine.submit_embed(&fx.input, "b", 0.1, &WatermarkOptions::default()).unwrap();

        let before = fx.engine.list_jobs().len();
        let err = fx
            .engine
            .submit_embed(&fx.input, "c", 0.1, &WatermarkOptions::default())
            .unwrap_err();
        assert!(matches!(err, SubmitError::QueueFull));
        assert_eq!(fx.engine.list_jobs().len(), before, "rejected submit must not grow the table");
    }

    #[test]
    fn workers_process_in_parallel() {
        let fx = fixture(2, 10, 40);
        let a = fx.engine.submit_embed(&fx.input, "a", 0.1, &WatermarkOptions::default()).unwrap();
        let b = fx.engine.submit_embed(&fx.input, "b", 0.1, &WatermarkOptions::default()).unwrap();
        wait_for_status(&fx.engine, &a, JobStatus::Processing);
        wait_for_status(&fx.engine, &b, JobStatus::Processing);
    }

    #[test]
    fn cancel_queued_job_removes_it() {
        let fx = fixture(1, 10, 50);
        let running = fx.engine.submit_embed(&fx.input, "a", 0.1, &WatermarkOptions::default()).unwrap();
        wait_for_status(&fx.engine, &running, JobStatus::Processing);
        let queued = fx.engine.submit_embed(&fx.input, "b", 0.1, &WatermarkOptions::default()).unwrap();

        fx.engine.cancel(&queued).unwrap();
        assert!(fx.engine.get_job(&queued).is_none());
        assert_eq!(fx.engine.cancel(&queued), Err(CancelError::NotFound));
        assert_eq!(fx.engine.cancel(&running), Err(CancelError::NotCancellable));
        assert_eq!(fx.engine.cancel(&JobId::generate()), Err(CancelError::NotFound));
    }

    #[test]
    fn subscription_sees_lifecycle_through_terminal() {
        let fx = fixture(1, 10, 2);
        let id = fx.engine.submit_embed(&fx.input, "hello", 0.1, &WatermarkOptions::default()).unwrap();
        let sub = fx.engine.subscribe(&id).unwrap();

        let mut last_progress = 0;
        let mut saw_terminal = false;
        while let Some(event) = sub.recv_timeout(Duration::from_secs(5)) {
            assert!(event.progress >= last_progress, "progress must not regress");
            last_progress = event.progress;
            if event.status.is_terminal() {
                assert_eq!(event.status, JobStatus::Completed);
                assert_eq!(event.progress, 100);
                saw_terminal = true;
                break;
            }
        }
        assert!(saw_terminal, "subscription must deliver the terminal event");
    }

    #[test]
    fn late_subscriber_gets_terminal_event() {
        let fx = fixture(1, 10, 1);
        let id = fx.engine.submit_embed(&fx.input, "hello", 0.1, &WatermarkOptions::default()).unwrap();
        wait_for_status(&fx.engine, &id, JobStatus::Completed);

        let sub = fx.engine.subscribe(&id).unwrap();
        let event = sub.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(event.status, JobStatus::Completed);
        assert!(fx.engine.subscribe(&JobId::generate()).is_none());
    }

    #[test]
    fn shutdown_stops_intake_and_ends_in_flight_jobs() {
        let fx = fixture(1, 10, 50);
        let id = fx.engine.submit_embed(&fx.input, "slow", 0.1, &WatermarkOptions::default()).unwrap();
        wait_for_status(&fx.engine, &id, JobStatus::Processing);

        fx.engine.shutdown();

        let snap = fx.engine.get_job(&id).unwrap();
        assert!(
            snap.status == JobStatus::Completed || snap.status == JobStatus::Error,
            "in-flight job must reach a terminal state, got {:?}",
            snap.status
        );
        if snap.status == JobStatus::Error {
            assert!(snap.error.unwrap().contains("shutdown"));
        }

        let err = fx
            .engine
            .submit_embed(&fx.input, "late", 0.1, &WatermarkOptions::default())
            .unwrap_err();
        assert!(matches!(err, SubmitError::Shutdown));

        // Idempotent.
        fx.engine.shutdown();
    }

    #[test]
    fn submit_rejects_oversized_payload_and_bad_params() {
        let fx = fixture(1, 10, 1);
        let long = "x".repeat(51);
        assert!(matches!(
            fx.engine.submit_embed(&fx.input, &long, 0.1, &WatermarkOptions::default()),
            Err(SubmitError::InvalidInput(_))
        ));
        assert!(matches!(
            fx.engine.submit_embed(&fx.input, "ok", 0.9, &WatermarkOptions::default()),
            Err(SubmitError::InvalidInput(_))
        ));
        assert!(matches!(
            fx.engine.submit_extract(&fx.input, 0, &WatermarkOptions::default()),
            Err(SubmitError::InvalidInput(_))
        ));
    }

    #[test]
    fn extract_job_returns_text_result() {
        let fx = fixture(1, 10, 1);
        let id = fx.engine.submit_extract(&fx.input, 5, &WatermarkOptions::default()).unwrap();
        let snap = wait_for_status(&fx.engine, &id, JobStatus::Completed);
        match snap.result.unwrap() {
            JobResult::Extracted { text, .. } => assert_eq!(text, "stub"),
            other => panic!("unexpected result {other:?}"),
        }
        // Extractions produce no registry write-through.
        assert!(fx.registry.completed.lock().unwrap().is_empty());
    }
}
