// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! Bounded FIFO job queue.
//!
//! Submission is non-blocking and fails fast when the queue is full;
//! workers block on [`JobQueue::pop`] until an id arrives or the queue
//! is closed. Closing wakes every waiter and discards whatever is
//! still queued — shutdown does not start new work.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::{Condvar, Mutex};

use super::job::JobId;

/// Why a push was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// The queue holds `capacity` pending jobs.
    Full,
    /// The queue was closed by shutdown.
    Closed,
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "queue full"),
            Self::Closed => write!(f, "queue closed"),
        }
    }
}

impl std::error::Error for PushError {}

struct QueueState {
    items: VecDeque<JobId>,
    closed: bool,
}

/// Bounded FIFO of queued job ids.
pub struct JobQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    capacity: usize,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState { items: VecDeque::new(), closed: false }),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Enqueue at the tail. Non-blocking.
    pub fn push(&self, id: JobId) -> Result<(), PushError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PushError::Closed);
        }
        if state.items.len() >= self.capacity {
            return Err(PushError::Full);
        }
        state.items.push_back(id);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Dequeue from the head, blocking while empty. Returns `None`
    /// once the queue has been closed.
    pub fn pop(&self) -> Option<JobId> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(id) = state.items.pop_front() {
                return Some(id);
            }
            self.available.wait(&mut state);
        }
    }

    /// Remove a queued id (cancellation). Returns whether it was
    /// present.
    pub fn remove(&self, id: &JobId) -> bool {
        let mut state = self.state.lock();
        let before = state.items.len();
        state.items.retain(|queued| queued != id);
        state.items.len() != before
    }

    /// Stop accepting and dispensing jobs; wakes all blocked workers.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        drop(state);
        self.available.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
