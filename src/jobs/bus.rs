// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/vidmark

//! Per-job progress publish/subscribe.
//!
//! Each subscription owns a coalescing mailbox: a newer intermediate
//! event overwrites an undelivered one (lossy), while the terminal
//! event is latched and delivered at least once. Publishing only takes
//! the mailbox lock for a store-and-notify, so a slow subscriber can
//! never block a worker. The bus is a sink — workers publish into it
//! and nothing ever calls back out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use super::job::{now_millis, JobId, JobStatus};

/// One observable progress update.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub timestamp: u64,
}

impl ProgressEvent {
    pub fn new(job_id: JobId, status: JobStatus, progress: u8, message: String) -> Self {
        Self { job_id, status, progress, message, timestamp: now_millis() }
    }
}

#[derive(Default)]
struct MailboxState {
    pending: Option<ProgressEvent>,
    terminal: Option<ProgressEvent>,
    terminal_delivered: bool,
    closed: bool,
}

struct Mailbox {
    state: Mutex<MailboxState>,
    ready: Condvar,
}

impl Mailbox {
    fn new() -> Self {
        Self { state: Mutex::new(MailboxState::default()), ready: Condvar::new() }
    }

    /// Store an event. Never blocks: an undelivered intermediate event
    /// is simply superseded.
    fn push(&self, event: ProgressEvent) {
        let mut state = self.state.lock();
        if state.closed || state.terminal_delivered {
            return;
        }
        if event.status.is_terminal() {
            state.terminal = Some(event);
        } else if state.terminal.is_none() {
            state.pending = Some(event);
        }
        drop(state);
        self.ready.notify_all();
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        drop(state);
        self.ready.notify_all();
    }

    fn take(state: &mut MailboxState) -> Option<ProgressEvent> {
        if let Some(event) = state.pending.take() {
            return Some(event);
        }
        if !state.terminal_delivered {
            if let Some(event) = state.terminal.take() {
                state.terminal_delivered = true;
                return Some(event);
            }
        }
        None
    }
}

/// A live event stream for one job. Ends after the terminal event (or
/// bus shutdown).
pub struct Subscription {
    mailbox: Arc<Mailbox>,
}

impl Subscription {
    /// Block for the next event. `None` means the stream ended: the
    /// terminal event was already delivered, or the bus shut down.
    pub fn recv(&self) -> Option<ProgressEvent> {
        let mut state = self.mailbox.state.lock();
        loop {
            if let Some(event) = Mailbox::take(&mut state) {
                return Some(event);
            }
            if state.terminal_delivered || state.closed {
                return None;
            }
            self.mailbox.ready.wait(&mut state);
        }
    }

    /// Like [`recv`](Self::recv) with an upper wait bound. `None` on
    /// timeout as well as on stream end.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ProgressEvent> {
        let mut state = self.mailbox.state.lock();
        loop {
            if let Some(event) = Mailbox::take(&mut state) {
                return Some(event);
            }
            if state.terminal_delivered || state.closed {
                return None;
            }
            if self.mailbox.ready.wait_for(&mut state, timeout).timed_out() {
                return Mailbox::take(&mut state);
            }
        }
    }
}

/// Publish/subscribe hub indexed by job id.
pub struct ProgressBus {
    subscribers: Mutex<HashMap<JobId, Vec<Arc<Mailbox>>>>,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self { subscribers: Mutex::new(HashMap::new()) }
    }

    /// Open a stream for a job. Events published before subscription
    /// are not replayed; the engine seeds the current state right
    /// after subscribing.
    pub fn subscribe(&self, id: &JobId) -> Subscription {
        let mailbox = Arc::new(Mailbox::new());
        self.subscribers
            .lock()
            .entry(id.clone())
            .or_default()
            .push(Arc::clone(&mailbox));
        Subscription { mailbox }
    }

    /// Deliver to every live subscriber of the event's job. A terminal
    /// event retires the job's subscriber list.
    pub fn publish(&self, event: ProgressEvent) {
        let mut map = self.subscribers.lock();
        let Some(list) = map.get_mut(&event.job_id) else { return };

        // Prune mailboxes whose Subscription was dropped.
        list.retain(|mailbox| Arc::strong_count(mailbox) > 1);

        let terminal = event.status.is_terminal();
        for mailbox in list.iter() {
            mailbox.push(event.clone());
        }
        if terminal || list.is_empty() {
            map.remove(&event.job_id);
        }
    }

    /// Terminate every open stream. Used on engine shutdown.
    pub fn close_all(&self) {
        let mut map = self.subscribers.lock();
        for list in map.values() {
            for mailbox in list {
                mailbox.close();
            }
        }
        map.clear();
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn event(id: &JobId, status: JobStatus, progress: u8) -> ProgressEvent {
        ProgressEvent::new(id.clone(), status, progress, format!("at {progress}%"))
    }

    #[test]
    fn delivers_in_order_to_live_subscriber() {
        let bus = ProgressBus::new();
        let id = JobId::generate();
        let sub = bus.subscribe(&id);

        bus.publish(event(&id, JobStatus::Processing, 10));
        assert_eq!(sub.recv().unwrap().progress, 10);

        bus.publish(event(&id, JobStatus::Processing, 20));
        bus.publish(event(&id, JobStatus::Completed, 100));
        // 20 was not yet taken, but a terminal event exists: the
        // intermediate survives (it was stored first), then terminal.
        assert_eq!(sub.recv().unwrap().progress, 20);
        let terminal = sub.recv().unwrap();
        assert_eq!(terminal.status, JobStatus::Completed);
        assert!(sub.recv_timeout(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn intermediate_events_coalesce() {
        let bus = ProgressBus::new();
        let id = JobId::generate();
        let sub = bus.subscribe(&id);

        for p in [10, 20, 30, 40] {
            bus.publish(event(&id, JobStatus::Processing, p));
        }
        // Only the newest undelivered intermediate survives.
        assert_eq!(sub.recv().unwrap().progress, 40);
    }

    #[test]
    fn terminal_latched_for_slow_subscriber() {
        let bus = ProgressBus::new();
        let id = JobId::generate();
        let sub = bus.subscribe(&id);

        bus.publish(event(&id, JobStatus::Processing, 50));
        bus.publish(event(&id, JobStatus::Error, 50));

        // However late the reader shows up, the terminal event is there.
        thread::sleep(Duration::from_millis(20));
        assert_eq!(sub.recv().unwrap().status, JobStatus::Processing);
        assert_eq!(sub.recv().unwrap().status, JobStatus::Error);
        assert!(sub.recv_timeout(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn stream_ends_after_terminal() {
        let bus = ProgressBus::new();
        let id = JobId::generate();
        let sub = bus.subscribe(&id);
        bus.publish(event(&id, JobStatus::Completed, 100));
        assert!(sub.recv().is_some());
        assert!(sub.recv().is_none(), "stream must end after the terminal event");
        // Publishing after terminal reaches nobody and must not panic.
        bus.publish(event(&id, JobStatus::Processing, 10));
    }

    #[test]
    fn subscribers_are_independent() {
        let bus = ProgressBus::new();
        let id = JobId::generate();
        let a = bus.subscribe(&id);
        let b = bus.subscribe(&id);
        bus.publish(event(&id, JobStatus::Processing, 33));
        assert_eq!(a.recv().unwrap().progress, 33);
        assert_eq!(b.recv().unwrap().progress, 33);
    }

    #[test]
    fn dropped_subscription_is_pruned() {
        let bus = ProgressBus::new();
        let id = JobId::generate();
        let sub = bus.subscribe(&id);
        drop(sub);
        bus.publish(event(&id, JobStatus::Processing, 5));
        assert!(bus.subscribers.lock().get(&id).is_none());
    }

    #[test]
    fn close_all_unblocks_readers() {
        let bus = Arc::new(ProgressBus::new());
        let id = JobId::generate();
        let sub = bus.subscribe(&id);
        let bus2 = Arc::clone(&bus);
        let closer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            bus2.close_all();
        });
        assert!(sub.recv().is_none());
        closer.join().unwrap();
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus = ProgressBus::new();
        bus.publish(event(&JobId::generate(), JobStatus::Processing, 1));
    }
}
