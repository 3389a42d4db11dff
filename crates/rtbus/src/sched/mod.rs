// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rtbus contributors

//! Stream commit scheduler: one periodic loop drives all deferred flushes.
//!
//! A single dedicated background thread wakes once per configured cycle,
//! captures one wall-clock timestamp and invokes every registered task with
//! that same timestamp, in registration order. Ports register on creation
//! and unregister on teardown; unregistration is effective no later than the
//! next cycle boundary (an in-flight invocation is never cancelled
//! mid-cycle).
//!
//! The scheduler is an explicitly constructed service with a `start`/`stop`
//! lifecycle, dependency-injected into ports at construction. There is no
//! hidden global instance.

use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

/// Stable identity of one registered task.
pub type TaskId = u64;

/// Per-cycle callback. All tasks of one cycle observe the identical `now`.
pub trait StreamTask: Send + Sync {
    fn cycle(&self, now: SystemTime);
}

struct SchedulerShared {
    tasks: Mutex<Vec<(TaskId, Arc<dyn StreamTask>)>>,
    next_id: AtomicU64,
    shutdown: AtomicBool,
    period: Duration,
}

impl SchedulerShared {
    /// One cycle: snapshot the registration list, capture one timestamp,
    /// invoke in registration order with per-task panic isolation.
    fn run_cycle(&self) {
        let snapshot: Vec<(TaskId, Arc<dyn StreamTask>)> = self.tasks.lock().clone();
        let now = SystemTime::now();
        for (task_id, task) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| task.cycle(now))).is_err() {
                log::warn!("stream task {} panicked, cycle continues", task_id);
            }
        }
    }
}

/// Periodic driver for deferred commit/flush work of streaming producers.
pub struct StreamScheduler {
    shared: Arc<SchedulerShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl StreamScheduler {
    /// Create a stopped scheduler with the given cycle period.
    pub fn new(period: Duration) -> Arc<Self> {
        Arc::new(Self {
            shared: Arc::new(SchedulerShared {
                tasks: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                shutdown: AtomicBool::new(false),
                period,
            }),
            handle: Mutex::new(None),
        })
    }

    /// Spawn the cycle thread. No effect while already running.
    pub fn start(&self) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return;
        }
        self.shared.shutdown.store(false, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        *handle = Some(thread::spawn(move || cycle_loop(&shared)));
    }

    /// Signal shutdown and join the cycle thread. Idempotent.
    pub fn stop(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::warn!("stream scheduler thread terminated abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Add a task to the cycle list; it fires first in the next cycle.
    pub fn register(&self, task: Arc<dyn StreamTask>) -> TaskId {
        let task_id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared.tasks.lock().push((task_id, task));
        task_id
    }

    /// Remove a task. Returns false for unknown ids. Effective no later than
    /// the next cycle boundary.
    pub fn unregister(&self, task_id: TaskId) -> bool {
        let mut tasks = self.shared.tasks.lock();
        let before = tasks.len();
        tasks.retain(|(id, _)| *id != task_id);
        tasks.len() != before
    }

    pub fn task_count(&self) -> usize {
        self.shared.tasks.lock().len()
    }

    pub fn period(&self) -> Duration {
        self.shared.period
    }

    /// Drive exactly one cycle on the calling thread. Used for deterministic
    /// stepping in tests and single-threaded harnesses.
    pub fn tick(&self) {
        self.shared.run_cycle();
    }
}

impl Drop for StreamScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Background loop: cycle, then sleep in short slices so `stop()` is honored
/// promptly even with long periods.
fn cycle_loop(shared: &SchedulerShared) {
    const SLEEP_SLICE: Duration = Duration::from_millis(10);

    while !shared.shutdown.load(Ordering::Acquire) {
        shared.run_cycle();

        let mut remaining = shared.period;
        while remaining > Duration::ZERO && !shared.shutdown.load(Ordering::Acquire) {
            let slice = remaining.min(SLEEP_SLICE);
            thread::sleep(slice);
            remaining = remaining.saturating_sub(slice);
        }
    }
}
