//! Worker threads and the pool's counters.

use super::worker_pool::PoolShared;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub type WorkerId = usize;

/// Point-in-time view of a pool's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: u64,
    pub executed: u64,
    pub panicked: u64,
    pub rejected: u64,
    pub dropped: u64,
    pub pending: usize,
}

// counters shared by all workers of one pool
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub submitted: AtomicU64,
    pub executed: AtomicU64,
    pub rejected: AtomicU64,
    pub dropped: AtomicU64,
}

impl PoolCounters {
    pub fn snapshot(&self, panicked: u64, pending: usize) -> PoolStats {
        PoolStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            panicked,
            rejected: self.rejected.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            pending,
        }
    }
}

/// Body of one worker thread: pop the highest-priority item, run it, repeat
/// until the pool stops.
pub(crate) fn run(shared: Arc<PoolShared>, id: WorkerId) {
    tracing::debug!(pool = %shared.name, worker = id, "worker started");

    loop {
        let item = {
            let mut state = shared.state.lock();
            loop {
                if state.stopped {
                    break None;
                }
                if let Some(item) = state.ready.pop() {
                    break Some(item);
                }
                shared.work_available.wait(&mut state);
            }
        };

        let Some(item) = item else {
            break;
        };

        // a slot opened up for a blocked submitter
        shared.space_available.notify_one();

        let task_id = item.task.id();
        let queued_for = item.task.spawn_time.elapsed();
        let start = Instant::now();

        // failures are logged and reported by the handler
        let _ = shared.panic_handler.run_task(item.task, &shared.name);

        shared.counters.executed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
            pool = %shared.name,
            worker = id,
            task = %task_id,
            priority = %item.priority,
            queued_us = queued_for.as_micros() as u64,
            run_us = start.elapsed().as_micros() as u64,
            "task finished"
        );
    }

    tracing::debug!(pool = %shared.name, worker = id, "worker stopped");
}
