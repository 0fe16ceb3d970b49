//! Deadline timer that defers tasks into a target.
//!
//! One dedicated thread sleeps until the earliest deadline, then hands the
//! task to its target (normally a [`DispatchQueue`](crate::DispatchQueue)).
//! The timer never runs user code itself.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::Task;
use crate::util::{evict_oldest, Admission, Bound, Sequenced};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Receiver of deferred tasks once their deadline has passed.
pub trait HandOff: Send + Sync {
    fn hand_off(&self, task: Task) -> Result<()>;

    /// Name used in diagnostics.
    fn label(&self) -> &str;
}

struct ScheduledItem {
    deadline: Instant,
    seq: u64,
    task: Task,
    target: Box<dyn HandOff>,
}

impl ScheduledItem {
    fn dispatch(self) {
        let task_id = self.task.id();
        if let Err(e) = self.target.hand_off(self.task) {
            tracing::warn!(
                target_queue = %self.target.label(),
                task = %task_id,
                error = %e,
                "deferred hand-off failed"
            );
        }
    }
}

impl Sequenced for ScheduledItem {
    fn seq(&self) -> u64 {
        self.seq
    }
}

impl PartialEq for ScheduledItem {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for ScheduledItem {}

impl PartialOrd for ScheduledItem {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

// Reversed so the max-heap yields the earliest deadline, then the earliest
// scheduled among equal deadlines.
impl Ord for ScheduledItem {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct TimerState {
    pending: BinaryHeap<ScheduledItem>,
    next_seq: u64,
    stopped: bool,
}

pub(crate) struct TimerShared {
    name: Arc<str>,
    state: Mutex<TimerState>,
    wake: Condvar,
    space_available: Condvar,
    bound: Bound,
}

impl TimerShared {
    fn schedule(&self, task: Task, deadline: Instant, target: Box<dyn HandOff>) -> Result<()> {
        let mut evicted = None;
        let mut state = self.state.lock();

        loop {
            if state.stopped {
                return Err(Error::ShutDown);
            }
            match self.bound.admit(state.pending.len()) {
                Admission::Admit => break,
                Admission::Wait => self.space_available.wait(&mut state),
                Admission::Reject => {
                    tracing::warn!(timer = %self.name, task = %task.id(), "pending set full, rejecting task");
                    return Err(Error::Rejected("pending set"));
                }
                Admission::EvictOldest => {
                    evicted = evict_oldest(&mut state.pending);
                    break;
                }
            }
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.pending.push(ScheduledItem {
            deadline,
            seq,
            task,
            target,
        });
        drop(state);

        // the new item may be earlier than the one being waited on
        self.wake.notify_one();

        if let Some(item) = evicted {
            tracing::warn!(
                timer = %self.name,
                task = %item.task.id(),
                target_queue = %item.target.label(),
                "pending set full, dropped oldest deferred task"
            );
            item.task.cancel(Error::Evicted("pending set"));
        }
        Ok(())
    }

    fn run(&self) {
        tracing::debug!(timer = %self.name, "timer started");

        let mut state = self.state.lock();
        loop {
            if state.stopped {
                break;
            }

            let next_deadline = match state.pending.peek() {
                Some(item) => item.deadline,
                None => {
                    self.wake.wait(&mut state);
                    continue;
                }
            };

            if Instant::now() < next_deadline {
                // woken early by a new item or by stop: re-evaluate from the top
                self.wake.wait_until(&mut state, next_deadline);
                continue;
            }

            let Some(item) = state.pending.pop() else {
                continue;
            };
            self.space_available.notify_one();

            MutexGuard::unlocked(&mut state, || item.dispatch());
        }

        let dropped = std::mem::take(&mut state.pending);
        drop(state);

        if !dropped.is_empty() {
            tracing::debug!(timer = %self.name, count = dropped.len(), "dropping deferred tasks on shutdown");
        }
        tracing::debug!(timer = %self.name, "timer stopped");
    }

    fn stop(&self) {
        self.state.lock().stopped = true;
        self.wake.notify_all();
        self.space_available.notify_all();
    }

    fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }
}

/// Cloneable scheduling handle held by queues.
#[derive(Clone)]
pub(crate) struct TimerHandle(Arc<TimerShared>);

impl TimerHandle {
    pub fn schedule<T>(&self, task: Task, deadline: Instant, target: T) -> Result<()>
    where
        T: HandOff + 'static,
    {
        self.0.schedule(task, deadline, Box::new(target))
    }
}

/// Owner of the timer thread. Dropping it stops the thread; anything still
/// pending is dropped without being handed off.
pub struct Timer {
    shared: Arc<TimerShared>,
    thread: Option<JoinHandle<()>>,
}

impl Timer {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(TimerShared {
            name: Arc::from(config.timer_thread_name.as_str()),
            state: Mutex::new(TimerState {
                pending: BinaryHeap::new(),
                next_seq: 0,
                stopped: false,
            }),
            wake: Condvar::new(),
            space_available: Condvar::new(),
            bound: Bound::new(config.pending_capacity, config.overflow_policy),
        });

        let runner = shared.clone();
        let thread = thread::Builder::new()
            .name(config.timer_thread_name.clone())
            .spawn(move || runner.run())
            .map_err(|e| Error::executor(format!("timer spawn failed: {}", e)))?;

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// Hand `task` to `target` once `deadline` has passed.
    pub fn schedule<T>(&self, task: Task, deadline: Instant, target: T) -> Result<()>
    where
        T: HandOff + 'static,
    {
        self.shared.schedule(task, deadline, Box::new(target))
    }

    pub(crate) fn handle(&self) -> TimerHandle {
        TimerHandle(self.shared.clone())
    }

    /// Number of deferred tasks not yet handed off.
    pub fn pending(&self) -> usize {
        self.shared.pending()
    }

    pub fn shutdown(&mut self) {
        self.shared.stop();

        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                tracing::warn!(timer = %self.shared.name, "timer thread exited with a panic");
            }
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("name", &self.shared.name)
            .field("pending", &self.pending())
            .finish()
    }
}
