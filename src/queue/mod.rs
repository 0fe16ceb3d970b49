//! Dispatch queues: logical execution contexts on top of the worker pool.
//!
//! A [`QueueKind::Serial`] queue runs at most one task at a time, in
//! submission order, hopping between pool workers as it drains. A
//! [`QueueKind::Concurrent`] queue forwards every task straight to the pool.
//!
//! ```no_run
//! use qos_dispatch::{DispatchQueue, Priority, QueueKind};
//! use std::time::Duration;
//!
//! let queue = DispatchQueue::new("db-writer", QueueKind::Serial, Priority::Utility);
//! queue.enqueue(|| println!("first")).unwrap();
//! queue.enqueue_after(Duration::from_millis(50), || println!("later")).unwrap();
//! queue.enqueue_blocking(|| println!("after first")).unwrap();
//! ```

mod completion;
pub(crate) mod context;

use crate::error::{Error, Result};
use crate::executor::worker_pool::PoolHandle;
use crate::executor::{Priority, Task};
use crate::runtime::{self, Runtime};
use crate::scheduler::timer::{HandOff, TimerHandle};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

static QUEUE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique queue identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(u64);

impl QueueId {
    pub(crate) fn next() -> Self {
        QueueId(QUEUE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// One task in flight at a time, FIFO.
    Serial,
    /// No ordering; limited only by pool parallelism.
    Concurrent,
}

#[derive(Debug, Default)]
struct SerialState {
    pending: VecDeque<Task>,
    draining: bool,
}

struct QueueInner {
    id: QueueId,
    name: Arc<str>,
    kind: QueueKind,
    priority: Priority,
    pool: PoolHandle,
    timer: TimerHandle,
    serial: Mutex<SerialState>,
}

impl QueueInner {
    /// Pop the FIFO head and hand it to the pool, or go idle when empty.
    ///
    /// Runs under the serial lock. A continuation refused by a stopped pool
    /// is returned so the caller drops it after unlocking.
    fn submit_next(self: &Arc<Self>, state: &mut SerialState) -> std::result::Result<(), Task> {
        let Some(task) = state.pending.pop_front() else {
            state.draining = false;
            return Ok(());
        };

        let ticket = DrainTicket {
            queue: Some(self.clone()),
        };
        let continuation = Task::new(move || ticket.run(task)).with_origin(self.name.clone());
        self.pool.submit_unbounded(continuation, self.priority)
    }

    /// Called on a pool worker once the in-flight task is done.
    fn finish_one(self: &Arc<Self>) {
        let refused = {
            let mut state = self.serial.lock();
            self.submit_next(&mut state).err()
        };
        drop(refused);
    }

    /// The in-flight continuation was dropped unexecuted: reset to idle and
    /// release everything still waiting.
    fn abandon(&self) {
        let dropped = {
            let mut state = self.serial.lock();
            state.draining = false;
            std::mem::take(&mut state.pending)
        };

        if !dropped.is_empty() {
            tracing::warn!(
                queue = %self.name,
                count = dropped.len(),
                "worker pool stopped, dropping pending serial tasks"
            );
        }
    }
}

/// Owned by the continuation of a serial queue. If the continuation is
/// dropped without running, the queue is reset instead of stalling.
struct DrainTicket {
    queue: Option<Arc<QueueInner>>,
}

impl DrainTicket {
    fn run(mut self, task: Task) {
        let Some(queue) = self.queue.take() else {
            return;
        };

        {
            let _context = context::enter(queue.id);
            // failure already logged and reported by the handler
            let _ = queue.pool.panic_handler().run_task(task, &queue.name);
        }

        queue.finish_one();
    }
}

impl Drop for DrainTicket {
    fn drop(&mut self) {
        if let Some(queue) = self.queue.take() {
            queue.abandon();
        }
    }
}

/// Handle to a dispatch queue. Clones share the same queue.
///
/// Deferred tasks and in-flight continuations hold their own handle, so
/// the queue stays alive until all work referring to it has finished.
#[derive(Clone)]
pub struct DispatchQueue {
    inner: Arc<QueueInner>,
}

impl DispatchQueue {
    /// Create a queue on the default runtime.
    pub fn new<S: Into<String>>(name: S, kind: QueueKind, priority: Priority) -> Self {
        Self::with_runtime(runtime::global(), name, kind, priority)
    }

    pub fn serial<S: Into<String>>(name: S) -> Self {
        Self::new(name, QueueKind::Serial, Priority::default())
    }

    pub fn concurrent<S: Into<String>>(name: S) -> Self {
        Self::new(name, QueueKind::Concurrent, Priority::default())
    }

    pub fn with_runtime<S: Into<String>>(
        runtime: &Runtime,
        name: S,
        kind: QueueKind,
        priority: Priority,
    ) -> Self {
        Self::from_parts(
            name.into(),
            kind,
            priority,
            runtime.pool().handle(),
            runtime.timer().handle(),
        )
    }

    pub(crate) fn from_parts(
        name: String,
        kind: QueueKind,
        priority: Priority,
        pool: PoolHandle,
        timer: TimerHandle,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                id: QueueId::next(),
                name: Arc::from(name),
                kind,
                priority,
                pool,
                timer,
                serial: Mutex::new(SerialState::default()),
            }),
        }
    }

    /// The process-wide concurrent queue for `priority` on the default
    /// runtime. Always the same instance for the same priority.
    pub fn global(priority: Priority) -> &'static DispatchQueue {
        runtime::global().global_queue(priority)
    }

    pub fn id(&self) -> QueueId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn kind(&self) -> QueueKind {
        self.inner.kind
    }

    pub fn priority(&self) -> Priority {
        self.inner.priority
    }

    /// Tasks waiting behind the in-flight one. Always 0 for concurrent queues.
    pub fn pending(&self) -> usize {
        self.inner.serial.lock().pending.len()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.serial.lock().draining
    }

    /// Submit `f` without waiting for it.
    pub fn enqueue<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue_task(self.task(f))
    }

    fn enqueue_task(&self, task: Task) -> Result<()> {
        match self.inner.kind {
            QueueKind::Concurrent => self.inner.pool.submit(task, self.inner.priority),
            QueueKind::Serial => self.enqueue_serial(task),
        }
    }

    fn enqueue_serial(&self, task: Task) -> Result<()> {
        let refused = {
            let mut state = self.inner.serial.lock();
            state.pending.push_back(task);
            if state.draining {
                return Ok(());
            }
            state.draining = true;
            self.inner.submit_next(&mut state).err()
        };

        match refused {
            None => Ok(()),
            Some(continuation) => {
                // dropping it resets the queue through its ticket
                drop(continuation);
                Err(Error::ShutDown)
            }
        }
    }

    /// Submit `f` and block until it has run.
    ///
    /// On a serial queue the task joins the FIFO behind everything already
    /// enqueued. Returns [`Error::TaskFailed`] if the task panicked and
    /// [`Error::Evicted`] if a `DropOldest` pool discarded it first.
    ///
    /// # Panics
    ///
    /// Panics when called on a serial queue from a task that queue is
    /// currently running, since that call could never complete.
    pub fn enqueue_blocking<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.inner.kind == QueueKind::Serial && context::current() == Some(self.inner.id) {
            panic!(
                "enqueue_blocking called on serial queue `{}` from its own draining task",
                self.inner.name
            );
        }

        let (completer, waiter) = completion::channel();
        let cancel = completer.canceller();
        let task = self.task(f);
        let inner = self.inner.clone();
        let wrapper = Task::new(move || {
            let outcome = inner
                .pool
                .panic_handler()
                .run_task(task, &inner.name)
                .map_err(|failure| Error::TaskFailed(failure.message));
            completer.complete(outcome);
        })
        .with_origin(self.inner.name.clone())
        .on_cancel(cancel);

        self.enqueue_task(wrapper)?;
        waiter.wait()
    }

    /// Submit `f` once `deadline` has passed.
    pub fn enqueue_at<F>(&self, deadline: Instant, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.timer.schedule(self.task(f), deadline, self.clone())
    }

    pub fn enqueue_after<F>(&self, delay: Duration, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue_at(Instant::now() + delay, f)
    }

    fn task<F>(&self, f: F) -> Task
    where
        F: FnOnce() + Send + 'static,
    {
        Task::new(f).with_origin(self.inner.name.clone())
    }
}

// Deferred tasks were admitted against the timer's pending set. Passing
// them on must not block the timer thread, so they skip the ready-set bound.
impl HandOff for DispatchQueue {
    fn hand_off(&self, task: Task) -> Result<()> {
        match self.inner.kind {
            QueueKind::Concurrent => self
                .inner
                .pool
                .submit_unbounded(task, self.inner.priority)
                .map_err(|_refused| Error::ShutDown),
            QueueKind::Serial => self.enqueue_serial(task),
        }
    }

    fn label(&self) -> &str {
        self.name()
    }
}

impl PartialEq for DispatchQueue {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for DispatchQueue {}

impl fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .field("priority", &self.inner.priority)
            .finish()
    }
}
