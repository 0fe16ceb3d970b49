use super::panic_handler::PanicHandler;
use super::task::{Priority, Task};
use super::worker::{self, PoolCounters, PoolStats, WorkerId};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::scheduler::priority::{ReadySet, WorkItem};
use crate::util::{Admission, Bound};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub(crate) struct PoolState {
    pub ready: ReadySet,
    pub stopped: bool,
}

/// State shared between the pool owner, its workers and queue handles.
pub(crate) struct PoolShared {
    pub name: Arc<str>,
    pub state: Mutex<PoolState>,
    pub work_available: Condvar,
    pub space_available: Condvar,
    pub bound: Bound,
    pub panic_handler: PanicHandler,
    pub counters: PoolCounters,
}

impl PoolShared {
    fn push(&self, task: Task, priority: Priority) -> Result<()> {
        let mut evicted: Option<WorkItem> = None;
        let mut state = self.state.lock();

        loop {
            if state.stopped {
                return Err(Error::ShutDown);
            }
            match self.bound.admit(state.ready.bounded_len()) {
                Admission::Admit => break,
                Admission::Wait => self.space_available.wait(&mut state),
                Admission::Reject => {
                    drop(state);
                    return Err(self.reject(&task));
                }
                Admission::EvictOldest => match state.ready.evict_oldest() {
                    Some(item) => {
                        evicted = Some(item);
                        break;
                    }
                    None => {
                        drop(state);
                        return Err(self.reject(&task));
                    }
                },
            }
        }

        state.ready.push(task, priority);
        drop(state);

        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        self.work_available.notify_one();

        if let Some(item) = evicted {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                pool = %self.name,
                task = %item.task.id(),
                priority = %item.priority,
                "ready set full, dropped oldest task"
            );
            item.task.cancel(Error::Evicted("ready set"));
        }
        Ok(())
    }

    fn reject(&self, task: &Task) -> Error {
        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(pool = %self.name, task = %task.id(), "ready set full, rejecting task");
        Error::Rejected("ready set")
    }

    /// Push past the bound. The item is exempt from eviction. On a stopped
    /// pool the task is handed back so the caller can drop it after
    /// releasing its own locks.
    fn push_unbounded(&self, task: Task, priority: Priority) -> std::result::Result<(), Task> {
        {
            let mut state = self.state.lock();
            if state.stopped {
                drop(state);
                return Err(task);
            }
            state.ready.push_exempt(task, priority);
        }

        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        self.work_available.notify_one();
        Ok(())
    }

    fn stop(&self) -> Vec<WorkItem> {
        let leftover = {
            let mut state = self.state.lock();
            state.stopped = true;
            state.ready.take_all()
        };
        self.work_available.notify_all();
        self.space_available.notify_all();
        leftover
    }

    fn stats(&self) -> PoolStats {
        let pending = self.state.lock().ready.len();
        self.counters
            .snapshot(self.panic_handler.panic_count() as u64, pending)
    }
}

/// Cloneable submission handle held by queues.
#[derive(Clone)]
pub(crate) struct PoolHandle(Arc<PoolShared>);

impl PoolHandle {
    pub fn submit(&self, task: Task, priority: Priority) -> Result<()> {
        self.0.push(task, priority)
    }

    pub fn submit_unbounded(
        &self,
        task: Task,
        priority: Priority,
    ) -> std::result::Result<(), Task> {
        self.0.push_unbounded(task, priority)
    }

    pub fn panic_handler(&self) -> &PanicHandler {
        &self.0.panic_handler
    }
}

/// Fixed set of worker threads draining a shared priority-ordered ready set.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Vec<WorkerHandle>,
    num_threads: usize,
}

struct WorkerHandle {
    id: WorkerId,
    thread: Option<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let num_threads = config.worker_threads();
        if num_threads == 0 {
            return Err(Error::config("need at least 1 thread"));
        }

        let shared = Arc::new(PoolShared {
            name: Arc::from(config.thread_name_prefix.as_str()),
            state: Mutex::new(PoolState {
                ready: ReadySet::new(),
                stopped: false,
            }),
            work_available: Condvar::new(),
            space_available: Condvar::new(),
            bound: Bound::new(config.ready_capacity, config.overflow_policy),
            panic_handler: PanicHandler::new(config.panic_strategy)
                .with_observer(config.failure_observer.clone()),
            counters: PoolCounters::default(),
        });

        let mut pool = Self {
            shared,
            workers: Vec::with_capacity(num_threads),
            num_threads,
        };

        for id in 0..num_threads {
            let shared = pool.shared.clone();
            let name = format!("{}-{}", config.thread_name_prefix, id);

            let mut builder = thread::Builder::new().name(name);
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            // on failure `pool` drops here and joins what already started
            let thread = builder
                .spawn(move || worker::run(shared, id))
                .map_err(|e| Error::executor(format!("spawn failed: {}", e)))?;

            pool.workers.push(WorkerHandle {
                id,
                thread: Some(thread),
            });
        }

        tracing::debug!(pool = %pool.shared.name, threads = num_threads, "worker pool started");
        Ok(pool)
    }

    /// Queue `task` at `priority` and wake one idle worker.
    ///
    /// Unbounded pools never block here. With a `ready_capacity` the
    /// configured [`OverflowPolicy`](crate::OverflowPolicy) decides.
    pub fn submit(&self, task: Task, priority: Priority) -> Result<()> {
        self.shared.push(task, priority)
    }

    pub fn execute<F>(&self, f: F, priority: Priority) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Task::new(f), priority)
    }

    pub(crate) fn handle(&self) -> PoolHandle {
        PoolHandle(self.shared.clone())
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Number of items waiting in the ready set.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().ready.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.shared.stats()
    }

    /// Stop all workers and join them. Queued work is dropped unexecuted.
    pub fn shutdown(&mut self) {
        let leftover = self.shared.stop();
        if !leftover.is_empty() {
            self.shared
                .counters
                .dropped
                .fetch_add(leftover.len() as u64, Ordering::Relaxed);
            tracing::debug!(
                pool = %self.shared.name,
                count = leftover.len(),
                "dropping queued tasks on shutdown"
            );
        }
        // dropped outside the pool lock: items may own queue continuations
        drop(leftover);

        let current = thread::current().id();
        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if thread.thread().id() == current {
                    continue;
                }
                if thread.join().is_err() {
                    tracing::warn!(pool = %self.shared.name, worker = worker.id, "worker exited with a panic");
                }
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.shared.name)
            .field("num_threads", &self.num_threads)
            .field("pending", &self.pending())
            .finish()
    }
}
