//! Task representation and execution.

use crate::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Quality-of-service class, ascending.
///
/// Only used as a comparison key inside the worker pool; it gives no
/// real-time guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Priority {
    Background = 0,
    #[default]
    Utility = 1,
    UserInitiated = 2,
    UserInteractive = 3,
}

impl Priority {
    /// All tiers, lowest first.
    pub const ALL: [Priority; 4] = [
        Priority::Background,
        Priority::Utility,
        Priority::UserInitiated,
        Priority::UserInteractive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Background => "background",
            Priority::Utility => "utility",
            Priority::UserInitiated => "user-initiated",
            Priority::UserInteractive => "user-interactive",
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type CancelHook = Box<dyn FnOnce(Error) + Send + 'static>;

/// A unit of work: runs once, returns nothing, may panic.
pub struct Task {
    pub(crate) id: TaskId,
    pub(crate) func: Box<dyn FnOnce() + Send + 'static>,
    /// Name of the queue that submitted the task, for diagnostics.
    pub(crate) origin: Option<Arc<str>>,
    pub(crate) spawn_time: Instant,
    on_cancel: Option<CancelHook>,
}

impl Task {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Task {
            id: TaskId::next(),
            func: Box::new(f),
            origin: None,
            spawn_time: Instant::now(),
            on_cancel: None,
        }
    }

    /// Called with the reason when the task is discarded by [`Task::cancel`].
    pub(crate) fn on_cancel<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(Error) + Send + 'static,
    {
        self.on_cancel = Some(Box::new(hook));
        self
    }

    /// Discard the task without running it.
    pub(crate) fn cancel(mut self, reason: Error) {
        if let Some(hook) = self.on_cancel.take() {
            hook(reason);
        }
    }

    pub fn with_origin(mut self, origin: Arc<str>) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Execute the task
    pub fn execute(self) {
        (self.func)();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("origin", &self.origin)
            .field("spawn_time", &self.spawn_time)
            .finish()
    }
}
