use super::task::{Task, TaskId};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanicStrategy {
    Abort,
    Isolate,
    #[default]
    LogAndContinue,
}

/// A task panic caught at its execution site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    /// Pool or queue name the task ran under.
    pub origin: String,
    pub task: TaskId,
    pub message: String,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} task {} panicked: {}", self.origin, self.task, self.message)
    }
}

/// Caller hook for task failures.
#[derive(Clone)]
pub struct FailureObserver(pub(crate) Arc<dyn Fn(&TaskFailure) + Send + Sync>);

impl FailureObserver {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&TaskFailure) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    fn notify(&self, failure: &TaskFailure) {
        (self.0)(failure)
    }
}

impl fmt::Debug for FailureObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FailureObserver(..)")
    }
}

pub struct PanicHandler {
    strategy: PanicStrategy,
    observer: Option<FailureObserver>,
    panic_count: AtomicUsize,
}

impl PanicHandler {
    pub fn new(strategy: PanicStrategy) -> Self {
        Self {
            strategy,
            observer: None,
            panic_count: AtomicUsize::new(0),
        }
    }

    pub fn with_observer(mut self, observer: Option<FailureObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn execute<F, R>(&self, f: F) -> Result<R, PanicInfo>
    where
        F: FnOnce() -> R,
    {
        catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
            self.panic_count.fetch_add(1, Ordering::Relaxed);
            PanicInfo::from_payload(payload)
        })
    }

    /// Run `task`, turning a panic into a logged [`TaskFailure`].
    ///
    /// `fallback_origin` names the task when it carries no origin of its own.
    pub fn run_task(&self, task: Task, fallback_origin: &str) -> Result<(), TaskFailure> {
        let id = task.id;
        let origin = task.origin.clone();

        match self.execute(|| task.execute()) {
            Ok(()) => Ok(()),
            Err(info) => {
                let failure = TaskFailure {
                    origin: origin.as_deref().unwrap_or(fallback_origin).to_string(),
                    task: id,
                    message: info.message,
                };
                self.report(&failure);
                Err(failure)
            }
        }
    }

    fn report(&self, failure: &TaskFailure) {
        match self.strategy {
            PanicStrategy::Abort => {
                tracing::error!(
                    origin = %failure.origin,
                    task = %failure.task,
                    "task panicked (abort strategy): {}",
                    failure.message
                );
                std::process::abort();
            }
            PanicStrategy::Isolate => {}
            PanicStrategy::LogAndContinue => {
                tracing::error!(
                    origin = %failure.origin,
                    task = %failure.task,
                    "task panicked: {}",
                    failure.message
                );
            }
        }

        if let Some(observer) = &self.observer {
            observer.notify(failure);
        }
    }

    pub fn panic_count(&self) -> usize {
        self.panic_count.load(Ordering::Relaxed)
    }
}

impl Default for PanicHandler {
    fn default() -> Self {
        Self::new(PanicStrategy::default())
    }
}

impl fmt::Debug for PanicHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanicHandler")
            .field("strategy", &self.strategy)
            .field("observer", &self.observer)
            .field("panic_count", &self.panic_count())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PanicInfo {
    pub message: String,
}

impl PanicInfo {
    fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        Self { message }
    }
}
