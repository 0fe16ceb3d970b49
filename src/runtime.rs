//! Runtime: the service handle that owns the worker pool, the timer and the
//! four global concurrent queues.
//!
//! Most code uses the lazily created default runtime through
//! [`DispatchQueue::new`] and [`DispatchQueue::global`]. Tests and embedders
//! that want isolated threads can build their own with [`Runtime::new`] and
//! create queues with [`Runtime::queue`].

use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::{Priority, WorkerPool};
use crate::queue::{DispatchQueue, QueueKind};
use crate::scheduler::Timer;
use std::fmt;
use std::sync::OnceLock;

pub struct Runtime {
    // Drop order matters: queues, then the timer (no more hand-offs),
    // then the pool.
    globals: Vec<DispatchQueue>,
    timer: Timer,
    pool: WorkerPool,
    config: Config,
}

impl Runtime {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let pool = WorkerPool::new(&config)?;
        let timer = Timer::new(&config)?;

        let globals = Priority::ALL
            .iter()
            .map(|priority| {
                DispatchQueue::from_parts(
                    format!("global-{}", priority.as_str()),
                    QueueKind::Concurrent,
                    *priority,
                    pool.handle(),
                    timer.handle(),
                )
            })
            .collect();

        Ok(Self {
            globals,
            timer,
            pool,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// The concurrent queue shared by everything running at `priority`.
    pub fn global_queue(&self, priority: Priority) -> &DispatchQueue {
        &self.globals[priority.index()]
    }

    /// Create a queue backed by this runtime's pool and timer.
    pub fn queue<S: Into<String>>(&self, name: S, kind: QueueKind, priority: Priority) -> DispatchQueue {
        DispatchQueue::with_runtime(self, name, kind, priority)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("pool", &self.pool)
            .field("timer", &self.timer)
            .finish()
    }
}

// Default runtime. Statics are never dropped, so its threads live until
// the process exits.
static GLOBAL_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// The default runtime, started with [`Config::default`] on first use
/// unless [`init_with_config`] ran earlier.
///
/// # Panics
///
/// Panics if the default runtime's threads cannot be spawned.
pub fn global() -> &'static Runtime {
    GLOBAL_RUNTIME.get_or_init(|| match Runtime::new(Config::default()) {
        Ok(runtime) => runtime,
        Err(e) => panic!("failed to start default dispatch runtime: {}", e),
    })
}

/// Install a custom default runtime. Fails if one already exists.
pub fn init_with_config(config: Config) -> Result<&'static Runtime> {
    if GLOBAL_RUNTIME.get().is_some() {
        return Err(Error::AlreadyInitialized);
    }

    let runtime = Runtime::new(config)?;
    // lost a race with another initializer: the spare runtime shuts down here
    GLOBAL_RUNTIME
        .set(runtime)
        .map_err(|_| Error::AlreadyInitialized)?;

    Ok(global())
}
