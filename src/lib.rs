//! qos-dispatch - priority worker pool, dispatch queues and a deadline timer
//!
//! An in-process task-dispatch library built from three pieces:
//!
//! - [`WorkerPool`]: a fixed set of threads pulling the highest-priority
//!   work from a shared ready set.
//! - [`DispatchQueue`]: a *serial* (one at a time, FIFO) or *concurrent*
//!   execution context on top of the pool.
//! - [`Timer`]: a single thread that hands deferred tasks to their queue
//!   once the deadline passes.
//!
//! # Quick Start
//!
//! ```no_run
//! use qos_dispatch::prelude::*;
//! use std::time::Duration;
//!
//! let log = DispatchQueue::serial("log-writer");
//! log.enqueue(|| println!("first")).unwrap();
//! log.enqueue(|| println!("second")).unwrap();
//!
//! DispatchQueue::global(Priority::UserInitiated)
//!     .enqueue_after(Duration::from_millis(10), || println!("deferred"))
//!     .unwrap();
//! ```
//!
//! # Priorities
//!
//! [`Priority`] orders work inside the pool, from `Background` up to
//! `UserInteractive`. It is a preference, not a real-time guarantee; items
//! in the same tier come out in no particular order.
//!
//! # Failures
//!
//! A panicking task is caught where it runs, logged through `tracing`, and
//! passed to the optional failure observer in [`Config`]. It never takes a
//! worker thread down.

// Lint configuration
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod queue;
pub mod runtime;
pub mod scheduler;
pub mod util;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use executor::{
    FailureObserver, PanicStrategy, PoolStats, Priority, Task, TaskFailure, TaskId, WorkerPool,
};
pub use queue::{DispatchQueue, QueueId, QueueKind};
pub use runtime::{init_with_config, Runtime};
pub use scheduler::{HandOff, Timer};
pub use util::OverflowPolicy;
