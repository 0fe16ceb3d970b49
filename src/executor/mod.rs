//! Task execution infrastructure.
//!
//! This module provides the core task execution primitives: the task type,
//! panic isolation, and the priority-ordered worker pool.

pub mod panic_handler;
pub mod task;
pub mod worker;
pub mod worker_pool;

pub use panic_handler::{FailureObserver, PanicHandler, PanicStrategy, TaskFailure};
pub use task::{Priority, Task, TaskId};
pub use worker::PoolStats;
pub use worker_pool::WorkerPool;
