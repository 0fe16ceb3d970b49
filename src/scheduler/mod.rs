//! Scheduling structures: the pool's priority-ordered ready set and the
//! deadline timer that feeds deferred work back into queues.

pub(crate) mod priority;
pub mod timer;

pub use timer::{HandOff, Timer};
