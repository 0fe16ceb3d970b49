//! Execution-context token: which serial queue, if any, the current thread
//! is draining right now.

use super::QueueId;
use std::cell::Cell;

thread_local! {
    static DRAINING: Cell<Option<QueueId>> = const { Cell::new(None) };
}

pub(crate) fn current() -> Option<QueueId> {
    DRAINING.with(|cell| cell.get())
}

/// Mark the current thread as draining `queue` until the guard drops.
pub(crate) fn enter(queue: QueueId) -> DrainGuard {
    let previous = DRAINING.with(|cell| cell.replace(Some(queue)));
    DrainGuard { previous }
}

pub(crate) struct DrainGuard {
    previous: Option<QueueId>,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        DRAINING.with(|cell| cell.set(self.previous));
    }
}
