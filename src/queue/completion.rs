//! One-shot completion signal for blocking enqueues.

use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

#[derive(Default)]
struct Outcome {
    result: Option<Result<()>>,
    settled: bool,
}

struct Slot {
    outcome: Mutex<Outcome>,
    done: Condvar,
}

impl Slot {
    // first outcome wins
    fn set(&self, result: Result<()>) {
        let mut outcome = self.outcome.lock();
        if outcome.settled {
            return;
        }
        outcome.settled = true;
        outcome.result = Some(result);
        drop(outcome);
        self.done.notify_one();
    }
}

pub(crate) fn channel() -> (Completer, Waiter) {
    let slot = Arc::new(Slot {
        outcome: Mutex::new(Outcome::default()),
        done: Condvar::new(),
    });
    (
        Completer {
            slot: Some(slot.clone()),
        },
        Waiter { slot },
    )
}

/// Sending half. Dropping it without completing releases the waiter with
/// [`Error::ShutDown`].
pub(crate) struct Completer {
    slot: Option<Arc<Slot>>,
}

impl Completer {
    pub fn complete(mut self, outcome: Result<()>) {
        if let Some(slot) = self.slot.take() {
            slot.set(outcome);
        }
    }

    /// Releases the waiter with a specific error, ahead of the generic
    /// [`Error::ShutDown`] the completer reports when it is dropped.
    pub fn canceller(&self) -> impl FnOnce(Error) + Send + 'static {
        let slot = self.slot.clone();
        move |reason| {
            if let Some(slot) = slot {
                slot.set(Err(reason));
            }
        }
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.set(Err(Error::ShutDown));
        }
    }
}

pub(crate) struct Waiter {
    slot: Arc<Slot>,
}

impl Waiter {
    pub fn wait(self) -> Result<()> {
        let mut outcome = self.slot.outcome.lock();
        loop {
            if let Some(result) = outcome.result.take() {
                return result;
            }
            self.slot.done.wait(&mut outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_complete_wakes_waiter() {
        let (completer, waiter) = channel();

        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            completer.complete(Ok(()));
        });

        assert!(waiter.wait().is_ok());
        sender.join().unwrap();
    }

    #[test]
    fn test_failure_is_delivered() {
        let (completer, waiter) = channel();
        completer.complete(Err(Error::task_failed("boom")));

        match waiter.wait() {
            Err(Error::TaskFailed(msg)) => assert_eq!(msg, "boom"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_dropped_completer_releases_waiter() {
        let (completer, waiter) = channel();
        drop(completer);

        assert!(matches!(waiter.wait(), Err(Error::ShutDown)));
    }

    #[test]
    fn test_cancel_reason_beats_drop() {
        let (completer, waiter) = channel();
        let cancel = completer.canceller();

        cancel(Error::Evicted("ready set"));
        drop(completer);

        assert!(matches!(waiter.wait(), Err(Error::Evicted("ready set"))));
    }
}
