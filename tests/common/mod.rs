//! Polling helper shared by integration tests.

use std::thread;
use std::time::{Duration, Instant};

/// Poll `condition` every `interval` until it holds or `timeout` elapses.
pub fn wait_until_with<F>(condition: F, timeout: Duration, interval: Duration) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while !condition() {
        if start.elapsed() > timeout {
            return false;
        }
        thread::sleep(interval);
    }
    true
}

#[allow(dead_code)]
pub fn wait_until<F>(condition: F) -> bool
where
    F: Fn() -> bool,
{
    wait_until_with(condition, Duration::from_secs(5), Duration::from_millis(1))
}

/// Route runtime logs to the test harness. Set `RUST_LOG` to see them.
#[allow(dead_code)]
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
