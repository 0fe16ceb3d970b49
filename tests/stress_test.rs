//! Stress tests for the dispatch runtime

mod common;

use common::wait_until_with;
use parking_lot::Mutex;
use qos_dispatch::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
#[ignore] // Run with --ignored flag
fn stress_test_many_serial_queues() {
    let rt = Runtime::new(Config::default()).unwrap();
    let queues: Vec<_> = (0..32)
        .map(|i| rt.queue(format!("serial-{}", i), QueueKind::Serial, Priority::ALL[i % 4]))
        .collect();
    let logs: Vec<_> = (0..32).map(|_| Arc::new(Mutex::new(Vec::new()))).collect();

    for n in 0..1_000 {
        for (queue, log) in queues.iter().zip(&logs) {
            let log = log.clone();
            queue.enqueue(move || log.lock().push(n)).unwrap();
        }
    }

    assert!(wait_until_with(
        || logs.iter().all(|log| log.lock().len() == 1_000),
        Duration::from_secs(60),
        Duration::from_millis(10),
    ));
    for log in &logs {
        assert_eq!(*log.lock(), (0..1_000).collect::<Vec<_>>());
    }
}

#[test]
#[ignore]
fn stress_test_concurrent_submitters() {
    let rt = Arc::new(Runtime::new(Config::default()).unwrap());
    let queue = rt.queue("shared", QueueKind::Serial, Priority::UserInitiated);
    let counter = Arc::new(AtomicUsize::new(0));

    let submitters: Vec<_> = (0..8)
        .map(|_| {
            let queue = queue.clone();
            let counter = counter.clone();
            thread::spawn(move || {
                for _ in 0..10_000 {
                    let counter = counter.clone();
                    queue
                        .enqueue(move || {
                            counter.fetch_add(1, Ordering::Relaxed);
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for submitter in submitters {
        submitter.join().unwrap();
    }

    assert!(wait_until_with(
        || counter.load(Ordering::Relaxed) == 80_000,
        Duration::from_secs(60),
        Duration::from_millis(10),
    ));
}

#[test]
#[ignore]
fn stress_test_many_deferred_tasks() {
    let rt = Runtime::new(Config::default()).unwrap();
    let queue = rt.queue("deferred", QueueKind::Concurrent, Priority::Utility);
    let early = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    for i in 0..5_000u64 {
        let deadline = start + Duration::from_micros((i * 37) % 200_000);
        let early = early.clone();
        let done = done.clone();
        queue
            .enqueue_at(deadline, move || {
                if Instant::now() < deadline {
                    early.fetch_add(1, Ordering::Relaxed);
                }
                done.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
    }

    assert!(wait_until_with(
        || done.load(Ordering::Relaxed) == 5_000,
        Duration::from_secs(60),
        Duration::from_millis(10),
    ));
    assert_eq!(early.load(Ordering::Relaxed), 0);
}

#[test]
#[ignore]
fn stress_test_blocking_callers() {
    let rt = Arc::new(Runtime::new(Config::builder().num_threads(4).build().unwrap()).unwrap());
    let queue = rt.queue("sync", QueueKind::Serial, Priority::Utility);
    let counter = Arc::new(AtomicUsize::new(0));

    let callers: Vec<_> = (0..16)
        .map(|_| {
            let queue = queue.clone();
            let counter = counter.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    let counter = counter.clone();
                    queue
                        .enqueue_blocking(move || {
                            counter.fetch_add(1, Ordering::Relaxed);
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for caller in callers {
        caller.join().unwrap();
    }
    assert_eq!(counter.load(Ordering::Relaxed), 8_000);
}
