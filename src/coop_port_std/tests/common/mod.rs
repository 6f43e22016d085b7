//! Utilities shared by the integration tests
#![allow(dead_code)]
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

/// An atomic counter for checking an execution sequence.
#[derive(Debug, Default)]
pub struct SeqTracker {
    counter: AtomicUsize,
}

impl SeqTracker {
    pub const fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }

    pub fn get(&self) -> usize {
        self.counter.load(Ordering::Relaxed)
    }

    /// Assert that the counter is equal to `old` and then replace it with
    /// `new`.
    #[track_caller]
    pub fn expect_and_replace(&self, old: usize, new: usize) {
        let got = self.counter.load(Ordering::Relaxed);
        log::debug!("{got} (expected: {old}) → {new}");
        assert_eq!(got, old, "expected {old}, got {got}");
        self.counter.store(new, Ordering::Relaxed);
    }
}

/// A list of events recorded by simulated threads.
#[derive(Debug, Default)]
pub struct EventLog<T> {
    events: Mutex<Vec<T>>,
}

impl<T: Clone> EventLog<T> {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, event: T) {
        self.events.lock().unwrap().push(event);
    }

    pub fn get(&self) -> Vec<T> {
        self.events.lock().unwrap().clone()
    }
}
