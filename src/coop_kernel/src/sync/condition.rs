use spin::Mutex as SpinMutex;
use std::fmt;

use super::{lock::Lock, wait_queue::WaitQueue};
use crate::System;

/// A condition variable with Mesa semantics.
///
/// Every operation takes the [`Lock`] protecting the condition and panics if
/// the calling thread does not hold it. A woken waiter is merely made ready
/// and must re-check its predicate after [`Self::wait`] returns.
pub struct Condition {
    system: System,
    name: String,
    wait_queue: SpinMutex<WaitQueue>,
}

impl Condition {
    pub fn new(system: &System, name: &str) -> Self {
        Self {
            system: system.clone(),
            name: name.to_owned(),
            wait_queue: SpinMutex::new(WaitQueue::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Release `lock`, wait for a signal, then re-acquire `lock`.
    #[track_caller]
    pub fn wait(&self, lock: &Lock) {
        self.system.expect_task_context();
        self.expect_held(lock, "wait");

        let _guard = self.system.atomic_section();
        let current = self.system.current_thread();
        self.wait_queue.lock().push_back(current);
        log::trace!("{current} waits on condition {:?}", self.name);

        lock.release();
        self.system.sleep();
        lock.acquire();
    }

    /// Wake up the oldest waiter, if any.
    #[track_caller]
    pub fn signal(&self, lock: &Lock) {
        self.expect_held(lock, "signal");

        let _guard = self.system.atomic_section();
        let mut wait_queue = self.wait_queue.lock();
        if let Some(thread) = wait_queue.pop_front() {
            log::trace!("condition {:?} wakes up {thread}", self.name);
            self.system.ready_to_run(thread);
        }
    }

    /// Wake up every waiter, oldest first.
    #[track_caller]
    pub fn broadcast(&self, lock: &Lock) {
        self.expect_held(lock, "broadcast");

        let _guard = self.system.atomic_section();
        let mut wait_queue = self.wait_queue.lock();
        for thread in wait_queue.drain() {
            log::trace!("condition {:?} wakes up {thread}", self.name);
            self.system.ready_to_run(thread);
        }
    }

    /// The number of threads waiting.
    pub fn waiters(&self) -> usize {
        self.wait_queue.lock().len()
    }

    #[track_caller]
    fn expect_held(&self, lock: &Lock, op: &str) {
        assert!(
            lock.is_held_by_current_thread(),
            "{} called `{op}` on condition {:?} without holding lock {:?}",
            self.system.current_thread(),
            self.name,
            lock.name()
        );
    }
}

impl Drop for Condition {
    fn drop(&mut self) {
        let waiters = self.wait_queue.get_mut().len();
        if waiters > 0 {
            log::warn!(
                "condition {:?} dropped with {waiters} waiting thread(s)",
                self.name
            );
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("name", &self.name)
            .field("waiters", &*self.wait_queue.lock())
            .finish()
    }
}
