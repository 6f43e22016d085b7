use spin::Mutex as SpinMutex;
use std::fmt;

use super::wait_queue::WaitQueue;
use crate::System;

/// A counting semaphore.
///
/// [`Self::p`] blocks while the value is zero; [`Self::v`] wakes up the
/// oldest waiter. A woken waiter re-checks the value when it resumes, so a
/// third thread may take the unit first.
pub struct Semaphore {
    system: System,
    name: String,
    state: SpinMutex<SemaphoreState>,
}

struct SemaphoreState {
    value: u32,
    wait_queue: WaitQueue,
}

impl Semaphore {
    pub fn new(system: &System, name: &str, initial_value: u32) -> Self {
        Self {
            system: system.clone(),
            name: name.to_owned(),
            state: SpinMutex::new(SemaphoreState {
                value: initial_value,
                wait_queue: WaitQueue::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current value.
    pub fn value(&self) -> u32 {
        self.state.lock().value
    }

    /// Wait until the value is positive, then decrement it.
    pub fn p(&self) {
        self.system.expect_task_context();
        let _guard = self.system.atomic_section();

        loop {
            let current = self.system.current_thread();
            {
                let mut state = self.state.lock();
                if state.value > 0 {
                    state.value -= 1;
                    return;
                }
                state.wait_queue.push_back(current);
            }

            log::trace!("{current} waits on semaphore {:?}", self.name);
            self.system.sleep();
        }
    }

    /// Increment the value and wake up the oldest waiter, if any.
    pub fn v(&self) {
        let _guard = self.system.atomic_section();
        let mut state = self.state.lock();
        if let Some(thread) = state.wait_queue.pop_front() {
            log::trace!("semaphore {:?} wakes up {thread}", self.name);
            self.system.ready_to_run(thread);
        }
        state.value += 1;
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        let waiters = self.state.get_mut().wait_queue.len();
        if waiters > 0 {
            log::warn!(
                "semaphore {:?} dropped with {waiters} waiting thread(s)",
                self.name
            );
        }
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Semaphore")
            .field("name", &self.name)
            .field("value", &state.value)
            .field("waiters", &state.wait_queue)
            .finish()
    }
}
