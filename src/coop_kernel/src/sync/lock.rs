use spin::Mutex as SpinMutex;
use std::fmt;

use super::wait_queue::WaitQueue;
use crate::{thread::ThreadId, System};

/// A mutual-exclusion lock with an owner.
///
/// Only the owner may release it; releasing a lock held by another thread
/// (or by nobody) panics. The lock is not reentrant: a thread acquiring a
/// lock it already holds blocks forever.
pub struct Lock {
    system: System,
    name: String,
    state: SpinMutex<LockState>,
}

struct LockState {
    /// `None` iff the lock is free.
    owner: Option<ThreadId>,
    wait_queue: WaitQueue,
}

impl Lock {
    pub fn new(system: &System, name: &str) -> Self {
        Self {
            system: system.clone(),
            name: name.to_owned(),
            state: SpinMutex::new(LockState {
                owner: None,
                wait_queue: WaitQueue::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait until the lock is free, then take it.
    pub fn acquire(&self) {
        self.system.expect_task_context();
        let _guard = self.system.atomic_section();

        loop {
            let current = self.system.current_thread();
            {
                let mut state = self.state.lock();
                if state.owner.is_none() {
                    state.owner = Some(current);
                    return;
                }
                state.wait_queue.push_back(current);
            }

            log::trace!("{current} waits on lock {:?}", self.name);
            self.system.sleep();
        }
    }

    /// Release the lock and wake up the oldest waiter, if any.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread does not hold the lock.
    #[track_caller]
    pub fn release(&self) {
        let _guard = self.system.atomic_section();
        let current = self.system.current_thread();
        let mut state = self.state.lock();

        assert_eq!(
            state.owner,
            Some(current),
            "{current} released lock {:?}, which it does not hold",
            self.name
        );

        if let Some(thread) = state.wait_queue.pop_front() {
            log::trace!("lock {:?} wakes up {thread}", self.name);
            self.system.ready_to_run(thread);
        }
        state.owner = None;
    }

    /// Return `true` if the calling thread holds the lock.
    pub fn is_held_by_current_thread(&self) -> bool {
        let current = self.system.current_thread();
        self.state.lock().owner == Some(current)
    }

    /// Return `true` if some thread holds the lock.
    pub fn is_locked(&self) -> bool {
        self.state.lock().owner.is_some()
    }

    /// The thread holding the lock.
    pub fn owner(&self) -> Option<ThreadId> {
        self.state.lock().owner
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        let waiters = self.state.get_mut().wait_queue.len();
        if waiters > 0 {
            log::warn!(
                "lock {:?} dropped with {waiters} waiting thread(s)",
                self.name
            );
        }
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Lock")
            .field("name", &self.name)
            .field("owner", &state.owner)
            .field("waiters", &state.wait_queue)
            .finish()
    }
}
