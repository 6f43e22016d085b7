//! Threads
use slab::Slab;
use std::{fmt, ops};

use crate::{
    error::ForkError,
    interrupt::IntLevel,
    port::ThreadEntry,
    scheduler::{Dispatch, Priority},
    System,
};

/// Identifies a thread in a [`ThreadTable`].
///
/// A thread's id is released when the thread finishes and may be reused by a
/// thread created later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(usize);

impl ThreadId {
    /// Get the raw index of the thread table entry.
    pub const fn index(self) -> usize {
        self.0
    }

    #[cfg(test)]
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread #{}", self.0)
    }
}

/// The lifecycle state of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    /// Created but never made ready.
    JustCreated,
    /// Holding the processor.
    Running,
    /// In the ready queue.
    Ready,
    /// Waiting for a primitive to wake it up.
    Blocked,
}

/// *Thread control block* - the state data of a thread.
///
/// Read it through [`ThreadTable`]'s indexing; the kernel owns every field.
#[derive(Debug)]
pub struct ThreadCb {
    pub(crate) name: String,
    pub(crate) status: ThreadStatus,
    /// The priority value. Only the scheduler writes this.
    pub(crate) priority: Priority,
}

impl ThreadCb {
    pub(crate) fn new(name: &str, priority: Priority) -> Self {
        Self {
            name: name.to_owned(),
            status: ThreadStatus::JustCreated,
            priority,
        }
    }
}

/// A snapshot of one row of the thread table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub id: ThreadId,
    pub name: String,
    pub status: ThreadStatus,
    pub priority: Priority,
}

impl fmt::Display for ThreadInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>4}  {:<16} {:<12} {:>4}",
            self.id.0,
            self.name,
            format!("{:?}", self.status),
            self.priority
        )
    }
}

/// The table of all live threads of a [`System`], with a fixed capacity.
#[derive(Debug)]
pub struct ThreadTable {
    threads: Slab<ThreadCb>,
    capacity: usize,
}

impl ThreadTable {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            threads: Slab::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn insert(&mut self, thread_cb: ThreadCb) -> Result<ThreadId, ForkError> {
        if self.threads.len() >= self.capacity {
            return Err(ForkError::TooManyThreads);
        }
        Ok(ThreadId(self.threads.insert(thread_cb)))
    }

    pub(crate) fn remove(&mut self, thread: ThreadId) -> Option<ThreadCb> {
        if self.threads.contains(thread.0) {
            Some(self.threads.remove(thread.0))
        } else {
            None
        }
    }

    pub(crate) fn get(&self, thread: ThreadId) -> Option<&ThreadCb> {
        self.threads.get(thread.0)
    }

    /// The number of live threads.
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// The maximum number of live threads.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Take a snapshot of every row, ordered by thread id.
    pub fn snapshot(&self) -> Vec<ThreadInfo> {
        self.threads
            .iter()
            .map(|(i, cb)| ThreadInfo {
                id: ThreadId(i),
                name: cb.name.clone(),
                status: cb.status,
                priority: cb.priority,
            })
            .collect()
    }
}

impl ops::Index<ThreadId> for ThreadTable {
    type Output = ThreadCb;

    #[track_caller]
    fn index(&self, thread: ThreadId) -> &Self::Output {
        &self.threads[thread.0]
    }
}

impl ops::IndexMut<ThreadId> for ThreadTable {
    #[track_caller]
    fn index_mut(&mut self, thread: ThreadId) -> &mut Self::Output {
        &mut self.threads[thread.0]
    }
}

impl System {
    /// Create a thread running `entry` and make it ready.
    pub fn fork(
        &self,
        name: &str,
        entry: impl FnOnce() + Send + 'static,
    ) -> Result<ThreadId, ForkError> {
        let thread = self
            .state()
            .threads
            .insert(ThreadCb::new(name, self.kernel.cfg.create_priority))?;

        if let Err(e) = self
            .kernel
            .port
            .initialize_context(thread, name, self.thread_entry(entry))
        {
            self.state().threads.remove(thread);
            return Err(e);
        }

        log::debug!("forked {thread} ({name:?})");

        let _guard = self.atomic_section();
        self.ready_to_run(thread);
        Ok(thread)
    }

    /// Wrap a thread body with the start-up and finish sequences.
    pub(crate) fn thread_entry(&self, entry: impl FnOnce() + Send + 'static) -> ThreadEntry {
        let system = self.clone();
        Box::new(move || {
            system.reap();
            system.set_level(IntLevel::On);
            entry();
            system.finish();
        })
    }

    /// Relinquish the processor if another thread at least as urgent as the
    /// caller is ready. The caller stays runnable and keeps its priority.
    pub fn yield_now(&self) {
        self.expect_task_context();
        let _guard = self.atomic_section();

        let next = {
            let mut state = self.state();
            let state = &mut *state;
            let next = state
                .scheduler
                .find_next_to_run(&state.threads, Dispatch::Yield);
            if next.is_some() {
                let current = state.scheduler.current_thread();
                state.scheduler.ready_to_run(&mut state.threads, current);
            }
            next
        };

        if let Some(next) = next {
            self.run(next);
        }
    }

    /// Block the calling thread until some other thread makes it ready.
    ///
    /// The caller must have disabled interrupts and must have put itself in
    /// a wait queue. If no other thread is ready, the machine halts.
    pub fn sleep(&self) {
        self.expect_task_context();
        self.expect_interrupts_disabled("`sleep`");

        let (current, next) = {
            let mut state = self.state();
            let state = &mut *state;
            let current = state.scheduler.current_thread();
            state.threads[current].status = ThreadStatus::Blocked;
            let next = state
                .scheduler
                .find_next_to_run(&state.threads, Dispatch::Sleep);
            (current, next)
        };

        match next {
            Some(next) => self.run(next),
            None => self.idle(current),
        }
    }

    /// Terminate the calling thread. Its thread table entry is released by
    /// the next thread to run.
    pub fn finish(&self) -> ! {
        self.expect_task_context();
        self.set_level(IntLevel::Off);

        let (current, next) = {
            let mut state = self.state();
            let state = &mut *state;
            let current = state.scheduler.current_thread();
            state.threads[current].status = ThreadStatus::Blocked;
            let next = state
                .scheduler
                .find_next_to_run(&state.threads, Dispatch::Sleep);
            match next {
                Some(_) => {
                    debug_assert_eq!(state.to_be_destroyed, None);
                    state.to_be_destroyed = Some(current);
                }
                None => {
                    state.threads.remove(current);
                }
            }
            (current, next)
        };

        log::debug!("{current} finished");

        match next {
            Some(next) => {
                let prev = self.dispatch(next);
                debug_assert_eq!(prev, current);
                self.kernel.port.exit_context(current, next)
            }
            None => self.idle(current),
        }
    }

    /// Switch from the running thread to `next`, returning when the caller
    /// is dispatched again. Interrupts must be disabled and the caller must
    /// already be in the ready queue or a wait queue.
    fn run(&self, next: ThreadId) {
        let prev = self.dispatch(next);
        self.kernel.port.switch_context(prev, next);

        // We are running again.
        self.reap();
    }

    /// Update the scheduler state for a switch to `next` and return the
    /// thread that is being switched out.
    fn dispatch(&self, next: ThreadId) -> ThreadId {
        let mut state = self.state();
        let state = &mut *state;
        let now = self.ticks();
        let prev = state.scheduler.run(&mut state.threads, next, now);
        log::trace!("switching from {prev} to {next} at tick {now}");
        prev
    }

    /// Release the thread that finished before the current one got the
    /// processor.
    fn reap(&self) {
        let mut state = self.state();
        if let Some(thread) = state.to_be_destroyed.take() {
            state.threads.remove(thread);
            log::debug!("released {thread}");
        }
    }

    /// Nothing is ready to run, and nothing can make a thread ready. Stop the
    /// machine.
    fn idle(&self, current: ThreadId) -> ! {
        let blocked = self
            .threads()
            .into_iter()
            .filter(|info| info.status == ThreadStatus::Blocked && info.id != current)
            .count();
        if blocked > 0 {
            log::warn!("no thread is ready to run; halting with {blocked} blocked thread(s)");
        } else {
            log::debug!("all threads have finished; halting");
        }
        self.kernel.port.halt(current)
    }

    /// Make `thread` ready to run. A thread woken from sleep gets
    /// [`KernelCfg::woken_priority`](crate::KernelCfg::woken_priority).
    ///
    /// Interrupts must be disabled.
    pub fn ready_to_run(&self, thread: ThreadId) {
        self.expect_interrupts_disabled("`ready_to_run`");
        let mut state = self.state();
        let state = &mut *state;
        state.scheduler.ready_to_run(&mut state.threads, thread);
    }

    /// The thread holding the processor.
    pub fn current_thread(&self) -> ThreadId {
        self.state().scheduler.current_thread()
    }

    pub fn thread_status(&self, thread: ThreadId) -> Option<ThreadStatus> {
        self.state().threads.get(thread).map(|cb| cb.status)
    }

    pub fn thread_name(&self, thread: ThreadId) -> Option<String> {
        self.state().threads.get(thread).map(|cb| cb.name.clone())
    }

    pub fn thread_priority(&self, thread: ThreadId) -> Option<Priority> {
        self.state().threads.get(thread).map(|cb| cb.priority)
    }

    /// Set the priority value of `thread`, clamped into the configured range.
    /// Returns the value actually set, or `None` if there is no such thread.
    ///
    /// The ready queue is not reordered; the new value takes effect at the
    /// next scheduling decision.
    pub fn set_priority(&self, thread: ThreadId, priority: Priority) -> Option<Priority> {
        let mut state = self.state();
        let state = &mut *state;
        state.threads.get(thread)?;
        Some(
            state
                .scheduler
                .set_priority(&mut state.threads, thread, priority),
        )
    }

    /// List every live thread, ordered by thread id.
    pub fn threads(&self) -> Vec<ThreadInfo> {
        self.state().threads.snapshot()
    }

    /// List the ready threads in ready-queue order.
    pub fn ready_threads(&self) -> Vec<ThreadId> {
        self.state().scheduler.ready_queue().iter().collect()
    }

    /// The clock value at the last context switch.
    pub fn last_switch_ticks(&self) -> u64 {
        self.state().scheduler.last_switch_ticks()
    }

    /// Age every ready thread by [`KernelCfg::adapt_step`](crate::KernelCfg::adapt_step).
    pub fn flush_priority(&self) {
        let mut state = self.state();
        let state = &mut *state;
        state.scheduler.flush_priority(&mut state.threads);
    }
}
