//! The scheduler: ready queue management and priority aging
use std::fmt;

use crate::{
    cfg::KernelCfg,
    thread::{ThreadId, ThreadStatus, ThreadTable},
};

mod readyqueue;
pub use self::readyqueue::{ReadyQueue, ScheduleDecision};

/// A priority value. A smaller value is more urgent.
pub type Priority = u32;

/// Why a scheduling decision is being made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The running thread cannot continue (it is going to sleep or
    /// finishing). The most urgent ready thread is chosen, if any.
    Sleep,
    /// The running thread gives up the processor voluntarily but stays
    /// runnable. It competes with the ready threads using its own priority.
    Yield,
}

/// The scheduler state: the ready queue, the running thread and the time of
/// the last context switch.
///
/// Priority values live in the [`ThreadTable`], which is passed to every
/// method that needs them. No other component writes them.
pub struct Scheduler {
    ready: ReadyQueue,
    current: ThreadId,
    last_switch_ticks: u64,
    cfg: KernelCfg,
}

impl Scheduler {
    /// Construct a scheduler whose running thread is `current`.
    pub(crate) fn new(current: ThreadId, cfg: &KernelCfg) -> Self {
        Self {
            ready: ReadyQueue::new(),
            current,
            last_switch_ticks: 0,
            cfg: *cfg,
        }
    }

    /// The thread holding the processor.
    pub fn current_thread(&self) -> ThreadId {
        self.current
    }

    pub fn ready_queue(&self) -> &ReadyQueue {
        &self.ready
    }

    /// The clock value at the last context switch.
    pub fn last_switch_ticks(&self) -> u64 {
        self.last_switch_ticks
    }

    /// Mark `thread` as ready and put it at the back of the ready queue.
    ///
    /// A thread coming out of sleep has its priority value reset to
    /// [`KernelCfg::woken_priority`].
    pub(crate) fn ready_to_run(&mut self, threads: &mut ThreadTable, thread: ThreadId) {
        let thread_cb = &mut threads[thread];
        debug_assert_ne!(thread_cb.status, ThreadStatus::Ready);

        if thread_cb.status == ThreadStatus::Blocked {
            thread_cb.priority = self.cfg.woken_priority;
        }
        thread_cb.status = ThreadStatus::Ready;
        log::trace!("{thread} is ready (priority {})", thread_cb.priority);

        self.ready.push_back_thread(thread);
    }

    /// Choose and dequeue the next thread to run.
    ///
    /// Returns `None` if the running thread should keep the processor
    /// ([`Dispatch::Yield`]) or if there is nothing to run
    /// ([`Dispatch::Sleep`]).
    ///
    /// With [`Dispatch::Yield`], `None` is the result of treating the running
    /// thread as one more ready thread at the back of the queue: the most
    /// urgent candidate is still chosen, and it happens to be the caller. A
    /// ready thread of equal priority precedes the caller in that order, so
    /// ties switch.
    pub(crate) fn find_next_to_run(
        &mut self,
        threads: &ThreadTable,
        dispatch: Dispatch,
    ) -> Option<ThreadId> {
        let prev_thread_priority = match dispatch {
            Dispatch::Sleep => None,
            Dispatch::Yield => Some(threads[self.current].priority),
        };

        match self
            .ready
            .pop_front_thread(|thread| threads[thread].priority, prev_thread_priority)
        {
            ScheduleDecision::Keep => None,
            ScheduleDecision::SwitchTo(next) => next,
        }
    }

    /// Make `next` the running thread and return the thread it replaces.
    ///
    /// The caller is responsible for the status of the previous thread and
    /// for the actual context transfer.
    pub(crate) fn run(&mut self, threads: &mut ThreadTable, next: ThreadId, now: u64) -> ThreadId {
        debug_assert!(!self.ready.contains(next));
        self.last_switch_ticks = now;
        threads[next].status = ThreadStatus::Running;
        std::mem::replace(&mut self.current, next)
    }

    /// Age every ready thread by [`KernelCfg::adapt_step`], saturating at
    /// [`KernelCfg::priority_floor`]. The running thread is not aged.
    pub(crate) fn flush_priority(&mut self, threads: &mut ThreadTable) {
        for thread in self.ready.iter() {
            let thread_cb = &mut threads[thread];
            thread_cb.priority = self
                .cfg
                .clamp_priority(thread_cb.priority.saturating_sub(self.cfg.adapt_step));
        }
    }

    /// Set the priority value of `thread`, clamped into the configured range.
    pub(crate) fn set_priority(
        &mut self,
        threads: &mut ThreadTable,
        thread: ThreadId,
        priority: Priority,
    ) -> Priority {
        let priority = self.cfg.clamp_priority(priority);
        threads[thread].priority = priority;
        priority
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("current", &self.current.index())
            .field("ready", &self.ready)
            .field("last_switch_ticks", &self.last_switch_ticks)
            .finish()
    }
}
