//! Thread ready queue
use std::{collections::VecDeque, fmt};

use super::Priority;
use crate::thread::ThreadId;

/// The result type of [`ReadyQueue::pop_front_thread`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleDecision<T> {
    /// The scheduler should not perform a context switch and should continue
    /// to run the current thread.
    Keep,
    /// The scheduler should perform a context switch to the specified thread,
    /// or idle if there is none.
    SwitchTo(Option<T>),
}

/// The list of ready threads, in arrival order.
///
/// Threads are not kept sorted because their priority values change while
/// they wait (aging). The most urgent thread is found by a linear scan when
/// a scheduling decision is made.
#[derive(Default, Clone)]
pub struct ReadyQueue {
    threads: VecDeque<ThreadId>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `thread` to the back of the queue.
    ///
    /// `thread` must not be in the queue already.
    pub fn push_back_thread(&mut self, thread: ThreadId) {
        debug_assert!(
            !self.threads.contains(&thread),
            "{thread} is already in the ready queue"
        );
        self.threads.push_back(thread);
    }

    /// Choose the next thread to schedule.
    ///
    /// `priority_of` maps each queued thread to its priority value.
    /// `prev_thread_priority` is the priority value of the current thread if
    /// it can continue running, or `None` if it can't.
    ///
    /// The chosen thread is the one with the smallest priority value; ties go
    /// to the thread that arrived first. If this method returns
    /// `SwitchTo(Some(thread))`, `thread` is removed from the queue.
    ///
    /// | `prev_thread_priority` | Most urgent queued thread      |        Returns      |
    /// | ---------------------- | ------------------------------ | ------------------- |
    /// |        `None`          | none                           |  `SwitchTo(None)`   |
    /// |        `None`          | `t`                            | `SwitchTo(Some(t))` |
    /// |       `Some(p)`        | none                           |       `Keep`        |
    /// |       `Some(p)`        | `t`, priority value `> p`      |       `Keep`        |
    /// |       `Some(p)`        | `t`, priority value `<= p`     | `SwitchTo(Some(t))` |
    ///
    /// A running thread thus loses the processor to a ready thread of equal
    /// priority, which gives round-robin among equals.
    pub fn pop_front_thread(
        &mut self,
        mut priority_of: impl FnMut(ThreadId) -> Priority,
        prev_thread_priority: Option<Priority>,
    ) -> ScheduleDecision<ThreadId> {
        // `min_by_key` returns the first of several equal minima
        let best = self
            .threads
            .iter()
            .map(|&thread| priority_of(thread))
            .enumerate()
            .min_by_key(|&(_, priority)| priority);

        match (best, prev_thread_priority) {
            (None, None) => ScheduleDecision::SwitchTo(None),
            (None, Some(_)) => ScheduleDecision::Keep,
            (Some((_, priority)), Some(prev)) if priority > prev => ScheduleDecision::Keep,
            (Some((i, _)), _) => ScheduleDecision::SwitchTo(self.threads.remove(i)),
        }
    }

    pub fn contains(&self, thread: ThreadId) -> bool {
        self.threads.contains(&thread)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Iterate over the queued threads in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.threads.iter().copied()
    }
}

impl fmt::Debug for ReadyQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.threads.iter().map(|t| t.index())).finish()
    }
}
