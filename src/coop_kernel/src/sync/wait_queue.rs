use std::collections::VecDeque;

use crate::thread::ThreadId;

/// A FIFO queue of threads blocked on a primitive.
#[derive(Debug, Default)]
pub(super) struct WaitQueue {
    waiters: VecDeque<ThreadId>,
}

impl WaitQueue {
    pub(super) fn push_back(&mut self, thread: ThreadId) {
        debug_assert!(!self.waiters.contains(&thread));
        self.waiters.push_back(thread);
    }

    pub(super) fn pop_front(&mut self) -> Option<ThreadId> {
        self.waiters.pop_front()
    }

    /// Remove every waiter, oldest first.
    pub(super) fn drain(&mut self) -> impl Iterator<Item = ThreadId> + '_ {
        self.waiters.drain(..)
    }

    pub(super) fn len(&self) -> usize {
        self.waiters.len()
    }

    #[cfg(test)]
    pub(super) fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo() {
        let mut q = WaitQueue::default();
        for i in [3, 1, 2] {
            q.push_back(ThreadId::from_index(i));
        }
        assert_eq!(q.pop_front(), Some(ThreadId::from_index(3)));
        assert_eq!(
            q.drain().map(ThreadId::index).collect::<Vec<_>>(),
            [1, 2]
        );
        assert!(q.is_empty());
        assert_eq!(q.len(), 0);
    }
}
