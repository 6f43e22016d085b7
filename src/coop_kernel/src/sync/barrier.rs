use spin::Mutex as SpinMutex;
use std::fmt;

use super::{condition::Condition, lock::Lock};
use crate::System;

/// A single-use rendezvous point for a fixed number of threads.
///
/// Every thread calling [`Self::arrive`] blocks until the last of the
/// `parties` threads arrives. The last arrival trips the barrier and releases
/// everyone. Arriving at a tripped barrier panics.
pub struct Barrier {
    name: String,
    lock: Lock,
    tripped_cond: Condition,
    state: SpinMutex<BarrierState>,
}

struct BarrierState {
    remaining: usize,
    tripped: bool,
}

impl Barrier {
    /// Construct a barrier for `parties` threads.
    ///
    /// # Panics
    ///
    /// Panics if `parties` is zero.
    #[track_caller]
    pub fn new(system: &System, name: &str, parties: usize) -> Self {
        assert!(parties > 0, "barrier {name:?} must have at least one party");
        Self {
            name: name.to_owned(),
            lock: Lock::new(system, &format!("{name}.lock")),
            tripped_cond: Condition::new(system, &format!("{name}.tripped")),
            state: SpinMutex::new(BarrierState {
                remaining: parties,
                tripped: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arrive at the barrier and wait for the remaining parties.
    ///
    /// # Panics
    ///
    /// Panics if the barrier has already tripped.
    #[track_caller]
    pub fn arrive(&self) {
        self.lock.acquire();

        let tripped_now = {
            let mut state = self.state.lock();
            assert!(
                !state.tripped,
                "arrived at barrier {:?}, which has already tripped",
                self.name
            );
            state.remaining -= 1;
            state.tripped = state.remaining == 0;
            state.tripped
        };

        if tripped_now {
            log::trace!("barrier {:?} tripped", self.name);
            self.tripped_cond.broadcast(&self.lock);
        } else {
            while !self.is_tripped() {
                self.tripped_cond.wait(&self.lock);
            }
        }

        self.lock.release();
    }

    pub fn is_tripped(&self) -> bool {
        self.state.lock().tripped
    }

    /// The number of parties that have yet to arrive.
    pub fn remaining(&self) -> usize {
        self.state.lock().remaining
    }
}

impl fmt::Debug for Barrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Barrier")
            .field("name", &self.name)
            .field("remaining", &state.remaining)
            .field("tripped", &state.tripped)
            .finish()
    }
}
