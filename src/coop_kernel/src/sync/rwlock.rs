use spin::Mutex as SpinMutex;
use std::fmt;

use super::{lock::Lock, semaphore::Semaphore};
use crate::System;

/// A reader/writer lock that does not let a stream of readers starve a
/// writer.
///
/// Both readers and writers pass through an admission gate. A pending writer
/// holds the gate while it waits for the readers inside to drain, so readers
/// arriving after it queue up behind it.
///
/// The exclusion gate is ownerless: the first reader closes it and the last
/// reader, which may be a different thread, opens it again.
pub struct RwLock {
    name: String,
    reader_count: SpinMutex<usize>,
    /// Protects `reader_count` transitions.
    mutex: Lock,
    admission: Lock,
    exclusion: Semaphore,
}

impl RwLock {
    pub fn new(system: &System, name: &str) -> Self {
        Self {
            name: name.to_owned(),
            reader_count: SpinMutex::new(0),
            mutex: Lock::new(system, &format!("{name}.mutex")),
            admission: Lock::new(system, &format!("{name}.admission")),
            exclusion: Semaphore::new(system, &format!("{name}.exclusion"), 1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enter the shared section.
    pub fn read_lock_acquire(&self) {
        self.admission.acquire();
        self.mutex.acquire();

        let first = {
            let mut reader_count = self.reader_count.lock();
            *reader_count += 1;
            *reader_count == 1
        };
        if first {
            // on behalf of all readers
            self.exclusion.p();
        }

        self.mutex.release();
        self.admission.release();
    }

    /// Leave the shared section.
    pub fn read_lock_release(&self) {
        self.mutex.acquire();

        let last = {
            let mut reader_count = self.reader_count.lock();
            assert!(
                *reader_count > 0,
                "read lock {:?} released with no readers inside",
                self.name
            );
            *reader_count -= 1;
            *reader_count == 0
        };
        if last {
            self.exclusion.v();
        }

        self.mutex.release();
    }

    /// Enter the exclusive section.
    pub fn write_lock_acquire(&self) {
        self.admission.acquire();
        self.exclusion.p();
        self.admission.release();
    }

    /// Leave the exclusive section.
    pub fn write_lock_release(&self) {
        self.exclusion.v();
    }

    /// The number of readers in the shared section.
    pub fn reader_count(&self) -> usize {
        *self.reader_count.lock()
    }

    /// Return `true` if a writer or at least one reader is inside.
    pub fn is_locked(&self) -> bool {
        self.exclusion.value() == 0
    }
}

impl fmt::Debug for RwLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RwLock")
            .field("name", &self.name)
            .field("reader_count", &self.reader_count())
            .field("locked", &self.is_locked())
            .finish()
    }
}
