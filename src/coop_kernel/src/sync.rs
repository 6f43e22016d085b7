//! Synchronization primitives
//!
//! [`Semaphore`], [`Lock`] and [`Condition`] are built directly on the
//! atomic section and [`System::sleep`](crate::System::sleep). The composite
//! constructs ([`BoundedBuffer`], [`Barrier`], [`RwLock`]) are built on top
//! of those and never touch the scheduler themselves.
mod barrier;
mod condition;
mod lock;
mod monitor;
mod rwlock;
mod semaphore;
mod wait_queue;

pub use self::{
    barrier::Barrier, condition::Condition, lock::Lock, monitor::BoundedBuffer, rwlock::RwLock,
    semaphore::Semaphore,
};
