//! Condition variable
use coop_kernel::{Condition, KernelCfg, Lock};
use coop_port_std::boot;
use std::sync::Arc;

mod common;
use common::EventLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Wait(usize),
    Woke(usize),
}

/// Fork `count` threads that wait on `cond` once each.
fn fork_waiters(
    system: &coop_kernel::System,
    lock: &Arc<Lock>,
    cond: &Arc<Condition>,
    log: &Arc<EventLog<Event>>,
    count: usize,
) {
    for i in 0..count {
        let (lock, cond, log) = (Arc::clone(lock), Arc::clone(cond), Arc::clone(log));
        system
            .fork(&format!("waiter{i}"), move || {
                lock.acquire();
                log.push(Event::Wait(i));
                cond.wait(&lock);
                assert!(lock.is_held_by_current_thread());
                log.push(Event::Woke(i));
                lock.release();
            })
            .unwrap();
    }
}

/// Sequential signals release the waiters in the order they started waiting.
#[test]
fn signal_fifo() {
    let log = Arc::new(EventLog::new());
    let log2 = Arc::clone(&log);

    let report = boot(KernelCfg::default(), move |system| {
        let log = log2;
        let lock = Arc::new(Lock::new(system, "lock"));
        let cond = Arc::new(Condition::new(system, "cond"));
        fork_waiters(system, &lock, &cond, &log, 3);

        system.yield_now(); // every waiter starts waiting
        assert_eq!(cond.waiters(), 3);

        for _ in 0..3 {
            lock.acquire();
            cond.signal(&lock);
            lock.release();
            system.yield_now();
        }

        assert_eq!(cond.waiters(), 0);
    })
    .unwrap();

    use Event::*;
    assert_eq!(
        log.get(),
        [Wait(0), Wait(1), Wait(2), Woke(0), Woke(1), Woke(2)]
    );
    assert!(report.threads.is_empty(), "{report:?}");
}

/// `broadcast` releases every waiter; they resume in FIFO order.
#[test]
fn broadcast_all() {
    let log = Arc::new(EventLog::new());
    let log2 = Arc::clone(&log);

    boot(KernelCfg::default(), move |system| {
        let log = log2;
        let lock = Arc::new(Lock::new(system, "lock"));
        let cond = Arc::new(Condition::new(system, "cond"));
        fork_waiters(system, &lock, &cond, &log, 3);

        system.yield_now();

        lock.acquire();
        cond.broadcast(&lock);
        assert_eq!(cond.waiters(), 0);
        // signalling with nobody waiting does nothing
        cond.signal(&lock);
        lock.release();
    })
    .unwrap();

    use Event::*;
    assert_eq!(
        log.get(),
        [Wait(0), Wait(1), Wait(2), Woke(0), Woke(1), Woke(2)]
    );
}

/// A waiter that is never signalled is reported as blocked.
#[test]
fn lost_waiter_is_reported() {
    let report = boot(KernelCfg::default(), |system| {
        let lock = Arc::new(Lock::new(system, "lock"));
        let cond = Arc::new(Condition::new(system, "cond"));
        let log = Arc::new(EventLog::new());
        fork_waiters(system, &lock, &cond, &log, 1);
        system.yield_now();
    })
    .unwrap();

    assert_eq!(report.threads.len(), 1);
    assert_eq!(report.threads[0].name, "waiter0");
    assert_eq!(report.threads[0].status, coop_kernel::ThreadStatus::Blocked);
}

#[test]
#[should_panic(expected = "without holding lock")]
fn wait_without_lock() {
    boot(KernelCfg::default(), |system| {
        let lock = Lock::new(system, "lock");
        Condition::new(system, "cond").wait(&lock);
    })
    .unwrap();
}

#[test]
#[should_panic(expected = "without holding lock")]
fn signal_without_lock() {
    boot(KernelCfg::default(), |system| {
        let lock = Lock::new(system, "lock");
        Condition::new(system, "cond").signal(&lock);
    })
    .unwrap();
}

#[test]
#[should_panic(expected = "without holding lock")]
fn broadcast_with_lock_held_by_another_thread() {
    boot(KernelCfg::default(), |system| {
        let lock = Arc::new(Lock::new(system, "lock"));
        let cond = Arc::new(Condition::new(system, "cond"));
        {
            let (lock, cond) = (Arc::clone(&lock), Arc::clone(&cond));
            system
                .fork("other", move || cond.broadcast(&lock))
                .unwrap();
        }
        lock.acquire();
        system.yield_now();
    })
    .unwrap();
}
