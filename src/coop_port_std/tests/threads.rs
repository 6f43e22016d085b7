//! Thread lifecycle and scheduling policy
use coop_kernel::{
    CfgError, ForkError, IntLevel, KernelCfg, Semaphore, ThreadStatus, TimerCfg, MAIN_THREAD_NAME,
};
use coop_port_std::{boot, BootError};
use std::sync::Arc;

mod common;
use common::EventLog;

/// Threads of equal priority that keep yielding take turns.
#[test]
fn yield_round_robin() {
    let log = Arc::new(EventLog::new());
    let log2 = Arc::clone(&log);

    boot(KernelCfg::default(), move |system| {
        for which in 1..=3 {
            let (log, system2) = (Arc::clone(&log2), system.clone());
            system
                .fork(&format!("thread{which}"), move || {
                    for num in 0..3 {
                        log.push((which, num));
                        system2.yield_now();
                    }
                })
                .unwrap();
        }
    })
    .unwrap();

    let expected: Vec<(i32, i32)> = (0..3)
        .flat_map(|num| (1..=3).map(move |which| (which, num)))
        .collect();
    assert_eq!(log.get(), expected);
}

/// The most urgent (smallest priority value) ready thread runs first.
#[test]
fn priority_order() {
    let log = Arc::new(EventLog::new());
    let log2 = Arc::clone(&log);

    boot(KernelCfg::default(), move |system| {
        for (name, priority) in [("t1", 120), ("t2", 80), ("t3", 95)] {
            let log = Arc::clone(&log2);
            let thread = system.fork(name, move || log.push(name)).unwrap();
            assert_eq!(system.set_priority(thread, priority), Some(priority));
        }
    })
    .unwrap();

    assert_eq!(log.get(), ["t2", "t3", "t1"]);
}

/// `yield_now` keeps the processor if every ready thread is less urgent.
#[test]
fn yield_keeps_more_urgent_thread() {
    boot(KernelCfg::default(), |system| {
        let main = system.current_thread();
        let other = system.fork("other", || {}).unwrap();

        system.set_priority(main, 50);
        system.yield_now();
        assert_eq!(system.current_thread(), main);
        assert_eq!(system.thread_status(other), Some(ThreadStatus::Ready));

        // yielding does not reset the caller's priority
        assert_eq!(system.thread_priority(main), Some(50));

        system.set_priority(other, 50);
        system.yield_now();
        // `other` ran and finished
        assert_eq!(system.thread_status(other), None);
    })
    .unwrap();
}

/// `flush_priority` ages every ready thread by exactly the adaptation step
/// and leaves the running thread alone.
#[test]
fn aging() {
    boot(KernelCfg::default().adapt_step(7), |system| {
        let a = system.fork("a", || {}).unwrap();
        let b = system.fork("b", || {}).unwrap();
        system.set_priority(b, 3);

        system.flush_priority();
        assert_eq!(system.thread_priority(a), Some(93));
        assert_eq!(system.thread_priority(b), Some(0));
        assert_eq!(system.thread_priority(system.current_thread()), Some(100));

        system.flush_priority();
        assert_eq!(system.thread_priority(a), Some(86));
        assert_eq!(system.thread_priority(b), Some(0));
    })
    .unwrap();
}

#[test]
fn thread_listing() {
    boot(KernelCfg::default(), |system| {
        let main = system.current_thread();
        let worker = system.fork("worker", || {}).unwrap();

        let threads = system.threads();
        assert_eq!(threads.len(), 2);

        let main_info = threads.iter().find(|t| t.id == main).unwrap();
        assert_eq!(main_info.name, MAIN_THREAD_NAME);
        assert_eq!(main_info.status, ThreadStatus::Running);

        let worker_info = threads.iter().find(|t| t.id == worker).unwrap();
        assert_eq!(worker_info.name, "worker");
        assert_eq!(worker_info.status, ThreadStatus::Ready);
        assert_eq!(worker_info.priority, 100);

        assert_eq!(system.thread_name(worker).as_deref(), Some("worker"));
        assert_eq!(system.ready_threads(), [worker]);
    })
    .unwrap();
}

#[test]
fn too_many_threads() {
    boot(KernelCfg::default().max_threads(2), |system| {
        let first = system.fork("first", || {}).unwrap();
        assert_eq!(
            system.fork("second", || unreachable!()),
            Err(ForkError::TooManyThreads)
        );

        // The slot becomes available again once `first` has finished
        system.yield_now();
        assert_eq!(system.thread_status(first), None);
        system.fork("third", || {}).unwrap();
    })
    .unwrap();
}

#[test]
fn bad_cfg() {
    assert_eq!(
        boot(KernelCfg::default().max_threads(0), |_| unreachable!()),
        Err(BootError::Cfg(CfgError::NoThreads))
    );
    assert_eq!(
        boot(KernelCfg::default().priority_range(0, 50), |_| unreachable!()),
        Err(BootError::Cfg(CfgError::BadPriorityRange))
    );
}

/// The machine halts when nothing is ready; blocked threads are reported.
#[test]
fn halt_reports_blocked_threads() {
    let report = boot(KernelCfg::default(), |system| {
        let sem = Arc::new(Semaphore::new(system, "never", 0));
        for name in ["x", "y"] {
            let sem = Arc::clone(&sem);
            system.fork(name, move || sem.p()).unwrap();
        }
        system.yield_now();
    })
    .unwrap();

    let names: Vec<_> = report.threads.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["x", "y"]);
    assert!(report
        .threads
        .iter()
        .all(|t| t.status == ThreadStatus::Blocked));
    assert!(report.ticks > 0);
}

/// Re-enabling interrupts advances the clock by one tick.
#[test]
fn clock() {
    boot(KernelCfg::default().system_tick(3), |system| {
        assert_eq!(system.interrupt_level(), IntLevel::On);
        let t0 = system.ticks();

        drop(system.atomic_section());
        assert_eq!(system.ticks(), t0 + 3);

        system.advance_tick();
        assert_eq!(system.ticks(), t0 + 6);

        let prev = system.set_level(IntLevel::Off);
        assert_eq!(prev, IntLevel::On);
        assert_eq!(system.ticks(), t0 + 6);
        system.set_level(IntLevel::On);
        assert_eq!(system.ticks(), t0 + 9);
    })
    .unwrap();
}

/// With a timer, threads that never yield still take turns, and the ones
/// waiting in the ready queue are aged.
#[test]
fn timer_preemption() {
    let log = Arc::new(EventLog::new());
    let log2 = Arc::clone(&log);

    let cfg = KernelCfg::default()
        .system_tick(10)
        .timer(Some(TimerCfg::new(100)));

    boot(cfg, move |system| {
        for which in ["a", "b"] {
            let (log, system2) = (Arc::clone(&log2), system.clone());
            system
                .fork(which, move || {
                    for _ in 0..50 {
                        log.push(which);
                        system2.advance_tick();
                    }
                })
                .unwrap();
        }
    })
    .unwrap();

    let events = log.get();
    assert_eq!(events.len(), 100);
    let last_a = events.iter().rposition(|&e| e == "a").unwrap();
    let first_b = events.iter().position(|&e| e == "b").unwrap();
    assert!(first_b < last_a, "no preemption happened: {events:?}");
}

#[test]
#[should_panic(expected = "requires interrupts to be disabled")]
fn sleep_with_interrupts_enabled() {
    boot(KernelCfg::default(), |system| system.sleep()).unwrap();
}
