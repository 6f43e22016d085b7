//! Reader/writer lock
use coop_kernel::{KernelCfg, RwLock};
use coop_port_std::boot;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

mod common;
use common::EventLog;

/// Two readers share the lock at the same time.
#[test]
fn concurrent_readers() {
    let max_readers = Arc::new(AtomicUsize::new(0));
    let max_readers2 = Arc::clone(&max_readers);

    boot(KernelCfg::default(), move |system| {
        let rwlock = Arc::new(RwLock::new(system, "rwlock"));
        for i in 0..2 {
            let (rwlock, max_readers, system2) =
                (Arc::clone(&rwlock), Arc::clone(&max_readers2), system.clone());
            system
                .fork(&format!("reader{i}"), move || {
                    rwlock.read_lock_acquire();
                    assert!(rwlock.is_locked());
                    max_readers.fetch_max(rwlock.reader_count(), Ordering::Relaxed);
                    system2.yield_now();
                    max_readers.fetch_max(rwlock.reader_count(), Ordering::Relaxed);
                    rwlock.read_lock_release();
                })
                .unwrap();
        }
    })
    .unwrap();

    assert_eq!(max_readers.load(Ordering::Relaxed), 2);
}

/// A pending writer is not overtaken by a reader arriving after it.
#[test]
fn writer_not_overtaken() {
    let log = Arc::new(EventLog::new());
    let log2 = Arc::clone(&log);

    let report = boot(KernelCfg::default(), move |system| {
        let rwlock = Arc::new(RwLock::new(system, "rwlock"));

        {
            let (rwlock, log, system2) = (Arc::clone(&rwlock), Arc::clone(&log2), system.clone());
            system
                .fork("R1", move || {
                    rwlock.read_lock_acquire();
                    log.push("R1 in");
                    system2.yield_now(); // `W` and `R2` arrive
                    log.push("R1 out");
                    rwlock.read_lock_release();
                })
                .unwrap();
        }
        {
            let (rwlock, log, system2) = (Arc::clone(&rwlock), Arc::clone(&log2), system.clone());
            system
                .fork("W", move || {
                    rwlock.write_lock_acquire();
                    log.push("W in");
                    system2.yield_now(); // `R2` gets admitted but can't enter
                    log.push("W out");
                    rwlock.write_lock_release();
                })
                .unwrap();
        }
        {
            let (rwlock, log) = (Arc::clone(&rwlock), Arc::clone(&log2));
            system
                .fork("R2", move || {
                    rwlock.read_lock_acquire();
                    log.push("R2 in");
                    rwlock.read_lock_release();
                })
                .unwrap();
        }
    })
    .unwrap();

    assert_eq!(log.get(), ["R1 in", "R1 out", "W in", "W out", "R2 in"]);
    assert!(report.threads.is_empty(), "{report:?}");
}

/// Writers exclude each other and readers.
#[test]
fn writers_exclusive() {
    struct St {
        writers: AtomicUsize,
        completed: AtomicUsize,
    }
    let st = Arc::new(St {
        writers: AtomicUsize::new(0),
        completed: AtomicUsize::new(0),
    });
    let st2 = Arc::clone(&st);

    boot(KernelCfg::default(), move |system| {
        let rwlock = Arc::new(RwLock::new(system, "rwlock"));
        for i in 0..3 {
            let (rwlock, st, system2) = (Arc::clone(&rwlock), Arc::clone(&st2), system.clone());
            system
                .fork(&format!("writer{i}"), move || {
                    rwlock.write_lock_acquire();
                    assert_eq!(st.writers.fetch_add(1, Ordering::Relaxed), 0);
                    assert_eq!(rwlock.reader_count(), 0);
                    system2.yield_now();
                    assert_eq!(st.writers.fetch_sub(1, Ordering::Relaxed), 1);
                    rwlock.write_lock_release();
                    st.completed.fetch_add(1, Ordering::Relaxed);
                })
                .unwrap();
        }
        {
            let (rwlock, st) = (Arc::clone(&rwlock), Arc::clone(&st2));
            system
                .fork("reader", move || {
                    rwlock.read_lock_acquire();
                    assert_eq!(st.writers.load(Ordering::Relaxed), 0);
                    rwlock.read_lock_release();
                    st.completed.fetch_add(1, Ordering::Relaxed);
                })
                .unwrap();
        }
    })
    .unwrap();

    assert_eq!(st.completed.load(Ordering::Relaxed), 4);
}
