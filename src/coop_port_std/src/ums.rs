//! Cooperative user-mode scheduling on top of OS threads.
//!
//! Every simulated thread is backed by an OS thread. Exactly one of them,
//! the one named by `running`, is allowed to proceed; the others are parked.
//! A switch names the next thread and parks the caller until it is named
//! again.
use spin::Mutex as SpinMutex;
use std::{
    any::Any,
    collections::HashMap,
    fmt,
    hash::Hash,
    io,
    panic::{self, AssertUnwindSafe},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
};


/// How a thread group stopped.
pub(crate) enum Outcome {
    /// A thread called [`ThreadGroup::halt`].
    Halted,
    /// A thread panicked. Holds the panic payload.
    Panicked(Box<dyn Any + Send + 'static>),
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Halted => f.write_str("Halted"),
            Self::Panicked(_) => f.write_str("Panicked(..)"),
        }
    }
}

/// The panic payload used to tear down a worker thread.
struct Exit;

pub(crate) struct ThreadGroup<K> {
    /// Only touched for bookkeeping around switches, so `SpinMutex` is
    /// sufficient.
    state: SpinMutex<GroupState<K>>,
    outcome_send: SpinMutex<Option<mpsc::Sender<Outcome>>>,
}

struct GroupState<K> {
    running: Option<K>,
    shut_down: bool,
    threads: HashMap<K, thread::Thread>,
    join_handles: Vec<JoinHandle<()>>,
}

impl<K: Copy + Eq + Hash + fmt::Debug + Send + 'static> ThreadGroup<K> {
    /// Construct a thread group. The receiver yields exactly one [`Outcome`]
    /// when the group shuts down.
    pub(crate) fn new() -> (Arc<Self>, mpsc::Receiver<Outcome>) {
        let (send, recv) = mpsc::channel();
        let this = Arc::new(Self {
            state: SpinMutex::new(GroupState {
                running: None,
                shut_down: false,
                threads: HashMap::new(),
                join_handles: Vec::new(),
            }),
            outcome_send: SpinMutex::new(Some(send)),
        });
        (this, recv)
    }

    /// Create a worker thread for `id`. It does not start running `f` until
    /// it is dispatched.
    pub(crate) fn spawn(
        self: &Arc<Self>,
        id: K,
        name: &str,
        f: impl FnOnce() + Send + 'static,
    ) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.shut_down {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "the thread group has been shut down",
            ));
        }

        let group = Arc::clone(self);
        let join_handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                THREAD_ROLE.with(|role| role.set(ThreadRole::Worker));

                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    group.wait_for_dispatch(id);
                    f();
                }));

                match result {
                    Ok(()) => log::trace!("worker {id:?} returned"),
                    Err(payload) if payload.is::<Exit>() => log::trace!("worker {id:?} exited"),
                    Err(payload) => {
                        log::trace!("worker {id:?} panicked; shutting down");
                        group.shutdown(Outcome::Panicked(payload));
                    }
                }
            })?;

        log::trace!("spawned worker {:?} for {id:?}", join_handle.thread().id());
        state.threads.insert(id, join_handle.thread().clone());
        state.join_handles.push(join_handle);
        Ok(())
    }

    /// Let `to` run. Does not block the caller.
    pub(crate) fn dispatch(&self, to: K) {
        let mut state = self.state.lock();
        if state.shut_down {
            return;
        }
        log::trace!("dispatching {to:?}");
        state.running = Some(to);
        if let Some(thread) = state.threads.get(&to) {
            thread.unpark();
        }
    }

    /// Let `to` run and park the calling thread `from` until it is
    /// dispatched again.
    pub(crate) fn switch(&self, from: K, to: K) {
        self.dispatch(to);
        self.wait_for_dispatch(from);
    }

    /// Let `to` run and terminate the calling thread `from`.
    pub(crate) fn exit(&self, from: K, to: K) -> ! {
        self.state.lock().threads.remove(&from);
        self.dispatch(to);
        panic::resume_unwind(Box::new(Exit))
    }

    /// Shut down the thread group and terminate the calling thread.
    pub(crate) fn halt(&self) -> ! {
        self.shutdown(Outcome::Halted);
        panic::resume_unwind(Box::new(Exit))
    }

    /// Wait for every worker thread to exit.
    pub(crate) fn join(&self) {
        let join_handles = std::mem::take(&mut self.state.lock().join_handles);
        for join_handle in join_handles {
            // Workers catch their own panics
            let _ = join_handle.join();
        }
    }

    /// Park the calling thread until `id` is dispatched. Exits the thread if
    /// the group shuts down in the meantime.
    fn wait_for_dispatch(&self, id: K) {
        loop {
            {
                let state = self.state.lock();
                if state.shut_down {
                    drop(state);
                    panic::resume_unwind(Box::new(Exit));
                }
                if state.running == Some(id) {
                    return;
                }
            }
            thread::park();
        }
    }

    /// Stop dispatching, wake up every worker so that it exits, and report
    /// `outcome`. Only the first call has an effect.
    fn shutdown(&self, outcome: Outcome) {
        {
            let mut state = self.state.lock();
            if state.shut_down {
                return;
            }
            log::trace!("shutting down with {outcome:?}");
            state.shut_down = true;
            state.running = None;
            for thread in state.threads.values() {
                thread.unpark();
            }
        }

        if let Some(send) = self.outcome_send.lock().take() {
            // The receiver may have given up already
            let _ = send.send(outcome);
        }
    }
}

/// The role of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThreadRole {
    Unknown,
    /// The backing thread of a simulated thread.
    Worker,
}

thread_local! {
    /// The current thread's role. It's automatically assigned after the
    /// creation of a worker thread.
    static THREAD_ROLE: std::cell::Cell<ThreadRole> = std::cell::Cell::new(ThreadRole::Unknown);
}

/// Return `true` if the calling thread is a worker of some thread group.
pub(crate) fn is_worker_thread() -> bool {
    THREAD_ROLE.with(|role| role.get() == ThreadRole::Worker)
}
