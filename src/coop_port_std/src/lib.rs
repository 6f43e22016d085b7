#![doc = include_str!("./lib.md")]
#![deny(unsafe_code)]
use coop_kernel::{CfgError, ForkError, KernelCfg, Port, System, ThreadEntry, ThreadId, ThreadInfo};
use std::{fmt, panic, sync::Arc};

mod ums;

pub extern crate env_logger;

/// The state of the machine after it halted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// The final value of the simulated clock.
    pub ticks: u64,
    /// The threads left in the thread table, i.e., the threads that were
    /// still blocked when the machine halted.
    pub threads: Vec<ThreadInfo>,
}

/// Error type for [`boot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    /// The configuration was rejected.
    Cfg(CfgError),
    /// The boot thread could not be created.
    Fork(ForkError),
}

impl From<CfgError> for BootError {
    fn from(x: CfgError) -> Self {
        Self::Cfg(x)
    }
}

impl From<ForkError> for BootError {
    fn from(x: ForkError) -> Self {
        Self::Fork(x)
    }
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cfg(e) => write!(f, "invalid configuration: {e}"),
            Self::Fork(e) => write!(f, "could not create the boot thread: {e}"),
        }
    }
}

impl std::error::Error for BootError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Cfg(e) => Some(e),
            Self::Fork(e) => Some(e),
        }
    }
}

/// The implementation of [`Port`] that backs each simulated thread with an
/// OS thread.
pub struct StdPort {
    thread_group: Arc<ums::ThreadGroup<ThreadId>>,
}

impl fmt::Debug for StdPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdPort").finish_non_exhaustive()
    }
}

impl Port for StdPort {
    fn initialize_context(
        &self,
        thread: ThreadId,
        name: &str,
        entry: ThreadEntry,
    ) -> Result<(), ForkError> {
        log::trace!("initialize_context({thread}, {name:?})");
        self.thread_group.spawn(thread, name, entry).map_err(|e| {
            log::warn!("failed to spawn a backing thread for {thread}: {e}");
            ForkError::NoContext
        })
    }

    fn switch_context(&self, from: ThreadId, to: ThreadId) {
        self.thread_group.switch(from, to);
    }

    fn exit_context(&self, from: ThreadId, to: ThreadId) -> ! {
        self.thread_group.exit(from, to)
    }

    fn halt(&self, from: ThreadId) -> ! {
        log::trace!("halt requested by {from}");
        self.thread_group.halt()
    }

    fn is_task_context(&self) -> bool {
        ums::is_worker_thread()
    }
}

/// Boot a simulated machine configured by `cfg` and run `main` as its first
/// thread. Returns when the machine halts.
///
/// # Panics
///
/// Resumes the panic of any simulated thread that panicked.
pub fn boot(
    cfg: KernelCfg,
    main: impl FnOnce(&System) + Send + 'static,
) -> Result<Report, BootError> {
    let _ = env_logger::try_init();

    let (thread_group, outcome_recv) = ums::ThreadGroup::new();
    let system = System::new(
        cfg,
        StdPort {
            thread_group: Arc::clone(&thread_group),
        },
    )?;

    let main_thread = {
        let system2 = system.clone();
        system.boot(move || main(&system2))?
    };

    log::debug!("starting the machine");
    thread_group.dispatch(main_thread);

    // Wait until the machine halts. The sender is only dropped after it has
    // sent the outcome.
    let outcome = outcome_recv.recv().unwrap_or(ums::Outcome::Halted);
    thread_group.join();
    log::debug!("the machine stopped: {outcome:?}");

    match outcome {
        ums::Outcome::Halted => Ok(Report {
            ticks: system.ticks(),
            threads: system.threads(),
        }),
        // Propagate any panic that occurred in a worker thread
        ums::Outcome::Panicked(payload) => panic::resume_unwind(payload),
    }
}
