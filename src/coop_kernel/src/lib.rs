#![doc = include_str!("./lib.md")]
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
use spin::{Mutex as SpinMutex, MutexGuard as SpinMutexGuard};
use std::{fmt, sync::Arc};

mod cfg;
mod error;
mod interrupt;
mod port;
pub mod scheduler;
pub mod sync;
mod thread;
pub use self::{
    cfg::*,
    error::*,
    interrupt::*,
    port::*,
    scheduler::{Dispatch, Priority, Scheduler},
    sync::*,
    thread::*,
};

/// The name given to the thread that runs the boot closure.
pub const MAIN_THREAD_NAME: &str = "main";

/// The runtime context of one simulated machine.
///
/// `System` is a cheap, clonable handle. All clones refer to the same
/// thread table, scheduler and interrupt state.
#[derive(Clone)]
pub struct System {
    kernel: Arc<Kernel>,
}

struct Kernel {
    cfg: KernelCfg,
    port: Box<dyn Port>,
    /// Lock order: `state` before `interrupt`. Neither is ever held across a
    /// context switch.
    state: SpinMutex<KernelState>,
    interrupt: SpinMutex<InterruptState>,
}

struct KernelState {
    threads: ThreadTable,
    scheduler: Scheduler,
    /// A thread that has finished and is waiting to be released by whichever
    /// thread runs next.
    to_be_destroyed: Option<ThreadId>,
}

impl System {
    /// Construct a machine whose boot thread ([`MAIN_THREAD_NAME`]) is
    /// already marked as running.
    ///
    /// The boot thread does not execute anything until [`Self::boot`] gives
    /// it a body and the port dispatches it.
    pub fn new(cfg: KernelCfg, port: impl Port) -> Result<Self, CfgError> {
        cfg.validate()?;

        let mut threads = ThreadTable::new(cfg.max_threads);
        let main = threads
            .insert(ThreadCb::new(MAIN_THREAD_NAME, cfg.create_priority))
            .map_err(|_| CfgError::NoThreads)?;
        threads[main].status = ThreadStatus::Running;

        let scheduler = Scheduler::new(main, &cfg);
        let interrupt = InterruptState::new(&cfg);

        log::debug!("system created with {cfg:?}");

        Ok(Self {
            kernel: Arc::new(Kernel {
                cfg,
                port: Box::new(port),
                state: SpinMutex::new(KernelState {
                    threads,
                    scheduler,
                    to_be_destroyed: None,
                }),
                interrupt: SpinMutex::new(interrupt),
            }),
        })
    }

    /// Give the boot thread its body and let the port prepare its context.
    ///
    /// Must be called exactly once, before the port dispatches the boot
    /// thread.
    pub fn boot(&self, main: impl FnOnce() + Send + 'static) -> Result<ThreadId, ForkError> {
        let thread = self.current_thread();
        self.kernel
            .port
            .initialize_context(thread, MAIN_THREAD_NAME, self.thread_entry(main))?;
        Ok(thread)
    }

    /// The configuration this machine was built with.
    pub fn cfg(&self) -> &KernelCfg {
        &self.kernel.cfg
    }

    fn state(&self) -> SpinMutexGuard<'_, KernelState> {
        self.kernel.state.lock()
    }

    /// Panic unless the caller is a thread managed by the kernel.
    #[track_caller]
    pub(crate) fn expect_task_context(&self) {
        assert!(
            self.kernel.port.is_task_context(),
            "this operation can only be performed by a kernel thread"
        );
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("self", &Arc::as_ptr(&self.kernel))
            .field("cfg", &self.kernel.cfg)
            .finish_non_exhaustive()
    }
}
