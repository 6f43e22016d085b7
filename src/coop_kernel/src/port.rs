use crate::{error::ForkError, thread::ThreadId};

/// The body of a thread, as handed to [`Port::initialize_context`].
///
/// The kernel wraps the user-supplied closure so that the entry performs the
/// thread start-up and calls [`System::finish`](crate::System::finish) when
/// the closure returns. The entry never returns normally.
pub type ThreadEntry = Box<dyn FnOnce() + Send + 'static>;

/// Implemented by a port. The low half of the thread lifecycle: creating
/// execution contexts and transferring the processor between them.
///
/// The kernel never holds any of its internal locks while calling
/// `switch_context`, `exit_context` or `halt`.
pub trait Port: Send + Sync + 'static {
    /// Prepare an execution context for `thread`. The context must not run
    /// until it is the target of [`Self::switch_context`] or
    /// [`Self::exit_context`] (or, for the boot thread, until the port starts
    /// the machine).
    fn initialize_context(
        &self,
        thread: ThreadId,
        name: &str,
        entry: ThreadEntry,
    ) -> Result<(), ForkError>;

    /// Transfer the processor from the calling thread `from` to `to`. Returns
    /// when `from` is dispatched again.
    fn switch_context(&self, from: ThreadId, to: ThreadId);

    /// Transfer the processor from the finishing thread `from` to `to` and
    /// discard the context of `from`.
    fn exit_context(&self, from: ThreadId, to: ThreadId) -> !;

    /// Stop the machine. Called by `from` when no thread is ready to run.
    fn halt(&self, from: ThreadId) -> !;

    /// Return `true` if the caller is running in the context of a thread
    /// created by this port.
    fn is_task_context(&self) -> bool;
}
