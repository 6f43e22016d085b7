use std::fmt;

/// Error type for [`System::fork`](crate::System::fork).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkError {
    /// The thread table is full.
    TooManyThreads,
    /// The port could not provide an execution context for the thread.
    NoContext,
}

/// Error type for [`KernelCfg::validate`](crate::KernelCfg::validate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfgError {
    /// The priority range is empty, or the creation or wakeup priority lies
    /// outside it.
    BadPriorityRange,
    /// The thread table cannot hold even the boot thread.
    NoThreads,
    /// `system_tick` is zero.
    ZeroSystemTick,
    /// The timer period is zero.
    ZeroTimerPeriod,
}

impl fmt::Display for ForkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TooManyThreads => "the thread table is full",
            Self::NoContext => "no execution context is available for the thread",
        })
    }
}

impl fmt::Display for CfgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BadPriorityRange => "invalid priority range",
            Self::NoThreads => "`max_threads` must be at least one",
            Self::ZeroSystemTick => "`system_tick` must be non-zero",
            Self::ZeroTimerPeriod => "the timer period must be non-zero",
        })
    }
}

impl std::error::Error for ForkError {}
impl std::error::Error for CfgError {}
