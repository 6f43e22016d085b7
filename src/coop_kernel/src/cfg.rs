//! Static configuration of a simulated machine.
use crate::{error::CfgError, scheduler::Priority};

/// The configuration of a [`System`](crate::System).
///
/// Construct one with [`KernelCfg::default`] and adjust it with the builder
/// methods:
///
/// ```
/// use coop_kernel::{KernelCfg, TimerCfg};
///
/// let cfg = KernelCfg::default()
///     .max_threads(16)
///     .timer(Some(TimerCfg::new(100)));
/// assert!(cfg.validate().is_ok());
/// assert_eq!(cfg.timer.unwrap().min_quantum, 12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct KernelCfg {
    /// The capacity of the thread table, including the boot thread.
    pub max_threads: usize,
    /// The priority value of a newly created thread.
    pub create_priority: Priority,
    /// The priority value a thread gets when it is woken from sleep.
    pub woken_priority: Priority,
    /// The amount subtracted from the priority value of every ready thread
    /// on each timer interrupt.
    pub adapt_step: Priority,
    /// The most urgent priority value a thread can have.
    pub priority_floor: Priority,
    /// The least urgent priority value a thread can have.
    pub priority_ceiling: Priority,
    /// The number of ticks [`System::advance_tick`](crate::System::advance_tick)
    /// moves the clock forward.
    pub system_tick: u64,
    /// The periodic timer device, if any.
    pub timer: Option<TimerCfg>,
}

/// The configuration of the periodic timer device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct TimerCfg {
    /// The number of ticks between two timer interrupts.
    pub period: u64,
    /// The number of ticks a thread must have held the processor before a
    /// timer interrupt makes it yield.
    pub min_quantum: u64,
}

impl Default for KernelCfg {
    fn default() -> Self {
        Self {
            max_threads: 128,
            create_priority: 100,
            woken_priority: 70,
            adapt_step: 5,
            priority_floor: 0,
            priority_ceiling: 255,
            system_tick: 10,
            timer: None,
        }
    }
}

impl KernelCfg {
    pub const fn max_threads(self, max_threads: usize) -> Self {
        Self {
            max_threads,
            ..self
        }
    }

    pub const fn create_priority(self, create_priority: Priority) -> Self {
        Self {
            create_priority,
            ..self
        }
    }

    pub const fn woken_priority(self, woken_priority: Priority) -> Self {
        Self {
            woken_priority,
            ..self
        }
    }

    pub const fn adapt_step(self, adapt_step: Priority) -> Self {
        Self { adapt_step, ..self }
    }

    /// Set the range `[floor, ceiling]` of priority values.
    pub const fn priority_range(self, priority_floor: Priority, priority_ceiling: Priority) -> Self {
        Self {
            priority_floor,
            priority_ceiling,
            ..self
        }
    }

    pub const fn system_tick(self, system_tick: u64) -> Self {
        Self {
            system_tick,
            ..self
        }
    }

    pub const fn timer(self, timer: Option<TimerCfg>) -> Self {
        Self { timer, ..self }
    }

    /// Check the configuration for consistency.
    pub fn validate(&self) -> Result<(), CfgError> {
        if self.max_threads == 0 {
            return Err(CfgError::NoThreads);
        }

        let range = self.priority_floor..=self.priority_ceiling;
        if range.is_empty()
            || !range.contains(&self.create_priority)
            || !range.contains(&self.woken_priority)
        {
            return Err(CfgError::BadPriorityRange);
        }

        if self.system_tick == 0 {
            return Err(CfgError::ZeroSystemTick);
        }

        if let Some(timer) = &self.timer {
            if timer.period == 0 {
                return Err(CfgError::ZeroTimerPeriod);
            }
        }

        Ok(())
    }

    /// Clamp `priority` into `[priority_floor, priority_ceiling]`.
    pub(crate) fn clamp_priority(&self, priority: Priority) -> Priority {
        priority.clamp(self.priority_floor, self.priority_ceiling)
    }
}

impl TimerCfg {
    /// Construct a timer that fires every `period` ticks. The minimum
    /// quantum defaults to an eighth of the period.
    pub const fn new(period: u64) -> Self {
        Self {
            period,
            min_quantum: period / 8,
        }
    }

    pub const fn min_quantum(self, min_quantum: u64) -> Self {
        Self {
            min_quantum,
            ..self
        }
    }
}
