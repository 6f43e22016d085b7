//! The atomic-section facility and the simulated clock
use crate::{cfg::KernelCfg, System};

/// The interrupt level of the simulated processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntLevel {
    /// Interrupts are disabled. No involuntary context switch can happen.
    Off,
    /// Interrupts are enabled.
    On,
}

pub(crate) struct InterruptState {
    level: IntLevel,
    ticks: u64,
    /// The timer handler asked for a yield once the current tick completes.
    yield_on_return: bool,
    /// The clock value at which the timer fires next.
    next_timer: Option<u64>,
}

impl InterruptState {
    pub(crate) fn new(cfg: &KernelCfg) -> Self {
        Self {
            // Every thread enables interrupts as part of its start-up.
            level: IntLevel::Off,
            ticks: 0,
            yield_on_return: false,
            next_timer: cfg.timer.map(|timer| timer.period),
        }
    }
}

/// RAII guard returned by [`System::atomic_section`]. Restores the previous
/// interrupt level when dropped.
#[derive(Debug)]
#[must_use = "interrupts are re-enabled as soon as the guard is dropped"]
pub struct AtomicSection<'a> {
    system: &'a System,
    prev: IntLevel,
}

impl AtomicSection<'_> {
    /// The level that will be restored on drop.
    pub fn prev_level(&self) -> IntLevel {
        self.prev
    }
}

impl Drop for AtomicSection<'_> {
    fn drop(&mut self) {
        // A thread being torn down must not touch the clock or the scheduler
        if !std::thread::panicking() {
            self.system.set_level(self.prev);
        }
    }
}

impl System {
    /// Change the interrupt level and return the previous one.
    ///
    /// Going from [`IntLevel::Off`] to [`IntLevel::On`] advances the clock by
    /// one tick, as [`Self::advance_tick`] does. This may run the timer
    /// handler and, consequently, yield the processor.
    pub fn set_level(&self, new: IntLevel) -> IntLevel {
        let old = self.change_level(new);
        if old == IntLevel::Off && new == IntLevel::On {
            self.advance_tick();
        }
        old
    }

    /// Disable interrupts until the returned guard is dropped.
    pub fn atomic_section(&self) -> AtomicSection<'_> {
        let prev = self.set_level(IntLevel::Off);
        AtomicSection { system: self, prev }
    }

    /// The current interrupt level.
    pub fn interrupt_level(&self) -> IntLevel {
        self.kernel.interrupt.lock().level
    }

    /// The simulated clock.
    pub fn ticks(&self) -> u64 {
        self.kernel.interrupt.lock().ticks
    }

    /// Advance the simulated clock by [`KernelCfg::system_tick`] ticks.
    ///
    /// If interrupts are enabled and the timer is due, the timer handler runs
    /// with interrupts disabled. It ages every ready thread and, if the
    /// running thread has held the processor for at least
    /// [`TimerCfg::min_quantum`](crate::TimerCfg::min_quantum) ticks, makes it
    /// yield before this method returns.
    pub fn advance_tick(&self) {
        let fire = {
            let mut interrupt = self.kernel.interrupt.lock();
            interrupt.ticks += self.kernel.cfg.system_tick;
            let now = interrupt.ticks;
            match (self.kernel.cfg.timer, interrupt.next_timer) {
                (Some(timer), Some(next)) if interrupt.level == IntLevel::On && now >= next => {
                    interrupt.next_timer = Some(now + timer.period);
                    true
                }
                _ => false,
            }
        };

        if fire {
            self.timer_interrupt();
        }

        let should_yield = {
            let mut interrupt = self.kernel.interrupt.lock();
            if interrupt.yield_on_return && interrupt.level == IntLevel::On {
                interrupt.yield_on_return = false;
                true
            } else {
                false
            }
        };

        if should_yield && self.kernel.port.is_task_context() {
            log::trace!("quantum of {} expired", self.current_thread());
            self.yield_now();
        }
    }

    /// The timer handler.
    fn timer_interrupt(&self) {
        let prev = self.change_level(IntLevel::Off);

        let request_yield = {
            let mut state = self.state();
            let state = &mut *state;
            state.scheduler.flush_priority(&mut state.threads);

            let now = self.ticks();
            let min_quantum = self.kernel.cfg.timer.map_or(0, |timer| timer.min_quantum);
            now - state.scheduler.last_switch_ticks() >= min_quantum
        };

        if request_yield {
            self.kernel.interrupt.lock().yield_on_return = true;
        }

        self.change_level(prev);
    }

    /// Change the interrupt level without advancing the clock.
    fn change_level(&self, new: IntLevel) -> IntLevel {
        std::mem::replace(&mut self.kernel.interrupt.lock().level, new)
    }

    #[track_caller]
    pub(crate) fn expect_interrupts_disabled(&self, what: &str) {
        assert_eq!(
            self.interrupt_level(),
            IntLevel::Off,
            "{what} requires interrupts to be disabled"
        );
    }
}
