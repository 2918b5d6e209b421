//! Effect lifecycle registry
//!
//! One atomic lifecycle word per effect. Starting is a single compare-and-swap
//! from `Idle` to `Running`, so two concurrent starts can never both succeed.

use crate::compositor::Liveness;
use crate::effects::EffectId;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Lifecycle of one effect task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Idle,
    Running,
    StopRequested,
}

impl Lifecycle {
    const IDLE: u8 = 0;
    const RUNNING: u8 = 1;
    const STOP_REQUESTED: u8 = 2;

    fn from_u8(value: u8) -> Self {
        match value {
            Self::RUNNING => Lifecycle::Running,
            Self::STOP_REQUESTED => Lifecycle::StopRequested,
            _ => Lifecycle::Idle,
        }
    }
}

/// Wakeable stop flag a task sleeps on between ticks
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    cv: Condvar,
}

impl StopSignal {
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.stopped.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn raise(&self) {
        *self.lock() = true;
        self.cv.notify_all();
    }

    pub fn clear(&self) {
        *self.lock() = false;
    }

    pub fn is_raised(&self) -> bool {
        *self.lock()
    }

    /// Sleep up to `timeout`; returns true if the flag is raised
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (guard, _) = self
            .cv
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard
    }
}

#[derive(Debug, Default)]
struct Slot {
    lifecycle: AtomicU8,
    stop: StopSignal,
    runs: AtomicU64,
}

/// Per-effect lifecycle table
#[derive(Debug)]
pub struct EffectRegistry {
    slots: [Slot; EffectId::COUNT],
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self {
            slots: Default::default(),
        }
    }

    fn slot(&self, id: EffectId) -> &Slot {
        &self.slots[id.index()]
    }

    /// Claim the effect for a new task
    ///
    /// Returns false if a task is already live, including one that has been
    /// asked to stop but has not finished its cleanup.
    pub fn try_begin(&self, id: EffectId) -> bool {
        let slot = self.slot(id);
        let claimed = slot
            .lifecycle
            .compare_exchange(Lifecycle::IDLE, Lifecycle::RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if claimed {
            slot.runs.fetch_add(1, Ordering::Relaxed);
        }
        claimed
    }

    /// Ask a running task to stop; returns false if it was not running
    pub fn request_stop(&self, id: EffectId) -> bool {
        let slot = self.slot(id);
        let requested = slot
            .lifecycle
            .compare_exchange(
                Lifecycle::RUNNING,
                Lifecycle::STOP_REQUESTED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if requested {
            slot.stop.raise();
        }
        requested
    }

    /// Mark the task as gone; called exactly once when a task exits
    pub fn finish(&self, id: EffectId) {
        let slot = self.slot(id);
        slot.stop.clear();
        slot.lifecycle.store(Lifecycle::IDLE, Ordering::Release);
    }

    pub fn lifecycle(&self, id: EffectId) -> Lifecycle {
        Lifecycle::from_u8(self.slot(id).lifecycle.load(Ordering::Acquire))
    }

    pub fn stop_signal(&self, id: EffectId) -> &StopSignal {
        &self.slot(id).stop
    }

    /// Number of tasks ever started for the effect
    pub fn runs(&self, id: EffectId) -> u64 {
        self.slot(id).runs.load(Ordering::Relaxed)
    }

    /// Effects with a live task
    pub fn live_effects(&self) -> Vec<EffectId> {
        EffectId::ALL.into_iter().filter(|&id| self.is_live(id)).collect()
    }
}

impl Liveness for EffectRegistry {
    fn is_live(&self, id: EffectId) -> bool {
        self.slot(id).lifecycle.load(Ordering::Relaxed) != Lifecycle::IDLE
    }
}
