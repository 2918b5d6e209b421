//! Effect scheduler
//!
//! Turns state changes into effect task starts and stops. Each running effect
//! owns one named thread that renders, sleeps for the effect's interval and
//! checks its stop flag. A stopped task draws exactly one cleanup frame and
//! then releases its registry slot; if the trigger came back true meanwhile,
//! the effect is started again.

mod registry;

pub use registry::{EffectRegistry, Lifecycle, StopSignal};

use crate::compositor::Compositor;
use crate::config::EngineConfig;
use crate::effects::{renderer_for, EffectId, EffectRenderer};
use crate::state::{ChangeSet, VehicleState};
use crate::types::{EngineError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Builds the render routine for a new task run
pub type RendererFactory = Arc<dyn Fn(EffectId) -> Box<dyn EffectRenderer> + Send + Sync>;

struct Inner {
    config: Arc<EngineConfig>,
    compositor: Arc<Compositor>,
    state: Arc<VehicleState>,
    registry: EffectRegistry,
    factory: RendererFactory,
    halted: AtomicBool,
}

/// Starts and stops effect tasks; clones share the same registry
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

/// Releases the registry slot even if the render routine panics
struct FinishGuard<'a> {
    registry: &'a EffectRegistry,
    id: EffectId,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.registry.finish(self.id);
    }
}

impl Scheduler {
    pub fn new(config: Arc<EngineConfig>, compositor: Arc<Compositor>, state: Arc<VehicleState>) -> Self {
        let factory_config = Arc::clone(&config);
        let factory: RendererFactory = Arc::new(move |id| renderer_for(id, &factory_config));
        Self::with_factory(config, compositor, state, factory)
    }

    /// Scheduler with custom render routines
    pub fn with_factory(
        config: Arc<EngineConfig>,
        compositor: Arc<Compositor>,
        state: Arc<VehicleState>,
        factory: RendererFactory,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                compositor,
                state,
                registry: EffectRegistry::new(),
                factory,
                halted: AtomicBool::new(false),
            }),
        }
    }

    pub fn registry(&self) -> &EffectRegistry {
        &self.inner.registry
    }

    /// Re-evaluate every effect watching one of the changed signals
    pub fn evaluate(&self, changes: &ChangeSet) {
        if changes.is_empty() {
            return;
        }
        for id in EffectId::ALL {
            if id.watched_signals().iter().any(|signal| changes.contains(signal)) {
                self.reconcile(id);
            }
        }
    }

    /// Bring an effect's task in line with its trigger
    pub fn reconcile(&self, id: EffectId) {
        let triggered = id.is_triggered(&self.inner.state.snapshot(), &self.inner.config.triggers);
        if triggered {
            if let Err(e) = self.start(id) {
                log::error!("Failed to start effect {}: {}", id, e);
            }
        } else if self.request_stop(id) {
            log::debug!("Effect {} trigger cleared", id);
        }
    }

    /// Start a task for the effect
    ///
    /// Returns `Ok(false)` if a task is already live or the scheduler is halted.
    pub fn start(&self, id: EffectId) -> Result<bool> {
        if self.inner.halted.load(Ordering::Acquire) {
            return Ok(false);
        }
        if !self.inner.registry.try_begin(id) {
            return Ok(false);
        }
        // A halt that landed after the check above found the slot idle
        if self.is_halted() {
            self.inner.registry.finish(id);
            return Ok(false);
        }

        let scheduler = self.clone();
        let spawned = thread::Builder::new()
            .name(format!("effect-{}", id))
            .spawn(move || scheduler.run_task(id));

        match spawned {
            Ok(_) => {
                log::debug!("Effect {} started", id);
                Ok(true)
            }
            Err(e) => {
                self.inner.registry.finish(id);
                Err(EngineError::Spawn(format!("effect {}: {}", id, e)))
            }
        }
    }

    pub fn request_stop(&self, id: EffectId) -> bool {
        self.inner.registry.request_stop(id)
    }

    pub fn stop_all(&self) {
        for id in EffectId::ALL {
            self.request_stop(id);
        }
    }

    /// Stop every task and refuse new starts until [`resume`](Self::resume)
    pub fn halt(&self) {
        self.inner.halted.store(true, Ordering::Release);
        self.stop_all();
    }

    pub fn resume(&self) {
        self.inner.halted.store(false, Ordering::Release);
    }

    pub fn is_halted(&self) -> bool {
        self.inner.halted.load(Ordering::Acquire)
    }

    /// Wait until no task is live; returns false on timeout
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.inner.registry.live_effects().is_empty() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn run_task(&self, id: EffectId) {
        {
            let _guard = FinishGuard {
                registry: &self.inner.registry,
                id,
            };
            self.render_loop(id);
        }

        // The trigger may have come back while the task was stopping
        if !self.is_halted() {
            self.reconcile(id);
        }
    }

    fn render_loop(&self, id: EffectId) {
        let inner = &self.inner;
        let mut renderer = (inner.factory)(id);
        let interval = id.interval(&inner.config.timing);
        let stop = inner.registry.stop_signal(id);
        let mut tick: u64 = 0;

        while !stop.is_raised() {
            // Catches a start raced by a stop that found the slot idle
            if self.is_halted() || !id.is_triggered(&inner.state.snapshot(), &inner.config.triggers) {
                inner.registry.request_stop(id);
                break;
            }
            if let Err(e) = inner
                .compositor
                .render(id, renderer.as_mut(), tick, &inner.registry, &inner.state)
            {
                log::warn!("Effect {} tick {} failed: {}", id, tick, e);
            }
            tick = tick.wrapping_add(1);
            if stop.wait_timeout(interval) {
                break;
            }
        }

        if let Err(e) = inner
            .compositor
            .cleanup(id, renderer.as_mut(), &inner.registry, &inner.state)
        {
            log::warn!("Effect {} cleanup failed: {}", id, e);
        }
        log::debug!("Effect {} stopped after {} ticks", id, tick);
    }
}
