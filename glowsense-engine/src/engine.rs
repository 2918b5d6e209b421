//! Engine orchestration
//!
//! Owns the signal database, vehicle state, router, scheduler and compositor,
//! and drives them from a bridge session. A failed session shows the error
//! pulse, resets state and effects, and is retried after a delay.

use crate::bridge::BridgeSession;
use crate::compositor::{dim, scale_brightness, Compositor};
use crate::config::{rgb, EngineConfig};
use crate::device::LedDevice;
use crate::router::FrameRouter;
use crate::scheduler::{Scheduler, StopSignal};
use crate::signals::SignalDatabase;
use crate::state::{ChangeSet, VehicleState};
use crate::types::{CanFrame, EngineError, Result, Signal};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Length of one error colour flash and the gap after it
const ERROR_PULSE: Duration = Duration::from_millis(150);
/// Half period of the stale telemetry blink
const STALE_BLINK: Duration = Duration::from_millis(500);
/// Time allowed for effect tasks to draw their cleanup frame
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// How a session ended
#[derive(Debug)]
pub enum SessionOutcome {
    /// Shutdown was requested; do not reconnect
    Shutdown,
    /// The session failed and should be retried
    Retry(EngineError),
}

/// Requests engine shutdown from another thread (e.g. a signal handler)
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    signal: Arc<StopSignal>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.signal.raise();
    }

    pub fn is_shutdown(&self) -> bool {
        self.signal.is_raised()
    }
}

pub struct Engine {
    config: Arc<EngineConfig>,
    database: Arc<SignalDatabase>,
    state: Arc<VehicleState>,
    router: FrameRouter,
    compositor: Arc<Compositor>,
    scheduler: Scheduler,
    shutdown: Arc<StopSignal>,
}

impl Engine {
    /// Build the engine from configuration and an LED device
    pub fn new(config: EngineConfig, device: Box<dyn LedDevice>) -> Result<Self> {
        let mut database = SignalDatabase::builtin();
        database.apply_calibration(&config.calibration)?;
        database.validate()?;

        let stats = database.stats();
        log::info!(
            "Signal catalogue: {} messages, {} signals",
            stats.num_messages,
            stats.num_signals
        );

        let config = Arc::new(config);
        let database = Arc::new(database);
        let state = Arc::new(VehicleState::new());
        let compositor = Arc::new(Compositor::new(config.strip, rgb(config.colors.default), device)?);
        let scheduler = Scheduler::new(Arc::clone(&config), Arc::clone(&compositor), Arc::clone(&state));
        let router = FrameRouter::new(Arc::clone(&database), Arc::clone(&state));

        Ok(Self {
            config,
            database,
            state,
            router,
            compositor,
            scheduler,
            shutdown: Arc::new(StopSignal::default()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn database(&self) -> &SignalDatabase {
        &self.database
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            signal: Arc::clone(&self.shutdown),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_raised()
    }

    /// Route one frame, apply brightness and re-evaluate affected effects
    pub fn handle_frame(&self, frame: &CanFrame) -> ChangeSet {
        let changes = self.router.route(frame);
        if changes.contains(&Signal::UiBrightness) {
            self.apply_brightness();
        }
        self.scheduler.evaluate(&changes);
        changes
    }

    /// Push the current UI brightness to the strip
    pub fn apply_brightness(&self) {
        let Some(percent) = self.state.get(Signal::UiBrightness).map(|r| r.value) else {
            return;
        };
        let level = scale_brightness(percent, &self.config.brightness);
        log::debug!("UI brightness {:.1}% -> level {}", percent, level);
        if let Err(e) = self.compositor.set_global_brightness(level) {
            log::warn!("Failed to apply brightness: {}", e);
        }
    }

    /// Run one bridge session until it fails or shutdown is requested
    pub fn serve<S: Read + Write>(&self, mut session: BridgeSession<S>) -> SessionOutcome {
        match self.serve_session(&mut session) {
            Ok(()) => SessionOutcome::Shutdown,
            Err(e) => SessionOutcome::Retry(e),
        }
    }

    fn serve_session<S: Read + Write>(&self, session: &mut BridgeSession<S>) -> Result<()> {
        session.handshake()?;
        session.register_filters(&self.database.filters())?;

        let stale_after = self.config.bridge.stale_after();
        let stale_color = rgb(self.config.colors.stale);
        let mut last_data = Instant::now();
        let mut stale_since: Option<Instant> = None;

        while !self.is_shutdown() {
            session.keepalive()?;
            let received = session.bytes_received();
            let frames = session.read_frames()?;

            // Partial units still prove the bridge is alive
            if session.bytes_received() > received {
                last_data = Instant::now();
                if stale_since.take().is_some() {
                    log::info!("Telemetry resumed");
                    self.compositor.release()?;
                }
            }

            if frames.is_empty() {
                let Some(after) = stale_after else { continue };
                if last_data.elapsed() < after {
                    continue;
                }
                let since = *stale_since.get_or_insert_with(|| {
                    log::warn!("No telemetry for {:?}", last_data.elapsed());
                    Instant::now()
                });
                let phase = since.elapsed().as_millis() / STALE_BLINK.as_millis();
                let color = if phase % 2 == 0 { stale_color } else { dim(stale_color, 64) };
                self.compositor.hold(color)?;
                continue;
            }

            for frame in &frames {
                self.handle_frame(frame);
            }
        }

        session.disconnect()
    }

    /// Connect over TCP and serve until shutdown, retrying failed sessions
    pub fn run(&self) -> Result<()> {
        let bridge = self.config.bridge.clone();
        self.run_with(|| BridgeSession::<TcpStream>::connect_tcp(&bridge))
    }

    /// Serve sessions from `connect` until shutdown
    pub fn run_with<S, C>(&self, mut connect: C) -> Result<()>
    where
        S: Read + Write,
        C: FnMut() -> Result<BridgeSession<S>>,
    {
        self.compositor.reset()?;
        let initial = self.config.brightness.initial;
        self.compositor.set_global_brightness(initial)?;

        let mut attempt: u64 = 0;
        while !self.is_shutdown() {
            attempt += 1;
            let outcome = match connect() {
                Ok(session) => self.serve(session),
                Err(e) => SessionOutcome::Retry(e),
            };

            match outcome {
                SessionOutcome::Shutdown => break,
                SessionOutcome::Retry(e) => {
                    log::warn!("Bridge session {} failed: {}", attempt, e);
                    self.reset()?;
                    if self.shutdown.wait_timeout(self.config.bridge.retry_delay()) {
                        break;
                    }
                    log::info!("Retrying bridge connection");
                }
            }
        }

        self.shutdown_effects()
    }

    /// Stop all effects, show the error pulse and return to the default state
    pub fn reset(&self) -> Result<()> {
        self.scheduler.halt();
        if !self.scheduler.wait_idle(STOP_TIMEOUT) {
            log::warn!("Effects still running after {:?}", STOP_TIMEOUT);
        }
        self.state.reset();
        self.show_error()?;
        self.compositor.reset()?;
        self.scheduler.resume();
        Ok(())
    }

    /// Flash the error colour over the whole strip
    pub fn show_error(&self) -> Result<()> {
        let error = rgb(self.config.colors.error);
        for _ in 0..self.config.bridge.error_pulses {
            self.compositor.fill_visible(error)?;
            std::thread::sleep(ERROR_PULSE);
            self.compositor.restore_visible()?;
            std::thread::sleep(ERROR_PULSE);
        }
        Ok(())
    }

    /// Request shutdown; a running [`run`](Self::run) loop returns soon after
    pub fn shutdown(&self) {
        self.shutdown.raise();
    }

    fn shutdown_effects(&self) -> Result<()> {
        self.scheduler.halt();
        if !self.scheduler.wait_idle(STOP_TIMEOUT) {
            log::warn!("Effects still running at shutdown");
        }
        self.compositor.reset()?;
        log::info!("Engine stopped");
        Ok(())
    }
}
