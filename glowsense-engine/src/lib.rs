//! GlowSense Engine
//!
//! Drives an addressable LED strip from vehicle telemetry relayed by a
//! network bridge.
//!
//! # Architecture
//!
//! ```text
//! bridge session -> FrameRouter -> VehicleState -> Scheduler -> Compositor -> LedDevice
//! ```
//!
//! - Frames are decoded against a built-in signal catalogue (calibratable
//!   from configuration) and stored as one atomic batch per frame
//! - Signals whose category changed re-evaluate the effects watching them
//! - Each running effect is its own task; the compositor resolves zones so
//!   concurrent effects never overdraw each other
//!
//! The library does NOT:
//! - Load signal definitions from database files
//! - Talk to LED hardware directly (plug in any [`LedDevice`])
//!
//! # Example Usage
//!
//! ```no_run
//! use glowsense_engine::{Engine, EngineConfig, MemoryDevice};
//!
//! let config = EngineConfig::new()
//!     .with_led_count(60)
//!     .with_bridge_address("192.168.4.1:1338");
//! let device = MemoryDevice::new(60);
//!
//! let engine = Engine::new(config, Box::new(device)).unwrap();
//! let shutdown = engine.shutdown_handle();
//! // hand `shutdown` to a signal handler, then:
//! engine.run().unwrap();
//! ```

// Public modules
pub mod bridge;
pub mod compositor;
pub mod config;
pub mod device;
pub mod effects;
pub mod engine;
pub mod router;
pub mod scheduler;
pub mod signals;
pub mod state;
pub mod types;

mod message_decoder;

// Re-export main types for convenience
pub use bridge::{BridgeSession, FrameAssembler};
pub use compositor::{Canvas, Compositor, Zone};
pub use config::{EngineConfig, StripLayout};
pub use device::{LedDevice, MemoryDevice, SmartLedsDevice};
pub use effects::{EffectId, EffectRenderer};
pub use engine::{Engine, SessionOutcome, ShutdownHandle};
pub use message_decoder::MessageDecoder;
pub use scheduler::Scheduler;
pub use signals::{DatabaseStats, SignalDatabase};
pub use state::{ChangeSet, VehicleSnapshot, VehicleState};
pub use types::{CanFrame, Classification, EngineError, Result, Rgb, Signal, SignalReading};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
