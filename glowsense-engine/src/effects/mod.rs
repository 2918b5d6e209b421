//! Visual effects
//!
//! The effect set is fixed. Each effect has a trigger predicate over the
//! vehicle state, a layer, a render cadence and a render routine. Render
//! routines only ever see a [`Canvas`] limited to their resolved zone; their
//! lifecycle is owned by the scheduler.

mod autopilot;
mod blind_spot;
mod charging;
mod collision;
mod hands_on;
mod turn_signal;

pub use autopilot::AutopilotBase;
pub use blind_spot::BlindSpotWarning;
pub use charging::{lit_pixel_count, ChargingPulse};
pub use collision::CollisionStrobe;
pub use hands_on::HandsOnGlow;
pub use turn_signal::TurnSignal;

use crate::compositor::Canvas;
use crate::config::{rgb, EngineConfig, TimingConfig, TriggerConfig};
use crate::state::VehicleSnapshot;
use crate::types::{Result, Signal};
use std::fmt;
use std::time::Duration;

/// Which layer an effect draws into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// Strip-wide base appearance; at most one is active
    Base,
    /// Drawn on top of the base layer within a zone
    Overlay,
}

/// Side of the strip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Effect identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EffectId {
    LeftTurn,
    RightTurn,
    LeftBlindSpot,
    RightBlindSpot,
    Autopilot,
    HandsOnNag,
    ForwardCollision,
    Charging,
}

impl EffectId {
    pub const COUNT: usize = 8;

    pub const ALL: [EffectId; Self::COUNT] = [
        EffectId::LeftTurn,
        EffectId::RightTurn,
        EffectId::LeftBlindSpot,
        EffectId::RightBlindSpot,
        EffectId::Autopilot,
        EffectId::HandsOnNag,
        EffectId::ForwardCollision,
        EffectId::Charging,
    ];

    /// Position in [`EffectId::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EffectId::LeftTurn => "LeftTurn",
            EffectId::RightTurn => "RightTurn",
            EffectId::LeftBlindSpot => "LeftBlindSpot",
            EffectId::RightBlindSpot => "RightBlindSpot",
            EffectId::Autopilot => "Autopilot",
            EffectId::HandsOnNag => "HandsOnNag",
            EffectId::ForwardCollision => "ForwardCollision",
            EffectId::Charging => "Charging",
        }
    }

    pub fn layer(self) -> Layer {
        match self {
            EffectId::Autopilot | EffectId::Charging => Layer::Base,
            _ => Layer::Overlay,
        }
    }

    pub fn side(self) -> Option<Side> {
        match self {
            EffectId::LeftTurn | EffectId::LeftBlindSpot => Some(Side::Left),
            EffectId::RightTurn | EffectId::RightBlindSpot => Some(Side::Right),
            _ => None,
        }
    }

    /// Signals whose change re-evaluates this effect's trigger
    pub fn watched_signals(self) -> &'static [Signal] {
        match self {
            EffectId::LeftTurn => &[Signal::LeftTurn],
            EffectId::RightTurn => &[Signal::RightTurn],
            EffectId::LeftBlindSpot => &[Signal::BlindSpotLeft],
            EffectId::RightBlindSpot => &[Signal::BlindSpotRight],
            EffectId::Autopilot => &[Signal::AutopilotState, Signal::ChargeStatus],
            EffectId::HandsOnNag => &[Signal::AutopilotHandsOn],
            EffectId::ForwardCollision => &[Signal::ForwardCollision],
            EffectId::Charging => &[Signal::ChargeStatus],
        }
    }

    /// Sleep between render ticks
    pub fn interval(self, timing: &TimingConfig) -> Duration {
        let ms = match self {
            EffectId::LeftTurn | EffectId::RightTurn => timing.turn_ms,
            EffectId::LeftBlindSpot | EffectId::RightBlindSpot => timing.blind_spot_ms,
            EffectId::Autopilot => timing.autopilot_ms,
            EffectId::HandsOnNag => timing.hands_on_ms,
            EffectId::ForwardCollision => timing.collision_ms,
            EffectId::Charging => timing.charging_ms,
        };
        Duration::from_millis(ms.max(1))
    }

    /// Evaluate the trigger predicate
    ///
    /// Signals never seen or classified `Unknown` keep the trigger false.
    pub fn is_triggered(self, snapshot: &VehicleSnapshot, triggers: &TriggerConfig) -> bool {
        match self {
            EffectId::LeftTurn => snapshot.is_one_of(Signal::LeftTurn, &triggers.turn_active),
            EffectId::RightTurn => snapshot.is_one_of(Signal::RightTurn, &triggers.turn_active),
            EffectId::LeftBlindSpot => snapshot.is_one_of(Signal::BlindSpotLeft, &triggers.blind_spot_active),
            EffectId::RightBlindSpot => snapshot.is_one_of(Signal::BlindSpotRight, &triggers.blind_spot_active),
            // Charging owns the base layer while plugged in
            EffectId::Autopilot => {
                snapshot.is_one_of(Signal::AutopilotState, &triggers.autopilot_active)
                    && !snapshot.is_one_of(Signal::ChargeStatus, &triggers.charging_active)
            }
            EffectId::HandsOnNag => snapshot.is_one_of(Signal::AutopilotHandsOn, &triggers.hands_on_nag),
            EffectId::ForwardCollision => snapshot.is_one_of(Signal::ForwardCollision, &triggers.collision_active),
            EffectId::Charging => snapshot.is_one_of(Signal::ChargeStatus, &triggers.charging_active),
        }
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render routine of one effect task
///
/// A fresh renderer is created for every task run, so per-run animation state
/// can live in `self`.
pub trait EffectRenderer: Send {
    /// Draw one frame
    fn render(&mut self, canvas: &mut Canvas<'_>, tick: u64) -> Result<()>;

    /// Draw the single frame shown when the effect stops
    fn cleanup(&mut self, canvas: &mut Canvas<'_>) -> Result<()> {
        canvas.clear();
        Ok(())
    }
}

/// Build the default render routine for an effect
pub fn renderer_for(id: EffectId, config: &EngineConfig) -> Box<dyn EffectRenderer> {
    let colors = &config.colors;
    match id {
        EffectId::LeftTurn => Box::new(TurnSignal::new(Side::Left, rgb(colors.turn))),
        EffectId::RightTurn => Box::new(TurnSignal::new(Side::Right, rgb(colors.turn))),
        EffectId::LeftBlindSpot | EffectId::RightBlindSpot => Box::new(BlindSpotWarning::new(rgb(colors.blind_spot))),
        EffectId::Autopilot => Box::new(AutopilotBase::new(rgb(colors.autopilot))),
        EffectId::HandsOnNag => Box::new(HandsOnGlow::new(rgb(colors.hands_on))),
        EffectId::ForwardCollision => Box::new(CollisionStrobe::new(rgb(colors.collision))),
        EffectId::Charging => Box::new(ChargingPulse::new(rgb(colors.charging))),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::VehicleState;
    use crate::types::{Classification, SignalReading};

    fn label(raw: i64, text: &str) -> SignalReading {
        SignalReading {
            raw,
            value: raw as f64,
            classification: Classification::Label(text.to_string()),
        }
    }

    #[test]
    fn test_effect_index_matches_all() {
        for (i, id) in EffectId::ALL.into_iter().enumerate() {
            assert_eq!(id.index(), i);
        }
    }

    #[test]
    fn test_turn_trigger() {
        let state = VehicleState::new();
        let triggers = TriggerConfig::default();
        assert!(!EffectId::LeftTurn.is_triggered(&state.snapshot(), &triggers));

        state.set_batch([(Signal::LeftTurn, label(2, "ActiveHigh"))]);
        assert!(EffectId::LeftTurn.is_triggered(&state.snapshot(), &triggers));
        assert!(!EffectId::RightTurn.is_triggered(&state.snapshot(), &triggers));
    }

    #[test]
    fn test_unknown_never_triggers() {
        let state = VehicleState::new();
        state.set_batch([(
            Signal::LeftTurn,
            SignalReading {
                raw: 3,
                value: 3.0,
                classification: Classification::Unknown,
            },
        )]);
        assert!(!EffectId::LeftTurn.is_triggered(&state.snapshot(), &TriggerConfig::default()));
    }

    #[test]
    fn test_charging_takes_base_layer_from_autopilot() {
        let state = VehicleState::new();
        let triggers = TriggerConfig::default();
        state.set_batch([(Signal::AutopilotState, label(3, "ActiveNominal"))]);
        assert!(EffectId::Autopilot.is_triggered(&state.snapshot(), &triggers));

        state.set_batch([(Signal::ChargeStatus, label(1, "Charging"))]);
        let snapshot = state.snapshot();
        assert!(!EffectId::Autopilot.is_triggered(&snapshot, &triggers));
        assert!(EffectId::Charging.is_triggered(&snapshot, &triggers));
    }

    #[test]
    fn test_intervals() {
        let timing = TimingConfig::default();
        assert_eq!(EffectId::LeftTurn.interval(&timing), Duration::from_millis(450));
        assert_eq!(EffectId::RightBlindSpot.interval(&timing), Duration::from_millis(150));
    }
}
