//! Core types for the GlowSense engine
//!
//! This module defines the fundamental values that flow through the engine:
//! raw CAN frames as relayed by the bridge, signal identifiers, decoded and
//! classified signal readings, and the engine-wide error type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// LED colour (three 8-bit channels)
pub type Rgb = smart_leds::RGB8;

/// Raw CAN frame relayed by the telemetry bridge
///
/// Constructed per received 16-byte packet unit, consumed synchronously by the
/// frame router and not retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    /// Bus number the frame was captured on
    pub bus_id: u8,
    /// 11-bit CAN message identifier
    pub frame_id: u16,
    /// Payload bytes, zero padded to 8
    pub data: [u8; 8],
}

impl CanFrame {
    /// Create a new frame
    pub fn new(bus_id: u8, frame_id: u16, data: [u8; 8]) -> Self {
        Self {
            bus_id,
            frame_id,
            data,
        }
    }

    /// Payload as one little-endian packed 64-bit word
    pub fn payload_word(&self) -> u64 {
        crate::message_decoder::MessageDecoder::payload_word(&self.data)
    }
}

/// Errors that can occur in the engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid signal definition: {0}")]
    InvalidSignalDefinition(String),

    #[error("Invalid calibration: {0}")]
    InvalidCalibration(String),

    #[error("Unknown signal name: {0}")]
    UnknownSignal(String),

    #[error("Bridge refused the connection")]
    HandshakeRefused,

    #[error("Invalid handshake reply: bus {bus_id}, frame {frame_id}")]
    HandshakeInvalid { bus_id: u8, frame_id: u16 },

    #[error("Bridge closed the connection")]
    Disconnected,

    #[error("Render failed: {0}")]
    Render(String),

    #[error("LED device error: {0}")]
    Device(String),

    #[error("Failed to spawn effect task: {0}")]
    Spawn(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Named vehicle signals tracked by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Signal {
    LeftTurn,
    RightTurn,
    AutopilotHandsOn,
    AutopilotState,
    BlindSpotLeft,
    BlindSpotRight,
    ForwardCollision,
    StateOfCharge,
    ChargeStatus,
    UiBrightness,
}

impl Signal {
    /// Every tracked signal
    pub const ALL: [Signal; 10] = [
        Signal::LeftTurn,
        Signal::RightTurn,
        Signal::AutopilotHandsOn,
        Signal::AutopilotState,
        Signal::BlindSpotLeft,
        Signal::BlindSpotRight,
        Signal::ForwardCollision,
        Signal::StateOfCharge,
        Signal::ChargeStatus,
        Signal::UiBrightness,
    ];

    /// Stable name used as state key and in calibration files
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::LeftTurn => "LeftTurn",
            Signal::RightTurn => "RightTurn",
            Signal::AutopilotHandsOn => "AutopilotHandsOn",
            Signal::AutopilotState => "AutopilotState",
            Signal::BlindSpotLeft => "BlindSpotLeft",
            Signal::BlindSpotRight => "BlindSpotRight",
            Signal::ForwardCollision => "ForwardCollision",
            Signal::StateOfCharge => "StateOfCharge",
            Signal::ChargeStatus => "ChargeStatus",
            Signal::UiBrightness => "UIBrightness",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Signal::ALL
            .into_iter()
            .find(|signal| signal.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| EngineError::UnknownSignal(s.to_string()))
    }
}

/// Category a decoded value falls into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Code found in the signal's value table
    Label(String),
    /// Code not present in the signal's value table
    Unknown,
    /// Signal has no value table; the value itself is the category
    Numeric,
}

impl Classification {
    /// Label text, if the value was classified into a named category
    pub fn label(&self) -> Option<&str> {
        match self {
            Classification::Label(label) => Some(label),
            Classification::Unknown | Classification::Numeric => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Label(label) => f.write_str(label),
            Classification::Unknown => f.write_str("Unknown"),
            Classification::Numeric => f.write_str("Numeric"),
        }
    }
}

/// A decoded, classified signal value
#[derive(Debug, Clone, PartialEq)]
pub struct SignalReading {
    /// Raw code after sign extension, before scaling
    pub raw: i64,
    /// Physical value (raw * factor + offset)
    pub value: f64,
    /// Category derived from the value table
    pub classification: Classification,
}

impl SignalReading {
    /// True if this reading's category differs from `previous`
    ///
    /// Numeric signals change category whenever their value changes.
    pub fn category_changed(&self, previous: &SignalReading) -> bool {
        match (&self.classification, &previous.classification) {
            (Classification::Numeric, Classification::Numeric) => self.value != previous.value,
            (current, before) => current != before,
        }
    }

    /// True if the reading is classified as one of `labels`
    ///
    /// `Unknown` readings never match.
    pub fn is_one_of(&self, labels: &[String]) -> bool {
        self.classification
            .label()
            .is_some_and(|label| labels.iter().any(|l| l == label))
    }
}

impl fmt::Display for SignalReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.classification {
            Classification::Numeric => write!(f, "{:.3}", self.value),
            ref other => write!(f, "{} ({})", other, self.raw),
        }
    }
}
