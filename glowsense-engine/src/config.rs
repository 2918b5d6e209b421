//! Engine configuration types
//!
//! Static configuration for the strip layout, colours, effect cadence,
//! trigger categories, bridge session and signal calibration. Every section
//! has defaults so a partial configuration file is enough.

use crate::signals::database::ByteOrder;
use crate::types::Rgb;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration for the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub strip: StripLayout,
    pub colors: ColorConfig,
    pub brightness: BrightnessConfig,
    pub bridge: BridgeConfig,
    pub timing: TimingConfig,
    pub triggers: TriggerConfig,
    pub calibration: CalibrationConfig,
}

impl EngineConfig {
    /// Create a new engine configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the strip length
    pub fn with_led_count(mut self, led_count: usize) -> Self {
        self.strip.led_count = led_count;
        self
    }

    /// Builder method: set the bridge address
    pub fn with_bridge_address(mut self, address: impl Into<String>) -> Self {
        self.bridge.address = address.into();
        self
    }
}

/// Physical layout of the strip and effect zones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StripLayout {
    /// Number of LED pixels
    pub led_count: usize,
    /// Outer pixels on each side used by a turn signal
    pub signal_length: usize,
    /// Outermost pixels on each side owned by a blind-spot warning
    pub blindspot_length: usize,
}

impl Default for StripLayout {
    fn default() -> Self {
        Self {
            led_count: 60,
            signal_length: 20,
            blindspot_length: 5,
        }
    }
}

/// Effect colours as `[r, g, b]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub default: [u8; 3],
    pub autopilot: [u8; 3],
    pub turn: [u8; 3],
    pub blind_spot: [u8; 3],
    pub hands_on: [u8; 3],
    pub collision: [u8; 3],
    pub charging: [u8; 3],
    pub error: [u8; 3],
    pub stale: [u8; 3],
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            default: [255, 165, 0],
            autopilot: [0, 0, 255],
            turn: [255, 255, 0],
            blind_spot: [255, 0, 0],
            hands_on: [255, 0, 0],
            collision: [255, 0, 0],
            charging: [0, 255, 0],
            error: [255, 0, 0],
            stale: [255, 255, 0],
        }
    }
}

/// Convert a configured colour triple
pub fn rgb(color: [u8; 3]) -> Rgb {
    Rgb::new(color[0], color[1], color[2])
}

/// Device brightness range the UI brightness percentage is mapped onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrightnessConfig {
    pub min: u8,
    pub max: u8,
    /// Brightness used until the first UI brightness frame arrives
    pub initial: u8,
}

impl Default for BrightnessConfig {
    fn default() -> Self {
        Self {
            min: 0,
            max: 255,
            initial: 255,
        }
    }
}

/// Telemetry bridge session settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// `host:port` of the bridge
    pub address: String,
    pub connect_timeout_ms: u64,
    /// Socket read timeout; also bounds keep-alive jitter
    pub read_timeout_ms: u64,
    pub keepalive_interval_ms: u64,
    pub retry_delay_ms: u64,
    /// Number of error colour pulses shown on a failed attempt
    pub error_pulses: u32,
    /// Telemetry silence after which the stale indication is shown (0 disables)
    pub stale_after_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            address: "192.168.4.1:1338".to_string(),
            connect_timeout_ms: 3000,
            read_timeout_ms: 500,
            keepalive_interval_ms: 5000,
            retry_delay_ms: 1000,
            error_pulses: 2,
            stale_after_ms: 10_000,
        }
    }
}

impl BridgeConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// None when the stale indication is disabled
    pub fn stale_after(&self) -> Option<Duration> {
        (self.stale_after_ms > 0).then(|| Duration::from_millis(self.stale_after_ms))
    }
}

/// Render interval per effect, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub turn_ms: u64,
    pub blind_spot_ms: u64,
    pub autopilot_ms: u64,
    pub hands_on_ms: u64,
    pub collision_ms: u64,
    pub charging_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            turn_ms: 450,
            blind_spot_ms: 150,
            autopilot_ms: 250,
            hands_on_ms: 40,
            collision_ms: 100,
            charging_ms: 60,
        }
    }
}

/// Category labels that make each effect's trigger true
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub turn_active: Vec<String>,
    pub blind_spot_active: Vec<String>,
    pub autopilot_active: Vec<String>,
    pub hands_on_nag: Vec<String>,
    pub collision_active: Vec<String>,
    pub charging_active: Vec<String>,
}

fn labels(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            turn_active: labels(&["ActiveLow", "ActiveHigh"]),
            blind_spot_active: labels(&["WarningLevel1", "WarningLevel2"]),
            autopilot_active: labels(&["ActiveNominal", "ActiveRestricted", "ActiveNav"]),
            hands_on_nag: labels(&[
                "RequiredEscalated",
                "RequiredChime1",
                "RequiredChime2",
                "RequiredSlowing",
                "Suspended",
                "EscalatedChime1",
            ]),
            collision_active: labels(&["Warning"]),
            charging_active: labels(&["Charging"]),
        }
    }
}

/// Per-signal and per-message overrides of the built-in catalogue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Key: signal name (e.g. "StateOfCharge")
    pub signals: BTreeMap<String, SignalCalibration>,
    /// Key: frame id as decimal string, value: bus to request it from
    pub message_bus: BTreeMap<String, u8>,
}

/// Overrides for one signal; unset fields keep the built-in value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalCalibration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_bit: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_length: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_order: Option<ByteOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
    /// Key: raw code as string, value: category label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<BTreeMap<String, String>>,
    /// Replace the built-in value table instead of merging into it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace_values: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::new()
            .with_led_count(120)
            .with_bridge_address("10.0.0.2:1338");

        assert_eq!(config.strip.led_count, 120);
        assert_eq!(config.strip.signal_length, 20);
        assert_eq!(config.bridge.address, "10.0.0.2:1338");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{
            "strip": { "led_count": 30 },
            "timing": { "turn_ms": 300 },
            "calibration": {
                "signals": {
                    "StateOfCharge": { "start_bit": 27, "byte_order": "little" }
                }
            }
        }"#;

        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.strip.led_count, 30);
        assert_eq!(config.strip.blindspot_length, 5);
        assert_eq!(config.timing.turn_ms, 300);
        assert_eq!(config.timing.blind_spot_ms, 150);
        assert_eq!(config.colors, ColorConfig::default());

        let soc = &config.calibration.signals["StateOfCharge"];
        assert_eq!(soc.start_bit, Some(27));
        assert_eq!(soc.byte_order, Some(ByteOrder::Little));
        assert_eq!(soc.bit_length, None);
    }

    #[test]
    fn test_stale_indication_can_be_disabled() {
        let mut bridge = BridgeConfig::default();
        assert_eq!(bridge.stale_after(), Some(Duration::from_secs(10)));
        bridge.stale_after_ms = 0;
        assert_eq!(bridge.stale_after(), None);
    }
}
