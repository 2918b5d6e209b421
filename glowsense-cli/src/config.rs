//! Configuration loading and parsing

use anyhow::{bail, Context, Result};
use glowsense_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main application configuration (loaded from a TOML file)
///
/// Engine sections (`[strip]`, `[colors]`, `[bridge]`, ...) sit at the top
/// level next to the CLI-only `[display]` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(flatten)]
    pub engine: EngineConfig,
    pub display: DisplayConfig,
}

/// Settings for the logging strip used when no hardware driver is attached
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Log the strip contents every N shows (0 disables)
    pub log_every: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { log_every: 20 }
    }
}

impl AppConfig {
    /// Apply command line overrides
    pub fn apply_overrides(&mut self, bridge: Option<&str>, led_count: Option<usize>) {
        if let Some(address) = bridge {
            self.engine.bridge.address = address.to_string();
        }
        if let Some(led_count) = led_count {
            self.engine.strip.led_count = led_count;
        }
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let strip = &self.engine.strip;
        if strip.led_count == 0 {
            bail!("strip.led_count must be at least 1");
        }
        if strip.blindspot_length > strip.signal_length {
            log::warn!(
                "strip.blindspot_length ({}) exceeds strip.signal_length ({}); turn zones will be empty while a blind-spot warning is live",
                strip.blindspot_length,
                strip.signal_length
            );
        }
        if strip.signal_length * 2 > strip.led_count {
            log::warn!(
                "Turn zones ({} px each side) overlap on a {} px strip",
                strip.signal_length,
                strip.led_count
            );
        }
        if self.engine.bridge.address.trim().is_empty() {
            bail!("bridge.address must not be empty");
        }
        let brightness = &self.engine.brightness;
        if brightness.min > brightness.max {
            bail!(
                "brightness.min ({}) is greater than brightness.max ({})",
                brightness.min,
                brightness.max
            );
        }
        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [strip]
            led_count = 120
            signal_length = 30

            [colors]
            default = [10, 20, 30]

            [bridge]
            address = "10.0.0.2:1338"

            [calibration.signals.StateOfCharge]
            start_bit = 27

            [display]
            log_every = 0
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.engine.strip.led_count, 120);
        assert_eq!(config.engine.strip.signal_length, 30);
        assert_eq!(config.engine.strip.blindspot_length, 5);
        assert_eq!(config.engine.colors.default, [10, 20, 30]);
        assert_eq!(config.engine.bridge.address, "10.0.0.2:1338");
        assert_eq!(
            config.engine.calibration.signals["StateOfCharge"].start_bit,
            Some(27)
        );
        assert_eq!(config.display.log_every, 0);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timing]\nturn_ms = 300").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.engine.timing.turn_ms, 300);
        assert_eq!(config.engine.timing.blind_spot_ms, 150);
    }

    #[test]
    fn test_load_config_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("missing.toml"));

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "[strip\nled_count = 1").unwrap();
        assert!(load_config(&bad).is_err());
    }

    #[test]
    fn test_overrides_and_validation() {
        let mut config = AppConfig::default();
        config.apply_overrides(Some("127.0.0.1:9000"), Some(0));
        assert_eq!(config.engine.bridge.address, "127.0.0.1:9000");
        assert!(config.validate().is_err());

        config.apply_overrides(None, Some(144));
        assert!(config.validate().is_ok());

        config.engine.brightness.min = 200;
        config.engine.brightness.max = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dump_round_trips() {
        let config = AppConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
