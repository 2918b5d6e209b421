//! Unified signal database
//!
//! Holds the static message and signal definitions the frame router decodes
//! against. Built from the built-in catalogue and optionally overridden by a
//! calibration table, then validated once before the engine starts.

use crate::config::{CalibrationConfig, SignalCalibration};
use crate::types::{EngineError, Result, Signal};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Enumeration table: raw integer code -> category label
pub type ValueTable = BTreeMap<i64, String>;

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Payload word used as received
    Little,
    /// Payload word byte-swapped before extraction
    Big,
}

/// Describes how to carve one signal out of a frame's 64-bit payload word
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalDescriptor {
    /// Bit index of the least significant bit
    pub start_bit: u8,
    /// Width in bits
    pub bit_length: u8,
    /// Byte order of the payload word
    pub byte_order: ByteOrder,
    /// Two's-complement interpretation
    pub signed: bool,
    /// Scale factor to convert raw value to physical value
    pub factor: f64,
    /// Offset to add after scaling
    pub offset: f64,
}

impl SignalDescriptor {
    /// Unsigned little-endian descriptor with unit scaling
    pub const fn unsigned(start_bit: u8, bit_length: u8) -> Self {
        Self {
            start_bit,
            bit_length,
            byte_order: ByteOrder::Little,
            signed: false,
            factor: 1.0,
            offset: 0.0,
        }
    }

    /// Builder method: set scaling
    pub const fn scaled(mut self, factor: f64, offset: f64) -> Self {
        self.factor = factor;
        self.offset = offset;
        self
    }

    /// Check the static precondition `1 <= bit_length` and `start_bit + bit_length <= 64`
    pub fn validate(&self) -> Result<()> {
        if self.bit_length == 0 {
            return Err(EngineError::InvalidSignalDefinition(
                "bit length must be at least 1".to_string(),
            ));
        }
        if u16::from(self.start_bit) + u16::from(self.bit_length) > 64 {
            return Err(EngineError::InvalidSignalDefinition(format!(
                "start bit {} + length {} exceeds 64 bits",
                self.start_bit, self.bit_length
            )));
        }
        if !self.factor.is_finite() || !self.offset.is_finite() {
            return Err(EngineError::InvalidSignalDefinition(
                "factor and offset must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// A CAN signal definition
#[derive(Debug, Clone)]
pub struct SignalDefinition {
    /// Signal identifier
    pub signal: Signal,
    /// Bitfield layout and scaling
    pub descriptor: SignalDescriptor,
    /// Value table for enum-like values (None for numeric signals)
    pub value_table: Option<ValueTable>,
}

/// A CAN message definition
#[derive(Debug, Clone)]
pub struct MessageDefinition {
    /// CAN message ID
    pub id: u16,
    /// Message name
    pub name: String,
    /// Bus the message is requested from
    pub bus: u8,
    /// All signals in this message
    pub signals: Vec<SignalDefinition>,
}

/// The unified signal database
pub struct SignalDatabase {
    /// Key: CAN ID
    messages: HashMap<u16, MessageDefinition>,

    /// Key: signal, value: CAN ID of the message carrying it
    signal_lookup: HashMap<Signal, u16>,
}

impl SignalDatabase {
    /// Create a new empty signal database
    pub fn new() -> Self {
        Self {
            messages: HashMap::new(),
            signal_lookup: HashMap::new(),
        }
    }

    /// Database preloaded with the built-in vehicle catalogue
    pub fn builtin() -> Self {
        let mut db = Self::new();
        for message in crate::signals::catalog::messages() {
            db.add_message(message);
        }
        db
    }

    /// Add a message definition, replacing any previous one with the same ID
    pub fn add_message(&mut self, message: MessageDefinition) {
        for signal in &message.signals {
            self.signal_lookup.insert(signal.signal, message.id);
        }
        self.messages.insert(message.id, message);
    }

    /// Get the message definition for a CAN ID
    pub fn get_message(&self, can_id: u16) -> Option<&MessageDefinition> {
        self.messages.get(&can_id)
    }

    /// All message definitions ordered by CAN ID
    pub fn messages(&self) -> Vec<&MessageDefinition> {
        let mut messages: Vec<&MessageDefinition> = self.messages.values().collect();
        messages.sort_by_key(|m| m.id);
        messages
    }

    /// Find the definition of a signal and the CAN ID carrying it
    pub fn find_signal(&self, signal: Signal) -> Option<(u16, &SignalDefinition)> {
        let can_id = *self.signal_lookup.get(&signal)?;
        self.messages
            .get(&can_id)?
            .signals
            .iter()
            .find(|def| def.signal == signal)
            .map(|def| (can_id, def))
    }

    fn find_signal_mut(&mut self, signal: Signal) -> Option<&mut SignalDefinition> {
        let can_id = *self.signal_lookup.get(&signal)?;
        self.messages
            .get_mut(&can_id)?
            .signals
            .iter_mut()
            .find(|def| def.signal == signal)
    }

    /// Apply calibration overrides on top of the current definitions
    pub fn apply_calibration(&mut self, calibration: &CalibrationConfig) -> Result<()> {
        for (name, overrides) in &calibration.signals {
            let signal: Signal = name
                .parse()
                .map_err(|_| EngineError::InvalidCalibration(format!("unknown signal '{}'", name)))?;
            let definition = self.find_signal_mut(signal).ok_or_else(|| {
                EngineError::InvalidCalibration(format!("signal '{}' is not carried by any message", name))
            })?;
            Self::override_signal(definition, overrides)?;
            log::debug!("Calibration applied to {}: {:?}", signal, definition.descriptor);
        }

        for (id, bus) in &calibration.message_bus {
            let can_id: u16 = id.parse().map_err(|_| {
                EngineError::InvalidCalibration(format!("message id '{}' is not a number", id))
            })?;
            let message = self.messages.get_mut(&can_id).ok_or_else(|| {
                EngineError::InvalidCalibration(format!("message {} is not defined", can_id))
            })?;
            message.bus = *bus;
        }

        Ok(())
    }

    fn override_signal(definition: &mut SignalDefinition, overrides: &SignalCalibration) -> Result<()> {
        let descriptor = &mut definition.descriptor;
        if let Some(start_bit) = overrides.start_bit {
            descriptor.start_bit = start_bit;
        }
        if let Some(bit_length) = overrides.bit_length {
            descriptor.bit_length = bit_length;
        }
        if let Some(byte_order) = overrides.byte_order {
            descriptor.byte_order = byte_order;
        }
        if let Some(signed) = overrides.signed {
            descriptor.signed = signed;
        }
        if let Some(factor) = overrides.factor {
            descriptor.factor = factor;
        }
        if let Some(offset) = overrides.offset {
            descriptor.offset = offset;
        }

        if let Some(values) = &overrides.values {
            let mut table = ValueTable::new();
            for (code, label) in values {
                let code: i64 = code.trim().parse().map_err(|_| {
                    EngineError::InvalidCalibration(format!(
                        "value code '{}' of {} is not an integer",
                        code, definition.signal
                    ))
                })?;
                table.insert(code, label.clone());
            }
            // Merge into the existing table so calibration can add single codes
            match &mut definition.value_table {
                Some(existing) if overrides.replace_values != Some(true) => existing.extend(table),
                slot => *slot = Some(table),
            }
        }
        Ok(())
    }

    /// Verify every descriptor once at startup
    pub fn validate(&self) -> Result<()> {
        for message in self.messages.values() {
            for def in &message.signals {
                def.descriptor.validate().map_err(|e| {
                    EngineError::InvalidSignalDefinition(format!(
                        "{} in message {} (0x{:X}): {}",
                        def.signal, message.name, message.id, e
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// (bus, frame id) pairs to register with the bridge, sorted by frame id
    pub fn filters(&self) -> Vec<(u8, u16)> {
        let mut filters: Vec<(u8, u16)> = self.messages.values().map(|m| (m.bus, m.id)).collect();
        filters.sort_unstable_by_key(|&(bus, id)| (id, bus));
        filters
    }

    /// Get database statistics
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            num_messages: self.messages.len(),
            num_signals: self.messages.values().map(|m| m.signals.len()).sum(),
        }
    }
}

/// Database statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Total number of message definitions
    pub num_messages: usize,
    /// Total number of signal definitions
    pub num_signals: usize,
}

impl Default for SignalDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_empty_database() {
        let db = SignalDatabase::new();
        let stats = db.stats();
        assert_eq!(stats.num_messages, 0);
        assert_eq!(stats.num_signals, 0);
    }

    #[test]
    fn test_builtin_catalogue() {
        let db = SignalDatabase::builtin();
        assert!(db.validate().is_ok());
        assert_eq!(db.stats().num_messages, 5);

        let (can_id, turn) = db.find_signal(Signal::LeftTurn).unwrap();
        assert_eq!(can_id, 1013);
        assert_eq!(turn.descriptor.start_bit, 0);
        assert_eq!(turn.descriptor.bit_length, 2);

        let ids: Vec<u16> = db.filters().iter().map(|&(_, id)| id).collect();
        assert_eq!(ids, vec![516, 627, 826, 921, 1013]);
    }

    #[test]
    fn test_validate_rejects_overflowing_descriptor() {
        let mut db = SignalDatabase::new();
        db.add_message(MessageDefinition {
            id: 0x123,
            name: "Broken".to_string(),
            bus: 0,
            signals: vec![SignalDefinition {
                signal: Signal::StateOfCharge,
                descriptor: SignalDescriptor::unsigned(60, 8),
                value_table: None,
            }],
        });
        assert!(matches!(db.validate(), Err(EngineError::InvalidSignalDefinition(_))));
    }

    #[test]
    fn test_calibration_overrides_descriptor_and_table() {
        let mut db = SignalDatabase::builtin();
        let mut values = BTreeMap::new();
        values.insert("6".to_string(), "ActiveFsd".to_string());

        let mut calibration = CalibrationConfig::default();
        calibration.signals.insert(
            "StateOfCharge".to_string(),
            SignalCalibration {
                start_bit: Some(27),
                ..Default::default()
            },
        );
        calibration.signals.insert(
            "AutopilotState".to_string(),
            SignalCalibration {
                values: Some(values),
                ..Default::default()
            },
        );
        calibration.message_bus.insert("1013".to_string(), 1);

        db.apply_calibration(&calibration).unwrap();

        let (_, soc) = db.find_signal(Signal::StateOfCharge).unwrap();
        assert_eq!(soc.descriptor.start_bit, 27);

        let (_, ap) = db.find_signal(Signal::AutopilotState).unwrap();
        let table = ap.value_table.as_ref().unwrap();
        assert_eq!(table.get(&6).map(String::as_str), Some("ActiveFsd"));
        assert_eq!(table.get(&3).map(String::as_str), Some("ActiveNominal"));

        assert!(db.filters().contains(&(1, 1013)));
    }

    #[test]
    fn test_calibration_rejects_unknown_signal() {
        let mut db = SignalDatabase::builtin();
        let mut calibration = CalibrationConfig::default();
        calibration
            .signals
            .insert("Wipers".to_string(), SignalCalibration::default());
        assert!(matches!(
            db.apply_calibration(&calibration),
            Err(EngineError::InvalidCalibration(_))
        ));
    }

    #[test]
    fn test_messages_ordered_by_id() {
        let db = SignalDatabase::builtin();
        let ids: Vec<u16> = db.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![516, 627, 826, 921, 1013]);
    }
}
