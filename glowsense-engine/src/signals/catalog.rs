//! Built-in Model 3 signal catalogue
//!
//! Frame identifiers, bit layouts and value tables for the messages the
//! lighting engine listens to. Any of these can be overridden through the
//! `[calibration]` section of the configuration.

use crate::signals::database::{MessageDefinition, SignalDefinition, SignalDescriptor, ValueTable};
use crate::types::Signal;

/// VCFRONT lighting: turn indicator requests
pub const VCFRONT_LIGHTING: u16 = 1013;
/// DAS status: autopilot, blind spot, hands-on and collision warnings
pub const DAS_STATUS: u16 = 921;
/// UI range / state of charge
pub const UI_RANGE_SOC: u16 = 826;
/// PCS charge status
pub const PCS_CHARGE_STATUS: u16 = 516;
/// UI vehicle control: display brightness
pub const UI_VEHICLE_CONTROL: u16 = 627;

fn table(entries: &[(i64, &str)]) -> Option<ValueTable> {
    Some(
        entries
            .iter()
            .map(|&(code, label)| (code, label.to_string()))
            .collect(),
    )
}

fn turn_table() -> Option<ValueTable> {
    table(&[(0, "Off"), (1, "ActiveLow"), (2, "ActiveHigh")])
}

fn blind_spot_table() -> Option<ValueTable> {
    table(&[(0, "NoWarning"), (1, "WarningLevel1"), (2, "WarningLevel2")])
}

/// All built-in message definitions
pub fn messages() -> Vec<MessageDefinition> {
    vec![
        MessageDefinition {
            id: VCFRONT_LIGHTING,
            name: "VCFRONT_lighting".to_string(),
            bus: 0,
            signals: vec![
                SignalDefinition {
                    signal: Signal::LeftTurn,
                    descriptor: SignalDescriptor::unsigned(0, 2),
                    value_table: turn_table(),
                },
                SignalDefinition {
                    signal: Signal::RightTurn,
                    descriptor: SignalDescriptor::unsigned(2, 2),
                    value_table: turn_table(),
                },
            ],
        },
        MessageDefinition {
            id: DAS_STATUS,
            name: "DAS_status".to_string(),
            bus: 0,
            signals: vec![
                SignalDefinition {
                    signal: Signal::AutopilotState,
                    descriptor: SignalDescriptor::unsigned(0, 4),
                    // Code 6 is left out; add it through calibration once confirmed
                    value_table: table(&[
                        (0, "Disabled"),
                        (1, "Unavailable"),
                        (2, "Available"),
                        (3, "ActiveNominal"),
                        (4, "ActiveRestricted"),
                        (5, "ActiveNav"),
                        (8, "Aborting"),
                        (9, "Aborted"),
                        (14, "Fault"),
                        (15, "Sna"),
                    ]),
                },
                SignalDefinition {
                    signal: Signal::BlindSpotLeft,
                    descriptor: SignalDescriptor::unsigned(4, 2),
                    value_table: blind_spot_table(),
                },
                SignalDefinition {
                    signal: Signal::BlindSpotRight,
                    descriptor: SignalDescriptor::unsigned(6, 2),
                    value_table: blind_spot_table(),
                },
                SignalDefinition {
                    signal: Signal::ForwardCollision,
                    descriptor: SignalDescriptor::unsigned(22, 2),
                    value_table: table(&[(0, "None"), (1, "Warning")]),
                },
                SignalDefinition {
                    signal: Signal::AutopilotHandsOn,
                    descriptor: SignalDescriptor::unsigned(42, 4),
                    value_table: table(&[
                        (0, "NotRequired"),
                        (1, "Detected"),
                        (2, "RequiredNotDetected"),
                        (3, "RequiredDetected"),
                        (4, "RequiredEscalated"),
                        (5, "RequiredChime1"),
                        (6, "RequiredChime2"),
                        (7, "RequiredSlowing"),
                        (8, "StruckOut"),
                        (9, "Suspended"),
                        (10, "EscalatedChime1"),
                        (11, "EscalatedChime2"),
                        (15, "Sna"),
                    ]),
                },
            ],
        },
        MessageDefinition {
            id: UI_RANGE_SOC,
            name: "UI_rangeSOC".to_string(),
            bus: 0,
            signals: vec![SignalDefinition {
                signal: Signal::StateOfCharge,
                descriptor: SignalDescriptor::unsigned(48, 7),
                value_table: None,
            }],
        },
        MessageDefinition {
            id: PCS_CHARGE_STATUS,
            name: "PCS_chgStatus".to_string(),
            bus: 0,
            signals: vec![SignalDefinition {
                signal: Signal::ChargeStatus,
                descriptor: SignalDescriptor::unsigned(4, 1),
                value_table: table(&[(0, "NotCharging"), (1, "Charging")]),
            }],
        },
        MessageDefinition {
            id: UI_VEHICLE_CONTROL,
            name: "UI_vehicleControl".to_string(),
            bus: 0,
            signals: vec![SignalDefinition {
                signal: Signal::UiBrightness,
                descriptor: SignalDescriptor::unsigned(32, 8).scaled(0.5, 0.0),
                value_table: None,
            }],
        },
    ]
}
