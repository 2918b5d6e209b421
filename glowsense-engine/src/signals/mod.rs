//! Signal database and built-in catalogue
//!
//! This module contains the static signal definitions (descriptors and value
//! tables) and the database the frame router decodes against.

pub mod catalog;
pub mod database;

// Re-export key types for convenience
pub use database::{
    ByteOrder, DatabaseStats, MessageDefinition, SignalDatabase, SignalDefinition,
    SignalDescriptor, ValueTable,
};
