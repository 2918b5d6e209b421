//! Message Decoding Engine
//!
//! Extracts signal values from raw CAN frames based on signal definitions
//! from the signal database. Handles bit extraction, byte order, sign
//! extension, physical value conversion and value-table classification.

use crate::signals::database::{ByteOrder, MessageDefinition, SignalDescriptor, ValueTable};
use crate::types::{CanFrame, Classification, Signal, SignalReading};
use byteorder::{ByteOrder as _, LittleEndian};

/// Message decoder - extracts signals from CAN frames
pub struct MessageDecoder;

impl MessageDecoder {
    /// Decode every signal of a message from a frame
    ///
    /// # Arguments
    /// * `frame` - Raw CAN frame
    /// * `message_def` - Message definition from signal database
    ///
    /// # Returns
    /// One classified reading per signal in the message definition
    pub fn decode_message(frame: &CanFrame, message_def: &MessageDefinition) -> Vec<(Signal, SignalReading)> {
        let word = Self::payload_word(&frame.data);

        message_def
            .signals
            .iter()
            .map(|def| {
                let raw = Self::extract_raw(word, &def.descriptor);
                let reading = SignalReading {
                    raw,
                    value: Self::scale(raw, &def.descriptor),
                    classification: Self::classify(raw, def.value_table.as_ref()),
                };
                log::trace!("0x{:X} {} = {}", frame.frame_id, def.signal, reading);
                (def.signal, reading)
            })
            .collect()
    }

    /// Decode a single signal from a 64-bit payload word
    ///
    /// The descriptor must have passed [`SignalDescriptor::validate`].
    pub fn decode(raw: u64, descriptor: &SignalDescriptor) -> f64 {
        Self::scale(Self::extract_raw(raw, descriptor), descriptor)
    }

    /// Interpret 8 payload bytes as one little-endian word
    pub fn payload_word(data: &[u8; 8]) -> u64 {
        LittleEndian::read_u64(data)
    }

    /// Map a raw code through a value table
    pub fn classify(raw: i64, table: Option<&ValueTable>) -> Classification {
        match table {
            None => Classification::Numeric,
            Some(table) => table
                .get(&raw)
                .map(|label| Classification::Label(label.clone()))
                .unwrap_or(Classification::Unknown),
        }
    }

    fn scale(raw: i64, descriptor: &SignalDescriptor) -> f64 {
        // Unsigned codes keep their bit pattern in the i64
        let unscaled = if descriptor.signed { raw as f64 } else { raw as u64 as f64 };
        unscaled * descriptor.factor + descriptor.offset
    }

    /// Extract raw signal bits with byte order and sign applied
    fn extract_raw(raw: u64, descriptor: &SignalDescriptor) -> i64 {
        let word = match descriptor.byte_order {
            ByteOrder::Little => raw,
            ByteOrder::Big => raw.swap_bytes(),
        };

        let length = u32::from(descriptor.bit_length);
        let bits = (word >> descriptor.start_bit) & Self::mask(length);

        if descriptor.signed {
            Self::sign_extend(bits, length)
        } else {
            bits as i64
        }
    }

    fn mask(length: u32) -> u64 {
        if length >= 64 {
            u64::MAX
        } else {
            (1u64 << length) - 1
        }
    }

    /// Sign-extend a value from N bits to 64 bits
    ///
    /// If the value's MSB is 1, fill the upper bits with 1s.
    fn sign_extend(value: u64, bit_length: u32) -> i64 {
        if bit_length >= 64 {
            return value as i64;
        }

        let sign_bit = 1u64 << (bit_length - 1);
        if (value & sign_bit) != 0 {
            let mask = !0u64 << bit_length;
            (value | mask) as i64
        } else {
            value as i64
        }
    }
}
