//! Bridge wire format
//!
//! Every unit on the wire starts with an 8-byte header made of two
//! little-endian 32-bit words:
//!
//! ```text
//! word0: frame id in bits 21..32
//! word1: payload length in bits 0..4, bus id above
//! ```
//!
//! Data units carry 8 payload bytes after the header. Control replies
//! (handshake accepted / refused) are a bare header on bus 15.

use crate::types::CanFrame;
use byteorder::{ByteOrder as _, LittleEndian};

/// Sent to open a session and re-sent as keep-alive
pub const HANDSHAKE_TOKEN: &[u8] = b"ehllo";
/// Sent to close a session
pub const DISCONNECT_TOKEN: &[u8] = b"bye";

pub const HEADER_LEN: usize = 8;
pub const PAYLOAD_LEN: usize = 8;
pub const UNIT_LEN: usize = HEADER_LEN + PAYLOAD_LEN;

/// Bus the bridge uses for control replies
pub const CONTROL_BUS: u8 = 15;
pub const ACCEPTED_ID: u16 = 6;
pub const REFUSED_ID: u16 = 7;

/// Leading byte of a filter registration request
pub const FILTER_COMMAND: u8 = 0x0F;

const FRAME_ID_SHIFT: u32 = 21;

/// Decoded unit header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub bus_id: u8,
    pub frame_id: u16,
    pub length: u8,
}

impl FrameHeader {
    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Self {
        let word0 = LittleEndian::read_u32(&bytes[0..4]);
        let word1 = LittleEndian::read_u32(&bytes[4..8]);
        Self {
            bus_id: (word1 >> 4) as u8,
            frame_id: (word0 >> FRAME_ID_SHIFT) as u16,
            length: (word1 & 0xF) as u8,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        let word0 = u32::from(self.frame_id & 0x7FF) << FRAME_ID_SHIFT;
        let word1 = (u32::from(self.bus_id) << 4) | u32::from(self.length & 0xF);
        LittleEndian::write_u32(&mut bytes[0..4], word0);
        LittleEndian::write_u32(&mut bytes[4..8], word1);
        bytes
    }
}

/// Bridge answer to the handshake token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeReply {
    Accepted,
    Refused,
    /// Anything else; carries the decoded ids for logging
    Invalid { bus_id: u8, frame_id: u16 },
}

impl HandshakeReply {
    pub fn classify(header: &FrameHeader) -> Self {
        match (header.bus_id, header.frame_id) {
            (CONTROL_BUS, ACCEPTED_ID) => HandshakeReply::Accepted,
            (CONTROL_BUS, REFUSED_ID) => HandshakeReply::Refused,
            (bus_id, frame_id) => HandshakeReply::Invalid { bus_id, frame_id },
        }
    }
}

/// Request the bridge to forward one message
pub fn filter_request(bus_id: u8, frame_id: u16) -> [u8; 4] {
    let [hi, lo] = frame_id.to_be_bytes();
    [FILTER_COMMAND, bus_id, hi, lo]
}

/// Encode a data unit
pub fn encode_unit(frame: &CanFrame) -> [u8; UNIT_LEN] {
    let header = FrameHeader {
        bus_id: frame.bus_id,
        frame_id: frame.frame_id,
        length: PAYLOAD_LEN as u8,
    };
    let mut unit = [0u8; UNIT_LEN];
    unit[..HEADER_LEN].copy_from_slice(&header.encode());
    unit[HEADER_LEN..].copy_from_slice(&frame.data);
    unit
}

/// Reassembles 16-byte data units across arbitrary read boundaries
#[derive(Debug, Default)]
pub struct FrameAssembler {
    pending: Vec<u8>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes and return every completed frame
    pub fn push(&mut self, bytes: &[u8]) -> Vec<CanFrame> {
        self.pending.extend_from_slice(bytes);

        let complete = self.pending.len() / UNIT_LEN * UNIT_LEN;
        let frames = self.pending[..complete]
            .chunks_exact(UNIT_LEN)
            .map(|unit| {
                let mut header = [0u8; HEADER_LEN];
                header.copy_from_slice(&unit[..HEADER_LEN]);
                let header = FrameHeader::decode(&header);

                let mut data = [0u8; PAYLOAD_LEN];
                data.copy_from_slice(&unit[HEADER_LEN..]);
                if usize::from(header.length) < PAYLOAD_LEN {
                    log::trace!(
                        "Frame {} on bus {} declares {} payload bytes",
                        header.frame_id,
                        header.bus_id,
                        header.length
                    );
                }
                CanFrame::new(header.bus_id, header.frame_id, data)
            })
            .collect();

        self.pending.drain(..complete);
        frames
    }

    /// Bytes of an incomplete unit held back
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_header_words() {
        // word0 = 1013 << 21, word1 = (1 << 4) | 8
        let word0: u32 = 1013 << 21;
        let word1: u32 = (1 << 4) | 8;
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&word0.to_le_bytes());
        bytes[4..].copy_from_slice(&word1.to_le_bytes());

        let header = FrameHeader::decode(&bytes);
        assert_eq!(header.frame_id, 1013);
        assert_eq!(header.bus_id, 1);
        assert_eq!(header.length, 8);
        assert_eq!(header.encode(), bytes);
    }

    #[test]
    fn test_handshake_reply_classification() {
        let reply = |bus_id, frame_id| {
            HandshakeReply::classify(&FrameHeader {
                bus_id,
                frame_id,
                length: 0,
            })
        };
        assert_eq!(reply(15, 6), HandshakeReply::Accepted);
        assert_eq!(reply(15, 7), HandshakeReply::Refused);
        assert_eq!(reply(14, 6), HandshakeReply::Invalid { bus_id: 14, frame_id: 6 });
        assert_eq!(reply(15, 8), HandshakeReply::Invalid { bus_id: 15, frame_id: 8 });
    }

    #[test]
    fn test_filter_request_is_big_endian() {
        assert_eq!(filter_request(0, 1013), [0x0F, 0x00, 0x03, 0xF5]);
        assert_eq!(filter_request(1, 0x0204), [0x0F, 0x01, 0x02, 0x04]);
    }

    #[test]
    fn test_assembler_handles_split_units() {
        let first = CanFrame::new(0, 1013, [2, 0, 0, 0, 0, 0, 0, 0]);
        let second = CanFrame::new(1, 826, [0, 0, 0, 0, 0, 0, 80, 0]);
        let mut stream = encode_unit(&first).to_vec();
        stream.extend_from_slice(&encode_unit(&second));

        let mut assembler = FrameAssembler::new();
        assert!(assembler.push(&stream[..5]).is_empty());
        let frames = assembler.push(&stream[5..20]);
        assert_eq!(frames, vec![first]);
        assert_eq!(assembler.pending(), 4);

        let frames = assembler.push(&stream[20..]);
        assert_eq!(frames, vec![second]);
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn test_assembler_multiple_units_in_one_read() {
        let frames: Vec<CanFrame> = (0..3).map(|i| CanFrame::new(0, 900 + i, [i as u8; 8])).collect();
        let stream: Vec<u8> = frames.iter().flat_map(encode_unit).collect();

        let mut assembler = FrameAssembler::new();
        assert_eq!(assembler.push(&stream), frames);
    }
}
