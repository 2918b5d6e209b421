//! Telemetry bridge client

pub mod protocol;
mod session;

pub use protocol::{FrameAssembler, FrameHeader, HandshakeReply};
pub use session::BridgeSession;
