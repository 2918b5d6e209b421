//! Frame router
//!
//! Maps an arriving frame's identifier to its message definition, decodes all
//! of the message's signals and writes them into the vehicle state as one
//! atomic batch.

use crate::message_decoder::MessageDecoder;
use crate::signals::SignalDatabase;
use crate::state::{ChangeSet, VehicleState};
use crate::types::CanFrame;
use std::sync::Arc;

/// Routes frames into the vehicle state store
pub struct FrameRouter {
    database: Arc<SignalDatabase>,
    state: Arc<VehicleState>,
}

impl FrameRouter {
    pub fn new(database: Arc<SignalDatabase>, state: Arc<VehicleState>) -> Self {
        Self { database, state }
    }

    /// Decode a frame and store its signals
    ///
    /// Returns the signals whose category changed. Unknown identifiers are
    /// ignored and yield an empty set.
    pub fn route(&self, frame: &CanFrame) -> ChangeSet {
        let Some(message_def) = self.database.get_message(frame.frame_id) else {
            log::trace!("Ignoring unknown frame ID {} (0x{:X})", frame.frame_id, frame.frame_id);
            return ChangeSet::new();
        };

        let readings = MessageDecoder::decode_message(frame, message_def);
        let changed = self.state.set_batch(readings);

        if !changed.is_empty() {
            log::debug!("{} changed: {:?}", message_def.name, changed);
        }
        changed
    }

    pub fn state(&self) -> &Arc<VehicleState> {
        &self.state
    }
}
