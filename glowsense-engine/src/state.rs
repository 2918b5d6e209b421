//! Vehicle state store
//!
//! Latest-value snapshot of every tracked signal. The frame router is the
//! single writer; effect tasks and trigger evaluation are readers. One coarse
//! lock guards the whole map so a batch decoded from one frame is never
//! observed half-applied.

use crate::types::{Signal, SignalReading};
use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Signals whose category changed in one update
pub type ChangeSet = BTreeSet<Signal>;

#[derive(Debug, Default, Clone)]
struct Inner {
    readings: HashMap<Signal, SignalReading>,
    revision: u64,
}

/// Thread-safe store of the latest decoded signal readings
#[derive(Debug, Default)]
pub struct VehicleState {
    inner: RwLock<Inner>,
}

impl VehicleState {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning is ignored: readings are plain values
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Latest reading of a signal, if one was ever decoded
    pub fn get(&self, signal: Signal) -> Option<SignalReading> {
        self.read().readings.get(&signal).cloned()
    }

    /// Apply all updates atomically and report which signals changed category
    ///
    /// A signal seen for the first time counts as changed.
    pub fn set_batch<I>(&self, updates: I) -> ChangeSet
    where
        I: IntoIterator<Item = (Signal, SignalReading)>,
    {
        let mut changed = ChangeSet::new();
        let mut inner = self.write();

        for (signal, reading) in updates {
            let is_change = inner
                .readings
                .get(&signal)
                .map_or(true, |previous| reading.category_changed(previous));
            if is_change {
                changed.insert(signal);
            }
            inner.readings.insert(signal, reading);
        }
        inner.revision += 1;

        changed
    }

    /// Consistent copy of every reading
    pub fn snapshot(&self) -> VehicleSnapshot {
        let inner = self.read();
        VehicleSnapshot {
            readings: inner.readings.clone(),
            revision: inner.revision,
        }
    }

    /// Number of batches applied since creation or the last reset
    pub fn revision(&self) -> u64 {
        self.read().revision
    }

    /// Forget every reading (used on bridge reconnect)
    pub fn reset(&self) {
        let mut inner = self.write();
        inner.readings.clear();
        inner.revision = 0;
    }
}

/// Point-in-time copy of the vehicle state
#[derive(Debug, Clone, Default)]
pub struct VehicleSnapshot {
    readings: HashMap<Signal, SignalReading>,
    revision: u64,
}

impl VehicleSnapshot {
    /// Reading of a signal at snapshot time
    pub fn get(&self, signal: Signal) -> Option<&SignalReading> {
        self.readings.get(&signal)
    }

    /// Physical value of a signal, if known
    pub fn value(&self, signal: Signal) -> Option<f64> {
        self.get(signal).map(|reading| reading.value)
    }

    /// True if the signal is currently classified as one of `labels`
    pub fn is_one_of(&self, signal: Signal, labels: &[String]) -> bool {
        self.get(signal).is_some_and(|reading| reading.is_one_of(labels))
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Classification;
    use std::sync::Arc;
    use std::thread;

    fn label(raw: i64, text: &str) -> SignalReading {
        SignalReading {
            raw,
            value: raw as f64,
            classification: Classification::Label(text.to_string()),
        }
    }

    #[test]
    fn test_first_update_is_a_change() {
        let state = VehicleState::new();
        let changed = state.set_batch([
            (Signal::LeftTurn, label(2, "ActiveHigh")),
            (Signal::RightTurn, label(0, "Off")),
        ]);
        assert_eq!(changed.len(), 2);
        assert_eq!(state.revision(), 1);
        assert_eq!(state.get(Signal::LeftTurn).unwrap().raw, 2);
    }

    #[test]
    fn test_unchanged_category_not_reported() {
        let state = VehicleState::new();
        state.set_batch([(Signal::LeftTurn, label(2, "ActiveHigh"))]);

        let changed = state.set_batch([(Signal::LeftTurn, label(2, "ActiveHigh"))]);
        assert!(changed.is_empty());

        let changed = state.set_batch([(Signal::LeftTurn, label(0, "Off"))]);
        assert_eq!(changed.into_iter().collect::<Vec<_>>(), vec![Signal::LeftTurn]);
    }

    #[test]
    fn test_reset_clears_readings() {
        let state = VehicleState::new();
        state.set_batch([(Signal::ChargeStatus, label(1, "Charging"))]);
        state.reset();
        assert!(state.get(Signal::ChargeStatus).is_none());
        assert_eq!(state.revision(), 0);
    }

    #[test]
    fn test_batches_are_never_observed_torn() {
        let state = Arc::new(VehicleState::new());
        let writer = {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                for i in 0..2000i64 {
                    state.set_batch([
                        (Signal::BlindSpotLeft, label(i, "A")),
                        (Signal::BlindSpotRight, label(i, "A")),
                    ]);
                }
            })
        };

        for _ in 0..2000 {
            let snapshot = state.snapshot();
            let left = snapshot.get(Signal::BlindSpotLeft).map(|r| r.raw);
            let right = snapshot.get(Signal::BlindSpotRight).map(|r| r.raw);
            assert_eq!(left, right);
        }
        writer.join().unwrap();
    }
}
