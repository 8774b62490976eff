//! Throttled write-back of MIDI values into the durable store
//!
//! The render loop gets every message immediately over the bus. The store
//! (scene configs, saved base values) only needs the final position, so
//! writes are deduplicated per destination and flushed once the throttle
//! window has passed.

use std::collections::BTreeMap;

use crate::mapping::Destination;

/// Default flush window in ms
pub const SYNC_THROTTLE_MS: f64 = 60.0;

/// Receiver of batched store writes, values in the destination's UI range
pub trait ParamStore {
    fn write(&mut self, dest: Destination, value: f32);
}

/// In-memory store, useful for hosts that persist on their own schedule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    pub values: BTreeMap<Destination, f32>,
}

impl ParamStore for MemoryStore {
    fn write(&mut self, dest: Destination, value: f32) {
        self.values.insert(dest, value);
    }
}

#[derive(Debug, Clone)]
pub struct StoreSync {
    pending: BTreeMap<Destination, f32>,
    deadline: Option<f64>,
    throttle_ms: f64,
}

impl StoreSync {
    pub fn new(throttle_ms: f64) -> Self {
        Self {
            pending: BTreeMap::new(),
            deadline: None,
            throttle_ms,
        }
    }

    /// Queue a write; the newest value per destination wins
    pub fn schedule(&mut self, dest: Destination, value: f32, now: f64) {
        self.pending.insert(dest, value);
        if self.deadline.is_none() {
            self.deadline = Some(now + self.throttle_ms);
        }
    }

    /// Flush into `store` once the deadline has passed; returns writes made
    pub fn poll(&mut self, store: &mut dyn ParamStore, now: f64) -> usize {
        match self.deadline {
            Some(deadline) if now >= deadline => {}
            _ => return 0,
        }
        self.deadline = None;
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        for (dest, value) in pending {
            store.write(dest, value);
        }
        log::trace!("MIDI: synced {} value(s) to store", count);
        count
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl Default for StoreSync {
    fn default() -> Self {
        Self::new(SYNC_THROTTLE_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::params::LayerParam;
    use strata_core::LayerId;

    #[test]
    fn test_throttle_and_dedup() {
        let size = Destination::Layer(LayerId::One, LayerParam::Size);
        let mut sync = StoreSync::default();
        let mut store = MemoryStore::default();

        sync.schedule(size, 1.0, 0.0);
        sync.schedule(size, 2.0, 20.0);
        sync.schedule(Destination::Crossfader, 0.3, 40.0);
        assert_eq!(sync.pending(), 2);

        // window opened by the first write
        assert_eq!(sync.poll(&mut store, 59.0), 0);
        assert_eq!(sync.poll(&mut store, 60.0), 2);
        assert_eq!(store.values[&size], 2.0);
        assert_eq!(store.values[&Destination::Crossfader], 0.3);

        assert_eq!(sync.poll(&mut store, 500.0), 0);
    }
}
