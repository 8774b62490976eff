//! Soft-takeover ("catch") state
//!
//! A physical control only takes over a destination once it passes close to
//! the value the engine is currently showing. Until then messages are
//! observed and dropped, so a knob left in a different position doesn't make
//! the visuals jump.

use std::collections::HashSet;

use crate::mapping::Destination;

/// Max distance (normalized) between control and live value to catch
pub const CATCH_THRESHOLD: f32 = 0.06;

#[derive(Debug, Clone)]
pub struct SoftTakeover {
    caught: HashSet<Destination>,
    threshold: f32,
}

impl SoftTakeover {
    pub fn new() -> Self {
        Self::with_threshold(CATCH_THRESHOLD)
    }

    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            caught: HashSet::new(),
            threshold,
        }
    }

    /// Whether a message for `dest` may be applied
    ///
    /// Latches once `|incoming - current| <= threshold` and stays caught until
    /// [`reset`](Self::reset).
    pub fn check(&mut self, dest: Destination, incoming: f32, current: f32) -> bool {
        if self.caught.contains(&dest) {
            return true;
        }
        if (incoming - current).abs() <= self.threshold {
            log::debug!("MIDI: caught {} at {:.3}", dest, incoming);
            self.caught.insert(dest);
            return true;
        }
        false
    }

    pub fn force_caught(&mut self, dest: Destination) {
        self.caught.insert(dest);
    }

    pub fn is_caught(&self, dest: Destination) -> bool {
        self.caught.contains(&dest)
    }

    /// Drop all latches (scene or workspace change)
    pub fn reset(&mut self) {
        if !self.caught.is_empty() {
            log::debug!("MIDI: catch reset ({} latched)", self.caught.len());
        }
        self.caught.clear();
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl Default for SoftTakeover {
    fn default() -> Self {
        Self::new()
    }
}
