//! One-shot event impulses
//!
//! `trigger("mint")` spikes `event.mint` and `event.any` to 1.0; every
//! update decays all impulses linearly toward 0.

use std::collections::BTreeMap;

/// Units per second
pub const DEFAULT_DECAY_RATE: f32 = 2.0;

/// Values at or below this snap to zero
const FLOOR: f32 = 0.001;

pub const ANY_EVENT: &str = "any";

#[derive(Debug, Clone)]
pub struct EventSignals {
    /// Keyed by event kind (without the `event.` prefix)
    levels: BTreeMap<String, f32>,
    decay_rate: f32,
}

impl EventSignals {
    pub fn new() -> Self {
        let mut levels = BTreeMap::new();
        levels.insert(ANY_EVENT.to_string(), 0.0);
        Self {
            levels,
            decay_rate: DEFAULT_DECAY_RATE,
        }
    }

    /// Spike `kind` and `any`; unknown kinds are registered on the fly
    pub fn trigger(&mut self, kind: &str) {
        self.levels.insert(kind.to_string(), 1.0);
        self.levels.insert(ANY_EVENT.to_string(), 1.0);
    }

    /// Decay by `dt_secs`
    pub fn update(&mut self, dt_secs: f32) {
        for level in self.levels.values_mut() {
            *level = if *level > FLOOR {
                (*level - self.decay_rate * dt_secs).max(0.0)
            } else {
                0.0
            };
        }
    }

    /// Current level of `kind`, 0 if never triggered
    pub fn level(&self, kind: &str) -> f32 {
        self.levels.get(kind).copied().unwrap_or(0.0)
    }

    pub fn set_decay_rate(&mut self, rate: f32) {
        self.decay_rate = rate.max(0.0);
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.levels.keys().map(String::as_str)
    }
}

impl Default for EventSignals {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_spikes_kind_and_any() {
        let mut events = EventSignals::new();
        events.trigger("mint");
        assert_eq!(events.level("mint"), 1.0);
        assert_eq!(events.level(ANY_EVENT), 1.0);
        assert_eq!(events.level("transfer"), 0.0);
    }

    #[test]
    fn test_linear_decay() {
        let mut events = EventSignals::new();
        events.trigger("mint");
        events.update(0.25);
        assert!((events.level("mint") - 0.5).abs() < 1e-6);
        events.update(0.5);
        assert_eq!(events.level("mint"), 0.0);
        assert_eq!(events.level(ANY_EVENT), 0.0);
    }

    #[test]
    fn test_kinds_registered_on_trigger() {
        let mut events = EventSignals::new();
        events.trigger("zap");
        let kinds: Vec<_> = events.kinds().collect();
        assert_eq!(kinds, vec!["any", "zap"]);
    }
}
