//! Linear value chase over a fixed duration
//!
//! Used for MIDI-driven deck parameters so a coarse 7-bit controller still
//! produces smooth motion. Manual edits and scene loads bypass it via
//! [`ValueInterpolator::snap`].

use crate::types::lerp;

/// Chase duration for MIDI-driven updates (ms)
pub const MIDI_GLIDE_MS: f64 = 300.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ValueInterpolator {
    current: f32,
    start: f32,
    target: f32,
    start_time: f64,
    duration_ms: f64,
    active: bool,
}

impl ValueInterpolator {
    pub fn new(initial: f32, duration_ms: f64) -> Self {
        Self {
            current: initial,
            start: initial,
            target: initial,
            start_time: 0.0,
            duration_ms,
            active: false,
        }
    }

    /// Begin chasing `target` from the current value
    ///
    /// Re-issuing the target that is already being chased keeps the running
    /// chase instead of restarting it.
    pub fn set_target(&mut self, target: f32, now: f64) {
        if self.active && self.target == target {
            return;
        }
        self.start = self.current;
        self.target = target;
        self.start_time = now;
        self.active = true;
    }

    /// Jump immediately, cancelling any chase
    pub fn snap(&mut self, value: f32) {
        self.current = value;
        self.start = value;
        self.target = value;
        self.active = false;
    }

    /// Advance to `now` and return the current value
    pub fn update(&mut self, now: f64) -> f32 {
        if !self.active {
            return self.current;
        }
        let progress = if self.duration_ms > 0.0 {
            ((now - self.start_time) / self.duration_ms).clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.current = lerp(self.start, self.target, progress as f32);
        if progress >= 1.0 {
            self.current = self.target;
            self.active = false;
        }
        self.current
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_duration(&mut self, duration_ms: f64) {
        self.duration_ms = duration_ms.max(0.0);
    }
}
