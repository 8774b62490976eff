//! Engine tuning loaded from `engine.yaml`

use serde::{Deserialize, Serialize};

use crate::bus::DEFAULT_BUS_CAPACITY;
use crate::engine::{AudioSettings, LoopSpeed, TransitionMode, DEFAULT_PARALLAX_SMOOTHING, MIDI_GLIDE_MS};
use crate::modulation::{default_lfo_settings, LfoSettings, DEFAULT_DECAY_RATE, NUM_LFOS};
use crate::types::ScreenSize;

/// Engine configuration
///
/// Every field has a default, so a partial file (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Auto-fade length when a scene is selected (ms)
    pub scene_fade_ms: f64,

    /// Glide time for MIDI-driven deck parameters (ms)
    pub midi_glide_ms: f64,

    /// Fraction of the remaining parallax distance covered per frame
    pub parallax_smoothing: f32,

    pub transition_mode: TransitionMode,

    /// Physics step per reference frame; dt = frame delta × this
    pub physics_step: f32,

    /// Upper bound on a frame delta, in reference frames
    pub max_frame_delta: f32,

    /// Reference frame length (ms) used to turn wall time into frame deltas
    pub frame_ms: f64,

    pub screen: ScreenSize,

    pub audio: AudioSettings,

    /// Capacity of the analysis → engine sample ring
    pub audio_ring_capacity: usize,

    pub lfos: [LfoSettings; NUM_LFOS],

    /// Event impulse decay per second
    pub event_decay_rate: f32,

    pub sequencer_speed: LoopSpeed,

    /// Per-subscriber bus queue length
    pub bus_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scene_fade_ms: 1000.0,
            midi_glide_ms: MIDI_GLIDE_MS,
            parallax_smoothing: DEFAULT_PARALLAX_SMOOTHING,
            transition_mode: TransitionMode::default(),
            physics_step: 0.01666,
            max_frame_delta: 1.5,
            frame_ms: 1000.0 / 60.0,
            screen: ScreenSize::default(),
            audio: AudioSettings::default(),
            audio_ring_capacity: 64,
            lfos: default_lfo_settings(),
            event_decay_rate: DEFAULT_DECAY_RATE,
            sequencer_speed: LoopSpeed::default(),
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}
