//! Low-frequency oscillator bank
//!
//! Three free-running oscillators (`lfo_1..3`) plus a raw noise source
//! (`lfo.chaos`). Phase is derived from elapsed time, so changing a
//! frequency rescales time rather than integrating phase.

use serde::{Deserialize, Serialize};

pub const NUM_LFOS: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    /// Ramp from -1 to 1
    Saw,
    /// Square, -1 or 1
    Pulse,
    /// Triangle between -1 and 1
    Tri,
    /// Uniform noise in -1..1
    Chaos,
}

impl Waveform {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sine" => Some(Waveform::Sine),
            "saw" => Some(Waveform::Saw),
            "pulse" => Some(Waveform::Pulse),
            "tri" => Some(Waveform::Tri),
            "chaos" => Some(Waveform::Chaos),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LfoId {
    #[serde(rename = "lfo_1")]
    Lfo1,
    #[serde(rename = "lfo_2")]
    Lfo2,
    #[serde(rename = "lfo_3")]
    Lfo3,
}

impl LfoId {
    pub const ALL: [LfoId; NUM_LFOS] = [LfoId::Lfo1, LfoId::Lfo2, LfoId::Lfo3];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lfo_1" => Some(LfoId::Lfo1),
            "lfo_2" => Some(LfoId::Lfo2),
            "lfo_3" => Some(LfoId::Lfo3),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LfoId::Lfo1 => "lfo_1",
            LfoId::Lfo2 => "lfo_2",
            LfoId::Lfo3 => "lfo_3",
        }
    }
}

/// Settings for one oscillator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LfoSettings {
    /// Hz
    pub frequency: f32,
    #[serde(rename = "type")]
    pub waveform: Waveform,
}

impl Default for LfoSettings {
    fn default() -> Self {
        Self {
            frequency: 1.0,
            waveform: Waveform::Sine,
        }
    }
}

/// Factory settings: slow sine, mid sine, fast pulse
pub fn default_lfo_settings() -> [LfoSettings; NUM_LFOS] {
    [
        LfoSettings {
            frequency: 0.2,
            waveform: Waveform::Sine,
        },
        LfoSettings {
            frequency: 1.0,
            waveform: Waveform::Sine,
        },
        LfoSettings {
            frequency: 4.0,
            waveform: Waveform::Pulse,
        },
    ]
}

/// One frame of LFO output
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LfoFrame {
    /// -1..1
    pub values: [f32; NUM_LFOS],
    /// 0..1, fresh every frame
    pub chaos: f32,
}

impl LfoFrame {
    pub fn get(&self, id: LfoId) -> f32 {
        self.values[id.index()]
    }
}

pub struct LfoBank {
    settings: [LfoSettings; NUM_LFOS],
    start_ms: f64,
    rng: fastrand::Rng,
}

impl LfoBank {
    /// Start the bank at `now`
    pub fn new(now: f64) -> Self {
        Self::with_rng(now, fastrand::Rng::new())
    }

    /// Deterministic noise, for tests and reproducible renders
    pub fn with_seed(now: f64, seed: u64) -> Self {
        Self::with_rng(now, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(now: f64, rng: fastrand::Rng) -> Self {
        Self {
            settings: default_lfo_settings(),
            start_ms: now,
            rng,
        }
    }

    pub fn settings(&self) -> &[LfoSettings; NUM_LFOS] {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: [LfoSettings; NUM_LFOS]) {
        self.settings = settings;
    }

    pub fn set_lfo(&mut self, id: LfoId, frequency: f32, waveform: Waveform) {
        self.settings[id.index()] = LfoSettings {
            frequency,
            waveform,
        };
    }

    /// Sample every oscillator at `now`
    pub fn update(&mut self, now: f64) -> LfoFrame {
        let seconds = ((now - self.start_ms) / 1000.0) as f32;
        let settings = self.settings;
        let mut frame = LfoFrame::default();
        for (value, cfg) in frame.values.iter_mut().zip(&settings) {
            *value = self.wave(cfg.waveform, seconds * cfg.frequency);
        }
        frame.chaos = self.rng.f32();
        frame
    }

    /// `t` is elapsed cycles
    fn wave(&mut self, waveform: Waveform, t: f32) -> f32 {
        use std::f32::consts::TAU;

        let phase = t.rem_euclid(1.0);
        match waveform {
            Waveform::Sine => (t * TAU).sin(),
            Waveform::Saw => phase * 2.0 - 1.0,
            Waveform::Pulse => {
                if (t * TAU).sin() > 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Tri => (phase * 2.0 - 1.0).abs() * 2.0 - 1.0,
            Waveform::Chaos => self.rng.f32() * 2.0 - 1.0,
        }
    }
}
