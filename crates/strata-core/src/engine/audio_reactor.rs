//! Audio-reactive scale factors
//!
//! Features:
//! - Per-layer persistent multiplier derived from band energy (bass → layer 1,
//!   mid → layer 2, treble → layer 3)
//! - Transient beat pulse with an expiry timestamp
//! - Wait-free sample handoff from the analysis thread via `rtrb`; a sample
//!   that finds the ring full is parked in an overflow slot so the newest
//!   frame always reaches the engine

use std::sync::atomic::{fence, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use rtrb::{Consumer, Producer, PushError, RingBuffer};
use serde::{Deserialize, Serialize};

use crate::types::{LayerId, NUM_LAYERS};

/// Level above which a loud bass hit fires an automatic pulse
const AUTO_PULSE_LEVEL: f32 = 0.4;
/// Bass energy required alongside the level threshold
const AUTO_PULSE_BASS: f32 = 0.6;
/// Length of an automatic pulse (ms)
const AUTO_PULSE_MS: f64 = 80.0;
/// Lower bound for every multiplier so layers never collapse to nothing
const MIN_FACTOR: f32 = 0.1;

/// Band energies, each 0..1
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBands {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
}

/// One analysis frame from the external FFT stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioSample {
    pub level: f32,
    #[serde(rename = "frequencyBands")]
    pub bands: FrequencyBands,
}

/// User sensitivity per band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct AudioSettings {
    pub bass_intensity: f32,
    pub mid_intensity: f32,
    pub treble_intensity: f32,
    /// Fire a beat pulse on loud bass hits
    pub auto_beat_pulse: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            bass_intensity: 1.0,
            mid_intensity: 1.0,
            treble_intensity: 1.0,
            auto_beat_pulse: true,
        }
    }
}

/// Holds the latest audio sample and derives per-layer scale multipliers
#[derive(Debug, Clone)]
pub struct AudioReactor {
    latest: AudioSample,
    /// Persistent per-layer multiplier
    factors: [f32; NUM_LAYERS],
    pulse_factor: f32,
    pulse_expiry: f64,
    settings: AudioSettings,
}

impl AudioReactor {
    pub fn new(settings: AudioSettings) -> Self {
        Self {
            latest: AudioSample::default(),
            factors: [1.0; NUM_LAYERS],
            pulse_factor: 1.0,
            pulse_expiry: 0.0,
            settings,
        }
    }

    /// Take a new analysis frame (last value wins) and update the factors
    pub fn ingest(&mut self, sample: AudioSample, now: f64) {
        self.latest = sample;
        let s = &self.settings;
        let FrequencyBands { bass, mid, treble } = sample.bands;

        self.factors[LayerId::One.index()] = (1.0 + bass * 0.8 * s.bass_intensity).max(MIN_FACTOR);
        self.factors[LayerId::Two.index()] = (1.0 + mid * s.mid_intensity).max(MIN_FACTOR);
        self.factors[LayerId::Three.index()] =
            (1.0 + treble * 2.0 * s.treble_intensity).max(MIN_FACTOR);

        if s.auto_beat_pulse && sample.level > AUTO_PULSE_LEVEL && bass > AUTO_PULSE_BASS {
            let factor = (1.0 + sample.level * 0.8).max(MIN_FACTOR);
            self.trigger_beat_pulse(factor, AUTO_PULSE_MS, now);
        }
    }

    /// Override persistent multipliers for the given layers; others keep theirs
    pub fn set_audio_factors(&mut self, factors: &[(LayerId, f32)]) {
        for &(layer, factor) in factors {
            self.factors[layer.index()] = factor;
        }
    }

    /// Start a transient multiplier that lasts `duration_ms` from `now`
    pub fn trigger_beat_pulse(&mut self, factor: f32, duration_ms: f64, now: f64) {
        self.pulse_factor = factor;
        self.pulse_expiry = now + duration_ms;
    }

    /// Pulse (if still live) times the layer's persistent factor
    pub fn combined_beat_factor(&self, layer: LayerId, now: f64) -> f32 {
        let pulse = if now < self.pulse_expiry {
            self.pulse_factor
        } else {
            1.0
        };
        pulse * self.factors[layer.index()]
    }

    pub fn latest(&self) -> AudioSample {
        self.latest
    }

    pub fn settings(&self) -> &AudioSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: AudioSettings) {
        self.settings = settings;
    }
}

impl Default for AudioReactor {
    fn default() -> Self {
        Self::new(AudioSettings::default())
    }
}

/// Sample that did not fit in the ring
///
/// Single writer (the sender), single reader (the receiver). A version
/// counter that is odd while a write is in flight lets the reader detect
/// and retry torn reads without locking the analysis thread.
struct OverflowSlot {
    version: AtomicU64,
    /// Sequence number of the stored sample, 0 when empty
    seq: AtomicU64,
    level: AtomicU32,
    bass: AtomicU32,
    mid: AtomicU32,
    treble: AtomicU32,
}

impl OverflowSlot {
    fn new() -> Self {
        Self {
            version: AtomicU64::new(0),
            seq: AtomicU64::new(0),
            level: AtomicU32::new(0),
            bass: AtomicU32::new(0),
            mid: AtomicU32::new(0),
            treble: AtomicU32::new(0),
        }
    }

    fn store(&self, seq: u64, sample: AudioSample) {
        let v = self.version.load(Ordering::Relaxed);
        self.version.store(v.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        self.seq.store(seq, Ordering::Relaxed);
        self.level.store(sample.level.to_bits(), Ordering::Relaxed);
        self.bass.store(sample.bands.bass.to_bits(), Ordering::Relaxed);
        self.mid.store(sample.bands.mid.to_bits(), Ordering::Relaxed);
        self.treble.store(sample.bands.treble.to_bits(), Ordering::Relaxed);
        self.version.store(v.wrapping_add(2), Ordering::Release);
    }

    fn load(&self) -> (u64, AudioSample) {
        loop {
            let before = self.version.load(Ordering::Acquire);
            if before % 2 == 1 {
                std::hint::spin_loop();
                continue;
            }
            let seq = self.seq.load(Ordering::Relaxed);
            let sample = AudioSample {
                level: f32::from_bits(self.level.load(Ordering::Relaxed)),
                bands: FrequencyBands {
                    bass: f32::from_bits(self.bass.load(Ordering::Relaxed)),
                    mid: f32::from_bits(self.mid.load(Ordering::Relaxed)),
                    treble: f32::from_bits(self.treble.load(Ordering::Relaxed)),
                },
            };
            fence(Ordering::Acquire);
            if self.version.load(Ordering::Relaxed) == before {
                return (seq, sample);
            }
        }
    }
}

/// Analysis-thread side of the sample ring
pub struct AudioSender {
    producer: Producer<(u64, AudioSample)>,
    overflow: Arc<OverflowSlot>,
    next_seq: u64,
}

impl AudioSender {
    /// Hand over a sample without blocking
    ///
    /// When the ring is full the sample goes to the overflow slot instead,
    /// replacing whatever was parked there. Returns false in that case.
    pub fn push(&mut self, sample: AudioSample) -> bool {
        self.next_seq += 1;
        let seq = self.next_seq;
        match self.producer.push((seq, sample)) {
            Ok(()) => true,
            Err(PushError::Full(_)) => {
                self.overflow.store(seq, sample);
                false
            }
        }
    }
}

/// Frame-loop side of the sample ring
pub struct AudioReceiver {
    consumer: Consumer<(u64, AudioSample)>,
    overflow: Arc<OverflowSlot>,
    last_seq: u64,
}

impl AudioReceiver {
    /// Newest sample since the last call, draining everything queued
    pub fn latest(&mut self) -> Option<AudioSample> {
        let mut newest = None;
        while let Ok(item) = self.consumer.pop() {
            newest = Some(item);
        }
        let (parked_seq, parked) = self.overflow.load();
        if parked_seq > newest.map_or(self.last_seq, |(seq, _)| seq) {
            newest = Some((parked_seq, parked));
        }

        match newest {
            Some((seq, sample)) if seq > self.last_seq => {
                self.last_seq = seq;
                Some(sample)
            }
            _ => None,
        }
    }
}

/// Create a sample ring between the analysis thread and the frame loop
pub fn audio_channel(capacity: usize) -> (AudioSender, AudioReceiver) {
    let (producer, consumer) = RingBuffer::new(capacity);
    let overflow = Arc::new(OverflowSlot::new());
    (
        AudioSender {
            producer,
            overflow: Arc::clone(&overflow),
            next_seq: 0,
        },
        AudioReceiver {
            consumer,
            overflow,
            last_seq: 0,
        },
    )
}
