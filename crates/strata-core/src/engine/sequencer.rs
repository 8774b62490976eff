//! Parameter-lock sequencer
//!
//! Arm it to snapshot every layer's live config, tweak some values, then
//! start it: the layer ping-pongs between the snapshot and the tweaked
//! values until it is reset.
//!
//! ```text
//!   Idle ──toggle──► Armed ──toggle──► ArmingToPlay ──1s──► Playing
//!    ▲                 │ (no diff)       (target→snapshot)     │ toggle
//!    └─────────────────┘◄───────────── Resetting ◄──────────────┘
//!                                     (1s back to snapshot)
//! ```
//!
//! Output is a list of [`PlaybackWrite`]s per tick; the engine writes them
//! into deck playback overrides and clears those when the run ends. A reset
//! also hands back the armed snapshot so the decks settle on it.

use serde::{Deserialize, Serialize};

use super::deck::{DeckConfig, DeckField, FieldValue};
use crate::types::{lerp, LayerId, NUM_LAYERS};

/// Length of the arming and reset transitions (ms)
pub const TRANSITION_MS: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    Armed,
    ArmingToPlay,
    Playing,
    Resetting,
}

/// Full ping-pong loop length
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopSpeed {
    Fast,
    #[default]
    Medium,
    Slow,
}

impl LoopSpeed {
    pub fn duration_ms(self) -> f64 {
        match self {
            LoopSpeed::Fast => 4000.0,
            LoopSpeed::Medium => 8000.0,
            LoopSpeed::Slow => 12000.0,
        }
    }
}

/// One value the engine should push into a layer's playback overrides
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackWrite {
    pub layer: LayerId,
    pub field: DeckField,
    pub value: FieldValue,
}

/// Result of [`PLockSequencer::tick`]
#[derive(Debug, Default)]
pub struct SequencerTick {
    pub writes: Vec<PlaybackWrite>,
    /// The run finished; playback overrides should be cleared
    pub ended: bool,
    /// Set when a reset completes: the configs captured at arming, to be
    /// written back into the decks before the overrides are cleared
    pub restore: Option<[DeckConfig; NUM_LAYERS]>,
}

#[derive(Debug, Clone, Copy)]
struct Track {
    layer: LayerId,
    field: DeckField,
    from: FieldValue,
    to: FieldValue,
}

impl Track {
    /// Numbers interpolate, everything else holds `from` until `t` reaches 1
    fn value_at(&self, t: f32) -> FieldValue {
        match (self.from, self.to) {
            (FieldValue::Number(a), FieldValue::Number(b)) => FieldValue::Number(lerp(a, b, t)),
            _ if t < 1.0 => self.from,
            _ => self.to,
        }
    }

    fn write(&self, value: FieldValue) -> PlaybackWrite {
        PlaybackWrite {
            layer: self.layer,
            field: self.field,
            value,
        }
    }
}

#[derive(Debug, Clone)]
struct Transition {
    start: f64,
    tracks: Vec<Track>,
}

pub struct PLockSequencer {
    state: SequencerState,
    speed: LoopSpeed,
    loop_ms: f64,
    snapshot: Option<[DeckConfig; NUM_LAYERS]>,
    /// Locked parameters: `from` is the snapshot, `to` the tweaked value
    tracks: Vec<Track>,
    transition: Option<Transition>,
    loop_start: f64,
    prev_progress: f64,
    ended: bool,
}

impl PLockSequencer {
    pub fn new() -> Self {
        Self {
            state: SequencerState::Idle,
            speed: LoopSpeed::default(),
            loop_ms: LoopSpeed::default().duration_ms(),
            snapshot: None,
            tracks: Vec::new(),
            transition: None,
            loop_start: 0.0,
            prev_progress: 0.0,
            ended: false,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn speed(&self) -> LoopSpeed {
        self.speed
    }

    /// Takes effect at the next playback start
    pub fn set_speed(&mut self, speed: LoopSpeed) {
        self.speed = speed;
    }

    /// Animating (arming transition, loop or reset)
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            SequencerState::ArmingToPlay | SequencerState::Playing | SequencerState::Resetting
        )
    }

    /// Whether the sequencer currently drives this destination
    pub fn owns(&self, layer: LayerId, field: DeckField) -> bool {
        if !self.is_active() {
            return false;
        }
        let hit = |t: &Track| t.layer == layer && t.field == field;
        self.tracks.iter().any(hit)
            || self
                .transition
                .as_ref()
                .is_some_and(|tr| tr.tracks.iter().any(hit))
    }

    pub fn has_locked_params(&self) -> bool {
        !self.tracks.is_empty()
    }

    /// Position in the current loop, 0..1 (0 when not playing)
    pub fn loop_progress(&self, now: f64) -> f64 {
        if self.state != SequencerState::Playing {
            return 0.0;
        }
        (now - self.loop_start).rem_euclid(self.loop_ms) / self.loop_ms
    }

    /// Advance the state machine with the current live config of each layer
    pub fn toggle(&mut self, live: &[DeckConfig; NUM_LAYERS], now: f64) {
        match self.state {
            SequencerState::Idle => self.arm(live),
            SequencerState::Armed => self.start_playback(live, now),
            SequencerState::Playing => self.start_reset(now),
            SequencerState::ArmingToPlay | SequencerState::Resetting => {}
        }
    }

    /// Reset when playing or armed, otherwise stop immediately
    pub fn clear(&mut self, now: f64) {
        match self.state {
            SequencerState::Playing | SequencerState::Armed => self.start_reset(now),
            _ => self.stop(),
        }
    }

    fn arm(&mut self, live: &[DeckConfig; NUM_LAYERS]) {
        self.stop();
        self.ended = false;
        self.snapshot = Some(live.clone());
        self.state = SequencerState::Armed;
        log::debug!("Sequencer: armed");
    }

    fn start_playback(&mut self, live: &[DeckConfig; NUM_LAYERS], now: f64) {
        let Some(snapshot) = self.snapshot.as_ref() else {
            self.stop();
            return;
        };

        let mut tracks = Vec::new();
        for layer in LayerId::ALL {
            let (initial, target) = (&snapshot[layer.index()], &live[layer.index()]);
            for field in DeckField::ALL {
                let (from, to) = (initial.field(field), target.field(field));
                if from != to {
                    tracks.push(Track {
                        layer,
                        field,
                        from,
                        to,
                    });
                }
            }
        }

        if tracks.is_empty() {
            log::debug!("Sequencer: nothing changed since arming");
            self.stop();
            return;
        }

        // Glide from the tweaked values back to the snapshot; the loop then
        // starts at phase 0 (snapshot → target) so there is no jump
        let back = tracks
            .iter()
            .map(|t| Track {
                from: t.to,
                to: t.from,
                ..*t
            })
            .collect();
        log::info!("Sequencer: locking {} parameter(s)", tracks.len());
        self.tracks = tracks;
        self.transition = Some(Transition {
            start: now,
            tracks: back,
        });
        self.loop_ms = self.speed.duration_ms();
        self.state = SequencerState::ArmingToPlay;
    }

    fn start_reset(&mut self, now: f64) {
        if self.tracks.is_empty() {
            self.stop();
            return;
        }
        let elapsed = (now - self.loop_start).rem_euclid(self.loop_ms);
        let back = self
            .tracks
            .iter()
            .map(|t| Track {
                from: self.loop_value(t, elapsed),
                to: t.from,
                ..*t
            })
            .collect();
        self.transition = Some(Transition {
            start: now,
            tracks: back,
        });
        self.tracks.clear();
        self.state = SequencerState::Resetting;
        log::debug!("Sequencer: resetting");
    }

    fn stop(&mut self) {
        if self.state != SequencerState::Idle {
            self.ended = true;
        }
        self.state = SequencerState::Idle;
        self.snapshot = None;
        self.tracks.clear();
        self.transition = None;
        self.loop_start = 0.0;
        self.prev_progress = 0.0;
    }

    /// Ping-pong value at `elapsed` ms into the loop
    fn loop_value(&self, track: &Track, elapsed: f64) -> FieldValue {
        let half = self.loop_ms / 2.0;
        let first_half = elapsed < half;
        match (track.from, track.to) {
            (FieldValue::Number(a), FieldValue::Number(b)) => {
                let v = if first_half {
                    lerp(a, b, (elapsed / half) as f32)
                } else {
                    lerp(b, a, ((elapsed - half) / half) as f32)
                };
                FieldValue::Number(v)
            }
            _ if first_half => track.from,
            _ => track.to,
        }
    }

    /// Evaluate the current animation frame
    pub fn tick(&mut self, now: f64) -> SequencerTick {
        let mut out = SequencerTick::default();
        match self.state {
            SequencerState::ArmingToPlay | SequencerState::Resetting => {
                let Some(transition) = self.transition.as_ref() else {
                    self.stop();
                    out.ended = std::mem::take(&mut self.ended);
                    return out;
                };
                let progress = ((now - transition.start) / TRANSITION_MS).clamp(0.0, 1.0) as f32;
                out.writes = transition
                    .tracks
                    .iter()
                    .map(|t| t.write(t.value_at(progress)))
                    .collect();

                if progress >= 1.0 {
                    self.transition = None;
                    if self.state == SequencerState::ArmingToPlay {
                        self.state = SequencerState::Playing;
                        self.loop_start = now;
                        self.prev_progress = 0.0;
                        log::debug!("Sequencer: playing ({} ms loop)", self.loop_ms);
                    } else {
                        out.restore = self.snapshot.take();
                        self.stop();
                    }
                }
            }
            SequencerState::Playing => {
                let elapsed = (now - self.loop_start).rem_euclid(self.loop_ms);
                let progress = elapsed / self.loop_ms;
                let started_loop = self.prev_progress > progress;
                let crossed_mid = self.prev_progress < 0.5 && progress >= 0.5;

                for track in &self.tracks {
                    match (track.from, track.to) {
                        (FieldValue::Number(_), FieldValue::Number(_)) => {
                            out.writes.push(track.write(self.loop_value(track, elapsed)));
                        }
                        _ if started_loop => out.writes.push(track.write(track.from)),
                        _ if crossed_mid => out.writes.push(track.write(track.to)),
                        _ => {}
                    }
                }
                self.prev_progress = progress;
            }
            SequencerState::Idle | SequencerState::Armed => {}
        }
        out.ended = std::mem::take(&mut self.ended);
        out
    }
}

impl Default for PLockSequencer {
    fn default() -> Self {
        Self::new()
    }
}
