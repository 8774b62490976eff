//! Deck state and physics
//!
//! Each layer owns two decks. A deck keeps its authoritative scene config,
//! one interpolator per continuous parameter, the motion accumulators
//! (continuous rotation and drift phase) and any sequencer playback
//! overrides. The crossfader only ever *reads* decks through
//! [`DeckState::resolve_render_state`], so a hidden deck can be rewritten
//! without a visible pop.

use serde::{Deserialize, Serialize};

use super::interpolator::{ValueInterpolator, MIDI_GLIDE_MS};
use crate::params::LayerParam;
use crate::types::{BlendMode, DeckId, LayerId, Vec2, NUM_DECKS};

/// Scene configuration for one deck
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeckConfig {
    pub enabled: bool,
    pub blend_mode: BlendMode,
    /// Rotation direction, +1 or -1
    pub direction: f32,
    pub speed: f32,
    pub size: f32,
    pub opacity: f32,
    pub drift: f32,
    pub drift_speed: f32,
    pub xaxis: f32,
    pub yaxis: f32,
    pub angle: f32,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blend_mode: BlendMode::Normal,
            direction: 1.0,
            speed: LayerParam::Speed.scene_default(),
            size: LayerParam::Size.scene_default(),
            opacity: LayerParam::Opacity.scene_default(),
            drift: 0.0,
            drift_speed: 0.0,
            xaxis: 0.0,
            yaxis: 0.0,
            angle: 0.0,
        }
    }
}

impl DeckConfig {
    pub fn get(&self, param: LayerParam) -> f32 {
        match param {
            LayerParam::Speed => self.speed,
            LayerParam::Size => self.size,
            LayerParam::Opacity => self.opacity,
            LayerParam::Drift => self.drift,
            LayerParam::DriftSpeed => self.drift_speed,
            LayerParam::Xaxis => self.xaxis,
            LayerParam::Yaxis => self.yaxis,
            LayerParam::Angle => self.angle,
        }
    }

    pub fn set(&mut self, param: LayerParam, value: f32) {
        let slot = match param {
            LayerParam::Speed => &mut self.speed,
            LayerParam::Size => &mut self.size,
            LayerParam::Opacity => &mut self.opacity,
            LayerParam::Drift => &mut self.drift,
            LayerParam::DriftSpeed => &mut self.drift_speed,
            LayerParam::Xaxis => &mut self.xaxis,
            LayerParam::Yaxis => &mut self.yaxis,
            LayerParam::Angle => &mut self.angle,
        };
        *slot = value;
    }

    pub fn field(&self, field: DeckField) -> FieldValue {
        match field {
            DeckField::Param(param) => FieldValue::Number(self.get(param)),
            DeckField::Enabled => FieldValue::Flag(self.enabled),
            DeckField::BlendMode => FieldValue::Blend(self.blend_mode),
            DeckField::Direction => FieldValue::Number(self.direction),
        }
    }

    /// Write a field; mismatched value kinds are ignored
    pub fn set_field(&mut self, field: DeckField, value: FieldValue) {
        match (field, value) {
            (DeckField::Param(param), FieldValue::Number(v)) => self.set(param, v),
            (DeckField::Enabled, FieldValue::Flag(on)) => self.enabled = on,
            (DeckField::BlendMode, FieldValue::Blend(mode)) => self.blend_mode = mode,
            (DeckField::Direction, FieldValue::Number(v)) => self.direction = direction_sign(v),
            (field, value) => {
                log::debug!("Deck: ignoring {:?} for field {:?}", value, field);
            }
        }
    }
}

fn direction_sign(v: f32) -> f32 {
    if v < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Any field of a [`DeckConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeckField {
    Param(LayerParam),
    Enabled,
    BlendMode,
    Direction,
}

impl DeckField {
    pub const ALL: [DeckField; LayerParam::COUNT + 3] = [
        DeckField::Param(LayerParam::Speed),
        DeckField::Param(LayerParam::Size),
        DeckField::Param(LayerParam::Opacity),
        DeckField::Param(LayerParam::Drift),
        DeckField::Param(LayerParam::DriftSpeed),
        DeckField::Param(LayerParam::Xaxis),
        DeckField::Param(LayerParam::Yaxis),
        DeckField::Param(LayerParam::Angle),
        DeckField::Enabled,
        DeckField::BlendMode,
        DeckField::Direction,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "enabled" => Some(DeckField::Enabled),
            "blendMode" => Some(DeckField::BlendMode),
            "direction" => Some(DeckField::Direction),
            other => LayerParam::parse(other).map(DeckField::Param),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeckField::Param(param) => param.as_str(),
            DeckField::Enabled => "enabled",
            DeckField::BlendMode => "blendMode",
            DeckField::Direction => "direction",
        }
    }

    /// Whether a glide request for this field is honoured
    ///
    /// Continuous layer params chase their target; flags, blend mode and
    /// direction always snap.
    pub fn is_interpolated(self) -> bool {
        matches!(self, DeckField::Param(_))
    }
}

/// Value carried by a [`DeckField`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Number(f32),
    Flag(bool),
    Blend(BlendMode),
}

impl FieldValue {
    pub fn as_number(self) -> Option<f32> {
        match self {
            FieldValue::Number(v) => Some(v),
            _ => None,
        }
    }
}

/// How a deck field update is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Instant (manual edits, scene loads)
    Snap,
    /// Chase the new value (continuous MIDI)
    Glide,
}

/// Fully resolved deck values for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSnapshot {
    pub speed: f32,
    pub size: f32,
    pub opacity: f32,
    pub drift: f32,
    pub drift_speed: f32,
    pub xaxis: f32,
    pub yaxis: f32,
    pub angle: f32,
    pub direction: f32,
    pub blend_mode: BlendMode,
    pub enabled: bool,
}

/// Sequencer values that take precedence over the deck's own state
#[derive(Debug, Clone, Default, PartialEq)]
struct PlaybackOverrides {
    values: [Option<f32>; LayerParam::COUNT],
    enabled: Option<bool>,
    blend_mode: Option<BlendMode>,
    direction: Option<f32>,
}

impl PlaybackOverrides {
    fn set(&mut self, field: DeckField, value: FieldValue) {
        match (field, value) {
            (DeckField::Param(param), FieldValue::Number(v)) => self.values[param.index()] = Some(v),
            (DeckField::Enabled, FieldValue::Flag(on)) => self.enabled = Some(on),
            (DeckField::BlendMode, FieldValue::Blend(mode)) => self.blend_mode = Some(mode),
            (DeckField::Direction, FieldValue::Number(v)) => self.direction = Some(direction_sign(v)),
            _ => {}
        }
    }

    fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
            && self.enabled.is_none()
            && self.blend_mode.is_none()
            && self.direction.is_none()
    }
}

/// Texture assigned to a deck (decoding happens in the renderer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureRef {
    pub token_id: String,
    pub source: Option<String>,
}

/// One deck of one layer
#[derive(Debug, Clone)]
pub struct DeckState {
    config: DeckConfig,
    interpolators: [ValueInterpolator; LayerParam::COUNT],
    playback: PlaybackOverrides,
    /// Additive offsets from the modulation matrix (`layer.N.param`)
    modulation: [f32; LayerParam::COUNT],
    /// Degrees, unbounded until a handoff normalizes it
    continuous_angle: f32,
    drift_phase: f32,
    drift_offset: Vec2,
    texture: Option<TextureRef>,
}

impl DeckState {
    pub fn new() -> Self {
        Self::with_glide(MIDI_GLIDE_MS)
    }

    /// Create a deck whose MIDI glides last `glide_ms`
    pub fn with_glide(glide_ms: f64) -> Self {
        let config = DeckConfig::default();
        let interpolators =
            std::array::from_fn(|i| ValueInterpolator::new(config.get(LayerParam::ALL[i]), glide_ms));
        Self {
            config,
            interpolators,
            playback: PlaybackOverrides::default(),
            modulation: [0.0; LayerParam::COUNT],
            continuous_angle: 0.0,
            drift_phase: 0.0,
            drift_offset: Vec2::ZERO,
            texture: None,
        }
    }

    pub fn config(&self) -> &DeckConfig {
        &self.config
    }

    /// Restore every field to its default and snap the interpolators
    pub fn reset_to_defaults(&mut self) {
        self.config = DeckConfig::default();
        for param in LayerParam::ALL {
            self.interpolators[param.index()].snap(self.config.get(param));
        }
    }

    /// Replace the config wholesale (scene load)
    ///
    /// The deck is reset first so fields absent from the previous scene do
    /// not leak into this one.
    pub fn load_scene(&mut self, config: &DeckConfig) {
        self.reset_to_defaults();
        for field in DeckField::ALL {
            self.update_field(field, config.field(field), UpdateMode::Snap, 0.0);
        }
    }

    /// Write one field
    ///
    /// `Glide` only takes effect for interpolated fields; other fields snap.
    pub fn update_field(&mut self, field: DeckField, value: FieldValue, mode: UpdateMode, now: f64) {
        self.config.set_field(field, value);
        if let (DeckField::Param(param), FieldValue::Number(v)) = (field, value) {
            let interp = &mut self.interpolators[param.index()];
            if mode == UpdateMode::Glide && field.is_interpolated() {
                interp.set_target(v, now);
            } else {
                interp.snap(v);
            }
        }
    }

    pub fn update_param(&mut self, param: LayerParam, value: f32, mode: UpdateMode, now: f64) {
        self.update_field(DeckField::Param(param), FieldValue::Number(value), mode, now);
    }

    /// Set the additive matrix offset for a parameter
    pub fn set_modulation(&mut self, param: LayerParam, offset: f32) {
        self.modulation[param.index()] = offset;
    }

    pub fn set_playback(&mut self, field: DeckField, value: FieldValue) {
        self.playback.set(field, value);
    }

    pub fn clear_playback(&mut self) {
        self.playback = PlaybackOverrides::default();
    }

    pub fn has_playback(&self) -> bool {
        !self.playback.is_empty()
    }

    /// Current interpolated value (no modulation, no playback)
    ///
    /// This is what a physical controller has to match to catch.
    pub fn live_value(&self, param: LayerParam) -> f32 {
        self.interpolators[param.index()].current()
    }

    /// Advance interpolators to `now`, then integrate rotation and drift by `dt`
    pub fn step_physics(&mut self, dt: f32, now: f64) {
        for interp in &mut self.interpolators {
            interp.update(now);
        }
        let state = self.resolve_render_state();
        self.continuous_angle += state.speed * state.direction * dt;
        self.drift_phase += state.drift_speed * dt;
        self.drift_offset = Vec2::new(
            state.drift * self.drift_phase.cos(),
            state.drift * self.drift_phase.sin(),
        );
    }

    /// Merge config, interpolation and playback into this frame's values
    pub fn resolve_render_state(&self) -> RenderSnapshot {
        let value = |param: LayerParam| {
            self.playback.values[param.index()].unwrap_or_else(|| {
                self.interpolators[param.index()].current() + self.modulation[param.index()]
            })
        };
        RenderSnapshot {
            speed: value(LayerParam::Speed),
            size: value(LayerParam::Size),
            opacity: value(LayerParam::Opacity),
            drift: value(LayerParam::Drift),
            drift_speed: value(LayerParam::DriftSpeed),
            xaxis: value(LayerParam::Xaxis),
            yaxis: value(LayerParam::Yaxis),
            angle: value(LayerParam::Angle),
            direction: self.playback.direction.unwrap_or(self.config.direction),
            blend_mode: self.playback.blend_mode.unwrap_or(self.config.blend_mode),
            enabled: self.playback.enabled.unwrap_or(self.config.enabled),
        }
    }

    /// Inherit motion phase from the visible deck before a handoff
    pub fn sync_physics_from(&mut self, other: &DeckState) {
        self.continuous_angle = other.continuous_angle.rem_euclid(360.0);
        self.drift_phase = other.drift_phase;
    }

    pub fn continuous_angle(&self) -> f32 {
        self.continuous_angle
    }

    pub fn drift_phase(&self) -> f32 {
        self.drift_phase
    }

    pub fn drift_offset(&self) -> Vec2 {
        self.drift_offset
    }

    pub fn set_texture(&mut self, texture: Option<TextureRef>) {
        self.texture = texture;
    }

    pub fn texture(&self) -> Option<&TextureRef> {
        self.texture.as_ref()
    }
}

impl Default for DeckState {
    fn default() -> Self {
        Self::new()
    }
}

/// A visual layer: two decks blended by the crossfader
#[derive(Debug, Clone)]
pub struct Layer {
    id: LayerId,
    decks: [DeckState; NUM_DECKS],
}

impl Layer {
    pub fn new(id: LayerId, glide_ms: f64) -> Self {
        Self {
            id,
            decks: std::array::from_fn(|_| DeckState::with_glide(glide_ms)),
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn deck(&self, deck: DeckId) -> &DeckState {
        &self.decks[deck.index()]
    }

    pub fn deck_mut(&mut self, deck: DeckId) -> &mut DeckState {
        &mut self.decks[deck.index()]
    }

    /// Both decks mutably, A first
    pub fn decks_mut(&mut self) -> (&mut DeckState, &mut DeckState) {
        let [a, b] = &mut self.decks;
        (a, b)
    }

    /// Copy motion phase from `from` into the other deck
    pub fn sync_physics(&mut self, from: DeckId) {
        let (a, b) = self.decks_mut();
        match from {
            DeckId::A => b.sync_physics_from(a),
            DeckId::B => a.sync_physics_from(b),
        }
    }
}
