//! Modulation matrix
//!
//! ```text
//!   resolved[id] = cast(clamp(base[id] + Σ patch.amount × source(patch), min, max))
//! ```
//!
//! Base values are the knob positions; patches wire a signal source to a
//! parameter. At most one patch exists per (source, target) pair.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::events::{EventSignals, ANY_EVENT};
use super::lfo::{LfoFrame, LfoId};
use crate::engine::AudioSample;
use crate::params::{all_param_ids, definition, ParamId};

/// Patches contribute nothing below this magnitude
const NEGLIGIBLE: f32 = 0.001;

/// Audio feature used as a modulation source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AudioBand {
    Bass,
    Mid,
    Treble,
    Level,
}

/// Where a patch reads its signal from
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SignalSource {
    /// `audio.bass`, `audio.mid`, `audio.treble`, `audio.level` (0..1)
    Audio(AudioBand),
    /// `lfo_1..3` (-1..1)
    Lfo(LfoId),
    /// `lfo.chaos` (0..1, fresh each frame)
    Chaos,
    /// `event.<kind>`; `event.any` fires on every event
    Event(String),
}

impl SignalSource {
    pub fn parse(s: &str) -> Option<Self> {
        if s == "lfo.chaos" {
            return Some(SignalSource::Chaos);
        }
        if let Some(lfo) = LfoId::parse(s) {
            return Some(SignalSource::Lfo(lfo));
        }
        if let Some(band) = s.strip_prefix("audio.") {
            let band = match band {
                "bass" => AudioBand::Bass,
                "mid" => AudioBand::Mid,
                "treble" => AudioBand::Treble,
                "level" => AudioBand::Level,
                _ => return None,
            };
            return Some(SignalSource::Audio(band));
        }
        match s.strip_prefix("event.") {
            Some(kind) if !kind.is_empty() => Some(SignalSource::Event(kind.to_string())),
            _ => None,
        }
    }

    pub fn any_event() -> Self {
        SignalSource::Event(ANY_EVENT.to_string())
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalSource::Audio(band) => {
                let name = match band {
                    AudioBand::Bass => "bass",
                    AudioBand::Mid => "mid",
                    AudioBand::Treble => "treble",
                    AudioBand::Level => "level",
                };
                write!(f, "audio.{name}")
            }
            SignalSource::Lfo(lfo) => f.write_str(lfo.as_str()),
            SignalSource::Chaos => f.write_str("lfo.chaos"),
            SignalSource::Event(kind) => write!(f, "event.{kind}"),
        }
    }
}

impl From<SignalSource> for String {
    fn from(source: SignalSource) -> Self {
        source.to_string()
    }
}

impl TryFrom<String> for SignalSource {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SignalSource::parse(&value).ok_or_else(|| format!("unknown signal source: {value}"))
    }
}

/// All source values for one frame
#[derive(Debug, Clone, Copy)]
pub struct SignalFrame<'a> {
    pub audio: AudioSample,
    pub lfo: LfoFrame,
    pub events: &'a EventSignals,
}

impl SignalFrame<'_> {
    pub fn value(&self, source: &SignalSource) -> f32 {
        match source {
            SignalSource::Audio(AudioBand::Bass) => self.audio.bands.bass,
            SignalSource::Audio(AudioBand::Mid) => self.audio.bands.mid,
            SignalSource::Audio(AudioBand::Treble) => self.audio.bands.treble,
            SignalSource::Audio(AudioBand::Level) => self.audio.level,
            SignalSource::Lfo(lfo) => self.lfo.get(*lfo),
            SignalSource::Chaos => self.lfo.chaos,
            SignalSource::Event(kind) => self.events.level(kind),
        }
    }
}

/// One source → target wire
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub source: SignalSource,
    pub target: ParamId,
    pub amount: f32,
}

impl Patch {
    /// `"<source>-><target>"`
    pub fn id(&self) -> String {
        patch_id(&self.source, self.target)
    }
}

pub fn patch_id(source: &SignalSource, target: ParamId) -> String {
    format!("{source}->{target}")
}

/// Persisted form of the matrix; ids are kept as raw strings so stale
/// entries survive deserialization and can be pruned explicitly
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModulationDoc {
    pub base_values: BTreeMap<String, f32>,
    pub patches: Vec<PatchDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchDoc {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default = "default_amount")]
    pub amount: f32,
}

fn default_amount() -> f32 {
    1.0
}

/// What [`ModulationMatrix::hydrate`] threw away
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HydrateReport {
    pub dropped_values: Vec<String>,
    pub pruned_patches: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ModulationMatrix {
    base_values: BTreeMap<ParamId, f32>,
    patches: Vec<Patch>,
    resolved: BTreeMap<ParamId, f32>,
}

impl ModulationMatrix {
    pub fn new() -> Self {
        let mut matrix = Self {
            base_values: BTreeMap::new(),
            patches: Vec::new(),
            resolved: BTreeMap::new(),
        };
        matrix.reset_base_values();
        matrix
    }

    /// Restore every knob to its default; patches are kept
    pub fn reset_base_values(&mut self) {
        for id in all_param_ids() {
            let default = definition(id).default;
            self.base_values.insert(id, default);
            self.resolved.insert(id, default);
        }
    }

    pub fn set_base_value(&mut self, id: ParamId, value: f32) {
        if let Some(slot) = self.base_values.get_mut(&id) {
            *slot = value;
        }
    }

    /// Set a base value from its string id; unknown ids are ignored
    pub fn set_base_value_str(&mut self, id: &str, value: f32) -> bool {
        match ParamId::parse(id) {
            Some(id) => {
                self.set_base_value(id, value);
                true
            }
            None => false,
        }
    }

    pub fn base_value(&self, id: ParamId) -> f32 {
        self.base_values
            .get(&id)
            .copied()
            .unwrap_or_else(|| definition(id).default)
    }

    /// Add a patch, or update the amount of the existing one for this pair
    pub fn add_patch(&mut self, source: SignalSource, target: ParamId, amount: f32) {
        match self
            .patches
            .iter_mut()
            .find(|p| p.source == source && p.target == target)
        {
            Some(existing) => existing.amount = amount,
            None => self.patches.push(Patch {
                source,
                target,
                amount,
            }),
        }
    }

    pub fn remove_patch(&mut self, patch_id: &str) {
        self.patches.retain(|p| p.id() != patch_id);
    }

    /// Remove every wire; base values are kept
    pub fn clear_all_patches(&mut self) {
        self.patches.clear();
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Compute this frame's value for every parameter
    pub fn resolve(&mut self, frame: &SignalFrame<'_>) -> &BTreeMap<ParamId, f32> {
        self.resolved.clone_from(&self.base_values);

        for patch in &self.patches {
            let signal = frame.value(&patch.source);
            if signal.abs() < NEGLIGIBLE || patch.amount.abs() < NEGLIGIBLE {
                continue;
            }
            if let Some(value) = self.resolved.get_mut(&patch.target) {
                *value += patch.amount * signal;
            }
        }

        for (id, value) in self.resolved.iter_mut() {
            *value = definition(*id).clamp_and_cast(*value);
        }
        &self.resolved
    }

    /// Value from the most recent [`resolve`](Self::resolve)
    pub fn resolved(&self, id: ParamId) -> f32 {
        self.resolved
            .get(&id)
            .copied()
            .unwrap_or_else(|| definition(id).default)
    }

    /// Replace state from a persisted document
    ///
    /// Saved base values are merged over fresh defaults; unknown ids are
    /// dropped. Patches whose target or source no longer exists are pruned.
    pub fn hydrate(&mut self, doc: &ModulationDoc) -> HydrateReport {
        let mut report = HydrateReport::default();
        self.reset_base_values();
        self.patches.clear();

        for (key, &value) in &doc.base_values {
            match ParamId::parse(key) {
                Some(id) => self.set_base_value(id, value),
                None => report.dropped_values.push(key.clone()),
            }
        }

        for saved in &doc.patches {
            match (SignalSource::parse(&saved.source), ParamId::parse(&saved.target)) {
                (Some(source), Some(target)) => self.add_patch(source, target, saved.amount),
                _ => {
                    let id = if saved.id.is_empty() {
                        format!("{}->{}", saved.source, saved.target)
                    } else {
                        saved.id.clone()
                    };
                    report.pruned_patches.push(id);
                }
            }
        }

        if !report.dropped_values.is_empty() || !report.pruned_patches.is_empty() {
            log::warn!(
                "Modulation: dropped {} unknown value(s), pruned {} stale patch(es)",
                report.dropped_values.len(),
                report.pruned_patches.len()
            );
        }
        report
    }

    pub fn to_doc(&self) -> ModulationDoc {
        ModulationDoc {
            base_values: self
                .base_values
                .iter()
                .map(|(id, v)| (id.to_string(), *v))
                .collect(),
            patches: self
                .patches
                .iter()
                .map(|p| PatchDoc {
                    id: p.id(),
                    source: p.source.to_string(),
                    target: p.target.to_string(),
                    amount: p.amount,
                })
                .collect(),
        }
    }
}

impl Default for ModulationMatrix {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FrequencyBands;
    use crate::params::{EffectParam, FeedbackParam, LayerParam};
    use crate::types::LayerId;

    fn frame(events: &EventSignals, bass: f32, lfo1: f32) -> SignalFrame<'_> {
        SignalFrame {
            audio: AudioSample {
                level: 0.0,
                bands: FrequencyBands {
                    bass,
                    mid: 0.0,
                    treble: 0.0,
                },
            },
            lfo: LfoFrame {
                values: [lfo1, 0.0, 0.0],
                chaos: 0.0,
            },
            events,
        }
    }

    #[test]
    fn test_source_strings() {
        for s in ["audio.bass", "audio.level", "lfo_2", "lfo.chaos", "event.any", "event.mint"] {
            let parsed = SignalSource::parse(s).unwrap();
            assert_eq!(parsed.to_string(), s);
        }
        assert!(SignalSource::parse("audio.sub").is_none());
        assert!(SignalSource::parse("event.").is_none());
        assert!(SignalSource::parse("lfo_9").is_none());
    }

    #[test]
    fn test_resolution_formula() {
        let events = EventSignals::new();
        let mut m = ModulationMatrix::new();
        let bloom = ParamId::Effect(EffectParam::BloomIntensity);
        m.set_base_value(bloom, 1.0);
        m.add_patch(SignalSource::Audio(AudioBand::Bass), bloom, 2.0);
        m.add_patch(SignalSource::Lfo(LfoId::Lfo1), bloom, 0.5);

        let out = m.resolve(&frame(&events, 0.5, -1.0));
        // 1.0 + 2.0*0.5 + 0.5*-1.0
        assert!((out[&bloom] - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_resolution_clamps() {
        let events = EventSignals::new();
        let mut m = ModulationMatrix::new();
        let amount = ParamId::Feedback(FeedbackParam::Amount);
        m.add_patch(SignalSource::Audio(AudioBand::Bass), amount, 10.0);
        m.resolve(&frame(&events, 1.0, 0.0));
        assert_eq!(m.resolved(amount), 0.99);
    }

    #[test]
    fn test_patch_add_is_idempotent() {
        let mut m = ModulationMatrix::new();
        let target = ParamId::Layer(LayerId::One, LayerParam::Size);
        m.add_patch(SignalSource::Lfo(LfoId::Lfo1), target, 0.5);
        m.add_patch(SignalSource::Lfo(LfoId::Lfo1), target, 0.8);
        assert_eq!(m.patches().len(), 1);
        assert_eq!(m.patches()[0].amount, 0.8);
        assert_eq!(m.patches()[0].id(), "lfo_1->layer.1.size");

        m.remove_patch("lfo_1->layer.1.size");
        assert!(m.patches().is_empty());
    }

    #[test]
    fn test_reset_and_clear_are_independent() {
        let mut m = ModulationMatrix::new();
        let zoom = ParamId::Feedback(FeedbackParam::Scale);
        m.set_base_value(zoom, 1.05);
        m.add_patch(SignalSource::any_event(), zoom, 0.1);

        m.clear_all_patches();
        assert_eq!(m.base_value(zoom), 1.05);

        m.add_patch(SignalSource::any_event(), zoom, 0.1);
        m.reset_base_values();
        assert_eq!(m.base_value(zoom), 1.01);
        assert_eq!(m.patches().len(), 1);
    }

    #[test]
    fn test_event_source() {
        let mut events = EventSignals::new();
        events.trigger("mint");
        let mut m = ModulationMatrix::new();
        let rgb = ParamId::Effect(EffectParam::RgbAmount);
        m.add_patch(SignalSource::Event("mint".into()), rgb, 20.0);
        m.resolve(&frame(&events, 0.0, 0.0));
        assert_eq!(m.resolved(rgb), 20.0);
    }

    #[test]
    fn test_hydrate_prunes_unknown() {
        let json = r#"{
            "baseValues": {"bloom.intensity": 2.0, "layer.9.speed": 1.0, "old.param": 3.0},
            "patches": [
                {"id": "lfo_1->bloom.intensity", "source": "lfo_1", "target": "bloom.intensity", "amount": 0.5},
                {"id": "lfo_1->glitch.amount", "source": "lfo_1", "target": "glitch.amount", "amount": 1.0},
                {"source": "midi.cc", "target": "bloom.blur", "amount": 1.0}
            ]
        }"#;
        let doc: ModulationDoc = serde_json::from_str(json).unwrap();
        let mut m = ModulationMatrix::new();
        m.set_base_value(ParamId::Effect(EffectParam::RgbAmount), 9.0);

        let report = m.hydrate(&doc);
        assert_eq!(m.base_value(ParamId::Effect(EffectParam::BloomIntensity)), 2.0);
        assert_eq!(m.base_value(ParamId::Effect(EffectParam::RgbAmount)), 0.0);
        assert_eq!(m.patches().len(), 1);
        assert_eq!(report.dropped_values.len(), 2);
        assert_eq!(
            report.pruned_patches,
            vec!["lfo_1->glitch.amount".to_string(), "midi.cc->bloom.blur".to_string()]
        );
    }

    #[test]
    fn test_doc_roundtrip_keeps_patches() {
        let mut m = ModulationMatrix::new();
        m.add_patch(
            SignalSource::Audio(AudioBand::Treble),
            ParamId::Layer(LayerId::Three, LayerParam::Angle),
            -4.0,
        );
        let doc = m.to_doc();
        assert_eq!(doc.patches[0].id, "audio.treble->layer.3.angle");

        let mut restored = ModulationMatrix::new();
        restored.hydrate(&doc);
        assert_eq!(restored.patches(), m.patches());
    }
}
