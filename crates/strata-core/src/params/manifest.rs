//! Parameter definitions: kind, hard range and default for every [`ParamId`]

use super::id::{EffectParam, FeedbackParam, LayerParam, ParamId};
use crate::types::LayerId;

/// How a resolved value is cast after clamping
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    Float,
    /// Floored after clamp
    Int,
    /// `> 0.5` is on; resolves to exactly 0.0 or 1.0
    Bool,
    /// Index into a fixed option list
    Select(&'static [&'static str]),
}

/// Static definition of one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDef {
    pub id: ParamId,
    pub label: &'static str,
    pub kind: ParamKind,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParamDef {
    const fn new(id: ParamId, label: &'static str, kind: ParamKind, min: f32, max: f32, default: f32) -> Self {
        Self {
            id,
            label,
            kind,
            min,
            max,
            default,
        }
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.kind, ParamKind::Bool)
    }

    /// Clamp to the hard range and cast to the parameter kind
    pub fn clamp_and_cast(&self, value: f32) -> f32 {
        let v = value.clamp(self.min, self.max);
        match self.kind {
            ParamKind::Float => v,
            ParamKind::Int => v.floor(),
            ParamKind::Bool => {
                if v > 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            ParamKind::Select(options) => {
                let last = options.len().saturating_sub(1) as f32;
                v.floor().clamp(0.0, last)
            }
        }
    }

    /// Map a value in the hard range to 0..1
    pub fn normalize(&self, value: f32) -> f32 {
        let range = self.max - self.min;
        if range == 0.0 {
            0.0
        } else {
            (value - self.min) / range
        }
    }

    /// Map 0..1 to the hard range
    pub fn denormalize(&self, normalized: f32) -> f32 {
        self.min + normalized * (self.max - self.min)
    }
}

const CHAR_SETS: &[&str] = &["Shapes", "Data Flow", "Binary", "Density"];
const COLOR_MODES: &[&str] = &["Original", "Matrix", "Amber", "Cyan", "B&W"];

/// Look up the definition of a parameter
pub fn definition(id: ParamId) -> ParamDef {
    use ParamKind::*;

    match id {
        // Offsets are added to the scene value, so they span ±(layer range) around 0
        ParamId::Layer(_, param) => {
            let (min, max) = param.range();
            let span = max - min;
            ParamDef::new(id, param.label(), Float, -span, span, 0.0)
        }
        ParamId::Feedback(param) => {
            let (label, kind, min, max, default) = match param {
                FeedbackParam::Enabled => ("Active", Bool, 0.0, 1.0, 0.0),
                FeedbackParam::Amount => ("Decay", Float, 0.5, 0.99, 0.9),
                FeedbackParam::Scale => ("Zoom", Float, 0.9, 1.1, 1.01),
                FeedbackParam::Rotation => ("Spin", Float, -1.0, 1.0, 0.0),
                FeedbackParam::XOffset => ("Drift X", Float, -10.0, 10.0, 0.0),
                FeedbackParam::YOffset => ("Drift Y", Float, -10.0, 10.0, 0.0),
                FeedbackParam::HueShift => ("Hue", Float, -180.0, 180.0, 0.0),
                FeedbackParam::SatShift => ("Saturation", Float, -1.0, 1.0, 0.0),
                FeedbackParam::Contrast => ("Contrast", Float, 0.0, 2.0, 1.0),
                FeedbackParam::Invert => ("Invert", Bool, 0.0, 1.0, 0.0),
                FeedbackParam::RenderOnTop => ("On Top", Bool, 0.0, 1.0, 0.0),
                FeedbackParam::Sway => ("Sway", Float, 0.0, 1.0, 0.0),
                FeedbackParam::Chroma => ("Chroma", Float, 0.0, 10.0, 0.0),
            };
            ParamDef::new(id, label, kind, min, max, default)
        }
        ParamId::Effect(param) => {
            let (label, kind, min, max, default) = match param {
                EffectParam::BloomIntensity => ("Intensity", Float, 0.0, 5.0, 0.0),
                EffectParam::BloomThreshold => ("Threshold", Float, 0.0, 1.0, 0.5),
                EffectParam::BloomBlur => ("Blur", Float, 0.0, 20.0, 8.0),
                EffectParam::RgbAmount => ("Offset", Float, 0.0, 50.0, 0.0),
                EffectParam::ColorMatrixThreshold => ("1-Bit Threshold", Float, 0.0, 1.0, 0.0),
                EffectParam::ColorMatrixInvert => ("Invert", Bool, 0.0, 1.0, 0.0),
                EffectParam::PixelateEnabled => ("Active", Bool, 0.0, 1.0, 0.0),
                EffectParam::PixelateSize => ("Block Size", Int, 2.0, 100.0, 10.0),
                EffectParam::KaleidoscopeSides => ("Segments", Int, 0.0, 32.0, 0.0),
                EffectParam::KaleidoscopeAngle => ("Rotation", Float, 0.0, 6.28, 0.0),
                EffectParam::AsciiEnabled => ("Active", Bool, 0.0, 1.0, 0.0),
                EffectParam::AsciiSize => ("Grid Size", Int, 2.0, 50.0, 10.0),
                EffectParam::AsciiCharSet => ("Char Set", Select(CHAR_SETS), 0.0, 3.0, 0.0),
                EffectParam::AsciiColorMode => ("Color", Select(COLOR_MODES), 0.0, 4.0, 0.0),
            };
            ParamDef::new(id, label, kind, min, max, default)
        }
        ParamId::Crossfader => ParamDef::new(id, "Crossfader", Float, 0.0, 1.0, 0.0),
    }
}

/// Every parameter id in manifest order
pub fn all_param_ids() -> Vec<ParamId> {
    let mut ids = Vec::with_capacity(LayerId::ALL.len() * LayerParam::COUNT + 28);
    for layer in LayerId::ALL {
        ids.extend(LayerParam::ALL.iter().map(|&p| ParamId::Layer(layer, p)));
    }
    ids.extend(FeedbackParam::ALL.iter().map(|&p| ParamId::Feedback(p)));
    ids.extend(EffectParam::ALL.iter().map(|&p| ParamId::Effect(p)));
    ids.push(ParamId::Crossfader);
    ids
}
