//! Typed parameter identifiers
//!
//! Every controllable value has a [`ParamId`] that round-trips through the
//! dotted string form used in workspace documents and MIDI maps
//! (`layer.1.speed`, `feedback.amount`, `global.crossfader`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::LayerId;

/// Per-deck continuous layer parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayerParam {
    Speed,
    Size,
    Opacity,
    Drift,
    DriftSpeed,
    Xaxis,
    Yaxis,
    Angle,
}

impl LayerParam {
    pub const COUNT: usize = 8;

    pub const ALL: [LayerParam; Self::COUNT] = [
        LayerParam::Speed,
        LayerParam::Size,
        LayerParam::Opacity,
        LayerParam::Drift,
        LayerParam::DriftSpeed,
        LayerParam::Xaxis,
        LayerParam::Yaxis,
        LayerParam::Angle,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "speed" => LayerParam::Speed,
            "size" => LayerParam::Size,
            "opacity" => LayerParam::Opacity,
            "drift" => LayerParam::Drift,
            "driftSpeed" => LayerParam::DriftSpeed,
            "xaxis" => LayerParam::Xaxis,
            "yaxis" => LayerParam::Yaxis,
            "angle" => LayerParam::Angle,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LayerParam::Speed => "speed",
            LayerParam::Size => "size",
            LayerParam::Opacity => "opacity",
            LayerParam::Drift => "drift",
            LayerParam::DriftSpeed => "driftSpeed",
            LayerParam::Xaxis => "xaxis",
            LayerParam::Yaxis => "yaxis",
            LayerParam::Angle => "angle",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LayerParam::Speed => "SPEED",
            LayerParam::Size => "SIZE",
            LayerParam::Opacity => "OPACITY",
            LayerParam::Drift => "DRIFT",
            LayerParam::DriftSpeed => "DRIFT SPEED",
            LayerParam::Xaxis => "X POS",
            LayerParam::Yaxis => "Y POS",
            LayerParam::Angle => "ANGLE",
        }
    }

    /// UI range (min, max)
    pub fn range(self) -> (f32, f32) {
        match self {
            LayerParam::Speed => (0.001, 0.1),
            LayerParam::Size => (0.1, 8.0),
            LayerParam::Opacity => (0.0, 1.0),
            LayerParam::Drift => (0.0, 100.0),
            LayerParam::DriftSpeed => (0.0, 1.0),
            LayerParam::Xaxis | LayerParam::Yaxis => (-10000.0, 10000.0),
            LayerParam::Angle => (-90.0, 90.0),
        }
    }

    /// Value a freshly reset deck starts with
    pub fn scene_default(self) -> f32 {
        match self {
            LayerParam::Speed => 0.01,
            LayerParam::Size | LayerParam::Opacity => 1.0,
            _ => 0.0,
        }
    }

    /// Map a UI-range value into 0..1
    pub fn normalize(self, value: f32) -> f32 {
        let (min, max) = self.range();
        (value - min) / (max - min)
    }

    /// Map 0..1 into the UI range
    pub fn denormalize(self, normalized: f32) -> f32 {
        let (min, max) = self.range();
        min + normalized * (max - min)
    }
}

/// Feedback compositor parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeedbackParam {
    Enabled,
    Amount,
    Scale,
    Rotation,
    XOffset,
    YOffset,
    HueShift,
    SatShift,
    Contrast,
    Invert,
    RenderOnTop,
    Sway,
    Chroma,
}

impl FeedbackParam {
    pub const ALL: [FeedbackParam; 13] = [
        FeedbackParam::Enabled,
        FeedbackParam::Amount,
        FeedbackParam::Scale,
        FeedbackParam::Rotation,
        FeedbackParam::XOffset,
        FeedbackParam::YOffset,
        FeedbackParam::HueShift,
        FeedbackParam::SatShift,
        FeedbackParam::Contrast,
        FeedbackParam::Invert,
        FeedbackParam::RenderOnTop,
        FeedbackParam::Sway,
        FeedbackParam::Chroma,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackParam::Enabled => "enabled",
            FeedbackParam::Amount => "amount",
            FeedbackParam::Scale => "scale",
            FeedbackParam::Rotation => "rotation",
            FeedbackParam::XOffset => "xOffset",
            FeedbackParam::YOffset => "yOffset",
            FeedbackParam::HueShift => "hueShift",
            FeedbackParam::SatShift => "satShift",
            FeedbackParam::Contrast => "contrast",
            FeedbackParam::Invert => "invert",
            FeedbackParam::RenderOnTop => "renderOnTop",
            FeedbackParam::Sway => "sway",
            FeedbackParam::Chroma => "chroma",
        }
    }
}

/// Post-processing effect parameters
///
/// Only carried through the matrix; the shader side lives in the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectParam {
    BloomIntensity,
    BloomThreshold,
    BloomBlur,
    RgbAmount,
    ColorMatrixThreshold,
    ColorMatrixInvert,
    PixelateEnabled,
    PixelateSize,
    KaleidoscopeSides,
    KaleidoscopeAngle,
    AsciiEnabled,
    AsciiSize,
    AsciiCharSet,
    AsciiColorMode,
}

impl EffectParam {
    pub const ALL: [EffectParam; 14] = [
        EffectParam::BloomIntensity,
        EffectParam::BloomThreshold,
        EffectParam::BloomBlur,
        EffectParam::RgbAmount,
        EffectParam::ColorMatrixThreshold,
        EffectParam::ColorMatrixInvert,
        EffectParam::PixelateEnabled,
        EffectParam::PixelateSize,
        EffectParam::KaleidoscopeSides,
        EffectParam::KaleidoscopeAngle,
        EffectParam::AsciiEnabled,
        EffectParam::AsciiSize,
        EffectParam::AsciiCharSet,
        EffectParam::AsciiColorMode,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }

    /// Full dotted id (effect group and parameter)
    pub fn as_str(self) -> &'static str {
        match self {
            EffectParam::BloomIntensity => "bloom.intensity",
            EffectParam::BloomThreshold => "bloom.threshold",
            EffectParam::BloomBlur => "bloom.blur",
            EffectParam::RgbAmount => "rgb.amount",
            EffectParam::ColorMatrixThreshold => "colorMatrix.threshold",
            EffectParam::ColorMatrixInvert => "colorMatrix.invert",
            EffectParam::PixelateEnabled => "pixelate.enabled",
            EffectParam::PixelateSize => "pixelate.size",
            EffectParam::KaleidoscopeSides => "kaleidoscope.sides",
            EffectParam::KaleidoscopeAngle => "kaleidoscope.angle",
            EffectParam::AsciiEnabled => "ascii.enabled",
            EffectParam::AsciiSize => "ascii.size",
            EffectParam::AsciiCharSet => "ascii.charSet",
            EffectParam::AsciiColorMode => "ascii.colorMode",
        }
    }
}

/// Identifier of any parameter the modulation matrix resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ParamId {
    /// Additive matrix offset for a layer parameter (`layer.N.param`)
    Layer(LayerId, LayerParam),
    /// `feedback.*`
    Feedback(FeedbackParam),
    /// Post effects (`bloom.*`, `rgb.*`, ...)
    Effect(EffectParam),
    /// `global.crossfader`
    Crossfader,
}

impl ParamId {
    pub fn parse(s: &str) -> Option<Self> {
        if s == "global.crossfader" {
            return Some(ParamId::Crossfader);
        }
        if let Some(rest) = s.strip_prefix("layer.") {
            let (layer, param) = rest.split_once('.')?;
            return Some(ParamId::Layer(
                LayerId::parse(layer)?,
                LayerParam::parse(param)?,
            ));
        }
        if let Some(rest) = s.strip_prefix("feedback.") {
            return FeedbackParam::parse(rest).map(ParamId::Feedback);
        }
        EffectParam::parse(s).map(ParamId::Effect)
    }

    /// Group name as used by MIDI maps (`"1"`, `"feedback"`, `"bloom"`, `"global"`)
    pub fn group(&self) -> &'static str {
        match self {
            ParamId::Layer(layer, _) => layer.as_str(),
            ParamId::Feedback(_) => "feedback",
            ParamId::Effect(effect) => effect
                .as_str()
                .split_once('.')
                .map(|(group, _)| group)
                .unwrap_or(""),
            ParamId::Crossfader => "global",
        }
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamId::Layer(layer, param) => {
                write!(f, "layer.{}.{}", layer.as_str(), param.as_str())
            }
            ParamId::Feedback(param) => write!(f, "feedback.{}", param.as_str()),
            ParamId::Effect(param) => f.write_str(param.as_str()),
            ParamId::Crossfader => f.write_str("global.crossfader"),
        }
    }
}

impl From<ParamId> for String {
    fn from(id: ParamId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ParamId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ParamId::parse(&value).ok_or_else(|| format!("unknown parameter id: {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_layer_id() {
        assert_eq!(
            ParamId::parse("layer.2.driftSpeed"),
            Some(ParamId::Layer(LayerId::Two, LayerParam::DriftSpeed))
        );
        assert_eq!(ParamId::parse("layer.4.speed"), None);
        assert_eq!(ParamId::parse("layer.1.warp"), None);
    }

    #[test]
    fn test_display_roundtrips_every_id() {
        for id in crate::params::all_param_ids() {
            let s = id.to_string();
            assert_eq!(ParamId::parse(&s), Some(id), "{s}");
        }
    }

    #[test]
    fn test_groups() {
        assert_eq!(ParamId::Effect(EffectParam::AsciiCharSet).group(), "ascii");
        assert_eq!(ParamId::Feedback(FeedbackParam::Amount).group(), "feedback");
        assert_eq!(ParamId::Layer(LayerId::Three, LayerParam::Size).group(), "3");
        assert_eq!(ParamId::Crossfader.group(), "global");
    }

    #[test]
    fn test_layer_param_normalization() {
        let v = LayerParam::Size.denormalize(0.5);
        assert!((v - 4.05).abs() < 0.001);
        assert!((LayerParam::Size.normalize(v) - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&ParamId::Feedback(FeedbackParam::XOffset)).unwrap();
        assert_eq!(json, "\"feedback.xOffset\"");
        let bad: Result<ParamId, _> = serde_json::from_str("\"nope.nothing\"");
        assert!(bad.is_err());
    }
}
