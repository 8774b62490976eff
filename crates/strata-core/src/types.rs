//! Common types for Strata
//!
//! Layer and deck identifiers, blend modes and the small geometry types
//! shared by the physics, crossfade and render stages.

use serde::{Deserialize, Serialize};

/// Number of visual layers
pub const NUM_LAYERS: usize = 3;

/// Number of decks per layer (A and B)
pub const NUM_DECKS: usize = 2;

/// Visual layer identifiers
///
/// Serialized as the strings `"1"`, `"2"`, `"3"` to match workspace documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayerId {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
}

impl LayerId {
    /// All layers, back to front
    pub const ALL: [LayerId; NUM_LAYERS] = [LayerId::One, LayerId::Two, LayerId::Three];

    /// Convert from index (0-2)
    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(LayerId::One),
            1 => Some(LayerId::Two),
            2 => Some(LayerId::Three),
            _ => None,
        }
    }

    /// Convert from the user-facing number (1-3)
    pub fn from_number(n: u8) -> Option<Self> {
        n.checked_sub(1).and_then(|i| Self::from_index(i as usize))
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// User-facing number (1-3)
    pub fn number(self) -> u8 {
        self as u8 + 1
    }

    /// Parallax multiplier; deeper layers move further
    pub fn parallax_factor(self) -> f32 {
        match self {
            LayerId::One => 10.0,
            LayerId::Two => 25.0,
            LayerId::Three => 50.0,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1" => Some(LayerId::One),
            "2" => Some(LayerId::Two),
            "3" => Some(LayerId::Three),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LayerId::One => "1",
            LayerId::Two => "2",
            LayerId::Three => "3",
        }
    }
}

/// Deck side within a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeckId {
    #[default]
    A,
    B,
}

impl DeckId {
    pub const ALL: [DeckId; NUM_DECKS] = [DeckId::A, DeckId::B];

    pub fn index(self) -> usize {
        self as usize
    }

    /// The opposite deck
    pub fn other(self) -> Self {
        match self {
            DeckId::A => DeckId::B,
            DeckId::B => DeckId::A,
        }
    }

    /// Deck that is predominantly visible at crossfade position `t`
    pub fn visible_at(t: f32) -> Self {
        if t < 0.5 {
            DeckId::A
        } else {
            DeckId::B
        }
    }

    /// Crossfader position at which this deck is fully visible
    pub fn crossfade_target(self) -> f32 {
        match self {
            DeckId::A => 0.0,
            DeckId::B => 1.0,
        }
    }
}

/// Compositing mode for a deck's sprites
///
/// Names the renderer understands; modes it cannot draw fall back via
/// [`BlendMode::renderable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
    Normal,
    Add,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
    LinearDodge,
}

impl BlendMode {
    /// Map to a mode the compositor can actually draw
    pub fn renderable(self) -> Self {
        match self {
            BlendMode::Hue | BlendMode::Saturation | BlendMode::Color => BlendMode::Normal,
            BlendMode::Luminosity => BlendMode::Overlay,
            BlendMode::LinearDodge => BlendMode::Add,
            other => other,
        }
    }
}

/// 2D vector in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn scale(self, factor: f32) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Output surface dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: f32,
    pub height: f32,
}

impl ScreenSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self::new(1920.0, 1080.0)
    }
}

/// Linear interpolation
#[inline]
pub fn lerp(start: f32, end: f32, t: f32) -> f32 {
    start * (1.0 - t) + end * t
}

/// Shortest-path interpolation between two angles in degrees
pub fn lerp_angle(start: f32, end: f32, t: f32) -> f32 {
    let mut delta = (end - start) % 360.0;
    if delta > 180.0 {
        delta -= 360.0;
    } else if delta < -180.0 {
        delta += 360.0;
    }
    start + delta * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_numbering() {
        assert_eq!(LayerId::from_number(1), Some(LayerId::One));
        assert_eq!(LayerId::from_number(0), None);
        assert_eq!(LayerId::from_number(4), None);
        assert_eq!(LayerId::Three.number(), 3);
        assert_eq!(LayerId::parse("2"), Some(LayerId::Two));
    }

    #[test]
    fn test_parallax_factors() {
        assert_eq!(LayerId::One.parallax_factor(), 10.0);
        assert_eq!(LayerId::Two.parallax_factor(), 25.0);
        assert_eq!(LayerId::Three.parallax_factor(), 50.0);
    }

    #[test]
    fn test_visible_deck() {
        assert_eq!(DeckId::visible_at(0.0), DeckId::A);
        assert_eq!(DeckId::visible_at(0.49), DeckId::A);
        assert_eq!(DeckId::visible_at(0.5), DeckId::B);
        assert_eq!(DeckId::A.other(), DeckId::B);
    }

    #[test]
    fn test_lerp_angle_takes_short_way() {
        // 170 → -170 is 20 degrees across the seam, not 340 back
        let mid = lerp_angle(170.0, -170.0, 0.5);
        assert!((mid - 180.0).abs() < 0.001);

        let mid = lerp_angle(-170.0, 170.0, 0.5);
        assert!((mid + 180.0).abs() < 0.001);

        assert!((lerp_angle(10.0, 30.0, 0.5) - 20.0).abs() < 0.001);
    }

    #[test]
    fn test_blend_mode_serde_names() {
        let mode: BlendMode = serde_json::from_str("\"color-dodge\"").unwrap();
        assert_eq!(mode, BlendMode::ColorDodge);
        assert_eq!(BlendMode::LinearDodge.renderable(), BlendMode::Add);
    }

    #[test]
    fn test_layer_serde_as_string_number() {
        let json = serde_json::to_string(&LayerId::Two).unwrap();
        assert_eq!(json, "\"2\"");
    }
}
