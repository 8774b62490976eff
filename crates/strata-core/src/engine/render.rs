//! Renderer-facing output of the crossfade stage
//!
//! The engine never touches the GPU. Each frame it hands one
//! [`DeckTransform`] per visible deck to a [`LayerRenderer`].

use super::deck::RenderSnapshot;
use crate::types::{BlendMode, DeckId, LayerId, ScreenSize, Vec2};

/// Alpha at or below which a deck is hidden
pub const MIN_VISIBLE_ALPHA: f32 = 0.001;

/// Scene position units per screen pixel offset
const AXIS_TO_PIXELS: f32 = 0.1;

/// Final placement of one deck for this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeckTransform {
    /// Sprite centre in screen pixels
    pub position: Vec2,
    pub scale: f32,
    /// Radians
    pub rotation: f32,
    /// 0..1
    pub alpha: f32,
    pub blend_mode: BlendMode,
}

/// Inputs besides the snapshot needed to place a deck
#[derive(Debug, Clone, Copy)]
pub struct PlacementContext {
    pub continuous_angle: f32,
    pub drift_offset: Vec2,
    pub parallax: Vec2,
    pub parallax_factor: f32,
    pub beat_factor: f32,
    pub screen: ScreenSize,
}

impl DeckTransform {
    /// Compose the final transform, or `None` if the deck should be hidden
    pub fn compose(state: &RenderSnapshot, curve: f32, ctx: &PlacementContext) -> Option<Self> {
        let alpha = (state.opacity * curve).clamp(0.0, 1.0);
        if !state.enabled || alpha <= MIN_VISIBLE_ALPHA {
            return None;
        }
        let base = ctx.screen.center()
            + Vec2::new(state.xaxis * AXIS_TO_PIXELS, state.yaxis * AXIS_TO_PIXELS);
        Some(Self {
            position: base + ctx.drift_offset + ctx.parallax.scale(ctx.parallax_factor),
            scale: state.size * ctx.beat_factor,
            rotation: (state.angle + ctx.continuous_angle).to_radians(),
            alpha,
            blend_mode: state.blend_mode.renderable(),
        })
    }

    /// Expand into four mirrored quadrant sprites
    ///
    /// Order: top-left, top-right (mirrored on x), bottom-left (mirrored on
    /// y), bottom-right (mirrored on both). Mirrored axes negate the scale;
    /// a single mirror also negates the rotation.
    pub fn quadrants(&self, screen: ScreenSize) -> [QuadrantSprite; 4] {
        let Vec2 { x, y } = self.position;
        let (w, h) = (screen.width, screen.height);
        let s = self.scale;
        let r = self.rotation;
        [
            QuadrantSprite::new(Vec2::new(x, y), (s, s), r),
            QuadrantSprite::new(Vec2::new(w - x, y), (-s, s), -r),
            QuadrantSprite::new(Vec2::new(x, h - y), (s, -s), -r),
            QuadrantSprite::new(Vec2::new(w - x, h - y), (-s, -s), r),
        ]
    }
}

/// One of the four mirrored copies of a deck sprite
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadrantSprite {
    pub position: Vec2,
    pub scale: (f32, f32),
    pub rotation: f32,
}

impl QuadrantSprite {
    fn new(position: Vec2, scale: (f32, f32), rotation: f32) -> Self {
        Self {
            position,
            scale,
            rotation,
        }
    }
}

/// Sink for per-deck transforms
pub trait LayerRenderer {
    fn apply(&mut self, layer: LayerId, deck: DeckId, transform: &DeckTransform);
    fn hide(&mut self, layer: LayerId, deck: DeckId);
}

/// Renderer that discards everything (headless runs)
#[derive(Debug, Default)]
pub struct NullRenderer;

impl LayerRenderer for NullRenderer {
    fn apply(&mut self, _layer: LayerId, _deck: DeckId, _transform: &DeckTransform) {}
    fn hide(&mut self, _layer: LayerId, _deck: DeckId) {}
}

/// Renderer that remembers the last call per deck
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    frames: std::collections::HashMap<(LayerId, DeckId), Option<DeckTransform>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last transform applied, `None` if hidden or never drawn
    pub fn last(&self, layer: LayerId, deck: DeckId) -> Option<DeckTransform> {
        self.frames.get(&(layer, deck)).copied().flatten()
    }

    pub fn was_hidden(&self, layer: LayerId, deck: DeckId) -> bool {
        matches!(self.frames.get(&(layer, deck)), Some(None))
    }
}

impl LayerRenderer for RecordingRenderer {
    fn apply(&mut self, layer: LayerId, deck: DeckId, transform: &DeckTransform) {
        self.frames.insert((layer, deck), Some(*transform));
    }

    fn hide(&mut self, layer: LayerId, deck: DeckId) {
        self.frames.insert((layer, deck), None);
    }
}
