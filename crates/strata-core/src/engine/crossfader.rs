//! Crossfader - blends the A and B decks of every layer
//!
//! Per tick:
//! 1. Advance an active auto-fade (quadratic ease in/out, wall clock)
//! 2. Dock detection at 0 / 1, once per approach
//! 3. Parallax smoothing
//! 4. Step, resolve and blend both decks of each layer
//! 5. Hand the final transforms to the renderer
//!
//! Only presentation is blended. Each deck keeps its own config so the
//! hidden one can be reloaded without a visible glitch.

use std::f32::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use super::audio_reactor::AudioReactor;
use super::deck::{Layer, RenderSnapshot};
use super::render::{DeckTransform, LayerRenderer, PlacementContext};
use crate::types::{lerp, lerp_angle, DeckId, ScreenSize, Vec2};

/// Per-tick parallax chase factor
pub const DEFAULT_PARALLAX_SMOOTHING: f32 = 0.05;

/// Above this (crossfade mode) deck A is neither stepped nor drawn
const HIDE_A_ABOVE: f32 = 0.999;
/// Below this (crossfade mode) deck B is neither stepped nor drawn
const HIDE_B_BELOW: f32 = 0.001;

/// Invoked once when an auto-fade reaches its target
pub type FadeCallback = Box<dyn FnOnce() + Send>;

/// How the two decks are presented during a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionMode {
    /// Plain constant-power dissolve
    #[default]
    Crossfade,
    /// Outgoing deck rushes past the camera, incoming grows from nothing
    Flythrough,
}

impl TransitionMode {
    /// Size multipliers (deck A, deck B) at crossfade position `t`
    pub fn size_multipliers(self, t: f32) -> (f32, f32) {
        match self {
            TransitionMode::Crossfade => (1.0, 1.0),
            TransitionMode::Flythrough => (1.0 + 4.0 * t, t),
        }
    }
}

/// Constant-power opacity weights (deck A, deck B)
///
/// `a² + b² = 1` for every `t`.
pub fn opacity_curve(t: f32) -> (f32, f32) {
    let angle = t.clamp(0.0, 1.0) * FRAC_PI_2;
    (angle.cos(), angle.sin())
}

/// Quadratic ease in/out
fn ease_in_out_quad(p: f32) -> f32 {
    if p < 0.5 {
        2.0 * p * p
    } else {
        1.0 - (-2.0 * p + 2.0).powi(2) / 2.0
    }
}

struct AutoFade {
    start_value: f32,
    target: f32,
    start_time: f64,
    duration_ms: f64,
    on_complete: Option<FadeCallback>,
}

/// Result of one crossfader tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CrossfadeTick {
    /// Crossfade position after this tick
    pub value: f32,
    /// Set when a boundary was reached on this tick
    pub docked: Option<DeckId>,
    /// Set when an auto-fade finished on this tick
    pub fade_completed: bool,
}

pub struct CrossfaderSystem {
    value: f32,
    mode: TransitionMode,
    auto_fade: Option<AutoFade>,
    last_docked: Option<DeckId>,
    parallax_target: Vec2,
    parallax_rendered: Vec2,
    parallax_smoothing: f32,
}

impl CrossfaderSystem {
    pub fn new() -> Self {
        Self {
            value: 0.0,
            mode: TransitionMode::Crossfade,
            auto_fade: None,
            last_docked: None,
            parallax_target: Vec2::ZERO,
            parallax_rendered: Vec2::ZERO,
            parallax_smoothing: DEFAULT_PARALLAX_SMOOTHING,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Set the position directly
    ///
    /// Ignored (returns false) while an auto-fade owns the crossfader.
    pub fn set_crossfade(&mut self, value: f32) -> bool {
        if self.auto_fade.is_some() {
            log::debug!("Crossfader: manual input ignored during auto-fade");
            return false;
        }
        self.value = value.clamp(0.0, 1.0);
        true
    }

    /// Animate to `target` over `duration_ms`
    ///
    /// Supersedes any fade already running; its callback is dropped unrun.
    pub fn fade_to(&mut self, target: f32, duration_ms: f64, now: f64, on_complete: Option<FadeCallback>) {
        self.auto_fade = Some(AutoFade {
            start_value: self.value,
            target: target.clamp(0.0, 1.0),
            start_time: now,
            duration_ms: duration_ms.max(0.0),
            on_complete,
        });
    }

    /// Abort the running fade where it is, without calling its callback
    pub fn cancel_fade(&mut self) {
        self.auto_fade = None;
    }

    pub fn is_auto_fading(&self) -> bool {
        self.auto_fade.is_some()
    }

    pub fn set_parallax(&mut self, x: f32, y: f32) {
        self.parallax_target = Vec2::new(x, y);
    }

    pub fn rendered_parallax(&self) -> Vec2 {
        self.parallax_rendered
    }

    pub fn set_parallax_smoothing(&mut self, factor: f32) {
        self.parallax_smoothing = factor.clamp(0.0, 1.0);
    }

    pub fn transition_mode(&self) -> TransitionMode {
        self.mode
    }

    pub fn set_transition_mode(&mut self, mode: TransitionMode) {
        self.mode = mode;
    }

    pub fn last_docked(&self) -> Option<DeckId> {
        self.last_docked
    }

    /// Advance the auto-fade; returns true when it completed this call
    fn advance_fade(&mut self, now: f64) -> bool {
        let Some(fade) = &self.auto_fade else {
            return false;
        };
        let progress = if fade.duration_ms > 0.0 {
            ((now - fade.start_time) / fade.duration_ms).clamp(0.0, 1.0) as f32
        } else {
            1.0
        };
        if progress < 1.0 {
            self.value = lerp(fade.start_value, fade.target, ease_in_out_quad(progress)).clamp(0.0, 1.0);
            return false;
        }

        // Clear the fade before running the callback so it may start another
        let Some(fade) = self.auto_fade.take() else {
            return false;
        };
        self.value = fade.target;
        if let Some(callback) = fade.on_complete {
            callback();
        }
        true
    }

    fn detect_dock(&mut self) -> Option<DeckId> {
        if self.value <= 0.0 {
            if self.last_docked != Some(DeckId::A) {
                self.last_docked = Some(DeckId::A);
                return Some(DeckId::A);
            }
        } else if self.value >= 1.0 {
            if self.last_docked != Some(DeckId::B) {
                self.last_docked = Some(DeckId::B);
                return Some(DeckId::B);
            }
        } else {
            self.last_docked = None;
        }
        None
    }

    /// Run one frame over every layer
    pub fn update(
        &mut self,
        layers: &mut [Layer],
        audio: &AudioReactor,
        dt: f32,
        now: f64,
        screen: ScreenSize,
        renderer: &mut dyn LayerRenderer,
    ) -> CrossfadeTick {
        let fade_completed = self.advance_fade(now);
        let docked = self.detect_dock();
        if let Some(side) = docked {
            log::debug!("Crossfader: docked {:?}", side);
        }

        self.parallax_rendered = self.parallax_rendered
            + (self.parallax_target - self.parallax_rendered).scale(self.parallax_smoothing);

        let t = self.value;
        for layer in layers.iter_mut() {
            self.blend_layer(layer, audio, t, dt, now, screen, renderer);
        }

        CrossfadeTick {
            value: t,
            docked,
            fade_completed,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn blend_layer(
        &self,
        layer: &mut Layer,
        audio: &AudioReactor,
        t: f32,
        dt: f32,
        now: f64,
        screen: ScreenSize,
        renderer: &mut dyn LayerRenderer,
    ) {
        let id = layer.id();
        let (render_a, render_b) = match self.mode {
            TransitionMode::Crossfade => (t <= HIDE_A_ABOVE, t >= HIDE_B_BELOW),
            TransitionMode::Flythrough => (true, true),
        };

        let (deck_a, deck_b) = layer.decks_mut();
        if render_a {
            deck_a.step_physics(dt, now);
        }
        if render_b {
            deck_b.step_physics(dt, now);
        }

        let (curve_a, curve_b) = opacity_curve(t);
        let (mult_a, mult_b) = self.mode.size_multipliers(t);
        let base_ctx = PlacementContext {
            continuous_angle: 0.0,
            drift_offset: Vec2::ZERO,
            parallax: self.parallax_rendered,
            parallax_factor: id.parallax_factor(),
            beat_factor: audio.combined_beat_factor(id, now),
            screen,
        };

        // Crossfade with both visible draws the morphed snapshot on each
        // deck; flythrough keeps each deck on its own state
        let morph = self.mode == TransitionMode::Crossfade && render_a && render_b;
        let (state_a, ctx_a, state_b, ctx_b) = if morph {
            let morphed = blend_snapshots(&deck_a.resolve_render_state(), &deck_b.resolve_render_state(), t);
            let ctx = PlacementContext {
                continuous_angle: lerp(deck_a.continuous_angle(), deck_b.continuous_angle(), t),
                drift_offset: Vec2::new(
                    lerp(deck_a.drift_offset().x, deck_b.drift_offset().x, t),
                    lerp(deck_a.drift_offset().y, deck_b.drift_offset().y, t),
                ),
                ..base_ctx
            };
            (morphed, ctx, morphed, ctx)
        } else {
            let own_ctx = |continuous_angle, drift_offset| PlacementContext {
                continuous_angle,
                drift_offset,
                ..base_ctx
            };
            (
                deck_a.resolve_render_state(),
                own_ctx(deck_a.continuous_angle(), deck_a.drift_offset()),
                deck_b.resolve_render_state(),
                own_ctx(deck_b.continuous_angle(), deck_b.drift_offset()),
            )
        };

        for (deck, render, mut state, ctx, curve, mult) in [
            (DeckId::A, render_a, state_a, ctx_a, curve_a, mult_a),
            (DeckId::B, render_b, state_b, ctx_b, curve_b, mult_b),
        ] {
            state.size *= mult;
            let transform = if render {
                DeckTransform::compose(&state, curve, &ctx)
            } else {
                None
            };
            match transform {
                Some(transform) => renderer.apply(id, deck, &transform),
                None => renderer.hide(id, deck),
            }
        }
    }
}

impl Default for CrossfaderSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Blend two deck snapshots at `t`
///
/// Scalars and position lerp, angle takes the short way round, and the
/// discrete fields switch over at the midpoint.
pub fn blend_snapshots(a: &RenderSnapshot, b: &RenderSnapshot, t: f32) -> RenderSnapshot {
    let pick = if t < 0.5 { a } else { b };
    RenderSnapshot {
        speed: lerp(a.speed, b.speed, t),
        size: lerp(a.size, b.size, t),
        opacity: lerp(a.opacity, b.opacity, t),
        drift: lerp(a.drift, b.drift, t),
        drift_speed: lerp(a.drift_speed, b.drift_speed, t),
        xaxis: lerp(a.xaxis, b.xaxis, t),
        yaxis: lerp(a.yaxis, b.yaxis, t),
        angle: lerp_angle(a.angle, b.angle, t),
        direction: pick.direction,
        blend_mode: pick.blend_mode,
        enabled: pick.enabled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::deck::{DeckField, FieldValue, UpdateMode};
    use crate::engine::render::RecordingRenderer;
    use crate::params::LayerParam;
    use crate::types::{BlendMode, LayerId};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn layers() -> Vec<Layer> {
        LayerId::ALL.iter().map(|&id| Layer::new(id, 0.0)).collect()
    }

    fn tick(xf: &mut CrossfaderSystem, layers: &mut [Layer], now: f64) -> CrossfadeTick {
        let mut renderer = RecordingRenderer::new();
        xf.update(layers, &AudioReactor::default(), 1.0, now, ScreenSize::default(), &mut renderer)
    }

    #[test]
    fn test_constant_power_curve() {
        for i in 0..=100 {
            let t = i as f32 / 100.0;
            let (a, b) = opacity_curve(t);
            assert!((a - (t * FRAC_PI_2).cos()).abs() < 1e-6);
            assert!((b - (t * FRAC_PI_2).sin()).abs() < 1e-6);
            assert!((a * a + b * b - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_manual_value_is_clamped() {
        let mut xf = CrossfaderSystem::new();
        assert!(xf.set_crossfade(1.7));
        assert_eq!(xf.value(), 1.0);
        xf.set_crossfade(-0.2);
        assert_eq!(xf.value(), 0.0);
    }

    #[test]
    fn test_dock_fires_once_per_approach() {
        let mut xf = CrossfaderSystem::new();
        let mut layers = layers();

        assert_eq!(tick(&mut xf, &mut layers, 0.0).docked, Some(DeckId::A));
        // Sitting on (or re-hitting) zero without leaving must not re-fire
        for _ in 0..5 {
            xf.set_crossfade(0.0);
            assert_eq!(tick(&mut xf, &mut layers, 0.0).docked, None);
        }

        xf.set_crossfade(0.3);
        assert_eq!(tick(&mut xf, &mut layers, 0.0).docked, None);
        xf.set_crossfade(0.0);
        assert_eq!(tick(&mut xf, &mut layers, 0.0).docked, Some(DeckId::A));

        xf.set_crossfade(1.0);
        assert_eq!(tick(&mut xf, &mut layers, 0.0).docked, Some(DeckId::B));
        assert_eq!(tick(&mut xf, &mut layers, 0.0).docked, None);
    }

    #[test]
    fn test_fade_eases_and_completes() {
        let mut xf = CrossfaderSystem::new();
        let mut layers = layers();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        xf.fade_to(
            1.0,
            1000.0,
            0.0,
            Some(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );

        tick(&mut xf, &mut layers, 250.0);
        assert!((xf.value() - 0.125).abs() < 1e-5);
        tick(&mut xf, &mut layers, 500.0);
        assert!((xf.value() - 0.5).abs() < 1e-5);
        tick(&mut xf, &mut layers, 750.0);
        assert!((xf.value() - 0.875).abs() < 1e-5);

        let done = tick(&mut xf, &mut layers, 1200.0);
        assert!(done.fade_completed);
        assert_eq!(done.docked, Some(DeckId::B));
        assert_eq!(xf.value(), 1.0);
        assert!(!xf.is_auto_fading());
        tick(&mut xf, &mut layers, 1300.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_manual_input_ignored_during_fade() {
        let mut xf = CrossfaderSystem::new();
        xf.fade_to(1.0, 1000.0, 0.0, None);
        assert!(!xf.set_crossfade(0.9));
        assert_eq!(xf.value(), 0.0);

        xf.cancel_fade();
        assert!(xf.set_crossfade(0.9));
        assert_eq!(xf.value(), 0.9);
    }

    #[test]
    fn test_parallax_smoothing_per_tick() {
        let mut xf = CrossfaderSystem::new();
        let mut layers = layers();
        xf.set_parallax(100.0, -100.0);
        tick(&mut xf, &mut layers, 0.0);
        assert!((xf.rendered_parallax().x - 5.0).abs() < 1e-4);
        tick(&mut xf, &mut layers, 0.0);
        assert!((xf.rendered_parallax().x - 9.75).abs() < 1e-4);
        assert!((xf.rendered_parallax().y + 9.75).abs() < 1e-4);
    }

    #[test]
    fn test_flythrough_multipliers_at_midpoint() {
        assert_eq!(TransitionMode::Flythrough.size_multipliers(0.5), (3.0, 0.5));
        assert_eq!(TransitionMode::Crossfade.size_multipliers(0.5), (1.0, 1.0));

        let mut xf = CrossfaderSystem::new();
        xf.set_transition_mode(TransitionMode::Flythrough);
        xf.set_crossfade(0.5);
        let mut layers = layers();
        let mut renderer = RecordingRenderer::new();
        xf.update(&mut layers, &AudioReactor::default(), 0.0, 0.0, ScreenSize::default(), &mut renderer);

        let a = renderer.last(LayerId::One, DeckId::A).unwrap();
        let b = renderer.last(LayerId::One, DeckId::B).unwrap();
        assert!((a.scale - 3.0).abs() < 1e-6);
        assert!((b.scale - 0.5).abs() < 1e-6);
    }

    fn decks_with_distinct_state(layers: &mut [Layer]) {
        let (a, b) = layers[0].decks_mut();
        a.update_param(LayerParam::Size, 2.0, UpdateMode::Snap, 0.0);
        a.update_param(LayerParam::Speed, 0.05, UpdateMode::Snap, 0.0);
        a.update_param(LayerParam::Angle, 10.0, UpdateMode::Snap, 0.0);
        b.update_param(LayerParam::Size, 4.0, UpdateMode::Snap, 0.0);
        b.update_param(LayerParam::Speed, 0.02, UpdateMode::Snap, 0.0);
        b.update_param(LayerParam::Angle, -20.0, UpdateMode::Snap, 0.0);
    }

    #[test]
    fn test_flythrough_keeps_each_deck_state() {
        let mut xf = CrossfaderSystem::new();
        xf.set_transition_mode(TransitionMode::Flythrough);
        xf.set_crossfade(0.5);
        let mut layers = layers();
        decks_with_distinct_state(&mut layers);
        let mut renderer = RecordingRenderer::new();
        xf.update(&mut layers, &AudioReactor::default(), 1.0, 0.0, ScreenSize::default(), &mut renderer);

        let a = renderer.last(LayerId::One, DeckId::A).unwrap();
        let b = renderer.last(LayerId::One, DeckId::B).unwrap();
        // own size times (1 + 4t) and t
        assert!((a.scale - 6.0).abs() < 1e-5);
        assert!((b.scale - 2.0).abs() < 1e-5);
        // own angle plus own spin
        assert!((a.rotation - 10.05_f32.to_radians()).abs() < 1e-5);
        assert!((b.rotation - (-19.98_f32).to_radians()).abs() < 1e-5);
    }

    #[test]
    fn test_crossfade_draws_morph_on_both_decks() {
        let mut xf = CrossfaderSystem::new();
        xf.set_crossfade(0.5);
        let mut layers = layers();
        decks_with_distinct_state(&mut layers);
        let mut renderer = RecordingRenderer::new();
        xf.update(&mut layers, &AudioReactor::default(), 1.0, 0.0, ScreenSize::default(), &mut renderer);

        let a = renderer.last(LayerId::One, DeckId::A).unwrap();
        let b = renderer.last(LayerId::One, DeckId::B).unwrap();
        assert!((a.scale - 3.0).abs() < 1e-5);
        assert_eq!(a.scale, b.scale);
        assert_eq!(a.rotation, b.rotation);
    }

    #[test]
    fn test_crossfade_hides_far_deck() {
        let mut xf = CrossfaderSystem::new();
        let mut layers = layers();
        let mut renderer = RecordingRenderer::new();
        xf.update(&mut layers, &AudioReactor::default(), 1.0, 0.0, ScreenSize::default(), &mut renderer);
        assert!(renderer.last(LayerId::Two, DeckId::A).is_some());
        assert!(renderer.was_hidden(LayerId::Two, DeckId::B));
    }

    #[test]
    fn test_blend_discrete_switch_at_half() {
        let mut layer = Layer::new(LayerId::One, 0.0);
        let (a, b) = layer.decks_mut();
        a.update_param(LayerParam::Size, 1.0, UpdateMode::Snap, 0.0);
        b.update_param(LayerParam::Size, 3.0, UpdateMode::Snap, 0.0);
        a.update_param(LayerParam::Angle, 80.0, UpdateMode::Snap, 0.0);
        b.update_param(LayerParam::Angle, -80.0, UpdateMode::Snap, 0.0);
        b.update_field(DeckField::BlendMode, FieldValue::Blend(BlendMode::Screen), UpdateMode::Snap, 0.0);
        b.update_field(DeckField::Enabled, FieldValue::Flag(false), UpdateMode::Snap, 0.0);

        let sa = layer.deck(DeckId::A).resolve_render_state();
        let sb = layer.deck(DeckId::B).resolve_render_state();

        let before = blend_snapshots(&sa, &sb, 0.49);
        assert_eq!(before.blend_mode, BlendMode::Normal);
        assert!(before.enabled);

        let after = blend_snapshots(&sa, &sb, 0.5);
        assert_eq!(after.blend_mode, BlendMode::Screen);
        assert!(!after.enabled);
        assert!((after.size - 2.0).abs() < 1e-6);
        // 80 → -80 lerps through 0 (160 degrees), not through 180 (200 degrees)
        assert!(after.angle.abs() < 1e-4);
    }

    #[test]
    fn test_beat_factor_scales_output() {
        let mut audio = AudioReactor::default();
        audio.set_audio_factors(&[(LayerId::Three, 2.0)]);
        let mut xf = CrossfaderSystem::new();
        let mut layers = layers();
        let mut renderer = RecordingRenderer::new();
        xf.update(&mut layers, &audio, 0.0, 0.0, ScreenSize::default(), &mut renderer);
        assert_eq!(renderer.last(LayerId::Three, DeckId::A).unwrap().scale, 2.0);
        assert_eq!(renderer.last(LayerId::One, DeckId::A).unwrap().scale, 1.0);
    }
}
