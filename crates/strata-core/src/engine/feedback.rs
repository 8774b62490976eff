//! Recursive video feedback ("infinity trails")
//!
//! Two accumulation surfaces are ping-ponged every frame:
//!
//! ```text
//!   surfaces[active] ──echo (zoom, spin, offset, decay)──► surfaces[1-active]  (cleared first)
//!   live scene       ──drawn on top, undecayed──────────► surfaces[1-active]
//!   active = 1 - active                                  (new display surface)
//! ```
//!
//! The GPU side is behind [`FeedbackRenderer`]; the system only owns the
//! surface pair, the flip index and the config. A render failure switches
//! feedback off instead of propagating into the frame loop.

use serde::{Deserialize, Serialize};

use crate::params::FeedbackParam;
use crate::types::Vec2;

/// Spin units to radians per frame
const SPIN_TO_RADIANS: f32 = 0.05;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to allocate surface {width}x{height}: {reason}")]
    Allocation {
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("Draw failed: {0}")]
    Draw(String),

    #[error("Feedback surfaces are not allocated")]
    NotReady,
}

/// Feedback parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedbackConfig {
    pub enabled: bool,
    /// Echo alpha (decay)
    pub amount: f32,
    /// Echo zoom
    pub scale: f32,
    /// Echo spin
    pub rotation: f32,
    pub x_offset: f32,
    pub y_offset: f32,
    pub hue_shift: f32,
    pub sat_shift: f32,
    pub contrast: f32,
    pub invert: bool,
    pub render_on_top: bool,
    pub sway: f32,
    pub chroma: f32,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            amount: 0.9,
            scale: 1.01,
            rotation: 0.0,
            x_offset: 0.0,
            y_offset: 0.0,
            hue_shift: 0.0,
            sat_shift: 0.0,
            contrast: 1.0,
            invert: false,
            render_on_top: false,
            sway: 0.0,
            chroma: 0.0,
        }
    }
}

impl FeedbackConfig {
    /// Apply a resolved matrix value
    pub fn set(&mut self, param: FeedbackParam, value: f32) {
        let flag = value > 0.5;
        match param {
            FeedbackParam::Enabled => self.enabled = flag,
            FeedbackParam::Amount => self.amount = value,
            FeedbackParam::Scale => self.scale = value,
            FeedbackParam::Rotation => self.rotation = value,
            FeedbackParam::XOffset => self.x_offset = value,
            FeedbackParam::YOffset => self.y_offset = value,
            FeedbackParam::HueShift => self.hue_shift = value,
            FeedbackParam::SatShift => self.sat_shift = value,
            FeedbackParam::Contrast => self.contrast = value,
            FeedbackParam::Invert => self.invert = flag,
            FeedbackParam::RenderOnTop => self.render_on_top = flag,
            FeedbackParam::Sway => self.sway = value,
            FeedbackParam::Chroma => self.chroma = value,
        }
    }
}

/// Transform for drawing the previous frame back into the accumulator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoTransform {
    /// Pivot (surface centre) in pixels
    pub center: Vec2,
    pub scale: f32,
    /// Radians
    pub rotation: f32,
    pub translate: Vec2,
    pub alpha: f32,
}

impl EchoTransform {
    pub fn from_config(config: &FeedbackConfig, center: Vec2) -> Self {
        Self {
            center,
            scale: config.scale,
            rotation: config.rotation * SPIN_TO_RADIANS,
            translate: Vec2::new(config.x_offset, config.y_offset),
            alpha: config.amount,
        }
    }
}

/// GPU operations the compositor needs
pub trait FeedbackRenderer {
    type Surface;
    type Scene: ?Sized;

    fn create_surface(&mut self, width: u32, height: u32) -> Result<Self::Surface, RenderError>;

    /// Clear `target`, then draw `source` with `transform`
    fn draw_echo(
        &mut self,
        source: &Self::Surface,
        target: &mut Self::Surface,
        transform: &EchoTransform,
    ) -> Result<(), RenderError>;

    /// Draw the live scene over `target` without clearing
    fn draw_scene(&mut self, scene: &Self::Scene, target: &mut Self::Surface) -> Result<(), RenderError>;
}

/// What happened on a call to [`FeedbackSystem::render`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackFrame {
    /// Feedback is off; the caller draws the scene directly
    Skipped,
    Rendered,
    /// A draw failed and feedback switched itself off
    Disabled,
}

pub struct FeedbackSystem<R: FeedbackRenderer> {
    renderer: R,
    surfaces: Option<[R::Surface; 2]>,
    /// Index of the surface holding the latest output
    active: usize,
    config: FeedbackConfig,
    width: u32,
    height: u32,
    center: Vec2,
}

impl<R: FeedbackRenderer> FeedbackSystem<R> {
    /// Allocate both surfaces at the given size
    pub fn new(renderer: R, width: u32, height: u32) -> Result<Self, RenderError> {
        let mut system = Self {
            renderer,
            surfaces: None,
            active: 0,
            config: FeedbackConfig::default(),
            width,
            height,
            center: Vec2::ZERO,
        };
        system.resize(width, height)?;
        Ok(system)
    }

    /// Reallocate both surfaces and re-centre the echo pivot
    ///
    /// On failure the old surfaces are released and feedback is disabled.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.width = width;
        self.height = height;
        self.center = Vec2::new(width as f32 * 0.5, height as f32 * 0.5);
        self.active = 0;

        let allocated = self
            .renderer
            .create_surface(width, height)
            .and_then(|a| Ok([a, self.renderer.create_surface(width, height)?]));
        match allocated {
            Ok(pair) => {
                self.surfaces = Some(pair);
                log::debug!("Feedback: surfaces resized to {}x{}", width, height);
                Ok(())
            }
            Err(e) => {
                self.surfaces = None;
                self.config.enabled = false;
                log::warn!("Feedback: resize failed, disabling: {}", e);
                Err(e)
            }
        }
    }

    /// Composite one frame
    pub fn render(&mut self, scene: &R::Scene) -> FeedbackFrame {
        if !self.config.enabled {
            return FeedbackFrame::Skipped;
        }
        match self.render_frame(scene) {
            Ok(()) => FeedbackFrame::Rendered,
            Err(e) => {
                log::warn!("Feedback: render error, disabling: {}", e);
                self.config.enabled = false;
                FeedbackFrame::Disabled
            }
        }
    }

    fn render_frame(&mut self, scene: &R::Scene) -> Result<(), RenderError> {
        let transform = EchoTransform::from_config(&self.config, self.center);
        let surfaces = self.surfaces.as_mut().ok_or(RenderError::NotReady)?;
        let [first, second] = surfaces;
        let (source, target) = if self.active == 0 {
            (&*first, second)
        } else {
            (&*second, first)
        };

        self.renderer.draw_echo(source, target, &transform)?;
        self.renderer.draw_scene(scene, target)?;
        self.active = 1 - self.active;
        Ok(())
    }

    /// Surface to display (latest output)
    pub fn display(&self) -> Option<&R::Surface> {
        self.surfaces.as_ref().map(|s| &s[self.active])
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn config(&self) -> &FeedbackConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: FeedbackConfig) {
        self.config = config;
    }

    pub fn update_config(&mut self, param: FeedbackParam, value: f32) {
        self.config.set(param, value);
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}
