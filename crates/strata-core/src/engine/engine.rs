//! Engine context: owns every system and sequences one frame
//!
//! ```text
//!   tick(renderer)
//!     1. drain audio ring, apply bus messages (MIDI crossfader / params / knobs)
//!     2. LFO + events → modulation resolve → layer offsets, feedback config, UI mirrors
//!     3. sequencer → playback overrides
//!     4. crossfader update (physics, blend, renderer calls)
//!   composite(feedback, scene)
//!     5. feedback render with the resolved feedback config
//! ```
//!
//! Time comes from the injected [`Clock`], read once per tick.

use flume::{Receiver, Sender};

use super::audio_reactor::{audio_channel, AudioReactor, AudioReceiver, AudioSender};
use super::crossfader::{CrossfadeTick, CrossfaderSystem};
use super::deck::{DeckConfig, DeckField, Layer, UpdateMode};
use super::feedback::{FeedbackConfig, FeedbackFrame, FeedbackRenderer, FeedbackSystem};
use super::render::LayerRenderer;
use super::sequencer::{PLockSequencer, SequencerState};
use crate::bus::{Signal, SignalBus};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::modulation::{EventSignals, LfoBank, LfoId, ModulationMatrix, SignalFrame};
use crate::params::{definition, FeedbackParam, LayerParam, ParamId};
use crate::types::{DeckId, LayerId, NUM_LAYERS};
use crate::workspace::Workspace;

pub struct Engine {
    clock: Box<dyn Clock>,
    config: EngineConfig,
    bus: SignalBus,
    inbox: Receiver<Signal>,
    layers: Vec<Layer>,
    crossfader: CrossfaderSystem,
    audio: AudioReactor,
    audio_rx: Option<AudioReceiver>,
    lfo: LfoBank,
    events: EventSignals,
    modulation: ModulationMatrix,
    sequencer: PLockSequencer,
    feedback: FeedbackConfig,
    workspace: Workspace,
    active_scene: Option<usize>,
    selected_layer: LayerId,
    scene_done_tx: Sender<usize>,
    scene_done_rx: Receiver<usize>,
    last_tick: Option<f64>,
}

impl Engine {
    pub fn new(config: EngineConfig, clock: Box<dyn Clock>) -> Self {
        let now = clock.now_ms();
        let bus = SignalBus::with_capacity(config.bus_capacity);
        let inbox = bus.subscribe();

        let mut crossfader = CrossfaderSystem::new();
        crossfader.set_parallax_smoothing(config.parallax_smoothing);
        crossfader.set_transition_mode(config.transition_mode);

        let mut lfo = LfoBank::new(now);
        lfo.set_settings(config.lfos);

        let mut events = EventSignals::new();
        events.set_decay_rate(config.event_decay_rate);

        let mut sequencer = PLockSequencer::new();
        sequencer.set_speed(config.sequencer_speed);

        let (scene_done_tx, scene_done_rx) = flume::unbounded();

        log::info!(
            "Engine: {} layers, scene fade {} ms, glide {} ms",
            NUM_LAYERS,
            config.scene_fade_ms,
            config.midi_glide_ms
        );

        Self {
            layers: LayerId::ALL
                .iter()
                .map(|&id| Layer::new(id, config.midi_glide_ms))
                .collect(),
            audio: AudioReactor::new(config.audio.clone()),
            clock,
            bus,
            inbox,
            crossfader,
            audio_rx: None,
            lfo,
            events,
            modulation: ModulationMatrix::new(),
            sequencer,
            feedback: FeedbackConfig::default(),
            workspace: Workspace::default(),
            active_scene: None,
            selected_layer: LayerId::One,
            scene_done_tx,
            scene_done_rx,
            last_tick: None,
            config,
        }
    }

    /// Engine on the wall clock
    pub fn with_system_clock(config: EngineConfig) -> Self {
        Self::new(config, Box::new(SystemClock::new()))
    }

    /// Open the audio sample ring; the sender goes to the analysis thread
    ///
    /// Replaces any previous ring.
    pub fn connect_audio(&mut self) -> AudioSender {
        let (tx, rx) = audio_channel(self.config.audio_ring_capacity);
        self.audio_rx = Some(rx);
        tx
    }

    pub fn now(&self) -> f64 {
        self.clock.now_ms()
    }

    /// Handle for publishing to / subscribing from the engine
    pub fn bus(&self) -> &SignalBus {
        &self.bus
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one frame
    pub fn tick(&mut self, renderer: &mut dyn LayerRenderer) -> CrossfadeTick {
        let now = self.clock.now_ms();
        let elapsed_ms = match self.last_tick {
            Some(last) => (now - last).max(0.0),
            None => self.config.frame_ms,
        };
        self.last_tick = Some(now);
        let frames = ((elapsed_ms / self.config.frame_ms) as f32).min(self.config.max_frame_delta);
        let dt = frames * self.config.physics_step;
        let dt_secs = frames * (self.config.frame_ms / 1000.0) as f32;

        // 1. inputs
        if let Some(sample) = self.audio_rx.as_mut().and_then(AudioReceiver::latest) {
            self.audio.ingest(sample, now);
        }
        let pending: Vec<Signal> = self.inbox.drain().collect();
        for signal in pending {
            self.handle_signal(signal, now);
        }

        // 2. modulation
        self.events.update(dt_secs);
        self.resolve_modulation(now);
        self.emit_mirrors();

        // 3. sequencer
        let seq = self.sequencer.tick(now);
        for write in seq.writes {
            let layer = &mut self.layers[write.layer.index()];
            for deck in DeckId::ALL {
                layer.deck_mut(deck).set_playback(write.field, write.value);
            }
        }
        if let Some(snapshot) = seq.restore {
            self.restore_configs(&snapshot);
        }
        if seq.ended {
            self.clear_playback();
        }

        // 4. crossfade
        let tick = self.crossfader.update(
            &mut self.layers,
            &self.audio,
            dt,
            now,
            self.config.screen,
            renderer,
        );
        self.bus
            .emit_if_changed("crossfader", tick.value, Signal::CrossfadeProgress);
        if let Some(side) = tick.docked {
            self.bus.emit(Signal::Docked(side));
        }
        for index in self.scene_done_rx.drain() {
            log::info!("Engine: scene {} active", index);
            self.active_scene = Some(index);
            self.bus.emit(Signal::SceneLoaded { index });
        }
        tick
    }

    /// Draw the feedback pass for this frame
    ///
    /// A render failure turns `feedback.enabled` off and emits
    /// [`Signal::FeedbackDisabled`].
    pub fn composite<R: FeedbackRenderer>(
        &mut self,
        feedback: &mut FeedbackSystem<R>,
        scene: &R::Scene,
    ) -> FeedbackFrame {
        feedback.set_config(self.feedback.clone());
        let frame = feedback.render(scene);
        if frame == FeedbackFrame::Disabled {
            self.modulation
                .set_base_value(ParamId::Feedback(FeedbackParam::Enabled), 0.0);
            self.feedback.enabled = false;
            self.bus.emit(Signal::FeedbackDisabled);
        }
        frame
    }

    fn handle_signal(&mut self, signal: Signal, now: f64) {
        match signal {
            Signal::CrossfaderSet(value) => {
                self.crossfader.set_crossfade(value);
            }
            Signal::ParamUpdate {
                layer,
                param,
                value,
            } => {
                self.apply_param_update(layer, param, param.denormalize(value), now);
            }
            Signal::ModulationValue { id, value } => {
                let value = definition(id).denormalize(value);
                self.modulation.set_base_value(id, value);
            }
            _ => {}
        }
    }

    /// Glide a layer parameter on the visible deck
    ///
    /// Skipped while the sequencer animates the same destination.
    fn apply_param_update(&mut self, layer: LayerId, param: LayerParam, value: f32, now: f64) {
        if self.sequencer.owns(layer, DeckField::Param(param)) {
            log::debug!("Engine: {}.{} held by sequencer", layer.as_str(), param.as_str());
            return;
        }
        let visible = self.visible_deck();
        self.layers[layer.index()]
            .deck_mut(visible)
            .update_param(param, value, UpdateMode::Glide, now);
    }

    fn resolve_modulation(&mut self, now: f64) {
        let frame = SignalFrame {
            audio: self.audio.latest(),
            lfo: self.lfo.update(now),
            events: &self.events,
        };
        let resolved = self.modulation.resolve(&frame);

        for layer in &mut self.layers {
            for param in LayerParam::ALL {
                let offset = resolved
                    .get(&ParamId::Layer(layer.id(), param))
                    .copied()
                    .unwrap_or(0.0);
                for deck in DeckId::ALL {
                    layer.deck_mut(deck).set_modulation(param, offset);
                }
            }
        }
        for param in FeedbackParam::ALL {
            if let Some(&value) = resolved.get(&ParamId::Feedback(param)) {
                self.feedback.set(param, value);
            }
        }
    }

    fn emit_mirrors(&self) {
        let visible = self.visible_deck();
        for layer in &self.layers {
            let deck = layer.deck(visible);
            for param in LayerParam::ALL {
                let key = format!("{}:{}", layer.id().as_str(), param.as_str());
                let id = layer.id();
                self.bus
                    .emit_if_changed(&key, deck.live_value(param), |value| Signal::SmoothedValue {
                        layer: id,
                        param,
                        value,
                    });
            }
        }
    }

    /// Snap both decks of every layer to the given configs
    fn restore_configs(&mut self, configs: &[DeckConfig; NUM_LAYERS]) {
        for (layer, config) in self.layers.iter_mut().zip(configs) {
            for deck in DeckId::ALL {
                layer.deck_mut(deck).load_scene(config);
            }
        }
    }

    fn clear_playback(&mut self) {
        for layer in &mut self.layers {
            for deck in DeckId::ALL {
                layer.deck_mut(deck).clear_playback();
            }
        }
    }

    // --- scenes & workspace ---

    /// Load a workspace: hydrate modulation and LFOs, keep its scenes
    pub fn load_workspace(&mut self, workspace: Workspace) {
        let report = self.modulation.hydrate(&workspace.modulation);
        for (&id, &settings) in &workspace.lfo_settings {
            self.lfo.set_lfo(id, settings.frequency, settings.waveform);
        }
        log::info!(
            "Engine: workspace with {} scenes ({} stale patches pruned)",
            workspace.scenes.len(),
            report.pruned_patches.len()
        );
        self.workspace = workspace;
        self.active_scene = None;
        self.bus.emit(Signal::WorkspaceChanged);
    }

    /// Snapshot the live modulation state back into the workspace document
    pub fn workspace_snapshot(&self) -> Workspace {
        let mut workspace = self.workspace.clone();
        workspace.modulation = self.modulation.to_doc();
        workspace.lfo_settings = LfoId::ALL
            .iter()
            .map(|&id| (id, self.lfo.settings()[id.index()]))
            .collect();
        workspace
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Crossfade to a scene
    ///
    /// The scene is loaded into the hidden deck (after it inherits the visible
    /// deck's motion phase) and the crossfader fades over to it.
    /// [`Signal::SceneLoaded`] is emitted once the fade completes.
    pub fn select_scene(&mut self, index: usize) -> Result<(), CoreError> {
        if self.crossfader.is_auto_fading() {
            return Err(CoreError::FadeInProgress);
        }
        let scene = self
            .workspace
            .scene(index)
            .ok_or(CoreError::SceneOutOfRange {
                index,
                count: self.workspace.scenes.len(),
            })?
            .clone();

        let visible = self.visible_deck();
        let hidden = visible.other();
        for layer in &mut self.layers {
            layer.sync_physics(visible);
            let id = layer.id();
            let deck = layer.deck_mut(hidden);
            deck.load_scene(&scene.layer(id));
            deck.set_texture(scene.texture(id));
        }

        let done = self.scene_done_tx.clone();
        let now = self.clock.now_ms();
        self.crossfader.fade_to(
            hidden.crossfade_target(),
            self.config.scene_fade_ms,
            now,
            Some(Box::new(move || {
                let _ = done.send(index);
            })),
        );
        log::info!("Engine: fading to scene {} '{}' on deck {:?}", index, scene.name, hidden);
        Ok(())
    }

    pub fn active_scene(&self) -> Option<usize> {
        self.active_scene
    }

    // --- direct control ---

    pub fn visible_deck(&self) -> DeckId {
        DeckId::visible_at(self.crossfader.value())
    }

    pub fn layer(&self, id: LayerId) -> &Layer {
        &self.layers[id.index()]
    }

    pub fn layer_mut(&mut self, id: LayerId) -> &mut Layer {
        &mut self.layers[id.index()]
    }

    /// Snap a layer parameter on the visible deck (manual edit)
    pub fn set_layer_param(&mut self, layer: LayerId, param: LayerParam, value: f32) {
        let visible = self.visible_deck();
        let now = self.clock.now_ms();
        self.layers[layer.index()]
            .deck_mut(visible)
            .update_param(param, value, UpdateMode::Snap, now);
    }

    /// Interpolated value of a layer parameter on the visible deck
    pub fn live_layer_value(&self, layer: LayerId, param: LayerParam) -> f32 {
        self.layers[layer.index()]
            .deck(self.visible_deck())
            .live_value(param)
    }

    pub fn crossfade_value(&self) -> f32 {
        self.crossfader.value()
    }

    pub fn crossfader(&self) -> &CrossfaderSystem {
        &self.crossfader
    }

    pub fn crossfader_mut(&mut self) -> &mut CrossfaderSystem {
        &mut self.crossfader
    }

    pub fn audio_mut(&mut self) -> &mut AudioReactor {
        &mut self.audio
    }

    pub fn modulation(&self) -> &ModulationMatrix {
        &self.modulation
    }

    pub fn modulation_mut(&mut self) -> &mut ModulationMatrix {
        &mut self.modulation
    }

    pub fn lfo_mut(&mut self) -> &mut LfoBank {
        &mut self.lfo
    }

    pub fn trigger_event(&mut self, kind: &str) {
        self.events.trigger(kind);
    }

    /// Feedback config resolved on the last tick
    pub fn feedback_config(&self) -> &FeedbackConfig {
        &self.feedback
    }

    pub fn selected_layer(&self) -> LayerId {
        self.selected_layer
    }

    pub fn select_layer(&mut self, layer: LayerId) {
        self.selected_layer = layer;
    }

    // --- sequencer ---

    /// Live config of every layer's visible deck
    fn live_configs(&self) -> [DeckConfig; NUM_LAYERS] {
        let visible = self.visible_deck();
        std::array::from_fn(|i| self.layers[i].deck(visible).config().clone())
    }

    pub fn toggle_sequencer(&mut self) -> SequencerState {
        let live = self.live_configs();
        let now = self.clock.now_ms();
        self.sequencer.toggle(&live, now);
        self.sequencer.state()
    }

    pub fn clear_sequencer(&mut self) {
        let now = self.clock.now_ms();
        self.sequencer.clear(now);
    }

    pub fn sequencer(&self) -> &PLockSequencer {
        &self.sequencer
    }

    pub fn sequencer_mut(&mut self) -> &mut PLockSequencer {
        &mut self.sequencer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::engine::{
        AudioSample, EchoTransform, FrequencyBands, RecordingRenderer, RenderError,
    };
    use crate::modulation::{AudioBand, SignalSource};
    use crate::workspace::Scene;

    fn engine() -> (Engine, ManualClock) {
        let _ = env_logger::builder().is_test(true).try_init();
        let clock = ManualClock::new(0.0);
        let engine = Engine::new(EngineConfig::default(), Box::new(clock.clone()));
        (engine, clock)
    }

    fn two_scene_workspace() -> Workspace {
        let mut big = Scene {
            name: "Big".into(),
            ..Scene::default()
        };
        big.layers.insert(
            LayerId::One,
            DeckConfig {
                size: 4.0,
                ..DeckConfig::default()
            },
        );
        Workspace {
            scenes: vec![Scene::default(), big],
            ..Workspace::default()
        }
    }

    #[test]
    fn test_scene_select_fades_to_hidden_deck() {
        let (mut engine, clock) = engine();
        let rx = engine.bus().subscribe();
        let mut renderer = RecordingRenderer::new();
        engine.load_workspace(two_scene_workspace());
        engine.tick(&mut renderer);

        engine.select_scene(1).unwrap();
        assert_eq!(engine.layer(LayerId::One).deck(DeckId::B).config().size, 4.0);
        assert!(matches!(engine.select_scene(0), Err(CoreError::FadeInProgress)));

        clock.advance(500.0);
        engine.tick(&mut renderer);
        assert!((engine.crossfade_value() - 0.5).abs() < 1e-5);
        assert_eq!(engine.active_scene(), None);

        clock.advance(600.0);
        engine.tick(&mut renderer);
        assert_eq!(engine.crossfade_value(), 1.0);
        assert_eq!(engine.active_scene(), Some(1));
        assert_eq!(engine.visible_deck(), DeckId::B);

        let signals: Vec<_> = rx.drain().collect();
        assert!(signals.contains(&Signal::WorkspaceChanged));
        assert!(signals.contains(&Signal::SceneLoaded { index: 1 }));
        assert!(signals.contains(&Signal::Docked(DeckId::B)));
    }

    #[test]
    fn test_scene_out_of_range() {
        let (mut engine, _clock) = engine();
        assert!(matches!(
            engine.select_scene(3),
            Err(CoreError::SceneOutOfRange { index: 3, count: 0 })
        ));
    }

    #[test]
    fn test_bus_param_update_glides_visible_deck() {
        let (mut engine, clock) = engine();
        let mut renderer = RecordingRenderer::new();
        engine.bus().emit(Signal::ParamUpdate {
            layer: LayerId::Two,
            param: LayerParam::Opacity,
            value: 0.0,
        });
        engine.tick(&mut renderer);

        clock.advance(150.0);
        engine.tick(&mut renderer);
        let mid = engine.live_layer_value(LayerId::Two, LayerParam::Opacity);
        assert!((mid - 0.5).abs() < 1e-4);

        clock.advance(200.0);
        engine.tick(&mut renderer);
        assert_eq!(engine.live_layer_value(LayerId::Two, LayerParam::Opacity), 0.0);
    }

    #[test]
    fn test_crossfader_from_bus() {
        let (mut engine, _clock) = engine();
        engine.bus().emit(Signal::CrossfaderSet(0.75));
        engine.tick(&mut RecordingRenderer::new());
        assert_eq!(engine.crossfade_value(), 0.75);
    }

    #[test]
    fn test_modulation_offsets_reach_renderer() {
        let (mut engine, _clock) = engine();
        let mut renderer = RecordingRenderer::new();
        engine
            .modulation_mut()
            .set_base_value(ParamId::Layer(LayerId::One, LayerParam::Size), 0.5);
        engine.tick(&mut renderer);
        let t = renderer.last(LayerId::One, DeckId::A).unwrap();
        assert!((t.scale - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_audio_patch_and_beat_factor() {
        let (mut engine, _clock) = engine();
        let mut audio = engine.connect_audio();
        engine.modulation_mut().add_patch(
            SignalSource::Audio(AudioBand::Bass),
            ParamId::Feedback(FeedbackParam::Rotation),
            1.0,
        );
        audio.push(AudioSample {
            level: 0.1,
            bands: FrequencyBands {
                bass: 0.5,
                mid: 0.0,
                treble: 0.0,
            },
        });
        let mut renderer = RecordingRenderer::new();
        engine.tick(&mut renderer);
        assert!((engine.feedback_config().rotation - 0.5).abs() < 1e-6);
        // bass 0.5 → layer 1 factor 1.4
        let t = renderer.last(LayerId::One, DeckId::A).unwrap();
        assert!((t.scale - 1.4).abs() < 1e-5);
    }

    #[test]
    fn test_sequencer_overrides_and_blocks_midi() {
        let (mut engine, clock) = engine();
        let mut renderer = RecordingRenderer::new();
        assert_eq!(engine.toggle_sequencer(), SequencerState::Armed);
        engine.set_layer_param(LayerId::One, LayerParam::Size, 3.0);
        assert_eq!(engine.toggle_sequencer(), SequencerState::ArmingToPlay);

        clock.advance(500.0);
        engine.tick(&mut renderer);
        let state = engine.layer(LayerId::One).deck(DeckId::A).resolve_render_state();
        assert!((state.size - 2.0).abs() < 1e-5);

        engine.bus().emit(Signal::ParamUpdate {
            layer: LayerId::One,
            param: LayerParam::Size,
            value: 1.0,
        });
        clock.advance(100.0);
        engine.tick(&mut renderer);
        assert_eq!(engine.layer(LayerId::One).deck(DeckId::A).config().size, 3.0);

        // clearing mid-transition stops at once
        engine.clear_sequencer();
        assert_eq!(engine.sequencer().state(), SequencerState::Idle);
        engine.tick(&mut renderer);
        assert!(!engine.layer(LayerId::One).deck(DeckId::A).has_playback());
    }

    #[test]
    fn test_sequencer_end_clears_playback() {
        let (mut engine, clock) = engine();
        let mut renderer = RecordingRenderer::new();
        engine.toggle_sequencer();
        engine.set_layer_param(LayerId::One, LayerParam::Size, 3.0);
        engine.toggle_sequencer();
        clock.advance(1000.0);
        engine.tick(&mut renderer);
        assert_eq!(engine.sequencer().state(), SequencerState::Playing);

        engine.toggle_sequencer();
        clock.advance(500.0);
        engine.tick(&mut renderer);
        assert_eq!(engine.sequencer().state(), SequencerState::Resetting);
        clock.advance(600.0);
        engine.tick(&mut renderer);
        assert_eq!(engine.sequencer().state(), SequencerState::Idle);

        // the armed snapshot persists, not the tweak
        for deck in DeckId::ALL {
            let deck = engine.layer(LayerId::One).deck(deck);
            assert!(!deck.has_playback());
            assert_eq!(deck.config().size, 1.0);
            assert_eq!(deck.live_value(LayerParam::Size), 1.0);
            assert_eq!(deck.resolve_render_state().size, 1.0);
        }

        clock.advance(100.0);
        engine.tick(&mut renderer);
        let state = engine.layer(LayerId::One).deck(DeckId::A).resolve_render_state();
        assert_eq!(state.size, 1.0);
    }

    struct BrokenRenderer;

    impl FeedbackRenderer for BrokenRenderer {
        type Surface = ();
        type Scene = ();

        fn create_surface(&mut self, _w: u32, _h: u32) -> Result<(), RenderError> {
            Ok(())
        }

        fn draw_echo(&mut self, _s: &(), _t: &mut (), _x: &EchoTransform) -> Result<(), RenderError> {
            Err(RenderError::Draw("device lost".into()))
        }

        fn draw_scene(&mut self, _s: &(), _t: &mut ()) -> Result<(), RenderError> {
            Ok(())
        }
    }

    #[test]
    fn test_feedback_failure_disables_and_notifies() {
        let (mut engine, _clock) = engine();
        let rx = engine.bus().subscribe();
        let mut feedback = FeedbackSystem::new(BrokenRenderer, 4, 4).unwrap();
        engine
            .modulation_mut()
            .set_base_value(ParamId::Feedback(FeedbackParam::Enabled), 1.0);
        engine.tick(&mut RecordingRenderer::new());
        assert!(engine.feedback_config().enabled);

        assert_eq!(engine.composite(&mut feedback, &()), FeedbackFrame::Disabled);
        assert_eq!(
            engine
                .modulation()
                .base_value(ParamId::Feedback(FeedbackParam::Enabled)),
            0.0
        );
        assert!(rx.drain().any(|s| s == Signal::FeedbackDisabled));

        engine.tick(&mut RecordingRenderer::new());
        assert_eq!(engine.composite(&mut feedback, &()), FeedbackFrame::Skipped);
    }

    #[test]
    fn test_workspace_snapshot_keeps_modulation() {
        let (mut engine, _clock) = engine();
        engine.load_workspace(two_scene_workspace());
        engine
            .modulation_mut()
            .set_base_value(ParamId::Feedback(FeedbackParam::Amount), 0.7);
        let snapshot = engine.workspace_snapshot();
        assert_eq!(snapshot.scenes.len(), 2);
        assert_eq!(snapshot.modulation.base_values["feedback.amount"], 0.7);
        assert_eq!(snapshot.lfo_settings.len(), 3);
    }
}
