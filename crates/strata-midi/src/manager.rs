//! MIDI manager: learn, soft-takeover and dispatch
//!
//! Every message passes through the same pipeline, first match wins:
//!
//! 1. monitor (before any filtering)
//! 2. channel filter
//! 3. learn capture, when armed
//! 4. crossfader binding
//! 5. parameter bindings (layer params glide, matrix params set base values)
//! 6. global actions (CC > 64 or note-on)
//! 7. layer-select pads (note-on)
//!
//! Applied values go out on the [`SignalBus`] immediately in normalized
//! units and are written back to the durable store on a 60 ms throttle.

use std::collections::VecDeque;

use flume::Receiver;
use strata_core::params::{definition, LayerParam, ParamId};
use strata_core::{CoreError, Engine, LayerId, Signal, SignalBus};

use crate::bridge::MidiPortBridge;
use crate::catch::SoftTakeover;
use crate::config::MidiConfig;
use crate::input::MidiInputEvent;
use crate::learn::{LearnState, Learned};
use crate::mapping::{Destination, GlobalAction, MidiMap};
use crate::monitor::MidiMonitor;
use crate::normalize::{normalize_event, scale_to_range};
use crate::sync::{ParamStore, StoreSync};

/// CC value above which a button-style action fires
const ACTION_CC_THRESHOLD: u8 = 64;
/// CC value above which a bool parameter is on
const TOGGLE_CC_THRESHOLD: u8 = 63;

/// Current values the engine is showing, used for soft-takeover
pub trait LiveValues {
    fn crossfade_value(&self) -> f32;
    /// Visible deck's interpolated value, in the layer UI range
    fn layer_value(&self, layer: LayerId, param: LayerParam) -> f32;
    /// Matrix base value, in the parameter's range
    fn base_value(&self, id: ParamId) -> f32;
}

impl LiveValues for Engine {
    fn crossfade_value(&self) -> f32 {
        Engine::crossfade_value(self)
    }

    fn layer_value(&self, layer: LayerId, param: LayerParam) -> f32 {
        self.live_layer_value(layer, param)
    }

    fn base_value(&self, id: ParamId) -> f32 {
        self.modulation().base_value(id)
    }
}

/// Discrete action queued for the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiAction {
    Global(GlobalAction),
    SelectLayer(LayerId),
}

/// What happened to one message
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// Dropped by the channel filter
    Filtered,
    Learned(Learned),
    /// Learn is armed and the message didn't qualify
    LearnPending,
    /// Forwarded to the engine with this normalized value
    Applied(Destination, f32),
    /// Mapped but not yet caught
    Blocked(Destination),
    Queued(MidiAction),
    /// Matched a binding that the message doesn't trigger (e.g. note-off)
    Ignored,
    Unmapped,
}

pub struct MidiManager {
    map: MidiMap,
    bus: SignalBus,
    bus_rx: Receiver<Signal>,
    catch: SoftTakeover,
    learn: LearnState,
    monitor: MidiMonitor,
    sync: StoreSync,
    /// 1-based channel, `None` listens to all
    channel_filter: Option<u8>,
    actions: VecDeque<MidiAction>,
    map_changed: bool,
}

impl MidiManager {
    pub fn new(config: &MidiConfig, bus: SignalBus) -> Self {
        let bus_rx = bus.subscribe();
        Self {
            map: config.map.clone(),
            bus,
            bus_rx,
            catch: SoftTakeover::with_threshold(config.catch_threshold),
            learn: LearnState::Idle,
            monitor: MidiMonitor::new(config.monitor),
            sync: StoreSync::new(config.throttle_ms),
            channel_filter: config.channel_filter(),
            actions: VecDeque::new(),
            map_changed: false,
        }
    }

    /// Handle everything the port bridge received since the last frame
    pub fn process(&mut self, bridge: &MidiPortBridge, live: &dyn LiveValues, now: f64) -> usize {
        let mut count = 0;
        for event in bridge.drain() {
            self.handle_event(&event, live, now);
            count += 1;
        }
        count
    }

    /// Handle a message in transport form
    pub fn handle_raw(
        &mut self,
        status: u8,
        data1: u8,
        data2: u8,
        live: &dyn LiveValues,
        now: f64,
    ) -> Outcome {
        match MidiInputEvent::from_raw(status, data1, data2) {
            Some(event) => self.handle_event(&event, live, now),
            None => Outcome::Unmapped,
        }
    }

    pub fn handle_event(
        &mut self,
        event: &MidiInputEvent,
        live: &dyn LiveValues,
        now: f64,
    ) -> Outcome {
        self.watch_bus();
        self.monitor.record(event, now);

        if let Some(channel) = self.channel_filter {
            if event.channel().map(|c| c + 1) != Some(channel) {
                return Outcome::Filtered;
            }
        }

        if self.learn.is_armed() {
            return match self.learn.capture(event) {
                Some(learned) => {
                    self.apply_learned(learned);
                    Outcome::Learned(learned)
                }
                None => Outcome::LearnPending,
            };
        }

        if self.map.matches_crossfader(event) {
            return self.apply_continuous(Destination::Crossfader, event, live, now);
        }

        if let Some(dest) = self.map.find_param(event) {
            return if dest.is_toggle() {
                self.apply_toggle(dest, event, live, now)
            } else {
                self.apply_continuous(dest, event, live, now)
            };
        }

        if let Some(action) = self.map.find_action(event) {
            let fires = match *event {
                MidiInputEvent::ControlChange { value, .. } => value > ACTION_CC_THRESHOLD,
                _ => event.is_note_on(),
            };
            return if fires {
                self.queue(MidiAction::Global(action))
            } else {
                Outcome::Ignored
            };
        }

        if let Some(layer) = self.map.find_layer_select(event) {
            return if event.is_note_on() {
                self.queue(MidiAction::SelectLayer(layer))
            } else {
                Outcome::Ignored
            };
        }

        Outcome::Unmapped
    }

    /// Flush throttled store writes; call once per frame
    pub fn poll(&mut self, store: &mut dyn ParamStore, now: f64) -> usize {
        self.watch_bus();
        self.sync.poll(store, now)
    }

    /// Actions queued since the last drain, oldest first
    pub fn drain_actions(&mut self) -> impl Iterator<Item = MidiAction> + '_ {
        std::iter::from_fn(move || self.actions.pop_front())
    }

    // --- learn ---

    pub fn learn_param(&mut self, dest: Destination) {
        log::info!("MIDI: learning {}", dest);
        self.learn = LearnState::Param(dest);
    }

    pub fn learn_layer(&mut self, layer: LayerId) {
        log::info!("MIDI: learning layer select {}", layer.as_str());
        self.learn = LearnState::Layer(layer);
    }

    pub fn cancel_learn(&mut self) {
        self.learn = LearnState::Idle;
    }

    pub fn learn_state(&self) -> LearnState {
        self.learn
    }

    /// True once after the map was changed by learning; the host saves it then
    pub fn take_map_changed(&mut self) -> bool {
        std::mem::take(&mut self.map_changed)
    }

    // --- state ---

    pub fn map(&self) -> &MidiMap {
        &self.map
    }

    pub fn set_map(&mut self, map: MidiMap) {
        self.map = map;
        self.catch.reset();
    }

    pub fn set_channel_filter(&mut self, channel: Option<u8>) {
        self.channel_filter = channel.filter(|c| (1..=16).contains(c));
    }

    pub fn channel_filter(&self) -> Option<u8> {
        self.channel_filter
    }

    pub fn monitor(&self) -> &MidiMonitor {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut MidiMonitor {
        &mut self.monitor
    }

    pub fn is_caught(&self, dest: Destination) -> bool {
        self.catch.is_caught(dest)
    }

    pub fn reset_catch(&mut self) {
        self.catch.reset();
    }

    // --- internals ---

    /// Scene and workspace changes invalidate every catch latch
    fn watch_bus(&mut self) {
        let mut reset = false;
        for signal in std::iter::from_fn(|| self.bus_rx.try_recv().ok()) {
            if matches!(signal, Signal::SceneLoaded { .. } | Signal::WorkspaceChanged) {
                reset = true;
            }
        }
        if reset {
            self.catch.reset();
        }
    }

    fn apply_learned(&mut self, learned: Learned) {
        match learned {
            Learned::Param(dest, binding) => {
                log::info!("MIDI: learned {} -> {:?}", dest, binding);
                self.map.bind(dest, binding);
                self.catch.force_caught(dest);
            }
            Learned::Layer(layer, binding) => {
                log::info!("MIDI: learned layer {} -> {:?}", layer.as_str(), binding);
                self.map.bind_layer_select(layer, binding);
            }
        }
        self.map_changed = true;
    }

    fn current_normalized(dest: Destination, live: &dyn LiveValues) -> f32 {
        match dest {
            Destination::Crossfader => live.crossfade_value(),
            Destination::Layer(layer, param) => param.normalize(live.layer_value(layer, param)),
            Destination::Param(id) => definition(id).normalize(live.base_value(id)),
        }
    }

    /// Value-carrying bindings; a note binding acts as a momentary pad, so
    /// its release (0x80, or 0x90 with velocity 0) writes 0
    fn apply_continuous(
        &mut self,
        dest: Destination,
        event: &MidiInputEvent,
        live: &dyn LiveValues,
        now: f64,
    ) -> Outcome {
        let value = normalize_event(event);
        let current = Self::current_normalized(dest, live);
        if !self.catch.check(dest, value, current) {
            return Outcome::Blocked(dest);
        }
        self.forward(dest, value, now);
        Outcome::Applied(dest, value)
    }

    fn apply_toggle(
        &mut self,
        dest: Destination,
        event: &MidiInputEvent,
        live: &dyn LiveValues,
        now: f64,
    ) -> Outcome {
        let Destination::Param(id) = dest else {
            return Outcome::Ignored;
        };
        let on = match *event {
            MidiInputEvent::NoteOn { .. } => live.base_value(id) <= 0.5,
            MidiInputEvent::ControlChange { value, .. } => value > TOGGLE_CC_THRESHOLD,
            MidiInputEvent::PitchBend { .. } => normalize_event(event) > 0.5,
            _ => return Outcome::Ignored,
        };
        let value = if on { 1.0 } else { 0.0 };
        self.forward(dest, definition(id).normalize(value), now);
        Outcome::Applied(dest, value)
    }

    /// Broadcast to the render loop and schedule the store write
    fn forward(&mut self, dest: Destination, normalized: f32, now: f64) {
        let signal = match dest {
            Destination::Crossfader => Signal::CrossfaderSet(normalized),
            Destination::Layer(layer, param) => Signal::ParamUpdate {
                layer,
                param,
                value: normalized,
            },
            Destination::Param(id) => Signal::ModulationValue {
                id,
                value: normalized,
            },
        };
        self.bus.emit(signal);

        let (min, max) = dest.range();
        self.sync
            .schedule(dest, scale_to_range(normalized, min, max), now);
    }

    fn queue(&mut self, action: MidiAction) -> Outcome {
        log::debug!("MIDI: queued {:?}", action);
        self.actions.push_back(action);
        Outcome::Queued(action)
    }
}

/// Apply a drained action to the engine
///
/// Scene navigation wraps around the workspace's scene list. Workspace
/// navigation is left to the host via [`Signal::WorkspaceNavigate`].
pub fn dispatch_action(engine: &mut Engine, action: MidiAction) -> Result<(), CoreError> {
    match action {
        MidiAction::Global(GlobalAction::NextScene) => step_scene(engine, 1),
        MidiAction::Global(GlobalAction::PrevScene) => step_scene(engine, -1),
        MidiAction::Global(GlobalAction::NextWorkspace) => {
            engine.bus().emit(Signal::WorkspaceNavigate(1));
            Ok(())
        }
        MidiAction::Global(GlobalAction::PrevWorkspace) => {
            engine.bus().emit(Signal::WorkspaceNavigate(-1));
            Ok(())
        }
        MidiAction::Global(GlobalAction::PLockToggle) => {
            let state = engine.toggle_sequencer();
            log::info!("MIDI: p-lock toggled, now {:?}", state);
            Ok(())
        }
        MidiAction::SelectLayer(layer) => {
            engine.select_layer(layer);
            Ok(())
        }
    }
}

fn step_scene(engine: &mut Engine, step: i64) -> Result<(), CoreError> {
    let count = engine.workspace().scenes.len() as i64;
    if count == 0 {
        return Ok(());
    }
    let next = match engine.active_scene() {
        Some(current) => (current as i64 + step).rem_euclid(count),
        None if step > 0 => 0,
        None => count - 1,
    };
    engine.select_scene(next as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MidiBinding;
    use crate::sync::MemoryStore;
    use std::collections::HashMap;
    use strata_core::config::EngineConfig;
    use strata_core::params::EffectParam;
    use strata_core::workspace::{Scene, Workspace};
    use strata_core::ManualClock;

    const SIZE_1: Destination = Destination::Layer(LayerId::One, LayerParam::Size);
    const PIXELATE: ParamId = ParamId::Effect(EffectParam::PixelateEnabled);

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[derive(Default)]
    struct FakeLive {
        crossfade: f32,
        layers: HashMap<(LayerId, LayerParam), f32>,
        bases: HashMap<ParamId, f32>,
    }

    impl LiveValues for FakeLive {
        fn crossfade_value(&self) -> f32 {
            self.crossfade
        }

        fn layer_value(&self, layer: LayerId, param: LayerParam) -> f32 {
            self.layers
                .get(&(layer, param))
                .copied()
                .unwrap_or_else(|| param.scene_default())
        }

        fn base_value(&self, id: ParamId) -> f32 {
            self.bases
                .get(&id)
                .copied()
                .unwrap_or_else(|| definition(id).default)
        }
    }

    fn cc(channel: u8, cc: u8, value: u8) -> MidiInputEvent {
        MidiInputEvent::ControlChange { channel, cc, value }
    }

    fn note_on(note: u8) -> MidiInputEvent {
        MidiInputEvent::NoteOn {
            channel: 0,
            note,
            velocity: 100,
        }
    }

    fn manager_with(map: MidiMap) -> (MidiManager, SignalBus, Receiver<Signal>) {
        let bus = SignalBus::new();
        let rx = bus.subscribe();
        let config = MidiConfig {
            map,
            ..MidiConfig::default()
        };
        (MidiManager::new(&config, bus.clone()), bus, rx)
    }

    fn drain(rx: &Receiver<Signal>) -> Vec<Signal> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_cc7_catches_layer_size() {
        init_logging();
        let mut map = MidiMap::default();
        map.bind(SIZE_1, MidiBinding::cc(7).on_channel(0));
        let (mut midi, _bus, rx) = manager_with(map);

        // live size normalized to 0.55
        let mut live = FakeLive::default();
        live.layers
            .insert((LayerId::One, LayerParam::Size), LayerParam::Size.denormalize(0.55));

        let out = midi.handle_event(&cc(0, 7, 64), &live, 0.0);
        assert!(matches!(out, Outcome::Applied(SIZE_1, v) if (v - 64.0 / 127.0).abs() < 1e-6));
        assert!(midi.is_caught(SIZE_1));

        // far away but already caught
        let out = midi.handle_event(&cc(0, 7, 0), &live, 10.0);
        assert_eq!(out, Outcome::Applied(SIZE_1, 0.0));

        let signals = drain(&rx);
        assert_eq!(
            signals.last(),
            Some(&Signal::ParamUpdate {
                layer: LayerId::One,
                param: LayerParam::Size,
                value: 0.0
            })
        );
    }

    #[test]
    fn test_uncaught_message_is_blocked() {
        let mut map = MidiMap::default();
        map.bind(SIZE_1, MidiBinding::cc(7));
        let (mut midi, _bus, rx) = manager_with(map);
        let live = FakeLive::default();

        // default size 1.0 normalizes to ~0.114
        assert_eq!(
            midi.handle_event(&cc(0, 7, 127), &live, 0.0),
            Outcome::Blocked(SIZE_1)
        );
        assert!(drain(&rx).is_empty());
        assert!(matches!(
            midi.handle_event(&cc(0, 7, 14), &live, 0.0),
            Outcome::Applied(SIZE_1, _)
        ));
    }

    #[test]
    fn test_scene_change_resets_catch() {
        let mut map = MidiMap::default();
        map.bind(Destination::Crossfader, MidiBinding::cc(1));
        let (mut midi, bus, _rx) = manager_with(map);
        let live = FakeLive::default();

        assert!(matches!(
            midi.handle_event(&cc(0, 1, 0), &live, 0.0),
            Outcome::Applied(Destination::Crossfader, _)
        ));
        assert!(midi.is_caught(Destination::Crossfader));

        bus.emit(Signal::SceneLoaded { index: 1 });
        midi.poll(&mut MemoryStore::default(), 0.0);
        assert!(!midi.is_caught(Destination::Crossfader));
        assert_eq!(
            midi.handle_event(&cc(0, 1, 127), &live, 0.0),
            Outcome::Blocked(Destination::Crossfader)
        );
    }

    #[test]
    fn test_channel_filter_after_monitor() {
        let mut map = MidiMap::default();
        map.bind(Destination::Crossfader, MidiBinding::cc(1));
        let (mut midi, _bus, _rx) = manager_with(map);
        midi.set_channel_filter(Some(2));
        let live = FakeLive::default();

        assert_eq!(midi.handle_event(&cc(0, 1, 0), &live, 0.0), Outcome::Filtered);
        assert_eq!(midi.monitor().len(), 1);
        assert!(matches!(
            midi.handle_event(&cc(1, 1, 0), &live, 0.0),
            Outcome::Applied(..)
        ));
    }

    #[test]
    fn test_note_binding_release_writes_zero() {
        let opacity = Destination::Layer(LayerId::One, LayerParam::Opacity);
        let mut map = MidiMap::default();
        map.bind(opacity, MidiBinding::note(36));
        let (mut midi, _bus, rx) = manager_with(map);
        let live = FakeLive::default();

        assert_eq!(
            midi.handle_raw(0x90, 36, 127, &live, 0.0),
            Outcome::Applied(opacity, 1.0)
        );
        // Note Off with a release velocity
        assert_eq!(
            midi.handle_raw(0x80, 36, 64, &live, 1.0),
            Outcome::Applied(opacity, 0.0)
        );
        // Note On with velocity 0
        assert_eq!(
            midi.handle_raw(0x90, 36, 0, &live, 2.0),
            Outcome::Applied(opacity, 0.0)
        );

        let values: Vec<f32> = rx
            .drain()
            .filter_map(|signal| match signal {
                Signal::ParamUpdate { value, .. } => Some(value),
                _ => None,
            })
            .collect();
        assert_eq!(values, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_learn_binds_and_catches() {
        let (mut midi, _bus, _rx) = manager_with(MidiMap::default());
        let live = FakeLive::default();
        midi.learn_param(SIZE_1);

        let off = MidiInputEvent::NoteOff {
            channel: 0,
            note: 3,
            velocity: 0,
        };
        assert_eq!(midi.handle_event(&off, &live, 0.0), Outcome::LearnPending);
        assert!(matches!(
            midi.handle_event(&cc(5, 20, 127), &live, 0.0),
            Outcome::Learned(Learned::Param(SIZE_1, _))
        ));
        assert_eq!(midi.learn_state(), LearnState::Idle);
        assert!(midi.take_map_changed());
        assert!(!midi.take_map_changed());

        // learned binding is live and already caught
        assert!(matches!(
            midi.handle_event(&cc(5, 20, 127), &live, 1.0),
            Outcome::Applied(SIZE_1, _)
        ));
    }

    #[test]
    fn test_bool_param_toggles_without_catch() {
        let dest = Destination::Param(PIXELATE);
        let mut map = MidiMap::default();
        map.bind(dest, MidiBinding::note(10));
        let (mut midi, _bus, rx) = manager_with(map);

        let mut live = FakeLive::default();
        assert_eq!(
            midi.handle_event(&note_on(10), &live, 0.0),
            Outcome::Applied(dest, 1.0)
        );
        live.bases.insert(PIXELATE, 1.0);
        assert_eq!(
            midi.handle_event(&note_on(10), &live, 0.0),
            Outcome::Applied(dest, 0.0)
        );
        assert_eq!(
            drain(&rx),
            vec![
                Signal::ModulationValue {
                    id: PIXELATE,
                    value: 1.0
                },
                Signal::ModulationValue {
                    id: PIXELATE,
                    value: 0.0
                },
            ]
        );
    }

    #[test]
    fn test_actions_need_press() {
        let mut map = MidiMap::default();
        map.bind_action(GlobalAction::NextScene, MidiBinding::cc(30));
        map.bind_action(GlobalAction::PLockToggle, MidiBinding::note(40));
        map.bind_layer_select(LayerId::Three, MidiBinding::note(41));
        let (mut midi, _bus, _rx) = manager_with(map);
        let live = FakeLive::default();

        assert_eq!(midi.handle_event(&cc(0, 30, 64), &live, 0.0), Outcome::Ignored);
        midi.handle_event(&cc(0, 30, 65), &live, 0.0);
        midi.handle_event(&note_on(40), &live, 0.0);
        midi.handle_event(&note_on(41), &live, 0.0);
        assert_eq!(
            midi.handle_event(&cc(0, 99, 127), &live, 0.0),
            Outcome::Unmapped
        );

        let actions: Vec<_> = midi.drain_actions().collect();
        assert_eq!(
            actions,
            vec![
                MidiAction::Global(GlobalAction::NextScene),
                MidiAction::Global(GlobalAction::PLockToggle),
                MidiAction::SelectLayer(LayerId::Three),
            ]
        );
        assert_eq!(midi.drain_actions().count(), 0);
    }

    #[test]
    fn test_store_sync_is_rescaled_and_throttled() {
        let mut map = MidiMap::default();
        map.bind(SIZE_1, MidiBinding::cc(7));
        let (mut midi, _bus, _rx) = manager_with(map);
        let mut live = FakeLive::default();
        live.layers.insert((LayerId::One, LayerParam::Size), 8.0);

        midi.handle_event(&cc(0, 7, 127), &live, 0.0);
        midi.handle_event(&cc(0, 7, 120), &live, 10.0);

        let mut store = MemoryStore::default();
        assert_eq!(midi.poll(&mut store, 30.0), 0);
        assert_eq!(midi.poll(&mut store, 61.0), 1);
        let expected = LayerParam::Size.denormalize(120.0 / 127.0);
        assert!((store.values[&SIZE_1] - expected).abs() < 1e-4);
    }

    #[test]
    fn test_engine_receives_midi_glide() {
        init_logging();
        let clock = ManualClock::new(0.0);
        let mut engine = Engine::new(EngineConfig::default(), Box::new(clock.clone()));
        let mut map = MidiMap::default();
        map.bind(Destination::Crossfader, MidiBinding::cc(1));
        let config = MidiConfig {
            map,
            ..MidiConfig::default()
        };
        let mut midi = MidiManager::new(&config, engine.bus().clone());

        // crossfader sits at 0; 0.5 is too far to catch
        assert_eq!(
            midi.handle_event(&cc(0, 1, 64), &engine, 0.0),
            Outcome::Blocked(Destination::Crossfader)
        );
        assert!(matches!(
            midi.handle_event(&cc(0, 1, 3), &engine, 0.0),
            Outcome::Applied(..)
        ));
        assert!(matches!(
            midi.handle_event(&cc(0, 1, 64), &engine, 0.0),
            Outcome::Applied(..)
        ));
        clock.advance(16.0);
        engine.tick(&mut strata_core::engine::NullRenderer);
        assert!((engine.crossfade_value() - 64.0 / 127.0).abs() < 1e-4);
    }

    #[test]
    fn test_dispatch_scene_navigation() {
        let clock = ManualClock::new(0.0);
        let mut engine = Engine::new(EngineConfig::default(), Box::new(clock));
        engine.load_workspace(Workspace {
            scenes: vec![Scene::default(), Scene::default()],
            ..Workspace::default()
        });

        dispatch_action(&mut engine, MidiAction::Global(GlobalAction::PrevScene)).unwrap();
        // a fade is already running
        assert!(matches!(
            dispatch_action(&mut engine, MidiAction::Global(GlobalAction::NextScene)),
            Err(CoreError::FadeInProgress)
        ));

        dispatch_action(&mut engine, MidiAction::SelectLayer(LayerId::Two)).unwrap();
        assert_eq!(engine.selected_layer(), LayerId::Two);
    }
}
