//! MIDI control surface support for strata
//!
//! This crate provides:
//! - Input port connection via midir and message parsing via midly
//! - A YAML mapping table from controls to layer params, matrix params,
//!   the crossfader, global actions and layer-select pads
//! - MIDI learn
//! - Soft-takeover so knobs only take over once they reach the live value
//! - Throttled write-back of controlled values to a durable store
//!
//! # Architecture
//!
//! ```text
//! MIDI Device → midir callback → flume → MidiManager ─► SignalBus ─► Engine::tick
//!                                            │
//!                                            ├─► StoreSync (60 ms) ─► ParamStore
//!                                            └─► MidiAction queue ─► dispatch_action
//! ```

mod bridge;
mod catch;
mod config;
mod input;
mod learn;
mod manager;
mod mapping;
mod monitor;
mod normalize;
mod sync;

pub use bridge::{ConnectionError, MidiPortBridge};
pub use catch::{SoftTakeover, CATCH_THRESHOLD};
pub use config::{default_midi_config_path, load_midi_config, save_midi_config, MidiConfig};
pub use input::{MessageKind, MidiInputEvent};
pub use learn::{LearnState, Learned};
pub use manager::{dispatch_action, LiveValues, MidiAction, MidiManager, Outcome};
pub use mapping::{BindingKind, Destination, GlobalAction, MidiBinding, MidiMap};
pub use monitor::{MidiMonitor, MonitorEntry, MONITOR_CAPACITY};
pub use normalize::{normalize_7bit, normalize_event, normalize_pitch_bend, scale_to_range};
pub use sync::{MemoryStore, ParamStore, StoreSync, SYNC_THROTTLE_MS};

use std::path::Path;

/// Error type for MIDI operations
#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("Failed to save MIDI config: {0}")]
    ConfigError(#[from] anyhow::Error),

    #[error("MIDI connection error: {0}")]
    ConnectionError(#[from] ConnectionError),

    #[error("No MIDI device found matching config")]
    NoDeviceFound,
}

/// Manager plus the port it listens to
///
/// Starts without a port when none matches, so the rest of the app keeps
/// working with MIDI unplugged.
pub struct MidiController {
    config: MidiConfig,
    manager: MidiManager,
    bridge: Option<MidiPortBridge>,
}

impl MidiController {
    pub fn new(config: MidiConfig, bus: strata_core::SignalBus) -> Self {
        let manager = MidiManager::new(&config, bus);
        let bridge = match MidiPortBridge::connect(&config.port_match) {
            Ok(bridge) => Some(bridge),
            Err(e) => {
                log::warn!("MIDI: {}, running without a device", e);
                None
            }
        };
        Self {
            config,
            manager,
            bridge,
        }
    }

    /// Retry the port connection, e.g. after a device was plugged in
    pub fn reconnect(&mut self) -> Result<(), MidiError> {
        self.bridge = None;
        match MidiPortBridge::connect(&self.config.port_match) {
            Ok(bridge) => {
                self.bridge = Some(bridge);
                Ok(())
            }
            Err(ConnectionError::NoInputPorts | ConnectionError::PortNotFound(_)) => {
                Err(MidiError::NoDeviceFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.bridge.is_some()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.bridge.as_ref().map(MidiPortBridge::port_name)
    }

    /// Run one frame: handle input, then flush store writes
    pub fn update(&mut self, live: &dyn LiveValues, store: &mut dyn ParamStore, now: f64) {
        if let Some(bridge) = &self.bridge {
            self.manager.process(bridge, live, now);
        }
        self.manager.poll(store, now);
    }

    pub fn manager(&self) -> &MidiManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut MidiManager {
        &mut self.manager
    }

    /// Persist the mapping table if learning changed it
    pub fn save_if_learned(&mut self, path: &Path) -> Result<bool, MidiError> {
        if !self.manager.take_map_changed() {
            return Ok(false);
        }
        self.config.map = self.manager.map().clone();
        save_midi_config(&self.config, path)?;
        Ok(true)
    }
}
