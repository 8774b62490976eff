//! MIDI configuration (`~/.config/strata/midi.yaml`)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_core::config::{default_config_path, load_config, save_config};

use crate::catch::CATCH_THRESHOLD;
use crate::mapping::MidiMap;
use crate::sync::SYNC_THROTTLE_MS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    /// Case-insensitive substring of the input port name; empty takes the first port
    pub port_match: String,
    /// 1-16 listens to a single channel, 0 listens to all
    pub channel: u8,
    /// Record incoming messages for the monitor view
    pub monitor: bool,
    pub throttle_ms: f64,
    pub catch_threshold: f32,
    pub map: MidiMap,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            port_match: String::new(),
            channel: 0,
            monitor: true,
            throttle_ms: SYNC_THROTTLE_MS,
            catch_threshold: CATCH_THRESHOLD,
            map: MidiMap::default(),
        }
    }
}

impl MidiConfig {
    /// Channel filter as used by the manager, `None` for all channels
    pub fn channel_filter(&self) -> Option<u8> {
        (1..=16).contains(&self.channel).then_some(self.channel)
    }
}

pub fn default_midi_config_path() -> PathBuf {
    default_config_path("midi.yaml")
}

/// Load the MIDI config; missing or invalid files give an empty map
pub fn load_midi_config(path: &Path) -> MidiConfig {
    let config: MidiConfig = load_config(path);
    log::info!(
        "MIDI: {} param mapping(s), {} action(s), {} layer select(s)",
        config.map.params.len() + usize::from(config.map.crossfader.is_some()),
        config.map.actions.len(),
        config.map.layer_selects.len()
    );
    config
}

pub fn save_midi_config(config: &MidiConfig, path: &Path) -> anyhow::Result<()> {
    save_config(config, path)?;
    log::info!("MIDI: saved config to {:?}", path);
    Ok(())
}
