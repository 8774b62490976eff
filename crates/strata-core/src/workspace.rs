//! Persisted workspace document
//!
//! A workspace bundles the modulation state and a list of scenes. Each scene
//! stores one [`DeckConfig`] per layer plus the texture assigned to it.
//!
//! ```json
//! {
//!   "modulation": { "baseValues": { "bloom.intensity": 1.2 }, "patches": [] },
//!   "lfoSettings": { "lfo_1": { "frequency": 0.2, "type": "sine" } },
//!   "scenes": [
//!     { "name": "Intro", "layers": { "1": { "size": 2.0 } }, "tokenAssignments": { "1": "tok-42" } }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{read_document, save_config};
use crate::engine::{DeckConfig, TextureRef};
use crate::error::CoreError;
use crate::modulation::{LfoId, LfoSettings, ModulationDoc};
use crate::types::LayerId;

/// Texture assignment as stored: a bare token id or an id with its source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenAssignment {
    Id(String),
    Full {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        src: Option<String>,
    },
}

impl TokenAssignment {
    pub fn to_texture(&self) -> TextureRef {
        match self {
            TokenAssignment::Id(id) => TextureRef {
                token_id: id.clone(),
                source: None,
            },
            TokenAssignment::Full { id, src } => TextureRef {
                token_id: id.clone(),
                source: src.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Scene {
    pub name: String,
    /// Layers missing here load as defaults
    pub layers: BTreeMap<LayerId, DeckConfig>,
    pub token_assignments: BTreeMap<LayerId, TokenAssignment>,
}

impl Scene {
    /// Config for a layer, defaults when the scene omits it
    pub fn layer(&self, layer: LayerId) -> DeckConfig {
        self.layers.get(&layer).cloned().unwrap_or_default()
    }

    pub fn texture(&self, layer: LayerId) -> Option<TextureRef> {
        self.token_assignments.get(&layer).map(TokenAssignment::to_texture)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Workspace {
    pub modulation: ModulationDoc,
    pub lfo_settings: BTreeMap<LfoId, LfoSettings>,
    pub scenes: Vec<Scene>,
}

impl Workspace {
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let workspace: Workspace = read_document(path)?;
        log::info!(
            "Workspace: loaded {:?} ({} scenes, {} patches)",
            path,
            workspace.scenes.len(),
            workspace.modulation.patches.len()
        );
        Ok(workspace)
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        save_config(self, path)?;
        Ok(())
    }

    pub fn scene(&self, index: usize) -> Option<&Scene> {
        self.scenes.get(index)
    }
}
