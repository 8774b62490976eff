//! MIDI mapping table
//!
//! Maps controller messages to destinations: the crossfader, a layer
//! parameter on the visible deck, a matrix parameter, a global action or a
//! layer-select pad. Serialized as YAML inside `midi.yaml`:
//!
//! ```yaml
//! map:
//!   crossfader: { type: cc, number: 1 }
//!   params:
//!     "1.size": { type: cc, number: 7, channel: 0 }
//!     "bloom.intensity": { type: pitchbend }
//!   actions:
//!     nextScene: { type: note, number: 40 }
//!   layer_selects:
//!     "2": { type: note, number: 37 }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strata_core::params::{definition, LayerParam, ParamId};
use strata_core::LayerId;

use crate::input::{MessageKind, MidiInputEvent};

/// Where a mapped message is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Destination {
    /// `global.crossfader`
    Crossfader,
    /// Layer parameter on the visible deck (`"1.size"`), glided by the engine
    Layer(LayerId, LayerParam),
    /// Base value of a matrix parameter (`"bloom.intensity"`, `"layer.1.size"`)
    Param(ParamId),
}

impl Destination {
    pub fn parse(s: &str) -> Option<Self> {
        if let Some((group, param)) = s.split_once('.') {
            if let (Some(layer), Some(param)) = (LayerId::parse(group), LayerParam::parse(param)) {
                return Some(Destination::Layer(layer, param));
            }
        }
        match ParamId::parse(s)? {
            ParamId::Crossfader => Some(Destination::Crossfader),
            id => Some(Destination::Param(id)),
        }
    }

    /// UI range the store expects for this destination
    pub fn range(&self) -> (f32, f32) {
        match self {
            Destination::Crossfader => (0.0, 1.0),
            Destination::Layer(_, param) => param.range(),
            Destination::Param(id) => {
                let def = definition(*id);
                (def.min, def.max)
            }
        }
    }

    /// Bool matrix parameters bypass soft-takeover
    pub fn is_toggle(&self) -> bool {
        match self {
            Destination::Param(id) => definition(*id).is_bool(),
            _ => false,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Crossfader => f.write_str("global.crossfader"),
            Destination::Layer(layer, param) => write!(f, "{}.{}", layer.as_str(), param.as_str()),
            Destination::Param(id) => write!(f, "{id}"),
        }
    }
}

impl TryFrom<String> for Destination {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Destination::parse(&s).ok_or_else(|| format!("unknown MIDI destination: {s}"))
    }
}

impl From<Destination> for String {
    fn from(dest: Destination) -> Self {
        dest.to_string()
    }
}

/// Message type a binding listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingKind {
    Cc,
    Note,
    #[serde(alias = "pitch_bend")]
    Pitchbend,
}

/// One learned or hand-written control binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiBinding {
    #[serde(rename = "type")]
    pub kind: BindingKind,
    /// CC or note number; ignored for pitch bend
    #[serde(default)]
    pub number: u8,
    /// 0-based channel; any channel when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<u8>,
}

impl MidiBinding {
    pub fn cc(number: u8) -> Self {
        Self {
            kind: BindingKind::Cc,
            number,
            channel: None,
        }
    }

    pub fn note(number: u8) -> Self {
        Self {
            kind: BindingKind::Note,
            number,
            channel: None,
        }
    }

    pub fn pitch_bend() -> Self {
        Self {
            kind: BindingKind::Pitchbend,
            number: 0,
            channel: None,
        }
    }

    pub fn on_channel(mut self, channel: u8) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Binding that would match this event, pinned to its channel
    pub fn from_event(event: &MidiInputEvent) -> Option<Self> {
        let kind = match event.kind() {
            MessageKind::Cc => BindingKind::Cc,
            MessageKind::Note => BindingKind::Note,
            MessageKind::PitchBend => BindingKind::Pitchbend,
            MessageKind::Other => return None,
        };
        Some(Self {
            kind,
            number: event.number(),
            channel: event.channel(),
        })
    }

    pub fn matches(&self, event: &MidiInputEvent) -> bool {
        if let Some(channel) = self.channel {
            if event.channel() != Some(channel) {
                return false;
            }
        }
        match (self.kind, event.kind()) {
            (BindingKind::Cc, MessageKind::Cc) | (BindingKind::Note, MessageKind::Note) => {
                self.number == event.number()
            }
            (BindingKind::Pitchbend, MessageKind::PitchBend) => true,
            _ => false,
        }
    }
}

/// Discrete actions triggered by buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GlobalAction {
    NextScene,
    PrevScene,
    NextWorkspace,
    PrevWorkspace,
    #[serde(rename = "pLockToggle")]
    PLockToggle,
}

/// Complete mapping table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiMap {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crossfader: Option<MidiBinding>,
    pub params: BTreeMap<Destination, MidiBinding>,
    pub actions: BTreeMap<GlobalAction, MidiBinding>,
    pub layer_selects: BTreeMap<LayerId, MidiBinding>,
}

impl MidiMap {
    pub fn is_empty(&self) -> bool {
        self.crossfader.is_none()
            && self.params.is_empty()
            && self.actions.is_empty()
            && self.layer_selects.is_empty()
    }

    /// Bind a destination, replacing any previous binding for it
    pub fn bind(&mut self, dest: Destination, binding: MidiBinding) {
        match dest {
            Destination::Crossfader => self.crossfader = Some(binding),
            dest => {
                self.params.insert(dest, binding);
            }
        }
    }

    pub fn bind_action(&mut self, action: GlobalAction, binding: MidiBinding) {
        self.actions.insert(action, binding);
    }

    pub fn bind_layer_select(&mut self, layer: LayerId, binding: MidiBinding) {
        self.layer_selects.insert(layer, binding);
    }

    pub fn unbind(&mut self, dest: Destination) -> Option<MidiBinding> {
        match dest {
            Destination::Crossfader => self.crossfader.take(),
            dest => self.params.remove(&dest),
        }
    }

    pub fn binding(&self, dest: Destination) -> Option<&MidiBinding> {
        match dest {
            Destination::Crossfader => self.crossfader.as_ref(),
            dest => self.params.get(&dest),
        }
    }

    pub fn matches_crossfader(&self, event: &MidiInputEvent) -> bool {
        self.crossfader.is_some_and(|b| b.matches(event))
    }

    /// First parameter destination matching the event, in key order
    pub fn find_param(&self, event: &MidiInputEvent) -> Option<Destination> {
        self.params
            .iter()
            .find(|(_, binding)| binding.matches(event))
            .map(|(dest, _)| *dest)
    }

    pub fn find_action(&self, event: &MidiInputEvent) -> Option<GlobalAction> {
        self.actions
            .iter()
            .find(|(_, binding)| binding.matches(event))
            .map(|(action, _)| *action)
    }

    pub fn find_layer_select(&self, event: &MidiInputEvent) -> Option<LayerId> {
        self.layer_selects
            .iter()
            .find(|(_, binding)| binding.matches(event))
            .map(|(layer, _)| *layer)
    }
}
