//! MIDI learn
//!
//! When armed, the next qualifying message becomes the binding for the armed
//! target and learn mode returns to idle.

use strata_core::LayerId;

use crate::input::{MessageKind, MidiInputEvent};
use crate::mapping::{Destination, MidiBinding};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LearnState {
    #[default]
    Idle,
    /// Waiting for a CC, note-on or pitch bend for a parameter
    Param(Destination),
    /// Waiting for a note-on for a layer-select pad
    Layer(LayerId),
}

/// What a learn capture produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Learned {
    Param(Destination, MidiBinding),
    Layer(LayerId, MidiBinding),
}

impl LearnState {
    pub fn is_armed(&self) -> bool {
        !matches!(self, LearnState::Idle)
    }

    /// Try to capture `event`; on success the state returns to idle
    pub fn capture(&mut self, event: &MidiInputEvent) -> Option<Learned> {
        let learned = match *self {
            LearnState::Idle => return None,
            LearnState::Param(dest) => {
                let qualifies = match event.kind() {
                    MessageKind::Cc | MessageKind::PitchBend => true,
                    MessageKind::Note => event.is_note_on(),
                    MessageKind::Other => false,
                };
                if !qualifies {
                    return None;
                }
                Learned::Param(dest, MidiBinding::from_event(event)?)
            }
            LearnState::Layer(layer) => {
                if !event.is_note_on() {
                    return None;
                }
                Learned::Layer(layer, MidiBinding::from_event(event)?)
            }
        };
        *self = LearnState::Idle;
        Some(learned)
    }
}
