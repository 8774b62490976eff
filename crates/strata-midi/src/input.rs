//! Raw MIDI input events
//!
//! Bytes from the port callback are parsed with midly into the small set of
//! channel messages the manager understands. Anything else still produces an
//! [`MidiInputEvent::Other`] so the monitor can show it.

use midly::live::LiveEvent;
use midly::MidiMessage;

/// Channel message, channel is 0-based (0..=15)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiInputEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, cc: u8, value: u8 },
    /// 14-bit bend split into its 7-bit halves
    PitchBend { channel: u8, lsb: u8, msb: u8 },
    /// Any other message, kept for the monitor
    Other { status: u8, data1: u8, data2: u8 },
}

/// Coarse message class used by bindings and the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Cc,
    Note,
    PitchBend,
    Other,
}

impl MessageKind {
    /// Short label for the monitor view
    pub fn label(&self) -> &'static str {
        match self {
            MessageKind::Cc => "CC",
            MessageKind::Note => "NOTE",
            MessageKind::PitchBend => "PITCH",
            MessageKind::Other => "OTHER",
        }
    }
}

impl MidiInputEvent {
    /// Parse raw MIDI bytes
    ///
    /// Note On with velocity 0 is reported as Note Off.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let status = *data.first()?;
        let data1 = data.get(1).copied().unwrap_or(0);
        let data2 = data.get(2).copied().unwrap_or(0);

        let event = match LiveEvent::parse(data) {
            Ok(LiveEvent::Midi { channel, message }) => {
                let channel = channel.as_int();
                match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => Self::NoteOff {
                        channel,
                        note: key.as_int(),
                        velocity: 0,
                    },
                    MidiMessage::NoteOn { key, vel } => Self::NoteOn {
                        channel,
                        note: key.as_int(),
                        velocity: vel.as_int(),
                    },
                    MidiMessage::NoteOff { key, vel } => Self::NoteOff {
                        channel,
                        note: key.as_int(),
                        velocity: vel.as_int(),
                    },
                    MidiMessage::Controller { controller, value } => Self::ControlChange {
                        channel,
                        cc: controller.as_int(),
                        value: value.as_int(),
                    },
                    MidiMessage::PitchBend { bend } => {
                        let raw = bend.0.as_int();
                        Self::PitchBend {
                            channel,
                            lsb: (raw & 0x7F) as u8,
                            msb: ((raw >> 7) & 0x7F) as u8,
                        }
                    }
                    _ => Self::Other {
                        status,
                        data1,
                        data2,
                    },
                }
            }
            Ok(_) | Err(_) => Self::Other {
                status,
                data1,
                data2,
            },
        };
        Some(event)
    }

    /// Build from the transport form `{status, data1, data2}`
    pub fn from_raw(status: u8, data1: u8, data2: u8) -> Option<Self> {
        Self::parse(&[status, data1 & 0x7F, data2 & 0x7F])
    }

    /// 0-based channel, `None` for non-channel messages
    pub fn channel(&self) -> Option<u8> {
        match *self {
            Self::NoteOn { channel, .. }
            | Self::NoteOff { channel, .. }
            | Self::ControlChange { channel, .. }
            | Self::PitchBend { channel, .. } => Some(channel),
            Self::Other { .. } => None,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::NoteOn { .. } | Self::NoteOff { .. } => MessageKind::Note,
            Self::ControlChange { .. } => MessageKind::Cc,
            Self::PitchBend { .. } => MessageKind::PitchBend,
            Self::Other { .. } => MessageKind::Other,
        }
    }

    pub fn is_note_on(&self) -> bool {
        matches!(self, Self::NoteOn { .. })
    }

    /// Note or controller number; 0 for pitch bend
    pub fn number(&self) -> u8 {
        match *self {
            Self::NoteOn { note, .. } | Self::NoteOff { note, .. } => note,
            Self::ControlChange { cc, .. } => cc,
            Self::PitchBend { .. } => 0,
            Self::Other { data1, .. } => data1,
        }
    }

    /// Back to `(status, data1, data2)`
    pub fn to_raw(&self) -> (u8, u8, u8) {
        match *self {
            Self::NoteOn {
                channel,
                note,
                velocity,
            } => (0x90 | channel, note, velocity),
            Self::NoteOff {
                channel,
                note,
                velocity,
            } => (0x80 | channel, note, velocity),
            Self::ControlChange { channel, cc, value } => (0xB0 | channel, cc, value),
            Self::PitchBend { channel, lsb, msb } => (0xE0 | channel, lsb, msb),
            Self::Other {
                status,
                data1,
                data2,
            } => (status, data1, data2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_control_change() {
        let event = MidiInputEvent::parse(&[0xB3, 7, 100]).unwrap();
        assert_eq!(
            event,
            MidiInputEvent::ControlChange {
                channel: 3,
                cc: 7,
                value: 100
            }
        );
        assert_eq!(event.kind(), MessageKind::Cc);
        assert_eq!(event.channel(), Some(3));
    }

    #[test]
    fn test_note_on_zero_velocity_is_note_off() {
        let event = MidiInputEvent::parse(&[0x90, 36, 0]).unwrap();
        assert!(matches!(event, MidiInputEvent::NoteOff { note: 36, .. }));
        assert!(!event.is_note_on());
    }

    #[test]
    fn test_pitch_bend_halves() {
        let event = MidiInputEvent::parse(&[0xE1, 0x7F, 0x7F]).unwrap();
        assert_eq!(
            event,
            MidiInputEvent::PitchBend {
                channel: 1,
                lsb: 0x7F,
                msb: 0x7F
            }
        );
        assert_eq!(event.to_raw(), (0xE1, 0x7F, 0x7F));
    }

    #[test]
    fn test_unsupported_message_is_other() {
        // program change
        let event = MidiInputEvent::parse(&[0xC0, 5]).unwrap();
        assert_eq!(event.kind(), MessageKind::Other);
        assert_eq!(event.channel(), None);
        assert!(MidiInputEvent::parse(&[]).is_none());
    }
}
