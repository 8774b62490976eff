//! Value normalization for MIDI controls
//!
//! CC and note values are 7-bit (0-127), pitch bend is 14-bit. Everything
//! downstream works in 0.0..=1.0.

use crate::input::MidiInputEvent;

/// Largest 14-bit pitch bend value
const PITCH_BEND_MAX: f32 = 16383.0;

/// Normalize a 7-bit value to 0.0..=1.0
pub fn normalize_7bit(value: u8) -> f32 {
    (value.min(127) as f32) / 127.0
}

/// Normalize a pitch bend from its two 7-bit halves
pub fn normalize_pitch_bend(lsb: u8, msb: u8) -> f32 {
    let raw = ((msb as u16 & 0x7F) << 7) | (lsb as u16 & 0x7F);
    (raw as f32 / PITCH_BEND_MAX).clamp(0.0, 1.0)
}

/// Normalized value carried by an event
///
/// Note On uses its velocity. Every Note Off reads as 0, whatever its
/// release velocity; Note On with velocity 0 already parses as Note Off.
pub fn normalize_event(event: &MidiInputEvent) -> f32 {
    match *event {
        MidiInputEvent::NoteOn { velocity, .. } => normalize_7bit(velocity),
        MidiInputEvent::NoteOff { .. } => 0.0,
        MidiInputEvent::ControlChange { value, .. } => normalize_7bit(value),
        MidiInputEvent::PitchBend { lsb, msb, .. } => normalize_pitch_bend(lsb, msb),
        MidiInputEvent::Other { data2, .. } => normalize_7bit(data2),
    }
}

/// Map a normalized value into `min..=max`
pub fn scale_to_range(normalized: f32, min: f32, max: f32) -> f32 {
    min + normalized.clamp(0.0, 1.0) * (max - min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_7bit_bounds() {
        assert_eq!(normalize_7bit(0), 0.0);
        assert_eq!(normalize_7bit(127), 1.0);
        assert!((normalize_7bit(64) - 0.5039).abs() < 0.001);
    }

    #[test]
    fn test_pitch_bend() {
        assert_eq!(normalize_pitch_bend(0, 0), 0.0);
        assert_eq!(normalize_pitch_bend(0x7F, 0x7F), 1.0);
        // center is 8192
        assert!((normalize_pitch_bend(0, 64) - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_note_off_reads_zero() {
        let off = MidiInputEvent::NoteOff {
            channel: 0,
            note: 1,
            velocity: 0,
        };
        assert_eq!(normalize_event(&off), 0.0);

        let released = MidiInputEvent::NoteOff {
            channel: 0,
            note: 1,
            velocity: 64,
        };
        assert_eq!(normalize_event(&released), 0.0);
    }

    #[test]
    fn test_scale_to_range() {
        assert!((scale_to_range(0.5, 0.1, 8.0) - 4.05).abs() < 1e-5);
        assert_eq!(scale_to_range(2.0, 0.0, 1.0), 1.0);
    }
}
