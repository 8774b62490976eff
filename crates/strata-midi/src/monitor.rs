//! Capped log of recent incoming messages for the MIDI monitor view

use std::collections::VecDeque;

use crate::input::{MessageKind, MidiInputEvent};

/// Entries kept before the oldest is dropped
pub const MONITOR_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorEntry {
    /// Engine clock time in ms
    pub timestamp: f64,
    pub kind: MessageKind,
    /// 1-based channel as shown to users, 0 for non-channel messages
    pub channel: u8,
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

#[derive(Debug, Clone)]
pub struct MidiMonitor {
    entries: VecDeque<MonitorEntry>,
    capacity: usize,
    enabled: bool,
}

impl MidiMonitor {
    pub fn new(enabled: bool) -> Self {
        Self {
            entries: VecDeque::with_capacity(MONITOR_CAPACITY),
            capacity: MONITOR_CAPACITY,
            enabled,
        }
    }

    pub fn record(&mut self, event: &MidiInputEvent, now: f64) {
        if !self.enabled {
            return;
        }
        let (status, data1, data2) = event.to_raw();
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(MonitorEntry {
            timestamp: now,
            kind: event.kind(),
            channel: event.channel().map_or(0, |c| c + 1),
            status,
            data1,
            data2,
        });
    }

    /// Oldest first
    pub fn entries(&self) -> impl Iterator<Item = &MonitorEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for MidiMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
