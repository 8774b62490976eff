//! In-process publish/subscribe for high-frequency signals
//!
//! Crossfade progress, dock events, MIDI parameter writes and smoothed UI
//! mirrors travel as typed [`Signal`] values. Each subscriber gets its own
//! bounded flume channel; dropping the receiver unsubscribes.
//!
//! Emitting never blocks: a full subscriber drops the signal with a warning,
//! the same policy the MIDI callback uses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use flume::{Receiver, Sender, TrySendError};

use crate::params::{LayerParam, ParamId};
use crate::types::{DeckId, LayerId};

/// Default per-subscriber queue depth
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Epsilon below which `emit_if_changed` treats two floats as equal
const CHANGE_EPSILON: f32 = 1e-6;

/// Signals exchanged between the engine, the MIDI layer and the UI
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Direct crossfader position (0..1), e.g. from a MIDI fader
    CrossfaderSet(f32),
    /// Crossfader position after this tick's update
    CrossfadeProgress(f32),
    /// Crossfader reached a boundary; the other deck is now hidden
    Docked(DeckId),
    /// Layer parameter write for the visible deck, normalized 0..1 (glides)
    ParamUpdate {
        layer: LayerId,
        param: LayerParam,
        value: f32,
    },
    /// Base-value write for a matrix parameter, normalized 0..1
    ModulationValue { id: ParamId, value: f32 },
    /// Smoothed mirror of a deck interpolator for UI sliders
    SmoothedValue {
        layer: LayerId,
        param: LayerParam,
        value: f32,
    },
    /// A scene finished loading onto the visible deck
    SceneLoaded { index: usize },
    /// A different workspace document was hydrated
    WorkspaceChanged,
    /// Step to the previous (-1) or next (+1) workspace; handled by the host
    WorkspaceNavigate(i32),
    /// The feedback compositor switched itself off after a render failure
    FeedbackDisabled,
}

struct BusInner {
    subscribers: Mutex<Vec<Sender<Signal>>>,
    last_values: Mutex<HashMap<String, f32>>,
    capacity: usize,
}

/// Cloneable handle to a shared signal bus
#[derive(Clone)]
pub struct SignalBus {
    inner: Arc<BusInner>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(Vec::new()),
                last_values: Mutex::new(HashMap::new()),
                capacity,
            }),
        }
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> Receiver<Signal> {
        let (tx, rx) = flume::bounded(self.inner.capacity);
        if let Ok(mut subs) = self.inner.subscribers.lock() {
            subs.push(tx);
        }
        rx
    }

    /// Deliver a signal to every live subscriber
    pub fn emit(&self, signal: Signal) {
        let Ok(mut subs) = self.inner.subscribers.lock() else {
            return;
        };
        subs.retain(|tx| match tx.try_send(signal.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("Bus: subscriber queue full, dropping {:?}", signal);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Emit only when `value` moved more than a tiny epsilon since the last
    /// emission under `key`
    ///
    /// Used for UI mirrors that would otherwise flood the bus every frame.
    pub fn emit_if_changed(&self, key: &str, value: f32, signal: impl FnOnce(f32) -> Signal) {
        if let Ok(mut last) = self.inner.last_values.lock() {
            if let Some(prev) = last.get(key) {
                if (prev - value).abs() < CHANGE_EPSILON {
                    return;
                }
            }
            last.insert(key.to_string(), value);
        }
        self.emit(signal(value));
    }

    /// Drop every subscriber and forget change-tracking state
    pub fn clear(&self) {
        if let Ok(mut subs) = self.inner.subscribers.lock() {
            subs.clear();
        }
        if let Ok(mut last) = self.inner.last_values.lock() {
            last.clear();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .map(|subs| subs.len())
            .unwrap_or(0)
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_receives() {
        let bus = SignalBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.emit(Signal::Docked(DeckId::B));
        assert_eq!(a.try_recv().unwrap(), Signal::Docked(DeckId::B));
        assert_eq!(b.try_recv().unwrap(), Signal::Docked(DeckId::B));
    }

    #[test]
    fn test_dropped_receiver_unsubscribes() {
        let bus = SignalBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);
        bus.emit(Signal::WorkspaceChanged);
        assert_eq!(bus.subscriber_count(), 1);
        assert!(keep.try_recv().is_ok());
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let bus = SignalBus::with_capacity(1);
        let rx = bus.subscribe();
        bus.emit(Signal::CrossfadeProgress(0.1));
        bus.emit(Signal::CrossfadeProgress(0.2));
        assert_eq!(rx.try_recv().unwrap(), Signal::CrossfadeProgress(0.1));
        assert!(rx.try_recv().is_err());
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_emit_if_changed_filters_jitter() {
        let bus = SignalBus::new();
        let rx = bus.subscribe();
        let mirror = |v| Signal::SmoothedValue {
            layer: LayerId::One,
            param: LayerParam::Size,
            value: v,
        };
        bus.emit_if_changed("1:size", 1.0, mirror);
        bus.emit_if_changed("1:size", 1.0 + 1e-8, mirror);
        bus.emit_if_changed("1:size", 1.5, mirror);
        assert_eq!(rx.drain().count(), 2);
    }
}
