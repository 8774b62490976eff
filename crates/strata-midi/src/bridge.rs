//! MIDI port bridge
//!
//! Connects to an input port through midir. The midir callback runs on the
//! driver thread; it parses each message and pushes it through a bounded
//! flume channel that the frame loop drains.
//!
//! ```text
//! MIDI device → midir callback → MidiInputEvent → flume → MidiManager::process
//! ```

use flume::{Receiver, Sender};
use midir::{MidiInput, MidiInputConnection};

use crate::input::MidiInputEvent;

/// Messages buffered between frames before new ones are dropped
const BRIDGE_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Failed to initialize MIDI input: {0}")]
    Init(String),

    #[error("No MIDI input ports available")]
    NoInputPorts,

    #[error("No MIDI port found matching pattern: {0}")]
    PortNotFound(String),

    #[error("Failed to connect to MIDI port: {0}")]
    Connect(String),

    #[error("Failed to get port info: {0}")]
    PortInfo(String),
}

/// Data handed to the midir callback
struct CallbackData {
    tx: Sender<MidiInputEvent>,
}

/// Live connection to one input port
pub struct MidiPortBridge {
    _connection: MidiInputConnection<CallbackData>,
    rx: Receiver<MidiInputEvent>,
    port_name: String,
}

impl MidiPortBridge {
    /// Connect to the first input port whose name contains `port_match`
    /// (case-insensitive). An empty pattern takes the first port.
    pub fn connect(port_match: &str) -> Result<Self, ConnectionError> {
        let pattern = port_match.to_lowercase();

        let midi_in =
            MidiInput::new("strata-midi-in").map_err(|e| ConnectionError::Init(e.to_string()))?;

        let ports = midi_in.ports();
        if ports.is_empty() {
            return Err(ConnectionError::NoInputPorts);
        }

        let port = ports
            .into_iter()
            .find(|port| {
                midi_in
                    .port_name(port)
                    .map(|name| name.to_lowercase().contains(&pattern))
                    .unwrap_or(false)
            })
            .ok_or_else(|| ConnectionError::PortNotFound(port_match.to_string()))?;

        let port_name = midi_in
            .port_name(&port)
            .map_err(|e| ConnectionError::PortInfo(e.to_string()))?;
        log::info!("MIDI: Found input port: {}", port_name);

        let (tx, rx) = flume::bounded(BRIDGE_CAPACITY);
        let connection = midi_in
            .connect(
                &port,
                "strata-midi-input",
                Self::midi_callback,
                CallbackData { tx },
            )
            .map_err(|e| ConnectionError::Connect(e.to_string()))?;

        log::info!("MIDI: Connected to {}", port_name);
        Ok(Self {
            _connection: connection,
            rx,
            port_name,
        })
    }

    fn midi_callback(_timestamp: u64, data: &[u8], cb: &mut CallbackData) {
        let Some(event) = MidiInputEvent::parse(data) else {
            return;
        };
        if cb.tx.try_send(event).is_err() {
            log::warn!("MIDI: input channel full, dropping {:?}", event);
        }
    }

    /// Everything received since the last drain, oldest first
    pub fn drain(&self) -> impl Iterator<Item = MidiInputEvent> + '_ {
        std::iter::from_fn(move || self.rx.try_recv().ok())
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Names of all input ports currently visible
    pub fn list_ports() -> Result<Vec<String>, ConnectionError> {
        let midi_in =
            MidiInput::new("strata-midi-list").map_err(|e| ConnectionError::Init(e.to_string()))?;
        Ok(midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect())
    }
}
