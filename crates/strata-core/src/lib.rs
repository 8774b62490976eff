//! Strata Core - control resolution and crossfade engine for layered visuals
//!
//! Three visual layers, each with an A and a B deck, blended by one
//! crossfader. Every frame the engine resolves what each deck should look
//! like from scene configs, MIDI glides, modulation and audio, then hands
//! per-deck transforms to a renderer.
//!
//! ```text
//!   MIDI (strata-midi) ──► SignalBus ──┐
//!   audio analysis ──► rtrb ring ──────┤
//!                                      ▼
//!                       Engine::tick ─► LFO/events ─► ModulationMatrix
//!                                      │                  │ offsets
//!                                      ▼                  ▼
//!                       PLockSequencer ─► Layer[3] { Deck A, Deck B }
//!                                      │
//!                                      ▼
//!                       CrossfaderSystem ─► LayerRenderer (per-deck transforms)
//!                       Engine::composite ─► FeedbackSystem ─► FeedbackRenderer
//! ```

pub mod bus;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod modulation;
pub mod params;
pub mod types;
pub mod workspace;

pub use bus::{Signal, SignalBus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::Engine;
pub use error::CoreError;
pub use types::*;
