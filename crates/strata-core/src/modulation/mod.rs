//! Modulation: signal sources and the patch matrix
//!
//! ```text
//!   AudioReactor ─┐
//!   LfoBank ──────┼──► SignalFrame ──► ModulationMatrix::resolve ──► layer.N.* offsets
//!   EventSignals ─┘                                              └─► feedback.*, effects
//! ```

mod events;
mod lfo;
mod matrix;

pub use events::{EventSignals, ANY_EVENT, DEFAULT_DECAY_RATE};
pub use lfo::{default_lfo_settings, LfoBank, LfoFrame, LfoId, LfoSettings, Waveform, NUM_LFOS};
pub use matrix::{
    patch_id, AudioBand, HydrateReport, ModulationDoc, ModulationMatrix, Patch, PatchDoc,
    SignalFrame, SignalSource,
};
