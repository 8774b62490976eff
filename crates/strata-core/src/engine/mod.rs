//! Frame engine - decks, crossfader, audio reaction, feedback, sequencer
//!
//! - Deck: per-deck scene config, glide interpolators and motion physics
//! - CrossfaderSystem: constant-power A/B blend, auto-fade, dock events, parallax
//! - AudioReactor: band-driven scale factors and beat pulses
//! - FeedbackSystem: ping-pong recursive echo behind a renderer trait
//! - PLockSequencer: parameter-lock ping-pong playback
//! - Engine: owns all of the above and runs one frame per tick

mod audio_reactor;
mod crossfader;
mod deck;
mod engine;
mod feedback;
mod interpolator;
mod render;
mod sequencer;

pub use audio_reactor::*;
pub use crossfader::*;
pub use deck::*;
pub use engine::*;
pub use feedback::*;
pub use interpolator::*;
pub use render::*;
pub use sequencer::*;
