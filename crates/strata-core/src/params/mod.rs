//! Parameter table
//!
//! A closed, typed set of parameter ids with their ranges and defaults.
//! Modulation, MIDI mapping and workspace hydration all key on [`ParamId`]
//! instead of free-form strings; unknown strings are rejected at the edge
//! by [`ParamId::parse`].

mod id;
mod manifest;

pub use id::{EffectParam, FeedbackParam, LayerParam, ParamId};
pub use manifest::{all_param_ids, definition, ParamDef, ParamKind};
