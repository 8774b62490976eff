//! Configuration files
//!
//! - Generic load/save for YAML and JSON documents
//! - Standard paths under `~/.config/strata`
//! - [`EngineConfig`] tuning
//!
//! ```ignore
//! use strata_core::config::{default_config_path, load_config, EngineConfig};
//!
//! let config: EngineConfig = load_config(&default_config_path("engine.yaml"));
//! ```

mod engine_config;
mod io;
mod paths;

pub use engine_config::EngineConfig;
pub use io::{load_config, read_document, save_config};
pub use paths::{default_config_dir, default_config_path, workspace_path};
