//! Serde file helpers shared by engine config, MIDI maps and workspaces
//!
//! The format is picked from the extension: `.json` is JSON, anything else
//! is YAML.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Json,
}

impl Format {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Yaml,
        }
    }
}

/// Read and parse a file, propagating every failure
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    let parsed = match Format::of(path) {
        Format::Json => serde_json::from_str(&contents)
            .with_context(|| format!("Invalid JSON in {:?}", path))?,
        Format::Yaml => serde_yaml::from_str(&contents)
            .with_context(|| format!("Invalid YAML in {:?}", path))?,
    };
    Ok(parsed)
}

/// Load a config file, falling back to `T::default()`
///
/// A missing file is normal on first run; a broken one is logged and ignored.
///
/// ```ignore
/// let config: EngineConfig = load_config(&default_config_path("engine.yaml"));
/// ```
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("Config: {:?} not found, using defaults", path);
        return T::default();
    }

    match read_document(path) {
        Ok(config) => {
            log::info!("Config: loaded {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("Config: {:#}, using defaults", e);
            T::default()
        }
    }
}

/// Serialize `value` to `path`, creating parent directories
pub fn save_config<T>(value: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let text = match Format::of(path) {
        Format::Json => serde_json::to_string_pretty(value).context("Failed to serialize JSON")?,
        Format::Yaml => serde_yaml::to_string(value).context("Failed to serialize YAML")?,
    };
    std::fs::write(path, text).with_context(|| format!("Failed to write {:?}", path))?;

    log::debug!("Config: saved {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Knobs {
        gain: f32,
        name: String,
    }

    #[test]
    fn test_missing_file_gives_default() {
        let knobs: Knobs = load_config(Path::new("/nonexistent/strata/knobs.yaml"));
        assert_eq!(knobs, Knobs::default());
    }

    #[test]
    fn test_yaml_and_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let knobs = Knobs {
            gain: 0.5,
            name: "main".into(),
        };

        for file in ["nested/knobs.yaml", "knobs.json"] {
            let path = dir.path().join(file);
            save_config(&knobs, &path).unwrap();
            let loaded: Knobs = load_config(&path);
            assert_eq!(loaded, knobs);
        }

        let json = std::fs::read_to_string(dir.path().join("knobs.json")).unwrap();
        assert!(json.trim_start().starts_with('{'));
    }

    #[test]
    fn test_broken_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "gain: [not a number").unwrap();
        let knobs: Knobs = load_config(&path);
        assert_eq!(knobs, Knobs::default());
        assert!(read_document::<Knobs>(&path).is_err());
    }
}
