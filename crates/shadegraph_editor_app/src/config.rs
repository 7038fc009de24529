// SPDX-License-Identifier: MIT OR Apache-2.0
//! Application configuration (`shadegraph.ron`).

use serde::{Deserialize, Serialize};
use shadegraph_editor_graph::EditorSettings;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default configuration file name
pub const CONFIG_FILE: &str = "shadegraph.ron";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed configuration
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// A value is out of range
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Material file edited by default
    pub material_path: PathBuf,
    /// Quiet period before autosave (milliseconds)
    pub autosave_delay_ms: u64,
    /// Undo history depth
    pub history_depth: usize,
    /// Offset of pasted nodes
    pub paste_offset: [f32; 2],
    /// Socket hit radius in screen pixels
    pub socket_hit_radius: f32,
    /// Reload the material when it changes on disk
    pub watch_material: bool,
    /// Default log filter (overridden by `RUST_LOG`)
    pub log_filter: String,
    /// Initial window size
    pub window_size: [u32; 2],
}

impl Default for AppConfig {
    fn default() -> Self {
        let settings = EditorSettings::default();
        Self {
            material_path: PathBuf::from("material.json"),
            autosave_delay_ms: settings.autosave_delay.as_millis() as u64,
            history_depth: settings.history_depth,
            paste_offset: [settings.paste_offset.x, settings.paste_offset.y],
            socket_hit_radius: settings.socket_hit_radius,
            watch_material: true,
            log_filter: "shadegraph_editor_app=info,shadegraph_editor_graph=info,wgpu=warn,naga=warn".to_string(),
            window_size: [1280, 800],
        }
    }
}

impl AppConfig {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        let config: AppConfig = ron::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty RON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let config = ron::ser::PrettyConfig::default()
            .depth_limit(3)
            .separate_tuple_members(true);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.history_depth == 0 {
            return Err(ConfigError::Invalid("history_depth must be at least 1".to_string()));
        }
        if !(self.socket_hit_radius.is_finite() && self.socket_hit_radius > 0.0) {
            return Err(ConfigError::Invalid("socket_hit_radius must be positive".to_string()));
        }
        Ok(())
    }

    /// Editor settings derived from this configuration
    pub fn editor_settings(&self) -> EditorSettings {
        EditorSettings {
            autosave_delay: Duration::from_millis(self.autosave_delay_ms),
            history_depth: self.history_depth,
            paste_offset: egui::Vec2::new(self.paste_offset[0], self.paste_offset[1]),
            socket_hit_radius: self.socket_hit_radius,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("shadegraph_config_{}_{name}", std::process::id()))
    }

    #[test]
    fn test_defaults_match_editor_settings() {
        let config = AppConfig::default();
        assert_eq!(config.editor_settings(), EditorSettings::default());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let path = temp_path("roundtrip.ron");
        let config = AppConfig {
            material_path: PathBuf::from("materials/rust.json"),
            autosave_delay_ms: 250,
            watch_material: false,
            ..AppConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_default() {
        let loaded = AppConfig::load(&temp_path("missing.ron")).unwrap();
        assert_eq!(loaded, AppConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = temp_path("partial.ron");
        std::fs::write(&path, "(history_depth: 10)").unwrap();
        let loaded = AppConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.history_depth, 10);
        assert_eq!(loaded.autosave_delay_ms, 1000);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let path = temp_path("invalid.ron");
        std::fs::write(&path, "(history_depth: 0)").unwrap();
        let result = AppConfig::load(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
