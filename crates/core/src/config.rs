//! Application configuration loaded from `trigon.toml`.
//!
//! Every section is optional; missing keys fall back to the defaults below.
//!
//! ```toml
//! [window]
//! width = 800
//! height = 600
//! title = "Vulkan App"
//!
//! [shaders]
//! vertex = "shaders/vert.spv"
//! fragment = "shaders/frag.spv"
//!
//! [debug]
//! validation = true
//! frame_limit = 60
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "trigon.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub shaders: ShaderConfig,
    pub debug: DebugConfig,
}

/// Window settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "Vulkan App".to_string(),
        }
    }
}

/// Locations of the pre-built SPIR-V blobs, relative to the working directory.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from("shaders/vert.spv"),
            fragment: PathBuf::from("shaders/frag.spv"),
        }
    }
}

/// Debug settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Overrides the build-time validation toggle when set.
    pub validation: Option<bool>,
    /// Stop after this many presented frames.
    pub frame_limit: Option<u64>,
}

impl AppConfig {
    /// Load `trigon.toml` from the working directory, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from a specific path.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Whether the validation layer should be requested.
    ///
    /// Debug builds enable it and release builds disable it, unless the
    /// `[debug] validation` key says otherwise.
    pub fn validation_enabled(&self) -> bool {
        self.debug.validation.unwrap_or(cfg!(debug_assertions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.window.title, "Vulkan App");
        assert_eq!(config.shaders.vertex, PathBuf::from("shaders/vert.spv"));
        assert_eq!(config.shaders.fragment, PathBuf::from("shaders/frag.spv"));
        assert_eq!(config.debug.frame_limit, None);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml(
            r#"
            [window]
            title = "Triangle"

            [debug]
            frame_limit = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.window.title, "Triangle");
        assert_eq!(config.window.width, 800);
        assert_eq!(config.debug.frame_limit, Some(60));
        assert_eq!(config.shaders, ShaderConfig::default());
    }

    #[test]
    fn test_validation_override() {
        let mut config = AppConfig::default();
        assert_eq!(config.validation_enabled(), cfg!(debug_assertions));

        config.debug.validation = Some(false);
        assert!(!config.validation_enabled());

        config.debug.validation = Some(true);
        assert!(config.validation_enabled());
    }

    #[test]
    fn test_malformed_document() {
        let result = AppConfig::from_toml("[window]\nwidth = \"wide\"");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load_from_path("does/not/exist/trigon.toml").unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
