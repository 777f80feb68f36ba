//! Engine configuration
//!
//! Type-safe configuration for the window and renderer, loadable from TOML
//! with sensible defaults for every field.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Window creation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial window width in pixels
    pub width: u32,
    /// Initial window height in pixels
    pub height: u32,
    /// Whether the window may be resized by the user
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Kestrel Engine".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
        }
    }
}

/// Renderer behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Prefer FIFO (vsync) presentation over MAILBOX
    pub vsync: bool,
    /// Enable Vulkan validation layers (debug builds only)
    pub enable_validation: bool,
    /// Directory searched for SPIR-V shader binaries
    pub shader_dir: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            vsync: true,
            enable_validation: cfg!(debug_assertions),
            shader_dir: "shaders".to_string(),
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window settings
    pub window: WindowConfig,
    /// Renderer settings
    pub renderer: RendererConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Resolve a shader file name against the configured shader directory
    pub fn shader_path(&self, file_name: &str) -> std::path::PathBuf {
        Path::new(&self.renderer.shader_dir).join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = EngineConfig::default();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert!(config.renderer.vsync);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [window]
            title = "Test"
            width = 300
            height = 300
            "#,
        )
        .unwrap();
        assert_eq!(config.window.title, "Test");
        assert_eq!(config.window.width, 300);
        // Unspecified sections fall back to defaults
        assert!(config.renderer.vsync);
        assert_eq!(config.renderer.shader_dir, "shaders");
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let result: Result<EngineConfig, _> = toml::from_str("window = 3");
        assert!(result.is_err());
    }

    #[test]
    fn shader_path_joins_dir() {
        let config = EngineConfig::default();
        assert_eq!(
            config.shader_path("default_vert.spv"),
            std::path::PathBuf::from("shaders/default_vert.spv")
        );
    }
}
