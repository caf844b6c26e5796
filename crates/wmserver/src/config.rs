//! Runtime configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::display::DisplayInfo;
use crate::geometry::Rect;

/// Largest display offset or size accepted from config (pixels)
const MAX_DISPLAY_EXTENT: u32 = 1 << 16;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Window manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WmConfig {
    /// Allow one window to minimize another (e.g. a new fullscreen app
    /// minimizing the previous one). User-initiated minimizes always pass.
    pub minimize_by_other_window: bool,

    /// Layout tuning
    pub layout: LayoutConfig,

    /// Displays known at startup (used by the standalone binary)
    pub displays: Vec<DisplayConfig>,
}

impl Default for WmConfig {
    fn default() -> Self {
        Self {
            minimize_by_other_window: true,
            layout: LayoutConfig::default(),
            displays: vec![DisplayConfig::default()],
        }
    }
}

/// Layout tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Thickness of the split divider (pixels)
    pub divider_width: u32,

    /// Initial share of the primary side, in (0, 1)
    pub split_ratio: f32,

    /// Minimum size either split side keeps while dragging (pixels)
    pub split_min_size: u32,

    /// Offset between consecutive cascaded windows (pixels)
    pub cascade_step: i32,

    /// Maximum number of tiled windows
    pub max_tile_windows: usize,

    /// Focus a window when it is shown
    pub focus_follows_show: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            divider_width: 16,
            split_ratio: 0.5,
            split_min_size: 200,
            cascade_step: 48,
            max_tile_windows: 3,
            focus_follows_show: true,
        }
    }
}

/// Static display description
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub id: u64,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { id: 0, x: 0, y: 0, width: 1280, height: 720 }
    }
}

impl DisplayConfig {
    pub fn info(&self) -> DisplayInfo {
        DisplayInfo {
            id: self.id,
            rect: Rect::new(self.x, self.y, self.width, self.height),
        }
    }
}

impl WmConfig {
    /// Load configuration from file, falling back to defaults
    pub fn load() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("wmserver/config.toml")),
            Some(std::path::PathBuf::from("/etc/wmserver/config.toml")),
        ];

        for path in config_paths.into_iter().flatten() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(content) => match Self::from_toml_str(&content) {
                        Ok(config) => {
                            tracing::info!(?path, displays = config.displays.len(), "loaded configuration");
                            return config;
                        }
                        Err(e) => {
                            tracing::warn!(?path, error = %e, "failed to load config");
                        }
                    },
                    Err(e) => {
                        tracing::warn!(?path, error = %e, "failed to read config");
                    }
                }
            }
        }

        tracing::info!("using default configuration");
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: WmConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let layout = &self.layout;
        if !(layout.split_ratio > 0.0 && layout.split_ratio < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "split_ratio must be in (0, 1), got {}",
                layout.split_ratio
            )));
        }
        if layout.divider_width == 0 {
            return Err(ConfigError::Invalid("divider_width must be positive".to_string()));
        }
        if layout.max_tile_windows == 0 {
            return Err(ConfigError::Invalid("max_tile_windows must be positive".to_string()));
        }
        for display in &self.displays {
            if display.width == 0 || display.height == 0 {
                return Err(ConfigError::Invalid(format!("display {} has an empty size", display.id)));
            }
            let extent = [display.x.unsigned_abs(), display.y.unsigned_abs(), display.width, display.height];
            if extent.iter().any(|v| *v > MAX_DISPLAY_EXTENT) {
                return Err(ConfigError::Invalid(format!(
                    "display {} exceeds {} pixels",
                    display.id, MAX_DISPLAY_EXTENT
                )));
            }
        }
        Ok(())
    }
}

/// Helper for getting XDG directories
mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
    }
}
