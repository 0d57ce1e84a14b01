//! Runtime configuration.

use crate::element::ElementStyle;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("could not determine config directory")]
    NoConfigDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hit-test padding in canvas units
    pub hit_tolerance: f64,
    /// Corner handle pick radius in screen pixels
    pub handle_tolerance: f64,
    /// Shapes need |width| or |height| above this to be kept
    pub min_shape_extent: f64,
    /// Freehand paths need at least this many points to be kept
    pub min_freehand_points: usize,
    /// Undo steps kept per session
    pub max_undo_steps: usize,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Style given to new elements
    pub default_style: ElementStyle,
    pub default_font_size: f64,
    pub default_font_family: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hit_tolerance: 10.0,
            handle_tolerance: 8.0,
            min_shape_extent: 2.0,
            min_freehand_points: 3,
            max_undo_steps: 100,
            min_zoom: 0.1,
            max_zoom: 10.0,
            default_style: ElementStyle::default(),
            default_font_size: 20.0,
            default_font_family: "Inter".to_string(),
        }
    }
}

impl Config {
    /// Get the config file path (~/.config/slatecanvas/config.json)
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("slatecanvas").join("config.json"))
    }

    /// Load from the default location, or defaults if there is no file.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load and validate a config file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |value: f64| value.is_finite() && value > 0.0;
        if !positive(self.hit_tolerance) || !positive(self.handle_tolerance) {
            return Err(ConfigError::Invalid("tolerances must be positive".into()));
        }
        if !(self.min_shape_extent.is_finite() && self.min_shape_extent >= 0.0) {
            return Err(ConfigError::Invalid("min_shape_extent must be non-negative".into()));
        }
        if self.min_freehand_points < 2 {
            return Err(ConfigError::Invalid("min_freehand_points must be at least 2".into()));
        }
        if !positive(self.min_zoom) || !positive(self.max_zoom) || self.min_zoom >= self.max_zoom {
            return Err(ConfigError::Invalid(format!(
                "zoom bounds {}..{} are not a positive range",
                self.min_zoom, self.max_zoom
            )));
        }
        if !positive(self.default_font_size) || self.default_font_family.trim().is_empty() {
            return Err(ConfigError::Invalid("default font must have a size and family".into()));
        }
        let style = &self.default_style;
        if !positive(style.stroke_width) || !(0.0..=1.0).contains(&style.opacity) {
            return Err(ConfigError::Invalid("default style is not a valid element style".into()));
        }
        Ok(())
    }
}
