// SPDX-License-Identifier: GPL-3.0-only

//! User configuration, stored as JSON

use crate::constants::{DEFAULT_BUFFER_COUNT, FilterLocation, FilterType};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Record render counts and durations per filter
    pub collect_performance_statistics: bool,
    /// Output buffers each renderer preallocates
    pub buffer_count_hint: usize,
    /// Filter active for still images
    pub photo_filter: FilterType,
    /// Filter active for the live stream
    pub video_filter: FilterType,
    /// Try to open a GPU device for compute filters
    pub use_gpu: bool,
    /// Parameter store file; the platform default when unset
    pub parameter_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collect_performance_statistics: true,
            buffer_count_hint: DEFAULT_BUFFER_COUNT,
            photo_filter: FilterType::PassThrough,
            video_filter: FilterType::PassThrough,
            use_gpu: true,
            parameter_file: None,
        }
    }
}

impl Config {
    /// `<config dir>/framefx/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("framefx").join("config.json"))
    }

    /// Load from the default location.
    ///
    /// A missing file gives the defaults. So does an unreadable one, with a
    /// warning, so a broken config never keeps the tool from starting.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            debug!("No config directory, using defaults");
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                Self::default()
            }
        }
    }

    /// Load from `path`; a missing file gives the defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }

    /// Write to `path`, or the default location when `None`
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path().ok_or(ConfigError::NoConfigDir)?,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "Saved config");
        Ok(path)
    }

    pub fn filter_for(&self, location: FilterLocation) -> FilterType {
        match location {
            FilterLocation::Photo => self.photo_filter,
            FilterLocation::Video => self.video_filter,
        }
    }
}
