//! Persisted user settings.
//!
//! Stored as pretty-printed JSON at `<config_dir>/stylestack/settings.json`:
//!
//! ```json
//! {
//!   "theme": "auto",
//!   "layer_dirs": ["/home/me/.config/stylestack/themes"],
//!   "stack": ["base-light@light", "base-dark@dark", "chat", "compact@compact"]
//! }
//! ```
//!
//! Every field is optional. A missing or unreadable file yields the
//! defaults, so a corrupt settings file never prevents startup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::context::ThemePreference;
use crate::engine::{LayerRef, ThemeStack};

/// Error returned when settings cannot be written.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to write settings to {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no configuration directory available on this platform")]
    NoConfigDir,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `light`, `dark` or `auto`.
    pub theme: ThemePreference,
    /// Extra directories searched for layer files.
    pub layer_dirs: Vec<PathBuf>,
    /// Overrides the default layer stack when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<LayerRef>>,
}

impl Settings {
    /// `<config_dir>/stylestack`, if the platform has a config directory.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("stylestack"))
    }

    /// Default settings file location.
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.json"))
    }

    /// Loads settings from the default location.
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(path),
            None => Self::default(),
        }
    }

    /// Loads settings from `path`, falling back to defaults when the file is
    /// missing or malformed.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Self::default();
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read settings");
                return Self::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(settings) => {
                debug!(path = %path.display(), "loaded settings");
                settings
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to parse settings, using defaults");
                Self::default()
            }
        }
    }

    /// Saves settings to the default location.
    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        let path = Self::default_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Saves settings to `path`, creating parent directories as needed.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let io_err = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut contents = serde_json::to_string_pretty(self)?;
        contents.push('\n');
        fs::write(path, contents).map_err(io_err)?;

        debug!(path = %path.display(), "saved settings");
        Ok(())
    }

    /// The configured stack, or the default one.
    pub fn theme_stack(&self) -> ThemeStack {
        match &self.stack {
            Some(layers) => ThemeStack::new(layers.clone()),
            None => ThemeStack::default(),
        }
    }
}
