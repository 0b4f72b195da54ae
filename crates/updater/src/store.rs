//! Persistence for the installed server version.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Errors from version store writes.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk settings shape.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Settings {
    #[serde(default)]
    server_version: Option<String>,
}

/// Persistent slot for the installed server version.
///
/// The value is cached in memory and persisted to a JSON settings file.
/// A missing or unreadable file reads as "nothing installed", so a fresh
/// profile and a corrupt one both fall into the first-install flow.
pub struct VersionStore {
    path: PathBuf,
    settings: RwLock<Settings>,
}

impl VersionStore {
    /// Opens the store at `path`, loading any existing value.
    pub fn open(path: PathBuf) -> Self {
        let settings = load_settings(&path);
        Self {
            path,
            settings: RwLock::new(settings),
        }
    }

    /// The installed version, if any. Empty strings read as absent.
    pub fn installed_version(&self) -> Option<String> {
        self.settings
            .read()
            .unwrap()
            .server_version
            .clone()
            .filter(|v| !v.is_empty())
    }

    /// Records a freshly installed version.
    pub fn set_installed_version(&self, tag: &str) -> Result<(), StoreError> {
        {
            let mut settings = self.settings.write().unwrap();
            settings.server_version = Some(tag.to_string());
        }
        self.persist()
    }

    /// Writes the current settings to disk.
    fn persist(&self) -> Result<(), StoreError> {
        let settings = self.settings.read().unwrap();
        let json = serde_json::to_string_pretty(&*settings)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), "persisted settings");
        Ok(())
    }
}

/// Loads settings, defaulting when the file is missing or unreadable.
fn load_settings(path: &Path) -> Settings {
    if !path.exists() {
        return Settings::default();
    }
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read settings");
            return Settings::default();
        }
    };
    match serde_json::from_str(&data) {
        Ok(settings) => settings,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not parse settings");
            Settings::default()
        }
    }
}
