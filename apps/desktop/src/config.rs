//! Desktop shell configuration and server data layout.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/lorecast/desktop.toml`
//! - Windows: `%APPDATA%/lorecast/desktop.toml`
//! - macOS: `~/Library/Application Support/lorecast/desktop.toml`

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Desktop shell configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Override for the server data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Number of server log lines kept in memory.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,

    /// Install server updates without asking.
    #[serde(default = "default_true")]
    pub auto_install: bool,
}

fn default_log_capacity() -> usize {
    2000
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            log_capacity: default_log_capacity(),
            auto_install: default_true(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Saves the current configuration to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        let path = config_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        // Restrict permissions on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Resolves the server data layout, honoring the `data_dir` override.
    pub fn data_layout(&self) -> DataLayout {
        let root = self
            .data_dir
            .clone()
            .unwrap_or_else(|| data_root().join("lorecast"));
        DataLayout { root }
    }
}

/// Layout of the server data directory.
///
/// Everything the managed server owns lives under one root: the binary
/// itself, its config and metadata directories, and the settings file
/// holding the installed version.
#[derive(Debug, Clone)]
pub struct DataLayout {
    pub root: PathBuf,
}

impl DataLayout {
    /// Path of the installed server binary.
    pub fn server_binary(&self) -> PathBuf {
        self.root.join(lorecast_installer::server_binary_name())
    }

    /// Directory passed to the server as `--config`.
    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    /// Directory passed to the server as `--metadata`.
    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join("metadata")
    }

    /// Settings file with the installed server version.
    pub fn settings_path(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    /// Creates the directories the server expects at launch.
    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.config_dir())?;
        std::fs::create_dir_all(self.metadata_dir())?;
        Ok(())
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("lorecast")
            .join("desktop.toml")
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("lorecast").join("desktop.toml")
    }

    #[cfg(target_os = "macos")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join("Library")
            .join("Application Support")
            .join("lorecast")
            .join("desktop.toml")
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        PathBuf::from("/tmp/lorecast/desktop.toml")
    }
}

/// Returns the platform-specific application data root.
fn data_root() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
                PathBuf::from(home).join(".local").join("share")
            })
    }

    #[cfg(target_os = "windows")]
    {
        let local = std::env::var("LOCALAPPDATA")
            .unwrap_or_else(|_| "C:\\Users\\Default\\AppData\\Local".into());
        PathBuf::from(local)
    }

    #[cfg(target_os = "macos")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join("Library").join("Application Support")
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        PathBuf::from("/tmp")
    }
}
