//! Launch contract for the server binary.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

/// Arguments the server binary is started with.
///
/// The server is invoked as
/// `lorecast-server -p <port> --config <dir> --metadata <dir> --source <tag>`
/// with working directory and environment inherited from the shell.
#[derive(Debug, Clone)]
pub struct LaunchArgs {
    /// HTTP port the server listens on.
    pub port: u16,
    /// Server configuration directory.
    pub config_dir: PathBuf,
    /// Server metadata directory.
    pub metadata_dir: PathBuf,
    /// Platform tag reported to the server (`windows`, `linux`, `macos`).
    pub source: String,
}

impl LaunchArgs {
    /// Builds the spawn command for the server binary at `binary`.
    ///
    /// Output streams are piped so the supervisor can relay them; stdin is
    /// closed. `kill_on_drop` backstops child cleanup if the shell aborts.
    pub(crate) fn command(&self, binary: &Path) -> Command {
        let mut cmd = Command::new(binary);
        cmd.arg("-p")
            .arg(self.port.to_string())
            .arg("--config")
            .arg(&self.config_dir)
            .arg("--metadata")
            .arg(&self.metadata_dir)
            .arg("--source")
            .arg(&self.source)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}
