//! Server binary installation for the Lorecast desktop shell.
//!
//! Downloads a release asset to a temporary file next to the destination,
//! verifies its digest when the feed published one, and atomically
//! replaces the installed server executable. A failed install never
//! leaves a partially-written binary at the destination.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderValue, USER_AGENT};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use lorecast_release_feed::RemoteRelease;

const USER_AGENT_VALUE: &str = concat!(
    "lorecast-desktop/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/lorecast-app/lorecast-desktop)"
);

/// Ceiling on connection setup and on each read of the download stream.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Installed filename of the server binary.
pub fn server_binary_name() -> String {
    format!("lorecast-server{}", std::env::consts::EXE_SUFFIX)
}

/// Errors from [`BinaryInstaller::install`].
///
/// Every variant aborts the install with the destination untouched; the
/// previously installed binary (if any) keeps working.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// The download request failed in transit.
    #[error("download failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The download URL answered with a non-success status.
    #[error("download failed with HTTP {status}")]
    DownloadFailed { status: u16 },

    /// Writing or replacing the binary on disk failed.
    #[error("failed to write server binary: {0}")]
    WriteFailed(#[from] std::io::Error),

    /// The downloaded bytes do not match the published digest.
    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },
}

/// Downloads and installs server binaries.
#[derive(Debug, Clone)]
pub struct BinaryInstaller {
    client: reqwest::Client,
}

impl BinaryInstaller {
    /// Creates an installer with its own download client.
    pub fn new() -> Result<Self, InstallError> {
        let client = reqwest::Client::builder()
            .connect_timeout(DOWNLOAD_TIMEOUT)
            .read_timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(InstallError::Request)?;
        Ok(Self { client })
    }

    /// Downloads the release asset and atomically installs it at
    /// `destination`.
    ///
    /// The payload streams into a temporary file in the destination's
    /// directory; only after the full transfer (and digest check, when the
    /// release carries one) does a rename replace the destination. Works
    /// the same whether the destination exists (upgrade) or not (first
    /// install). Recording the new installed version is the caller's job.
    pub async fn install(
        &self,
        release: &RemoteRelease,
        destination: &Path,
    ) -> Result<(), InstallError> {
        info!(tag = %release.tag, dest = %destination.display(), "installing server binary");

        let dir = match destination.parent() {
            Some(parent) if parent != Path::new("") => {
                std::fs::create_dir_all(parent)?;
                parent
            }
            _ => Path::new("."),
        };

        let response = self
            .client
            .get(&release.download_url)
            .header(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE))
            .send()
            .await
            .map_err(InstallError::Request)?;
        let status = response.status();
        if !status.is_success() {
            debug!(%status, url = %release.download_url, "asset download rejected");
            return Err(InstallError::DownloadFailed {
                status: status.as_u16(),
            });
        }

        let mut temp = NamedTempFile::new_in(dir)?;
        let mut hasher = Sha256::new();
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(InstallError::Request)?;
            hasher.update(&chunk);
            temp.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        temp.flush()?;
        debug!(bytes = written, "download complete");

        if let Some(expected) = release.sha256() {
            let actual = hex::encode(hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(InstallError::DigestMismatch {
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        set_executable(temp.path())?;
        temp.persist(destination).map_err(|e| e.error)?;
        info!(tag = %release.tag, "server binary installed");
        Ok(())
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
