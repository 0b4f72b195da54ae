//! Wire types for the release feed and platform asset selection.

use serde::Deserialize;

const SERVER_ASSET_PREFIX: &str = "lorecast-server";

/// Latest release resolved for this platform.
///
/// Only produced when the release carries an asset whose filename matches
/// this platform exactly, so `download_url` always points at a usable
/// server binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRelease {
    /// Release tag (e.g. `v2.3.0`).
    pub tag: String,
    /// Direct download URL of the platform server binary.
    pub download_url: String,
    /// Human-facing release page URL.
    pub html_url: String,
    /// `sha256:<hex>` digest of the binary asset, when published.
    pub digest: Option<String>,
}

impl RemoteRelease {
    /// SHA256 hex digest with the `sha256:` prefix stripped, if published.
    pub fn sha256(&self) -> Option<&str> {
        self.digest
            .as_deref()
            .and_then(|d| d.strip_prefix("sha256:"))
    }
}

/// Raw release entry from the feed listing.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ReleaseEntry {
    pub tag_name: String,
    pub html_url: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// Raw asset entry on a release.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub digest: Option<String>,
}

impl ReleaseEntry {
    /// Resolves this entry against the platform asset name.
    ///
    /// `None` when no asset filename matches exactly; the release is then
    /// treated as not published for this platform.
    pub(crate) fn resolve(self, asset_name: &str) -> Option<RemoteRelease> {
        let asset = self.assets.into_iter().find(|a| a.name == asset_name)?;
        Some(RemoteRelease {
            tag: self.tag_name,
            download_url: asset.browser_download_url,
            html_url: self.html_url,
            digest: asset.digest,
        })
    }
}

/// Platform tag used for asset selection and the server `--source` flag.
pub fn platform_tag() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "macos"
    } else {
        "linux"
    }
}

/// Exact asset filename of the server binary for this platform.
pub fn server_asset_name() -> String {
    asset_name_for(platform_tag())
}

fn asset_name_for(tag: &str) -> String {
    match tag {
        "windows" => format!("{SERVER_ASSET_PREFIX}-windows.exe"),
        other => format!("{SERVER_ASSET_PREFIX}-{other}"),
    }
}
