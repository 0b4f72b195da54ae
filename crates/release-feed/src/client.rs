//! HTTP client for the release feed.

use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::types::{ReleaseEntry, RemoteRelease, server_asset_name};

const GITHUB_API_URL: &str = "https://api.github.com";

const USER_AGENT_VALUE: &str = concat!(
    "lorecast-desktop/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/lorecast-app/lorecast-desktop)"
);

/// Ceiling on any single feed request.
const FEED_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors reaching the release feed.
///
/// All variants are recoverable from the caller's point of view: an
/// installed server keeps working when a check fails.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The feed did not answer within the client timeout.
    #[error("release feed timed out")]
    TimedOut,

    /// The feed answered with a non-success status.
    #[error("release feed returned HTTP {status}")]
    Status { status: u16 },

    /// Network or decode failure reaching the feed.
    #[error("release feed unreachable: {0}")]
    Transport(#[source] reqwest::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::TimedOut
        } else {
            Self::Transport(e)
        }
    }
}

/// Client for the project's public release index.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: reqwest::Client,
    base_url: String,
    owner: String,
    repo: String,
}

impl FeedClient {
    /// Creates a feed client for the given repository.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_base_url(owner, repo, GITHUB_API_URL)
    }

    /// Creates a feed client against a non-default API root.
    pub fn with_base_url(
        owner: impl Into<String>,
        repo: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(FEED_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            owner: owner.into(),
            repo: repo.into(),
        })
    }

    /// Fetches the most recent published release with a binary for this
    /// platform.
    ///
    /// "Most recent" is the feed's own ordering: the first entry of its
    /// reverse-chronological listing. Returns `Ok(None)` when the listing
    /// is empty or the newest release has no asset matching the platform
    /// binary name exactly. Network, API, and timeout failures surface as
    /// [`FetchError`]; the caller falls back to whatever is installed.
    pub async fn fetch_latest(&self) -> Result<Option<RemoteRelease>, FetchError> {
        let url = format!(
            "{}/repos/{}/{}/releases?per_page=1",
            self.base_url, self.owner, self.repo
        );
        debug!(%url, "querying release feed");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!(%status, "release feed rejected the request");
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let listing: Vec<ReleaseEntry> = response.json().await?;
        let Some(entry) = listing.into_iter().next() else {
            debug!("release feed listing is empty");
            return Ok(None);
        };

        let asset_name = server_asset_name();
        let tag = entry.tag_name.clone();
        match entry.resolve(&asset_name) {
            Some(release) => {
                debug!(tag = %release.tag, "latest release has a platform binary");
                Ok(Some(release))
            }
            None => {
                debug!(%tag, %asset_name, "latest release has no asset for this platform");
                Ok(None)
            }
        }
    }
}
