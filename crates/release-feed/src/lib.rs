//! Release feed client for the Lorecast desktop shell.
//!
//! Queries the project's public release index for the most recent
//! published server version and the download location of the binary
//! built for this platform.

mod client;
mod types;

pub use client::{FeedClient, FetchError};
pub use types::{RemoteRelease, platform_tag, server_asset_name};
