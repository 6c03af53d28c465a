//! Game descriptors and the remote game manifest.
//!
//! The manifest is a JSON array of games that have a curated profile. It is
//! fetched on demand and compared by value to detect changes.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::http::HttpClient;

/// Manifest used when no other URL is configured.
pub const DEFAULT_MANIFEST_URL: &str =
    "https://gist.githubusercontent.com/ur-wesley/8e93a37dc70b7d8161e94fc62df061ee/raw/manifest.json";

/// Timeout for fetching the game manifest.
pub const MANIFEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Profile name used when a game does not declare one.
pub const DEFAULT_PROFILE_NAME: &str = "Default";

/// A moddable game with a curated profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDescriptor {
    #[serde(default)]
    pub name: String,

    /// Steam app id
    #[serde(default)]
    pub id: String,

    /// Header image URL
    #[serde(default)]
    pub icon: String,

    #[serde(default)]
    pub profile_name: String,

    /// Where the profile archive is downloaded from
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub launch_args: String,

    /// Thunderstore community, e.g. `repo` or `lethal-company`
    #[serde(default)]
    pub community: String,

    #[serde(default)]
    pub executable_names: Vec<String>,

    /// Version of the curated profile
    #[serde(default)]
    pub version: String,
}

impl GameDescriptor {
    /// The declared profile name, or `Default`.
    pub fn profile_name(&self) -> &str {
        if self.profile_name.is_empty() {
            DEFAULT_PROFILE_NAME
        } else {
            &self.profile_name
        }
    }

    pub fn has_source(&self) -> bool {
        !self.url.is_empty()
    }
}

/// Appends the cache-busting `t=<unix seconds>` parameter.
pub fn timestamped_url(manifest_url: &str, now: SystemTime) -> String {
    let separator = if manifest_url.contains('?') { '&' } else { '?' };
    let secs = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{}{}t={}", manifest_url, separator, secs)
}

/// Downloads and parses the game manifest.
pub fn fetch_games(http: &dyn HttpClient, manifest_url: &str) -> Result<Vec<GameDescriptor>> {
    let url = timestamped_url(manifest_url, SystemTime::now());
    info!("Fetching manifest from: {}", url);

    let response = http
        .get(&url, MANIFEST_TIMEOUT)
        .context("Failed to fetch manifest")?;

    if !response.is_ok() {
        bail!("Manifest request failed with HTTP {}", response.status);
    }

    let games: Vec<GameDescriptor> =
        serde_json::from_reader(response.body).context("Failed to parse manifest")?;

    debug!("Manifest lists {} games", games.len());
    Ok(games)
}

/// True if a re-fetched manifest differs from the previous one.
pub fn manifest_changed(old: &[GameDescriptor], new: &[GameDescriptor]) -> bool {
    old != new
}

/// Finds a game by name or Steam app id, case-insensitively.
pub fn find_game<'a>(games: &'a [GameDescriptor], query: &str) -> Option<&'a GameDescriptor> {
    games
        .iter()
        .find(|g| g.name.eq_ignore_ascii_case(query) || g.id.eq_ignore_ascii_case(query))
}
