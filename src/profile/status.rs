//! Install and update status of a game's profile.

use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{installed_version, StateError};
use crate::games::GameDescriptor;
use crate::paths::ProfileLayout;

/// Derived state of one game's profile. Recomputed on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileStatus {
    pub installed: bool,
    pub up_to_date: bool,
    pub has_update: bool,
    /// Set when presence could not be determined
    pub install_error: Option<String>,
    /// Set when the version check failed; the profile then counts as current
    pub version_error: Option<String>,
}

/// The profile directory exists and holds either a ledger or `BepInEx/`.
pub fn is_installed(layout: &ProfileLayout) -> Result<bool, StateError> {
    match fs::metadata(&layout.root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Ok(false),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(StateError::io(&layout.root, e)),
    }

    for marker in [&layout.ledger_file, &layout.bepinex_dir] {
        if marker
            .try_exists()
            .map_err(|e| StateError::io(marker.as_path(), e))?
        {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Compares the installed version with the one the manifest declares.
///
/// Without a source URL or declared version there is nothing to compare and
/// the profile is current. An unknown installed version is never current.
pub fn check_up_to_date(game: &GameDescriptor, layout: &ProfileLayout) -> Result<bool, StateError> {
    if game.url.is_empty() || game.version.is_empty() {
        return Ok(true);
    }

    let installed = installed_version(layout)?;
    if installed.is_empty() {
        return Ok(false);
    }

    let current = installed == game.version;
    if !current {
        info!(
            "Profile update available for {}: {} -> {}",
            game.name, installed, game.version
        );
    }
    Ok(current)
}

/// [`check_up_to_date`], treating a failed check as up to date.
pub fn is_up_to_date(game: &GameDescriptor, layout: &ProfileLayout) -> bool {
    check_up_to_date(game, layout).unwrap_or_else(|e| {
        warn!("Could not check profile version for {}: {}", game.name, e);
        true
    })
}

/// Status of the game's declared profile under `target_dir`.
pub fn profile_status(target_dir: &Path, game: &GameDescriptor) -> ProfileStatus {
    let layout = ProfileLayout::for_game(target_dir, game);
    let mut status = ProfileStatus::default();

    match is_installed(&layout) {
        Ok(installed) => status.installed = installed,
        Err(e) => {
            warn!("Could not check install state of {}: {}", game.name, e);
            status.install_error = Some(format!("{:#}", anyhow::Error::from(e)));
        }
    }

    if !status.installed {
        return status;
    }

    match check_up_to_date(game, &layout) {
        Ok(up_to_date) => {
            status.up_to_date = up_to_date;
            status.has_update = !up_to_date;
        }
        Err(e) => {
            warn!("Could not check profile version for {}: {}", game.name, e);
            status.version_error = Some(format!("{:#}", anyhow::Error::from(e)));
            status.up_to_date = true;
        }
    }

    debug!("Status of {}: {:?}", game.name, status);
    status
}
