//! Installed profile version.
//!
//! `.profile_version` next to the profile is the primary record. The ledger's
//! version record is read when the marker is missing or unreadable.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Ledger, StateError};
use crate::paths::ProfileLayout;

/// Contents of `.profile_version`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct VersionMarker {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub version: String,
}

/// Reads the version marker; `Ok(None)` if there is none.
pub fn read_marker(path: &Path) -> Result<Option<VersionMarker>, StateError> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StateError::io(path, e)),
    };

    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|source| StateError::InvalidMarker {
            path: path.to_path_buf(),
            source,
        })
}

pub fn write_marker(path: &Path, marker: &VersionMarker) -> Result<(), StateError> {
    let data = serde_json::to_vec(marker).map_err(|source| StateError::InvalidMarker {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, data).map_err(|e| StateError::io(path, e))
}

/// Version of the installed profile, or an empty string when unknown.
///
/// A broken marker falls back to the ledger. Only a ledger that cannot be
/// read or parsed during that fallback is an error.
pub fn installed_version(layout: &ProfileLayout) -> Result<String, StateError> {
    match read_marker(&layout.version_file) {
        Ok(Some(marker)) => return Ok(marker.version),
        Ok(None) => debug!("No version marker at {}", layout.version_file.display()),
        Err(e) => warn!("Ignoring version marker: {}", e),
    }

    let ledger = Ledger::load(&layout.ledger_file)?;
    Ok(ledger.profile_version().unwrap_or_default().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_marker_round_trip_format() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(".profile_version");
        write_marker(
            &path,
            &VersionMarker {
                url: "https://cdn.test/repo.r2z".into(),
                version: "1.0.0".into(),
            },
        )?;

        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path)?)?;
        assert_eq!(raw["url"], "https://cdn.test/repo.r2z");
        assert_eq!(raw["version"], "1.0.0");
        Ok(())
    }

    #[test]
    fn test_installed_version_prefers_marker() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let layout = ProfileLayout::new(dir.path().to_path_buf());

        let mut ledger = Ledger::default();
        ledger.set_profile_version("Game", "0.9.0", 0);
        ledger.save(&layout.ledger_file)?;
        assert_eq!(installed_version(&layout)?, "0.9.0");

        write_marker(
            &layout.version_file,
            &VersionMarker {
                url: String::new(),
                version: "1.0.0".into(),
            },
        )?;
        assert_eq!(installed_version(&layout)?, "1.0.0");
        Ok(())
    }

    #[test]
    fn test_corrupt_marker_falls_back_to_ledger() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let layout = ProfileLayout::new(dir.path().to_path_buf());
        fs::write(&layout.version_file, "not json")?;

        assert_eq!(installed_version(&layout)?, "");

        let mut ledger = Ledger::default();
        ledger.set_profile_version("Game", "2.1.0", 0);
        ledger.save(&layout.ledger_file)?;
        assert_eq!(installed_version(&layout)?, "2.1.0");
        Ok(())
    }

    #[test]
    fn test_unreadable_ledger_is_error() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let layout = ProfileLayout::new(dir.path().to_path_buf());
        fs::write(&layout.ledger_file, "- name: [broken")?;

        assert!(installed_version(&layout).is_err());
        Ok(())
    }
}
