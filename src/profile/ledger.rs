//! The installed-mod ledger (`mods.yml`).
//!
//! The mod manager owns this file; it lists every mod in the profile. The
//! profile's source version rides along as one extra, disabled record named
//! [`PROFILE_VERSION_RECORD`]. In memory that record is its own variant and
//! the reserved name only appears when reading or writing YAML.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ExportManifest, StateError, VersionTriple};
use crate::registry::split_full_name;

/// Reserved record name carrying the profile version.
pub const PROFILE_VERSION_RECORD: &str = "_ProfileVersion";

const INSTALLER_NAME: &str = "modprofiles";
const MARKER_DESCRIPTION_PREFIX: &str = "Profile version marker for ";

/// One record as the mod manager writes it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerEntry {
    pub manifest_version: u32,
    pub name: String,
    pub author_name: String,
    pub website_url: String,
    pub display_name: String,
    pub description: String,
    pub game_version: String,
    pub network_mode: String,
    pub package_type: String,
    pub install_mode: String,
    /// Unix milliseconds
    pub installed_at_time: i64,
    pub loaders: Vec<String>,
    pub dependencies: Vec<String>,
    pub incompatibilities: Vec<String>,
    pub optional_dependencies: Vec<String>,
    pub version_number: VersionTriple,
    pub enabled: bool,
    pub icon: String,

    /// Fields this crate does not model, kept as-is on rewrite
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// The profile version carried inside the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileVersionRecord {
    pub version: String,
    pub game_name: String,
    pub installed_at_time: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerRecord {
    Mod(LedgerEntry),
    ProfileVersion(ProfileVersionRecord),
}

impl LedgerRecord {
    fn from_entry(entry: LedgerEntry) -> Self {
        if entry.name != PROFILE_VERSION_RECORD {
            return LedgerRecord::Mod(entry);
        }
        LedgerRecord::ProfileVersion(ProfileVersionRecord {
            version: entry.game_version,
            game_name: entry
                .description
                .strip_prefix(MARKER_DESCRIPTION_PREFIX)
                .unwrap_or_default()
                .to_string(),
            installed_at_time: entry.installed_at_time,
        })
    }

    fn to_entry(&self) -> LedgerEntry {
        match self {
            LedgerRecord::Mod(entry) => entry.clone(),
            LedgerRecord::ProfileVersion(record) => LedgerEntry {
                manifest_version: 1,
                name: PROFILE_VERSION_RECORD.to_string(),
                author_name: INSTALLER_NAME.to_string(),
                display_name: format!("Profile Version {}", record.version),
                description: format!("{}{}", MARKER_DESCRIPTION_PREFIX, record.game_name),
                game_version: record.version.clone(),
                network_mode: "none".to_string(),
                package_type: "other".to_string(),
                install_mode: "manual".to_string(),
                installed_at_time: record.installed_at_time,
                version_number: VersionTriple::new(1, 0, 0),
                enabled: false,
                ..Default::default()
            },
        }
    }
}

impl LedgerEntry {
    /// Record for a mod listed in an export manifest.
    fn for_export(
        name: &str,
        version: VersionTriple,
        enabled: bool,
        community: &str,
        now_ms: i64,
    ) -> Self {
        let (author_name, display_name, website_url) = match split_full_name(name) {
            Ok((namespace, package)) => (
                namespace.to_string(),
                package.to_string(),
                format!(
                    "https://thunderstore.io/c/{}/p/{}/{}/",
                    community, namespace, package
                ),
            ),
            Err(_) => (
                name.to_string(),
                name.to_string(),
                format!("https://thunderstore.io/c/{}/p/{}/", community, name),
            ),
        };

        Self {
            manifest_version: 1,
            name: name.to_string(),
            author_name,
            website_url,
            display_name,
            description: format!("Mod installed by {}", INSTALLER_NAME),
            game_version: "0".to_string(),
            network_mode: "both".to_string(),
            package_type: "other".to_string(),
            install_mode: "managed".to_string(),
            installed_at_time: now_ms,
            version_number: version,
            enabled,
            ..Default::default()
        }
    }
}

/// In-memory ledger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    records: Vec<LedgerRecord>,
}

impl Ledger {
    /// Builds the ledger for an exported profile.
    ///
    /// Disabled mods are kept (with `enabled: false`); a repeated
    /// `name-major.minor.patch` is listed once.
    pub fn from_export(manifest: &ExportManifest, community: &str, now_ms: i64) -> Self {
        let mut seen = HashSet::new();
        let records = manifest
            .mods
            .iter()
            .filter(|m| seen.insert(m.key()))
            .map(|m| {
                LedgerRecord::Mod(LedgerEntry::for_export(
                    &m.name, m.version, m.enabled, community, now_ms,
                ))
            })
            .collect();

        Self { records }
    }

    /// Reads `mods.yml`. A missing or empty file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(StateError::io(path, e)),
        };
        Self::parse(&data).map_err(|source| StateError::InvalidLedger {
            path: path.to_path_buf(),
            source,
        })
    }

    fn parse(data: &str) -> Result<Self, serde_yaml::Error> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let entries: Vec<LedgerEntry> = serde_yaml::from_str(data)?;
        Ok(Self {
            records: entries.into_iter().map(LedgerRecord::from_entry).collect(),
        })
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        let entries: Vec<LedgerEntry> = self.records.iter().map(LedgerRecord::to_entry).collect();
        serde_yaml::to_string(&entries)
    }

    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let yaml = self.to_yaml().map_err(|source| StateError::InvalidLedger {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, yaml).map_err(|e| StateError::io(path, e))?;
        debug!("Wrote {} ledger records to {}", self.records.len(), path.display());
        Ok(())
    }

    /// Replaces any profile version record with a fresh one, first in the list.
    pub fn set_profile_version(&mut self, game_name: &str, version: &str, now_ms: i64) {
        self.records
            .retain(|r| !matches!(r, LedgerRecord::ProfileVersion(_)));
        self.records.insert(
            0,
            LedgerRecord::ProfileVersion(ProfileVersionRecord {
                version: version.to_string(),
                game_name: game_name.to_string(),
                installed_at_time: now_ms,
            }),
        );
    }

    pub fn profile_version(&self) -> Option<&str> {
        self.records.iter().find_map(|r| match r {
            LedgerRecord::ProfileVersion(record) => Some(record.version.as_str()),
            LedgerRecord::Mod(_) => None,
        })
    }

    pub fn mods(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.records.iter().filter_map(|r| match r {
            LedgerRecord::Mod(entry) => Some(entry),
            LedgerRecord::ProfileVersion(_) => None,
        })
    }

    pub fn records(&self) -> &[LedgerRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
