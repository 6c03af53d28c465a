//! Export manifest (`export.r2x`) parsing.
//!
//! A profile archive exported by the mod manager carries a YAML document
//! naming the profile and every mod it had installed:
//!
//! ```yaml
//! profileName: Wesley
//! mods:
//!   - name: BepInEx-BepInExPack
//!     version: { major: 5, minor: 4, patch: 2100 }
//!     enabled: true
//! ```

use std::fmt;
use std::io::Read;

use serde::{Deserialize, Serialize};

use super::ProfileError;

/// Archive member holding the export manifest.
pub const EXPORT_MANIFEST_NAME: &str = "export.r2x";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportManifest {
    #[serde(default)]
    pub profile_name: String,

    #[serde(default)]
    pub mods: Vec<ExportedMod>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExportedMod {
    /// `<namespace>-<name>`
    pub name: String,

    #[serde(default)]
    pub version: VersionTriple,

    #[serde(default)]
    pub enabled: bool,
}

/// `major.minor.patch` as the mod manager stores it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct VersionTriple {
    #[serde(default)]
    pub major: u64,
    #[serde(default)]
    pub minor: u64,
    #[serde(default)]
    pub patch: u64,
}

impl VersionTriple {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for VersionTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl ExportedMod {
    /// Identity used for de-duplication: `name-major.minor.patch`.
    pub fn key(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

impl ExportManifest {
    pub fn from_reader(reader: impl Read) -> Result<Self, ProfileError> {
        serde_yaml::from_reader(reader).map_err(ProfileError::InvalidExportManifest)
    }

    pub fn enabled_mods(&self) -> impl Iterator<Item = &ExportedMod> {
        self.mods.iter().filter(|m| m.enabled)
    }
}
