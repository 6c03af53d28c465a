//! Type definitions for the Thunderstore package listing.
//!
//! These map to the objects returned by `GET /c/{community}/api/v1/package/`.

use serde::{Deserialize, Serialize};

/// A package as listed by the registry.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Package {
    /// `<owner>-<name>`
    #[serde(default)]
    pub full_name: String,

    #[serde(default)]
    pub name: String,

    /// The namespace the package is published under.
    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub package_url: String,

    #[serde(default)]
    pub is_deprecated: bool,

    /// Known versions, newest first once [`Package::order_versions`] ran.
    #[serde(default)]
    pub versions: Vec<PackageVersion>,
}

/// One published version of a package.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PackageVersion {
    #[serde(default)]
    pub full_name: String,

    #[serde(default)]
    pub description: String,

    /// e.g. `5.4.2100`
    #[serde(default)]
    pub version_number: String,

    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub download_url: String,

    #[serde(default)]
    pub file_size: u64,
}

impl Package {
    /// Returns true if this listing entry is `<namespace>-<name>`.
    pub fn matches(&self, namespace: &str, name: &str) -> bool {
        self.owner == namespace && self.name == name
    }

    /// Sorts versions newest first by semantic version.
    ///
    /// Versions that do not parse keep their listing order, after every
    /// parsable version.
    pub fn order_versions(&mut self) {
        self.versions.sort_by(|a, b| {
            match (
                semver::Version::parse(&a.version_number),
                semver::Version::parse(&b.version_number),
            ) {
                (Ok(a), Ok(b)) => b.cmp(&a),
                (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                (Err(_), Err(_)) => std::cmp::Ordering::Equal,
            }
        });
    }

    /// The newest known version.
    pub fn latest(&self) -> Option<&PackageVersion> {
        self.versions.first()
    }

    /// Finds an exact version string.
    pub fn version(&self, version_number: &str) -> Option<&PackageVersion> {
        self.versions
            .iter()
            .find(|v| v.version_number == version_number)
    }
}
