//! Profile installation and state tracking.
//!
//! This module handles:
//! - Downloading a game's profile archive and detecting its format
//! - Installing every mod an exported profile lists from Thunderstore
//! - Writing the installed-mod ledger and the version marker
//! - Deriving install/update status from what is on disk

mod export;
mod extract;
mod installer;
mod ledger;
mod mods;
mod status;
mod version;

pub use export::{ExportManifest, ExportedMod, VersionTriple, EXPORT_MANIFEST_NAME};
pub use extract::{extract_entry, extract_package, extract_verbatim, has_member, PackageExtraction};
pub use installer::{delete_profile, ArchiveFormat, InstallReport, ProfileInstaller};
pub use ledger::{Ledger, LedgerEntry, LedgerRecord, ProfileVersionRecord, PROFILE_VERSION_RECORD};
pub use mods::{
    essential_files, install_mods, ModInstallError, ModInstallReport, ModOutcome, ModResult,
};
pub use status::{check_up_to_date, is_installed, is_up_to_date, profile_status, ProfileStatus};
pub use version::{installed_version, read_marker, write_marker, VersionMarker};

use std::path::PathBuf;

use thiserror::Error;

/// Configuration and format errors of the profile orchestrator.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("no profile download URL configured for {0}")]
    MissingSource(String),

    #[error("no Thunderstore community configured for {0}")]
    MissingCommunity(String),

    #[error("{} not found in profile archive", EXPORT_MANIFEST_NAME)]
    MissingExportManifest,

    #[error("failed to parse {}", EXPORT_MANIFEST_NAME)]
    InvalidExportManifest(#[source] serde_yaml::Error),
}

/// Failures reading or writing the version marker and the ledger.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to access {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid version marker {}", path.display())]
    InvalidMarker {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid mod ledger {}", path.display())]
    InvalidLedger {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl StateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StateError::Io {
            path: path.into(),
            source,
        }
    }
}
