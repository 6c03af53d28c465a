//! Installs the mods an exported profile lists.
//!
//! Each enabled mod is resolved on Thunderstore, downloaded and extracted in
//! manifest order. One failing mod does not stop the batch; the outcome of
//! every mod is reported. Afterwards the files BepInEx needs to start are
//! checked, and a missing one fails the whole install.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{info, warn};
use zip::ZipArchive;

use super::extract::extract_package;
use super::{ExportManifest, ExportedMod};
use crate::paths::ProfileLayout;
use crate::registry::RegistryClient;

/// What happened to one mod of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModOutcome {
    Installed { version: String, files: usize },
    /// Same `name-version` already installed earlier in this run
    Duplicate,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModResult {
    /// `name-major.minor.patch`
    pub key: String,
    pub outcome: ModOutcome,
}

/// Per-mod results of one [`install_mods`] run, in manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModInstallReport {
    pub results: Vec<ModResult>,
}

impl ModInstallReport {
    pub fn installed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, ModOutcome::Installed { .. }))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ModResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, ModOutcome::Failed(_)))
    }
}

impl fmt::Display for ModInstallReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} installed, {} failed",
            self.installed_count(),
            self.failures().count()
        )
    }
}

#[derive(Debug, Error)]
pub enum ModInstallError {
    #[error("essential file missing after installation: {file} (checked: {})", format_paths(.checked))]
    MissingEssentialFile {
        file: &'static str,
        checked: Vec<PathBuf>,
        report: Box<ModInstallReport>,
    },
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Files a working profile needs, each with the places it may live, in the
/// order they are checked.
pub fn essential_files(layout: &ProfileLayout) -> Vec<(&'static str, Vec<PathBuf>)> {
    let root = &layout.root;
    vec![
        (
            "BepInEx.Preloader.dll",
            vec![
                layout.core_dir.join("BepInEx.Preloader.dll"),
                root.join("config").join("BepInEx.Preloader.dll"),
            ],
        ),
        (
            "BepInEx.cfg",
            vec![
                root.join("config").join("BepInEx.cfg"),
                layout.config_dir.join("BepInEx.cfg"),
                root.join("BepInEx.cfg"),
            ],
        ),
        (
            "doorstop_config.ini",
            vec![
                layout.doorstop_config.clone(),
                root.join("config").join("doorstop_config.ini"),
            ],
        ),
        ("installation_state.yml", vec![layout.state_file.clone()]),
    ]
}

/// Installs every enabled mod of `manifest` into the profile.
pub fn install_mods(
    manifest: &ExportManifest,
    layout: &ProfileLayout,
    community: &str,
    registry: &RegistryClient,
) -> Result<ModInstallReport, ModInstallError> {
    let mut handled = HashSet::new();
    let mut report = ModInstallReport::default();

    info!(
        "Installing {} enabled mods from {}",
        manifest.enabled_mods().count(),
        community
    );

    for exported in manifest.enabled_mods() {
        let key = exported.key();

        // only successful installs count; a failed mod listed again is retried
        let outcome = if handled.contains(&key) {
            ModOutcome::Duplicate
        } else {
            match install_mod(exported, layout, community, registry) {
                Ok((version, files)) => {
                    info!("Installed mod: {} ({})", key, version);
                    handled.insert(key.clone());
                    ModOutcome::Installed { version, files }
                }
                Err(e) => {
                    warn!("Failed to install mod {}: {:#}", key, e);
                    ModOutcome::Failed(format!("{:#}", e))
                }
            }
        };

        report.results.push(ModResult { key, outcome });
    }

    for (file, candidates) in essential_files(layout) {
        match candidates.iter().find(|p| p.exists()) {
            Some(found) => info!("Found essential file: {} at {}", file, found.display()),
            None => {
                warn!(
                    "Missing essential file: {} (checked: {})",
                    file,
                    format_paths(&candidates)
                );
                return Err(ModInstallError::MissingEssentialFile {
                    file,
                    checked: candidates,
                    report: Box::new(report),
                });
            }
        }
    }

    info!("Mod installation finished: {}", report);
    Ok(report)
}

/// Resolves, downloads and extracts one mod. Returns the installed version
/// and the number of files written.
fn install_mod(
    exported: &ExportedMod,
    layout: &ProfileLayout,
    community: &str,
    registry: &RegistryClient,
) -> Result<(String, usize)> {
    let package = registry
        .resolve_package(&exported.name, community)
        .with_context(|| format!("Failed to get package info for {}", exported.name))?;

    let requested = exported.version.to_string();
    let version = match package.version(&requested) {
        Some(v) => v,
        None => {
            let latest = package
                .latest()
                .with_context(|| format!("{} has no published versions", exported.name))?;
            warn!(
                "Requested version {} not available for {}, using latest {}",
                requested, exported.name, latest.version_number
            );
            latest
        }
    };

    let file = registry
        .download(&version.download_url)
        .with_context(|| {
            format!(
                "Failed to download {} {}",
                exported.name, version.version_number
            )
        })?;

    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("Failed to open package {}", exported.name))?;
    let extraction = extract_package(&mut archive, &exported.name, layout)?;

    Ok((version.version_number.clone(), extraction.files_written))
}
