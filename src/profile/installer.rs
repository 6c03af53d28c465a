//! Profile installation orchestration.
//!
//! Downloads a game's profile archive and installs it as either a plain
//! archive (copied verbatim) or an exported profile (`export.r2x` plus config
//! files, with every listed mod fetched from Thunderstore).

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use super::extract::{extract_verbatim, has_member};
use super::mods::{install_mods, ModInstallReport};
use super::status::{is_installed, is_up_to_date};
use super::version::{write_marker, VersionMarker};
use super::{ExportManifest, Ledger, ProfileError, EXPORT_MANIFEST_NAME};
use crate::games::GameDescriptor;
use crate::paths::ProfileLayout;
use crate::registry::{download_artifact, RegistryClient};

/// Content the mod manager expects in a fresh `installation_state.yml`.
pub const EMPTY_INSTALLATION_STATE: &str = "currentState: []\n";

/// How a profile archive is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Extracted verbatim into the profile
    Plain,
    /// Has `export.r2x`; mods are installed from Thunderstore
    Export,
}

impl ArchiveFormat {
    pub fn detect<R: Read + Seek>(archive: &ZipArchive<R>) -> Self {
        if has_member(archive, EXPORT_MANIFEST_NAME) {
            ArchiveFormat::Export
        } else {
            ArchiveFormat::Plain
        }
    }
}

/// Outcome of a successful install.
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub profile_dir: PathBuf,
    pub format: ArchiveFormat,
    /// Only for exported profiles
    pub mods: Option<ModInstallReport>,
}

/// Installs game profiles.
///
/// Holds the registry client so package lookups are cached across every
/// install made through the same installer.
pub struct ProfileInstaller {
    registry: Arc<RegistryClient>,
}

impl ProfileInstaller {
    pub fn new(registry: Arc<RegistryClient>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<RegistryClient> {
        &self.registry
    }

    /// Downloads and installs the game's profile under `target_dir`.
    ///
    /// Version bookkeeping after the files are in place is best-effort.
    pub fn install_profile(
        &self,
        game: &GameDescriptor,
        target_dir: &Path,
    ) -> Result<InstallReport> {
        if !game.has_source() {
            return Err(ProfileError::MissingSource(game.name.clone()).into());
        }

        info!("Downloading profile for {} from {}", game.name, game.url);
        let file = download_artifact(
            self.registry.http().as_ref(),
            self.registry.download_policy(),
            &game.url,
        )
        .with_context(|| format!("Failed to download profile for {}", game.name))?;

        let mut archive = ZipArchive::new(file).context("Failed to read profile archive")?;

        let layout = ProfileLayout::for_game(target_dir, game);
        fs::create_dir_all(&layout.root).with_context(|| {
            format!("Failed to create profile directory {}", layout.root.display())
        })?;

        let format = ArchiveFormat::detect(&archive);
        info!(
            "Installing {:?} profile for {} (version {}) to {}",
            format,
            game.name,
            game.version,
            layout.root.display()
        );

        let mods = match format {
            ArchiveFormat::Plain => {
                install_plain(&mut archive, &layout)?;
                None
            }
            ArchiveFormat::Export => Some(self.install_export(&mut archive, game, &layout)?),
        };

        record_version(game, &layout);

        info!("Successfully installed profile for {}", game.name);
        Ok(InstallReport {
            profile_dir: layout.root,
            format,
            mods,
        })
    }

    /// Installs the profile, replacing an outdated one first.
    pub fn install_or_update_profile(
        &self,
        game: &GameDescriptor,
        target_dir: &Path,
    ) -> Result<InstallReport> {
        let layout = ProfileLayout::for_game(target_dir, game);

        let installed = is_installed(&layout).unwrap_or_else(|e| {
            warn!("Could not check install state of {}: {}", game.name, e);
            false
        });

        if installed && !is_up_to_date(game, &layout) {
            info!("Updating profile for {}", game.name);
            if let Err(e) = delete_profile(target_dir, game) {
                warn!("Failed to remove old profile for {}: {:#}", game.name, e);
            }
        }

        self.install_profile(game, target_dir)
    }

    fn install_export<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        game: &GameDescriptor,
        layout: &ProfileLayout,
    ) -> Result<ModInstallReport> {
        let manifest = read_export_manifest(archive)?;
        debug!(
            "Export manifest '{}' lists {} mods",
            manifest.profile_name,
            manifest.mods.len()
        );

        layout
            .create_skeleton()
            .context("Failed to create BepInEx directories")?;

        extract_verbatim(archive, &layout.root, |name| name == EXPORT_MANIFEST_NAME)
            .context("Failed to extract profile files")?;
        clean_transient_files(layout);

        write_installation_state(layout)?;

        if game.community.is_empty() {
            return Err(ProfileError::MissingCommunity(game.name.clone()).into());
        }

        let report = install_mods(&manifest, layout, &game.community, &self.registry)
            .with_context(|| format!("Failed to install mods for {}", game.name))?;

        Ledger::from_export(&manifest, &game.community, now_ms())
            .save(&layout.ledger_file)
            .context("Failed to create mods.yml")?;

        ensure_placeholder(&layout.winhttp_file);

        Ok(report)
    }
}

/// Removes the game's declared profile. Nothing to do if it is absent.
pub fn delete_profile(target_dir: &Path, game: &GameDescriptor) -> Result<()> {
    let layout = ProfileLayout::for_game(target_dir, game);

    if !layout.root.exists() {
        return Ok(());
    }

    info!("Deleting profile directory: {}", layout.root.display());
    fs::remove_dir_all(&layout.root)
        .with_context(|| format!("Failed to delete profile directory {}", layout.root.display()))?;

    info!("Deleted profile for {}", game.name);
    Ok(())
}

fn install_plain<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    layout: &ProfileLayout,
) -> Result<()> {
    extract_verbatim(archive, &layout.root, |_| false).context("Failed to extract profile")?;
    clean_transient_files(layout);
    Ok(())
}

fn read_export_manifest<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<ExportManifest> {
    let entry = match archive.by_name(EXPORT_MANIFEST_NAME) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(ProfileError::MissingExportManifest.into())
        }
        Err(e) => return Err(e).context("Failed to open export.r2x"),
    };
    Ok(ExportManifest::from_reader(entry)?)
}

/// Drops the BepInEx cache and last log left behind by the game.
fn clean_transient_files(layout: &ProfileLayout) {
    match fs::remove_dir_all(&layout.cache_dir) {
        Ok(()) => debug!("Removed {}", layout.cache_dir.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to clean cache directory: {}", e),
    }

    match fs::remove_file(&layout.log_file) {
        Ok(()) => debug!("Removed {}", layout.log_file.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove log file: {}", e),
    }
}

fn write_installation_state(layout: &ProfileLayout) -> Result<()> {
    if let Some(dir) = layout.state_file.parent() {
        fs::create_dir_all(dir).context("Failed to create _state directory")?;
    }
    fs::write(&layout.state_file, EMPTY_INSTALLATION_STATE)
        .context("Failed to create installation_state.yml")
}

/// Creates an empty file if nothing exists at `path`. Never overwrites.
fn ensure_placeholder(path: &Path) {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => debug!("Created placeholder {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
        Err(e) => warn!("Could not create placeholder {}: {}", path.display(), e),
    }
}

/// Writes the version marker and the ledger's version record. Failures are
/// logged only.
fn record_version(game: &GameDescriptor, layout: &ProfileLayout) {
    let marker = VersionMarker {
        url: game.url.clone(),
        version: game.version.clone(),
    };
    match write_marker(&layout.version_file, &marker) {
        Ok(()) => info!("Saved profile version for {}: {}", game.name, game.version),
        Err(e) => warn!("Failed to save profile version file for {}: {}", game.name, e),
    }

    let mut ledger = Ledger::load(&layout.ledger_file).unwrap_or_else(|e| {
        warn!("Could not parse existing mods.yml for {}: {}", game.name, e);
        Ledger::default()
    });
    ledger.set_profile_version(&game.name, &game.version, now_ms());
    if let Err(e) = ledger.save(&layout.ledger_file) {
        warn!("Failed to save profile version in mods.yml for {}: {}", game.name, e);
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::{Reply, ScriptedClient};
    use crate::profile::testing::{zip_archive, zip_bytes};
    use crate::profile::{profile_status, LedgerRecord, ModInstallError};
    use crate::registry::RetryPolicy;
    use tempfile::tempdir;

    const PROFILE_URL: &str = "https://cdn.test/profile.r2z";
    const LISTING_PATH: &str = "/c/repo/api/v1/package/";

    const EXPORT: &str = "profileName: Default\nmods:\n  - name: BepInEx-BepInExPack\n    version: { major: 5, minor: 4, patch: 2100 }\n    enabled: true\n  - name: Owner-MoreShopItems\n    version: { major: 1, minor: 2, patch: 0 }\n    enabled: true\n  - name: Owner-MoreShopItems\n    version: { major: 1, minor: 2, patch: 0 }\n    enabled: true\n";

    fn game() -> GameDescriptor {
        GameDescriptor {
            name: "R.E.P.O.".into(),
            url: PROFILE_URL.into(),
            community: "repo".into(),
            version: "1.0.0".into(),
            ..Default::default()
        }
    }

    fn listing() -> String {
        serde_json::json!([
            {
                "name": "BepInExPack", "owner": "BepInEx",
                "versions": [{"version_number": "5.4.2100", "download_url": "https://cdn.test/bepinex.zip"}]
            },
            {
                "name": "MoreShopItems", "owner": "Owner",
                "versions": [{"version_number": "1.2.0", "download_url": "https://cdn.test/msi.zip"}]
            }
        ])
        .to_string()
    }

    fn export_archive() -> Vec<u8> {
        zip_bytes(&[
            ("export.r2x", EXPORT.as_bytes()),
            ("config/", b""),
            ("config/MoreShopItems.cfg", b"price = 1"),
            ("BepInEx/cache/stale.dat", b"stale"),
            ("BepInEx/LogOutput.log", b"old log"),
        ])
    }

    fn export_client(profile: Vec<u8>) -> Arc<ScriptedClient> {
        Arc::new(
            ScriptedClient::new()
                .on("profile.r2z", vec![Reply::ok(profile)])
                .on(LISTING_PATH, vec![Reply::ok(listing())])
                .on(
                    "bepinex.zip",
                    vec![Reply::ok(zip_bytes(&[
                        ("BepInExPack/BepInEx/core/BepInEx.Preloader.dll", b"pre".as_slice()),
                        ("BepInExPack/BepInEx/config/BepInEx.cfg", b"cfg"),
                        ("BepInExPack/doorstop_config.ini", b"ini"),
                    ]))],
                )
                .on(
                    "msi.zip",
                    vec![Reply::ok(zip_bytes(&[
                        ("manifest.json", b"{}".as_slice()),
                        ("MoreShopItems.dll", b"dll"),
                    ]))],
                ),
        )
    }

    fn installer(http: Arc<ScriptedClient>) -> ProfileInstaller {
        ProfileInstaller::new(Arc::new(
            RegistryClient::new(http)
                .with_base_url("https://registry.test")
                .with_retry_policies(RetryPolicy::immediate(3), RetryPolicy::immediate(3)),
        ))
    }

    #[test]
    fn test_format_detection() {
        let export = zip_archive(&[("export.r2x", b"".as_slice()), ("BepInEx/plugins/x.dll", b"")]);
        assert_eq!(ArchiveFormat::detect(&export), ArchiveFormat::Export);

        let nested = zip_archive(&[("profile/export.r2x", b"".as_slice())]);
        assert_eq!(ArchiveFormat::detect(&nested), ArchiveFormat::Plain);

        let plain = zip_archive(&[("BepInEx/config/x.cfg", b"".as_slice())]);
        assert_eq!(ArchiveFormat::detect(&plain), ArchiveFormat::Plain);
    }

    #[test]
    fn test_install_plain_profile() -> Result<()> {
        let dir = tempdir()?;
        let http = Arc::new(ScriptedClient::new().on(
            "profile.r2z",
            vec![Reply::ok(zip_bytes(&[
                ("BepInEx/config/x.cfg", b"x".as_slice()),
                ("BepInEx/cache/chainloader.dat", b"stale"),
                ("BepInEx/LogOutput.log", b"log"),
            ]))],
        ));

        let report = installer(http).install_profile(&game(), dir.path())?;
        let layout = ProfileLayout::for_game(dir.path(), &game());

        assert_eq!(report.format, ArchiveFormat::Plain);
        assert!(report.mods.is_none());
        assert!(layout.config_dir.join("x.cfg").exists());
        assert!(!layout.cache_dir.exists());
        assert!(!layout.log_file.exists());

        let status = profile_status(dir.path(), &game());
        assert!(status.installed);
        assert!(status.up_to_date);
        Ok(())
    }

    #[test]
    fn test_install_export_profile() -> Result<()> {
        let dir = tempdir()?;
        let report =
            installer(export_client(export_archive())).install_profile(&game(), dir.path())?;
        let layout = ProfileLayout::for_game(dir.path(), &game());

        assert_eq!(report.format, ArchiveFormat::Export);
        assert_eq!(report.mods.as_ref().map(|m| m.installed_count()), Some(2));

        assert!(layout.root.join("config/MoreShopItems.cfg").exists());
        assert!(!layout.root.join(EXPORT_MANIFEST_NAME).exists());
        assert!(!layout.cache_dir.exists());
        assert!(!layout.log_file.exists());
        assert_eq!(fs::read_to_string(&layout.state_file)?, EMPTY_INSTALLATION_STATE);
        assert!(layout.plugins_dir.join("Owner-MoreShopItems/MoreShopItems.dll").exists());
        assert_eq!(fs::metadata(&layout.winhttp_file)?.len(), 0);

        let ledger = Ledger::load(&layout.ledger_file)?;
        assert_eq!(ledger.profile_version(), Some("1.0.0"));
        assert_eq!(ledger.mods().count(), 2);
        Ok(())
    }

    #[test]
    fn test_reinstall_keeps_single_version_record() -> Result<()> {
        let dir = tempdir()?;
        let installer = installer(export_client(export_archive()));

        installer.install_profile(&game(), dir.path())?;
        installer.install_profile(&game(), dir.path())?;

        let layout = ProfileLayout::for_game(dir.path(), &game());
        let ledger = Ledger::load(&layout.ledger_file)?;
        let sentinels = ledger
            .records()
            .iter()
            .filter(|r| matches!(r, LedgerRecord::ProfileVersion(_)))
            .count();
        assert_eq!(sentinels, 1);

        let mut names: Vec<_> = ledger.mods().map(|m| m.name.clone()).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
        Ok(())
    }

    #[test]
    fn test_existing_winhttp_is_not_overwritten() -> Result<()> {
        let dir = tempdir()?;
        let profile = zip_bytes(&[
            ("export.r2x", EXPORT.as_bytes()),
            ("winhttp.dll", b"real shim"),
        ]);
        installer(export_client(profile)).install_profile(&game(), dir.path())?;

        let layout = ProfileLayout::for_game(dir.path(), &game());
        assert_eq!(fs::read_to_string(&layout.winhttp_file)?, "real shim");
        Ok(())
    }

    #[test]
    fn test_missing_source_fails_before_network() {
        let dir = tempdir().unwrap();
        let http = Arc::new(ScriptedClient::new());
        let game = GameDescriptor {
            url: String::new(),
            ..game()
        };

        let err = installer(http.clone()).install_profile(&game, dir.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProfileError>(),
            Some(ProfileError::MissingSource(_))
        ));
        assert_eq!(http.total_calls(), 0);
    }

    #[test]
    fn test_missing_community_fails() {
        let dir = tempdir().unwrap();
        let game = GameDescriptor {
            community: String::new(),
            ..game()
        };

        let err = installer(export_client(export_archive()))
            .install_profile(&game, dir.path())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProfileError>(),
            Some(ProfileError::MissingCommunity(_))
        ));
    }

    #[test]
    fn test_unparsable_export_manifest_fails() {
        let dir = tempdir().unwrap();
        let profile = zip_bytes(&[("export.r2x", b"mods: [ {".as_slice())]);

        let err = installer(export_client(profile))
            .install_profile(&game(), dir.path())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProfileError>(),
            Some(ProfileError::InvalidExportManifest(_))
        ));
    }

    #[test]
    fn test_essential_file_gate_fails_install() {
        let dir = tempdir().unwrap();
        let http = Arc::new(
            ScriptedClient::new()
                .on("profile.r2z", vec![Reply::ok(export_archive())])
                .on(LISTING_PATH, vec![Reply::ok(listing())])
                .on("bepinex.zip", vec![Reply::ok(zip_bytes(&[("Other.txt", b"".as_slice())]))])
                .on("msi.zip", vec![Reply::ok(zip_bytes(&[("M.dll", b"".as_slice())]))]),
        );

        let err = installer(http).install_profile(&game(), dir.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModInstallError>(),
            Some(ModInstallError::MissingEssentialFile {
                file: "BepInEx.Preloader.dll",
                ..
            })
        ));
    }

    #[test]
    fn test_update_replaces_outdated_profile() -> Result<()> {
        let dir = tempdir()?;
        let layout = ProfileLayout::for_game(dir.path(), &game());
        fs::create_dir_all(&layout.bepinex_dir)?;
        fs::write(layout.root.join("leftover.txt"), "old")?;
        write_marker(
            &layout.version_file,
            &VersionMarker {
                url: PROFILE_URL.into(),
                version: "0.9.0".into(),
            },
        )?;

        let http = Arc::new(ScriptedClient::new().on(
            "profile.r2z",
            vec![Reply::ok(zip_bytes(&[("BepInEx/config/x.cfg", b"x".as_slice())]))],
        ));
        let report = installer(http).install_or_update_profile(&game(), dir.path())?;

        assert_eq!(report.format, ArchiveFormat::Plain);
        assert_eq!(report.profile_dir, layout.root);
        assert!(report.mods.is_none());
        assert!(!layout.root.join("leftover.txt").exists());
        assert!(profile_status(dir.path(), &game()).up_to_date);
        Ok(())
    }

    #[test]
    fn test_delete_profile() -> Result<()> {
        let dir = tempdir()?;
        // absent profile is fine
        delete_profile(dir.path(), &game())?;

        let layout = ProfileLayout::for_game(dir.path(), &game());
        fs::create_dir_all(&layout.plugins_dir)?;
        delete_profile(dir.path(), &game())?;
        assert!(!layout.root.exists());
        Ok(())
    }
}
