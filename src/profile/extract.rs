//! Archive extraction for profile archives and Thunderstore packages.

use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::file_router::{FileRouter, PackageKind, Route, RouteTargets};
use crate::paths::{self, ProfileLayout};

/// Writes one archive entry to `dest`.
///
/// Directory entries (name ending in a separator) are no-ops. Missing parent
/// directories are created and an existing file is overwritten.
pub fn extract_entry(name: &str, reader: &mut impl Read, dest: &Path) -> io::Result<u64> {
    if name.ends_with('/') || name.ends_with('\\') {
        return Ok(0);
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut out = File::create(dest)?;
    io::copy(reader, &mut out)
}

/// Whether the archive has a member with exactly this name.
pub fn has_member<R: Read + Seek>(archive: &ZipArchive<R>, name: &str) -> bool {
    archive.file_names().any(|n| n == name)
}

/// Extracts every file entry under `root`, keeping relative paths.
///
/// Entries for which `skip` returns true are left out. Entries that would
/// escape `root` are skipped with a warning. Returns the number of files
/// written.
pub fn extract_verbatim<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    root: &Path,
    skip: impl Fn(&str) -> bool,
) -> Result<usize> {
    let mut written = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();

        if entry.is_dir() || skip(&name) {
            continue;
        }

        let Some(dest) = paths::join_relative(root, &name) else {
            warn!("Skipping unsafe archive path: {}", name);
            continue;
        };

        extract_entry(&name, &mut entry, &dest)
            .with_context(|| format!("Failed to extract {}", name))?;
        written += 1;
    }

    debug!("Extracted {} files to {}", written, root.display());
    Ok(written)
}

/// Result of installing one package archive into a profile.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PackageExtraction {
    pub files_written: usize,
    pub files_skipped: usize,
    /// Only meaningful for the core pack
    pub core_content_found: bool,
}

/// Installs a Thunderstore package archive into the profile, routing each
/// entry by package kind.
///
/// A core pack that produced no recognisable core content is reported with a
/// warning; the files that were placed stay.
pub fn extract_package<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    full_name: &str,
    layout: &ProfileLayout,
) -> Result<PackageExtraction> {
    let router = FileRouter::for_package(full_name);
    let targets = RouteTargets {
        profile_root: &layout.root,
        bepinex_root: &layout.bepinex_dir,
        plugins_root: &layout.plugins_dir,
        package_full_name: full_name,
    };

    if router.kind() == PackageKind::CorePack {
        fs::create_dir_all(&layout.core_dir)
            .with_context(|| format!("Failed to create {}", layout.core_dir.display()))?;
        debug!("Extracting core pack: {}", full_name);
    } else {
        debug!("Extracting mod: {}", full_name);
    }

    let mut result = PackageExtraction::default();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();

        if entry.is_dir() {
            continue;
        }

        let route = router.route(&name);
        let Some(dest) = route.destination(&targets) else {
            if route != Route::Skip {
                warn!("Skipping unsafe path {} in {}", name, full_name);
            }
            result.files_skipped += 1;
            continue;
        };

        extract_entry(&name, &mut entry, &dest)
            .with_context(|| format!("Failed to extract {} from {}", name, full_name))?;
        debug!("{} -> {} ({})", name, dest.display(), route);

        result.core_content_found |= route.is_core_content();
        result.files_written += 1;
    }

    if router.kind() == PackageKind::CorePack && !result.core_content_found {
        warn!(
            "No core files were extracted from {}; the profile will likely not start",
            full_name
        );
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::testing::zip_archive;
    use tempfile::tempdir;

    #[test]
    fn test_extract_entry_creates_parents_and_overwrites() -> Result<()> {
        let dir = tempdir()?;
        let dest = dir.path().join("a/b/c.txt");

        extract_entry("a/b/c.txt", &mut "first".as_bytes(), &dest)?;
        extract_entry("a/b/c.txt", &mut "second".as_bytes(), &dest)?;

        assert_eq!(fs::read_to_string(&dest)?, "second");
        Ok(())
    }

    #[test]
    fn test_extract_entry_directory_is_noop() -> Result<()> {
        let dir = tempdir()?;
        let dest = dir.path().join("somedir");

        let written = extract_entry("somedir/", &mut io::empty(), &dest)?;

        assert_eq!(written, 0);
        assert!(!dest.exists());
        Ok(())
    }

    #[test]
    fn test_extract_verbatim_skips_and_refuses_escape() -> Result<()> {
        let dir = tempdir()?;
        let mut archive = zip_archive(&[
            ("export.r2x", b"profileName: x".as_slice()),
            ("config/a.cfg", b"a"),
            ("../evil.txt", b"nope"),
        ]);

        let written = extract_verbatim(&mut archive, dir.path(), |n| n == "export.r2x")?;

        assert_eq!(written, 1);
        assert!(dir.path().join("config/a.cfg").exists());
        assert!(!dir.path().join("export.r2x").exists());
        assert!(!dir.path().parent().unwrap().join("evil.txt").exists());
        Ok(())
    }

    #[test]
    fn test_extract_plugin_package() -> Result<()> {
        let dir = tempdir()?;
        let layout = ProfileLayout::new(dir.path().to_path_buf());
        let mut archive = zip_archive(&[
            ("manifest.json", b"{}".as_slice()),
            ("icon.png", b""),
            ("plugins/MoreShopItems.dll", b"dll"),
            ("assets/shop.bundle", b"bundle"),
        ]);

        let result = extract_package(&mut archive, "Owner-MoreShopItems", &layout)?;

        let pkg_dir = layout.plugins_dir.join("Owner-MoreShopItems");
        assert!(pkg_dir.join("MoreShopItems.dll").exists());
        assert!(pkg_dir.join("assets/shop.bundle").exists());
        assert!(!pkg_dir.join("manifest.json").exists());
        assert_eq!(result.files_written, 2);
        assert_eq!(result.files_skipped, 2);
        Ok(())
    }

    #[test]
    fn test_extract_core_pack() -> Result<()> {
        let dir = tempdir()?;
        let layout = ProfileLayout::new(dir.path().to_path_buf());
        let mut archive = zip_archive(&[
            ("BepInExPack/BepInEx/core/BepInEx.Preloader.dll", b"pre".as_slice()),
            ("BepInExPack/BepInEx/config/BepInEx.cfg", b"cfg"),
            ("BepInExPack/doorstop_config.ini", b"ini"),
            ("BepInExPack/winhttp.dll", b"shim"),
            ("README.md", b"readme"),
        ]);

        let result = extract_package(&mut archive, "BepInEx-BepInExPack", &layout)?;

        assert!(result.core_content_found);
        assert!(layout.core_dir.join("BepInEx.Preloader.dll").exists());
        assert!(layout.config_dir.join("BepInEx.cfg").exists());
        assert_eq!(fs::read_to_string(&layout.doorstop_config)?, "ini");
        assert_eq!(fs::read_to_string(&layout.winhttp_file)?, "shim");
        Ok(())
    }

    #[test]
    fn test_core_pack_without_core_content_still_extracts() -> Result<()> {
        let dir = tempdir()?;
        let layout = ProfileLayout::new(dir.path().to_path_buf());
        let mut archive = zip_archive(&[("Helper.dll", b"x".as_slice())]);

        let result = extract_package(&mut archive, "BepInEx-BepInExPack", &layout)?;

        assert!(!result.core_content_found);
        assert!(layout.core_dir.join("Helper.dll").exists());
        Ok(())
    }

    #[test]
    fn test_has_member() {
        let archive = zip_archive(&[("export.r2x", b"".as_slice()), ("x/export.r2x", b"")]);
        assert!(has_member(&archive, "export.r2x"));
        assert!(!has_member(&archive, "EXPORT.R2X"));
    }
}
