//! Profile paths on disk
//!
//! Profiles live in the mod manager's data directory:
//! `<target>/<GameName>/profiles/<ProfileName>/`. Archive entry names use `/`
//! (sometimes `\`) and are only ever joined onto a profile through
//! [`join_relative`], which refuses to leave the base directory.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::games::{GameDescriptor, DEFAULT_PROFILE_NAME};

/// Convert Windows path separators
/// `BepInEx\plugins\mod.dll` -> `BepInEx/plugins/mod.dll`
pub fn to_unix_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Get the filename from a path (handles both / and \)
pub fn file_name(path: &str) -> &str {
    path.rfind(['\\', '/'])
        .map(|idx| &path[idx + 1..])
        .unwrap_or(path)
}

/// Get file extension (as written, without the dot)
pub fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    name.rfind('.').map(|idx| &name[idx + 1..])
}

/// Join a relative archive path onto `base`.
///
/// Returns `None` for absolute paths, drive-qualified paths, or any `..`
/// component. Empty and `.` components are dropped.
pub fn join_relative(base: &Path, relative: &str) -> Option<PathBuf> {
    let relative = to_unix_path(relative);
    if relative.starts_with('/') {
        return None;
    }

    let mut joined = base.to_path_buf();
    for component in relative.split('/') {
        match component {
            "" | "." => continue,
            ".." => return None,
            c if c.contains(':') => return None,
            c => joined.push(c),
        }
    }
    Some(joined)
}

/// Directory name the mod manager uses for a game: spaces removed, trailing
/// periods trimmed.
pub fn sanitize_game_dir_name(name: &str) -> String {
    name.replace(' ', "").trim_end_matches('.').to_string()
}

/// `<target>/<sanitized game name>/profiles`
pub fn game_profiles_dir(target_dir: &Path, game: &GameDescriptor) -> PathBuf {
    target_dir
        .join(sanitize_game_dir_name(&game.name))
        .join("profiles")
}

/// Finds the on-disk profile directory name when it drifted from the one
/// the manifest declares.
///
/// Tries the declared name, the name without trailing dots, the name without
/// any dots, the game name and `Default`; the first existing directory wins.
/// Falls back to the declared name.
pub fn actual_profile_name(target_dir: &Path, game: &GameDescriptor) -> String {
    let profiles_dir = game_profiles_dir(target_dir, game);
    let declared = game.profile_name();

    let variations = [
        declared.to_string(),
        declared.trim_end_matches('.').to_string(),
        declared.replace('.', ""),
        game.name.clone(),
        DEFAULT_PROFILE_NAME.to_string(),
    ];

    for variation in variations.iter().filter(|v| !v.is_empty()) {
        if profiles_dir.join(variation).is_dir() {
            if variation != declared {
                debug!(
                    "Found profile directory '{}' (manifest declares '{}')",
                    variation, declared
                );
            }
            return variation.clone();
        }
    }

    declared.to_string()
}

/// Paths inside one installed profile.
#[derive(Debug, Clone)]
pub struct ProfileLayout {
    /// `<profiles>/<ProfileName>`
    pub root: PathBuf,
    pub bepinex_dir: PathBuf,
    pub plugins_dir: PathBuf,
    pub config_dir: PathBuf,
    pub core_dir: PathBuf,
    /// Cache the game rebuilds on launch; stale copies break startup.
    pub cache_dir: PathBuf,
    pub log_file: PathBuf,
    /// Installed-mod ledger (`mods.yml`)
    pub ledger_file: PathBuf,
    pub version_file: PathBuf,
    pub state_file: PathBuf,
    pub winhttp_file: PathBuf,
    pub doorstop_config: PathBuf,
}

impl ProfileLayout {
    /// Creates path references for a profile rooted at `root`.
    pub fn new(root: PathBuf) -> Self {
        let bepinex_dir = root.join("BepInEx");
        Self {
            plugins_dir: bepinex_dir.join("plugins"),
            config_dir: bepinex_dir.join("config"),
            core_dir: bepinex_dir.join("core"),
            cache_dir: bepinex_dir.join("cache"),
            log_file: bepinex_dir.join("LogOutput.log"),
            ledger_file: root.join("mods.yml"),
            version_file: root.join(".profile_version"),
            state_file: root.join("_state").join("installation_state.yml"),
            winhttp_file: root.join("winhttp.dll"),
            doorstop_config: root.join("doorstop_config.ini"),
            bepinex_dir,
            root,
        }
    }

    /// Layout of the game's declared profile under `target_dir`.
    pub fn for_game(target_dir: &Path, game: &GameDescriptor) -> Self {
        Self::new(game_profiles_dir(target_dir, game).join(game.profile_name()))
    }

    /// Creates `BepInEx/{plugins,config,core}`.
    pub fn create_skeleton(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.plugins_dir)?;
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.core_dir)?;
        Ok(())
    }

    /// Present on disk with either a ledger or a `BepInEx` directory.
    pub fn looks_installed(&self) -> bool {
        self.root.is_dir() && (self.ledger_file.exists() || self.bepinex_dir.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(name: &str, profile: &str) -> GameDescriptor {
        GameDescriptor {
            name: name.to_string(),
            profile_name: profile.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_file_name_and_extension() {
        assert_eq!(file_name("BepInEx\\plugins\\Mod.dll"), "Mod.dll");
        assert_eq!(file_name("Mod.dll"), "Mod.dll");
        assert_eq!(extension("pack/Mod.DLL"), Some("DLL"));
        assert_eq!(extension("README"), None);
    }

    #[test]
    fn test_join_relative() {
        let base = Path::new("/profiles/Default");
        assert_eq!(
            join_relative(base, "BepInEx\\config\\x.cfg"),
            Some(PathBuf::from("/profiles/Default/BepInEx/config/x.cfg"))
        );
        assert_eq!(
            join_relative(base, "./a//b.txt"),
            Some(PathBuf::from("/profiles/Default/a/b.txt"))
        );
        assert_eq!(join_relative(base, "../escape.txt"), None);
        assert_eq!(join_relative(base, "a/../../escape.txt"), None);
        assert_eq!(join_relative(base, "/etc/passwd"), None);
        assert_eq!(join_relative(base, "C:/Windows/x.dll"), None);
    }

    #[test]
    fn test_game_profiles_dir_sanitizes() {
        let dir = game_profiles_dir(Path::new("/data"), &game("R.E.P.O.", ""));
        assert_eq!(dir, PathBuf::from("/data/R.E.P.O/profiles"));

        let dir = game_profiles_dir(Path::new("/data"), &game("Lethal Company", ""));
        assert_eq!(dir, PathBuf::from("/data/LethalCompany/profiles"));
    }

    #[test]
    fn test_profile_layout_paths() {
        let layout = ProfileLayout::for_game(Path::new("/data"), &game("Lethal Company", ""));

        assert_eq!(layout.root, PathBuf::from("/data/LethalCompany/profiles/Default"));
        assert_eq!(
            layout.plugins_dir,
            PathBuf::from("/data/LethalCompany/profiles/Default/BepInEx/plugins")
        );
        assert_eq!(
            layout.state_file,
            PathBuf::from("/data/LethalCompany/profiles/Default/_state/installation_state.yml")
        );
        assert_eq!(
            layout.version_file,
            PathBuf::from("/data/LethalCompany/profiles/Default/.profile_version")
        );
    }

    #[test]
    fn test_actual_profile_name_variations() {
        let dir = tempfile::tempdir().unwrap();
        let g = game("R.E.P.O.", "Wesley.");
        let profiles = game_profiles_dir(dir.path(), &g);

        // nothing on disk: declared name
        assert_eq!(actual_profile_name(dir.path(), &g), "Wesley.");

        std::fs::create_dir_all(profiles.join("Wesley")).unwrap();
        assert_eq!(actual_profile_name(dir.path(), &g), "Wesley");

        std::fs::create_dir_all(profiles.join("Wesley.")).unwrap();
        assert_eq!(actual_profile_name(dir.path(), &g), "Wesley.");
    }

    #[test]
    fn test_actual_profile_name_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let g = game("Lethal Company", "Modded");
        std::fs::create_dir_all(game_profiles_dir(dir.path(), &g).join("Default")).unwrap();

        assert_eq!(actual_profile_name(dir.path(), &g), "Default");
    }

    #[test]
    fn test_skeleton_and_presence() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProfileLayout::new(dir.path().join("Default"));
        assert!(!layout.looks_installed());

        layout.create_skeleton().unwrap();
        assert!(layout.core_dir.is_dir());
        assert!(layout.config_dir.is_dir());
        assert!(layout.looks_installed());
    }
}
