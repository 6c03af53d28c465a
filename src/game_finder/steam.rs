//! Steam library lookup
//!
//! Finds the Steam installation, every library folder it knows about, and the
//! apps installed in them (from `appmanifest_<appid>.acf`).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, warn};

use crate::games::GameDescriptor;

/// An app installed in one of the Steam libraries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SteamApp {
    pub app_id: String,
    pub name: String,
    /// `<library>/steamapps/common/<installdir>`, if the manifest names one
    pub install_dir: Option<PathBuf>,
}

/// Find the primary Steam installation path
pub fn find_steam_path() -> Option<PathBuf> {
    steam_candidates()
        .into_iter()
        .find(|p| p.join("steamapps").exists())
}

fn steam_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(home) = dirs::home_dir() {
        candidates.extend([
            home.join(".local/share/Steam"),
            home.join(".steam/debian-installation"),
            home.join(".steam/steam"),
            home.join(".var/app/com.valvesoftware.Steam/data/Steam"),
            home.join(".var/app/com.valvesoftware.Steam/.local/share/Steam"),
            home.join("snap/steam/common/.local/share/Steam"),
        ]);
    }

    for var in ["PROGRAMFILES(X86)", "PROGRAMFILES"] {
        if let Ok(dir) = std::env::var(var) {
            candidates.push(PathBuf::from(dir).join("Steam"));
        }
    }

    candidates
}

/// `steamapps` directories of every library, the main one first.
pub fn library_dirs(steam_path: &Path) -> Vec<PathBuf> {
    let main = steam_path.join("steamapps");
    let mut libs = vec![main.clone()];

    let vdf = main.join("libraryfolders.vdf");
    let content = match fs::read_to_string(&vdf) {
        Ok(content) => content,
        Err(e) => {
            debug!("No library folders file at {}: {}", vdf.display(), e);
            return libs;
        }
    };

    for path in parse_library_paths(&content) {
        let lib = PathBuf::from(path).join("steamapps");
        if lib.is_dir() && !libs.contains(&lib) {
            libs.push(lib);
        }
    }

    libs
}

/// `"path"` values of `libraryfolders.vdf`.
fn parse_library_paths(vdf: &str) -> Vec<String> {
    let Ok(re) = Regex::new(r#""path"\s+"([^"]+)""#) else {
        return Vec::new();
    };

    re.captures_iter(vdf)
        // VDF escapes backslashes in Windows paths
        .map(|caps| caps[1].replace("\\\\", "\\"))
        .collect()
}

/// Parse one `appmanifest_*.acf`. Needs at least `appid` and `name`.
fn parse_app_manifest(content: &str, steamapps: &Path) -> Option<SteamApp> {
    let field = |key: &str| -> Option<String> {
        let re = Regex::new(&format!(r#""{}"\s*"([^"]+)""#, key)).ok()?;
        re.captures(content).map(|caps| caps[1].to_string())
    };

    let app_id = field("appid")?;
    let name = field("name")?;
    let install_dir = field("installdir").map(|dir| steamapps.join("common").join(dir));

    Some(SteamApp {
        app_id,
        name,
        install_dir,
    })
}

/// All apps found in the given libraries, keyed by app id.
pub fn scan_libraries(libs: &[PathBuf]) -> HashMap<String, SteamApp> {
    let mut apps = HashMap::new();

    for lib in libs {
        let Ok(entries) = fs::read_dir(lib) else {
            continue;
        };

        for entry in entries.flatten() {
            let file_name = entry.file_name().to_string_lossy().to_string();
            if !(file_name.starts_with("appmanifest_") && file_name.ends_with(".acf")) {
                continue;
            }

            let path = entry.path();
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Failed to read {}: {}", path.display(), e);
                    continue;
                }
            };

            match parse_app_manifest(&content, lib) {
                Some(app) => {
                    apps.insert(app.app_id.clone(), app);
                }
                None => debug!("Skipping invalid app manifest {}", path.display()),
            }
        }
    }

    apps
}

/// Apps installed through Steam. Empty when Steam is not found.
pub fn installed_apps() -> HashMap<String, SteamApp> {
    let Some(steam_path) = find_steam_path() else {
        debug!("Steam installation not found");
        return HashMap::new();
    };

    let libs = library_dirs(&steam_path);
    let apps = scan_libraries(&libs);
    debug!(
        "Found {} Steam apps in {} libraries under {}",
        apps.len(),
        libs.len(),
        steam_path.display()
    );
    apps
}

pub fn is_game_installed(game: &GameDescriptor, apps: &HashMap<String, SteamApp>) -> bool {
    !game.id.is_empty() && apps.contains_key(&game.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const VDF: &str = r#"
"libraryfolders"
{
	"0"
	{
		"path"		"/home/user/.local/share/Steam"
		"label"		""
	}
	"1"
	{
		"path"		"D:\\SteamLibrary"
	}
}
"#;

    fn write_manifest(steamapps: &Path, id: &str, name: &str, dir: &str) {
        fs::create_dir_all(steamapps).unwrap();
        fs::write(
            steamapps.join(format!("appmanifest_{}.acf", id)),
            format!(
                "\"AppState\"\n{{\n\t\"appid\"\t\t\"{}\"\n\t\"name\"\t\t\"{}\"\n\t\"installdir\"\t\t\"{}\"\n}}\n",
                id, name, dir
            ),
        )
        .unwrap();
    }

    #[test]
    fn test_parse_library_paths() {
        let paths = parse_library_paths(VDF);
        assert_eq!(paths, vec!["/home/user/.local/share/Steam", "D:\\SteamLibrary"]);
    }

    #[test]
    fn test_parse_app_manifest() {
        let content = "\"AppState\"\n{\n\t\"appid\"\t\t\"3241660\"\n\t\"name\"\t\t\"R.E.P.O.\"\n\t\"installdir\"\t\t\"REPO\"\n}";
        let app = parse_app_manifest(content, Path::new("/lib/steamapps")).unwrap();

        assert_eq!(app.app_id, "3241660");
        assert_eq!(app.name, "R.E.P.O.");
        assert_eq!(app.install_dir, Some(PathBuf::from("/lib/steamapps/common/REPO")));

        assert!(parse_app_manifest("\"appid\" \"1\"", Path::new("/lib")).is_none());
    }

    #[test]
    fn test_scan_multiple_libraries() {
        let dir = tempdir().unwrap();
        let steam = dir.path().join("Steam");
        let extra = dir.path().join("Library2");

        write_manifest(&steam.join("steamapps"), "1966720", "Lethal Company", "Lethal Company");
        write_manifest(&extra.join("steamapps"), "3241660", "R.E.P.O.", "REPO");
        fs::write(
            steam.join("steamapps/libraryfolders.vdf"),
            format!(
                "\"libraryfolders\"\n{{\n\t\"0\"\n\t{{\n\t\t\"path\"\t\t\"{}\"\n\t}}\n\t\"1\"\n\t{{\n\t\t\"path\"\t\t\"{}\"\n\t}}\n}}\n",
                steam.display(),
                extra.display()
            ),
        )
        .unwrap();
        fs::write(steam.join("steamapps/appmanifest_bad.acf"), "garbage").unwrap();

        let libs = library_dirs(&steam);
        assert_eq!(libs.len(), 2);

        let apps = scan_libraries(&libs);
        assert_eq!(apps.len(), 2);
        assert_eq!(apps["3241660"].name, "R.E.P.O.");

        let repo = GameDescriptor {
            id: "3241660".into(),
            ..Default::default()
        };
        assert!(is_game_installed(&repo, &apps));

        let unknown = GameDescriptor::default();
        assert!(!is_game_installed(&unknown, &apps));
    }
}
