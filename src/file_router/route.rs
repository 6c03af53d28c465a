//! Routing decisions for package files.

use std::path::{Path, PathBuf};

use crate::paths;

/// Where a file from a package archive should be installed.
///
/// Paths carried by a variant are relative to the directory the variant
/// names and always use `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    /// Not installed (registry metadata, directories, unrecognised core-pack
    /// files)
    Skip,

    /// Goes to: `BepInEx/plugins/<package full name>/`
    Plugin(String),

    /// Goes to: `BepInEx/core/`
    Core {
        relative: String,
        /// Whether this file shows the core pack was laid out as expected
        core_content: bool,
    },

    /// Goes to: `BepInEx/`
    BepInEx(String),

    /// Goes to: the profile root (`winhttp.dll`, `doorstop_config.ini`)
    ProfileRoot(String),
}

/// Directories a [`Route`] resolves against.
#[derive(Debug, Clone)]
pub struct RouteTargets<'a> {
    pub profile_root: &'a Path,
    pub bepinex_root: &'a Path,
    pub plugins_root: &'a Path,
    pub package_full_name: &'a str,
}

impl Route {
    /// Returns the display name for this route.
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Skip => "Skip",
            Route::Plugin(_) => "Plugin",
            Route::Core { .. } => "Core",
            Route::BepInEx(_) => "BepInEx",
            Route::ProfileRoot(_) => "Profile Root",
        }
    }

    pub fn is_core_content(&self) -> bool {
        matches!(self, Route::Core { core_content: true, .. })
    }

    /// Absolute destination, or `None` for [`Route::Skip`] and for paths that
    /// would escape their target directory.
    pub fn destination(&self, targets: &RouteTargets<'_>) -> Option<PathBuf> {
        match self {
            Route::Skip => None,
            Route::Plugin(rel) => paths::join_relative(
                &paths::join_relative(targets.plugins_root, targets.package_full_name)?,
                rel,
            ),
            Route::Core { relative, .. } => {
                paths::join_relative(&targets.bepinex_root.join("core"), relative)
            }
            Route::BepInEx(rel) => paths::join_relative(targets.bepinex_root, rel),
            Route::ProfileRoot(name) => paths::join_relative(targets.profile_root, name),
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
