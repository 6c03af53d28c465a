//! File router module for determining where package files should be installed.
//!
//! This module analyzes file paths from Thunderstore package archives and
//! determines whether they should be installed to:
//! - The package's own folder under `BepInEx/plugins` (regular mods)
//! - `BepInEx/core`, `BepInEx/` or the profile root (the BepInEx pack)
//!
//! Routing is an ordered rule table per package kind; the first matching rule
//! decides. It does no I/O.

mod patterns;
mod route;

pub use patterns::*;
pub use route::{Route, RouteTargets};

use crate::paths;

/// How a package's archive is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageKind {
    /// Regular mod: everything goes under its plugin folder
    Plugin,
    /// The BepInEx pack, which bootstraps the mod loader itself
    CorePack,
}

impl PackageKind {
    pub fn for_package(full_name: &str) -> Self {
        if patterns::is_core_pack(full_name) {
            PackageKind::CorePack
        } else {
            PackageKind::Plugin
        }
    }
}

/// One routing rule: if `matches` accepts the entry path, `target` decides.
struct Rule {
    name: &'static str,
    matches: fn(&str) -> bool,
    target: fn(&str) -> Route,
}

/// Rules for regular mods, in priority order.
const PLUGIN_RULES: &[Rule] = &[
    Rule {
        name: "metadata",
        matches: patterns::is_metadata,
        target: |_| Route::Skip,
    },
    Rule {
        // libraries are flattened into the package folder
        name: "library",
        matches: patterns::is_library,
        target: |path| Route::Plugin(paths::file_name(path).to_string()),
    },
    Rule {
        name: "payload",
        matches: |_| true,
        target: |path| Route::Plugin(path.to_string()),
    },
];

/// Rules for the BepInEx pack, in priority order.
const CORE_PACK_RULES: &[Rule] = &[
    Rule {
        name: "metadata",
        matches: patterns::is_metadata,
        target: |_| Route::Skip,
    },
    Rule {
        // also covers `<pack>/BepInEx/core/`
        name: "core directory",
        matches: |path| patterns::core_suffix(path).is_some(),
        target: |path| Route::Core {
            relative: patterns::core_suffix(path).unwrap_or_default().to_string(),
            core_content: true,
        },
    },
    Rule {
        name: "BepInEx directory",
        matches: |path| patterns::bepinex_suffix(path).is_some(),
        target: |path| {
            Route::BepInEx(patterns::bepinex_suffix(path).unwrap_or_default().to_string())
        },
    },
    Rule {
        name: "profile root file",
        matches: patterns::is_profile_root_file,
        target: |path| Route::ProfileRoot(paths::file_name(path).to_string()),
    },
    Rule {
        name: "core library",
        matches: patterns::is_core_library,
        target: |path| Route::Core {
            relative: paths::file_name(path).to_string(),
            core_content: true,
        },
    },
    Rule {
        name: "stray library",
        matches: |path| patterns::is_library(path) || patterns::is_xml(path),
        target: |path| Route::Core {
            relative: paths::file_name(path).to_string(),
            core_content: false,
        },
    },
];

/// Routes package files to their installation location.
pub struct FileRouter {
    kind: PackageKind,
}

impl FileRouter {
    pub fn new(kind: PackageKind) -> Self {
        Self { kind }
    }

    /// Router for the package with the given `<namespace>-<name>`.
    pub fn for_package(full_name: &str) -> Self {
        Self::new(PackageKind::for_package(full_name))
    }

    fn rules(&self) -> &'static [Rule] {
        match self.kind {
            PackageKind::Plugin => PLUGIN_RULES,
            PackageKind::CorePack => CORE_PACK_RULES,
        }
    }

    /// Determines the route for an archive entry name.
    ///
    /// Directory entries (trailing separator) are skipped. Backslashes are
    /// treated as separators.
    pub fn route(&self, entry_name: &str) -> Route {
        if entry_name.ends_with('/') || entry_name.ends_with('\\') {
            return Route::Skip;
        }
        let path = paths::to_unix_path(entry_name);

        self.rules()
            .iter()
            .find(|rule| (rule.matches)(&path))
            .map(|rule| {
                tracing::trace!("{} matched rule '{}'", path, rule.name);
                (rule.target)(&path)
            })
            .unwrap_or(Route::Skip)
    }

    /// Returns the package kind this router is configured for.
    pub fn kind(&self) -> PackageKind {
        self.kind
    }
}
