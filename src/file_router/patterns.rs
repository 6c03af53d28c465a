//! File detection patterns for routing.

use crate::paths;

/// Registry metadata shipped in every package; never installed.
/// Matched by exact (case-sensitive) base name.
pub const METADATA_FILES: &[&str] = &["manifest.json", "icon.png", "README.md", "CHANGELOG.md"];

/// Files of the core pack that belong at the profile root.
pub const PROFILE_ROOT_FILES: &[&str] = &["doorstop_config.ini", "winhttp.dll"];

/// BepInEx runtime libraries.
/// Case-insensitive exact match on the base name.
pub const CORE_LIBRARIES: &[&str] = &[
    "BepInEx.dll",
    "BepInEx.Preloader.dll",
    "BepInEx.Harmony.dll",
    // Harmony
    "0Harmony.dll",
    "0Harmony20.dll",
    "HarmonyXInterop.dll",
    // Mono.Cecil
    "Mono.Cecil.dll",
    "Mono.Cecil.Mdb.dll",
    "Mono.Cecil.Pdb.dll",
    "Mono.Cecil.Rocks.dll",
    // MonoMod
    "MonoMod.RuntimeDetour.dll",
    "MonoMod.Utils.dll",
];

/// Marker in a package full name identifying the core pack.
pub const CORE_PACK_MARKER: &str = "bepinex";

const CORE_SEGMENT: &str = "/core/";
const BEPINEX_SEGMENT: &str = "/BepInEx/";

/// Returns true if the base name is registry metadata.
pub fn is_metadata(path: &str) -> bool {
    METADATA_FILES.contains(&paths::file_name(path))
}

/// Returns true for `.dll` files (any case).
pub fn is_library(path: &str) -> bool {
    paths::extension(path).is_some_and(|ext| ext.eq_ignore_ascii_case("dll"))
}

/// Returns true for `.xml` files (any case).
pub fn is_xml(path: &str) -> bool {
    paths::extension(path).is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

/// Returns true if the base name is one of the BepInEx runtime libraries.
pub fn is_core_library(path: &str) -> bool {
    let name = paths::file_name(path);
    CORE_LIBRARIES.iter().any(|lib| lib.eq_ignore_ascii_case(name))
}

/// Returns true if the base name must sit at the profile root.
pub fn is_profile_root_file(path: &str) -> bool {
    PROFILE_ROOT_FILES.contains(&paths::file_name(path))
}

/// Part of the path after the last `core/` directory segment.
///
/// A leading `core/` counts as a segment.
pub fn core_suffix(path: &str) -> Option<&str> {
    let anchored = anchored(path);
    anchored
        .rfind(CORE_SEGMENT)
        .map(|idx| &path[idx + CORE_SEGMENT.len() - 1..])
}

/// Part of the path after the first `BepInEx/` directory segment.
///
/// Covers both `<pack>/BepInEx/...` and a top-level `BepInEx/...`.
pub fn bepinex_suffix(path: &str) -> Option<&str> {
    let anchored = anchored(path);
    anchored
        .find(BEPINEX_SEGMENT)
        .map(|idx| &path[idx + BEPINEX_SEGMENT.len() - 1..])
}

/// Returns true if the package full name identifies the core pack.
pub fn is_core_pack(full_name: &str) -> bool {
    full_name.to_lowercase().contains(CORE_PACK_MARKER)
}

/// The path with a leading `/`, so a first-level directory is also a
/// `/<dir>/` segment. Indices into the result are one past those in `path`.
fn anchored(path: &str) -> String {
    format!("/{}", path)
}
