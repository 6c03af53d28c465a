//! modprofiles - curated BepInEx mod profile installer
//!
//! Fetches a game manifest, installs each game's profile into the mod
//! manager's profile directory, and resolves every mod an exported profile
//! lists from Thunderstore.

pub mod file_router;
pub mod game_finder;
pub mod games;
pub mod http;
pub mod logging;
pub mod paths;
pub mod profile;
pub mod registry;
pub mod settings;
