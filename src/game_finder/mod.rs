//! Game detection
//!
//! Looks up which games are installed through Steam.

pub mod steam;

pub use steam::{find_steam_path, installed_apps, is_game_installed, SteamApp};
