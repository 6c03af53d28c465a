//! modprofiles - curated BepInEx mod profile installer

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{error, info};

use modprofiles::game_finder::{installed_apps, is_game_installed};
use modprofiles::games::{fetch_games, find_game, GameDescriptor};
use modprofiles::http::{HttpClient, ReqwestClient};
use modprofiles::logging::{default_log_dir, init_logging};
use modprofiles::paths::{actual_profile_name, ProfileLayout};
use modprofiles::profile::{
    delete_profile, installed_version, profile_status, InstallReport, ProfileInstaller,
};
use modprofiles::registry::RegistryClient;
use modprofiles::settings::Settings;

#[derive(Parser)]
#[command(name = "modprofiles")]
#[command(version)]
#[command(about = "Installs curated BepInEx mod profiles for the r2modman mod manager")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (use RUST_LOG for finer control)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Game manifest URL (overrides settings)
    #[arg(long, global = true)]
    manifest: Option<String>,

    /// Mod manager profile root (overrides settings)
    #[arg(long, global = true)]
    target: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the games in the manifest with their install status
    Games,

    /// Install or update one game's profile
    Install {
        /// Game name or Steam app id
        game: String,
    },

    /// Install or update every profile that is missing or outdated
    Sync,

    /// Show the profile status of one game
    Status {
        /// Game name or Steam app id
        game: String,
    },

    /// Delete one game's profile
    Delete {
        /// Game name or Steam app id
        game: String,
    },

    /// Look up a package on Thunderstore
    Resolve {
        /// Thunderstore community, e.g. `repo`
        community: String,

        /// `<namespace>-<name>`
        package: String,
    },

    /// Show or change saved settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective settings
    Show,

    /// Save the values given with --manifest and --target
    Set,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_logging(default_log_dir().as_deref(), cli.verbose)?;

    let mut settings = Settings::load();
    if let Some(url) = &cli.manifest {
        settings.manifest_url = url.clone();
    }
    if let Some(dir) = &cli.target {
        settings.target_dir = dir.clone();
    }

    let http: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new()?);
    let registry = Arc::new(RegistryClient::new(http.clone()));
    let installer = ProfileInstaller::new(registry.clone());

    match cli.command {
        Commands::Games => {
            let games = fetch_games(http.as_ref(), &settings.manifest_url)?;
            let apps = installed_apps();

            println!("{:<28} {:<10} {:<10} {}", "GAME", "STEAM", "PROFILE", "VERSION");
            for game in &games {
                let status = profile_status(&settings.target_dir, game);
                let profile = if !status.installed {
                    "missing"
                } else if status.has_update {
                    "outdated"
                } else {
                    "current"
                };
                let steam = if is_game_installed(game, &apps) {
                    "installed"
                } else {
                    "-"
                };
                println!("{:<28} {:<10} {:<10} {}", game.name, steam, profile, game.version);
            }
        }

        Commands::Install { game } => {
            let games = fetch_games(http.as_ref(), &settings.manifest_url)?;
            let game = lookup(&games, &game)?;

            let spinner = spinner(&format!("Installing profile for {}", game.name))?;
            let result = installer.install_or_update_profile(game, &settings.target_dir);
            spinner.finish_and_clear();

            print_report(game, &result?);
        }

        Commands::Sync => {
            let games = fetch_games(http.as_ref(), &settings.manifest_url)?;
            let pending: Vec<&GameDescriptor> = games
                .iter()
                .filter(|g| g.has_source())
                .filter(|g| {
                    let status = profile_status(&settings.target_dir, g);
                    !status.installed || status.has_update
                })
                .collect();

            if pending.is_empty() {
                println!("All profiles are up to date.");
                return Ok(());
            }

            let spinner = spinner(&format!("Syncing {} profiles", pending.len()))?;
            let results: Vec<(&GameDescriptor, Result<InstallReport>)> = pending
                .par_iter()
                .map(|game| {
                    (
                        *game,
                        installer.install_or_update_profile(game, &settings.target_dir),
                    )
                })
                .collect();
            spinner.finish_and_clear();

            let mut failed = 0;
            for (game, result) in &results {
                match result {
                    Ok(report) => print_report(game, report),
                    Err(e) => {
                        error!("Failed to install profile for {}: {:#}", game.name, e);
                        failed += 1;
                    }
                }
            }
            info!("Sync finished after {} registry requests", registry.request_count());

            if failed > 0 {
                bail!("{} of {} profiles failed to install", failed, results.len());
            }
        }

        Commands::Status { game } => {
            let games = fetch_games(http.as_ref(), &settings.manifest_url)?;
            let game = lookup(&games, &game)?;
            print_status(game, &settings.target_dir);
        }

        Commands::Delete { game } => {
            let games = fetch_games(http.as_ref(), &settings.manifest_url)?;
            let game = lookup(&games, &game)?;
            delete_profile(&settings.target_dir, game)?;
            println!("Deleted profile for {}", game.name);
        }

        Commands::Resolve { community, package } => {
            let package = registry
                .resolve_package(&package, &community)
                .with_context(|| format!("Failed to resolve {}", package))?;

            println!("{}", package.full_name);
            if !package.package_url.is_empty() {
                println!("  {}", package.package_url);
            }
            if package.is_deprecated {
                println!("  (deprecated)");
            }
            for version in &package.versions {
                println!("  {:<12} {}", version.version_number, version.download_url);
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("Settings file: {}", Settings::settings_path()?.display());
                println!("Manifest URL:  {}", settings.manifest_url);
                println!("Profile root:  {}", settings.target_dir.display());
            }
            ConfigAction::Set => {
                if cli.manifest.is_none() && cli.target.is_none() {
                    bail!("Nothing to set; pass --manifest and/or --target");
                }
                settings.save()?;
                println!("Settings saved.");
            }
        },
    }

    Ok(())
}

fn lookup<'a>(games: &'a [GameDescriptor], query: &str) -> Result<&'a GameDescriptor> {
    find_game(games, query).with_context(|| format!("No game named '{}' in the manifest", query))
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn print_report(game: &GameDescriptor, report: &InstallReport) {
    println!(
        "{}: installed {:?} profile to {}",
        game.name,
        report.format,
        report.profile_dir.display()
    );

    if let Some(mods) = &report.mods {
        println!("  Mods: {}", mods);
        for failure in mods.failures() {
            println!("  failed: {} ({:?})", failure.key, failure.outcome);
        }
    }
}

fn print_status(game: &GameDescriptor, target_dir: &Path) {
    let status = profile_status(target_dir, game);
    let layout = ProfileLayout::for_game(target_dir, game);

    println!("=== {} ===", game.name);
    println!("Profile:          {}", actual_profile_name(target_dir, game));
    println!("Directory:        {}", layout.root.display());
    println!("Installed:        {}", if status.installed { "Yes" } else { "No" });

    if status.installed {
        let version = installed_version(&layout).unwrap_or_default();
        println!(
            "Version:          {} (manifest: {})",
            if version.is_empty() { "unknown" } else { version.as_str() },
            game.version
        );
        println!("Update available: {}", if status.has_update { "Yes" } else { "No" });
    }

    if let Some(e) = &status.install_error {
        println!("Install check:    {}", e);
    }
    if let Some(e) = &status.version_error {
        println!("Version check:    {}", e);
    }
}
