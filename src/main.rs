//! Command line tool for Essential Core.
//!
//! Installs optional packages into a project manifest and inspects or
//! resets the stored audio settings.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use essential_core::config::AppConfig;
use essential_core::error::AppResult;
use essential_core::logging;
use essential_core::manifest::{find_packages, ManifestPatcher, OptionalPackage, CATALOG};
use essential_core::messaging::EventBus;
use essential_core::prefs::{JsonFilePrefs, PreferenceStore};
use essential_core::settings::SettingsStore;

#[derive(Parser)]
#[command(name = "essential-core")]
#[command(about = "Game audio core utilities", version)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Optional packages for a project manifest
    Packages {
        #[command(subcommand)]
        action: PackagesAction,
    },
    /// Stored audio settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum PackagesAction {
    /// List installable packages
    List,
    /// Add packages to Packages/manifest.json
    Install {
        /// Install every catalog package
        #[arg(long)]
        all: bool,

        /// Package names, e.g. com.cysharp.unitask
        names: Vec<String>,

        /// Project directory containing Packages/
        #[arg(long, default_value = ".")]
        project: PathBuf,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the stored audio settings
    Show,
    /// Restore default audio settings
    Reset,
}

fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;
    logging::init(&config.log_level);

    match cli.command {
        Command::Packages { action } => run_packages(action),
        Command::Settings { action } => run_settings(&config, action),
    }
}

fn run_packages(action: PackagesAction) -> AppResult<()> {
    match action {
        PackagesAction::List => {
            for package in CATALOG {
                println!(
                    "{:<24} {} {}  (scopes: {})",
                    package.display_name,
                    package.package_name,
                    package.version,
                    package.scopes.join(", ")
                );
            }
            Ok(())
        }
        PackagesAction::Install {
            all,
            names,
            project,
        } => {
            let packages: Vec<&OptionalPackage> = if all {
                CATALOG.iter().collect()
            } else {
                find_packages(&names)?
            };
            if packages.is_empty() {
                bail!("Nothing selected; pass package names or --all");
            }

            let patcher = ManifestPatcher::for_project(&project);
            let report = patcher
                .install(&packages)
                .with_context(|| format!("Failed to patch {}", patcher.manifest_path().display()))?;

            if report.registry_added {
                println!("✓ Added OpenUPM scoped registry");
            }
            for scope in &report.scopes_added {
                println!("✓ Added scope {}", scope);
            }
            for name in &report.dependencies_added {
                println!("✓ Added dependency {}", name);
            }
            for name in &report.already_present {
                println!("  {} already present", name);
            }
            println!("Backup: {}", report.backup.display());
            Ok(())
        }
    }
}

fn run_settings(config: &AppConfig, action: SettingsAction) -> AppResult<()> {
    let path = config
        .prefs_path()
        .context("Could not determine the preference file location")?;
    let prefs: Arc<dyn PreferenceStore> = Arc::new(JsonFilePrefs::open(path));
    let store = SettingsStore::load(prefs, EventBus::new());

    if let SettingsAction::Reset = action {
        store.reset();
        println!("✓ Audio settings reset");
    }

    let audio = store.audio();
    println!("{}", serde_json::to_string_pretty(&audio)?);
    println!(
        "Effective: music {:.2}{}, effects {:.2}{}",
        audio.final_bgm_volume(),
        if audio.bgm_enabled { "" } else { " (muted)" },
        audio.final_sfx_volume(),
        if audio.sfx_enabled { "" } else { " (muted)" },
    );
    Ok(())
}
