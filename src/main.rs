#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use gdp::commands;
use gdp::display_config::{DisplayConfig, MutterDisplayConfig};
use gdp::reconcile::ModeStrategy;
use gdp::store::{LocalProfileStore, ProfileStore};

/// Manage display profiles and switch between them
#[derive(Debug, Parser)]
#[command(name = "gdp", version)]
struct Cli {
    /// Directory holding the profiles (default: ~/.config/gdp)
    #[arg(long, global = true, value_name = "DIR")]
    profile_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Save the current display configuration as a profile
    Save {
        name: String,
        /// Replace an existing profile with the same name
        #[arg(long)]
        overwrite: bool,
    },
    /// Switch to a saved profile
    #[command(alias = "s")]
    Switch {
        name: String,
        /// Pick live modes by resolution and refresh rate instead of reusing
        /// the saved mode ids (helps after the compositor restarted)
        #[arg(long)]
        match_modes: bool,
    },
    /// Delete a profile
    Delete { name: String },
    /// List profiles
    List,
}

fn init_logging() -> Result<()> {
    // Parse log level from environment variable; stdout is reserved for `list`
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "warn".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "info" => TraceLevel::INFO,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to install log subscriber")
}

fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();
    debug!(?cli, "parsed arguments");

    let dir = match cli.profile_dir {
        Some(dir) => dir,
        None => LocalProfileStore::default_dir()
            .context("Failed to determine config directory (is HOME set?)")?,
    };
    let store = LocalProfileStore::open(dir).context("Failed to open profile store")?;

    run(cli.command, &store, || MutterDisplayConfig::connect().map_err(anyhow::Error::from))
}

/// Execute one subcommand; the bus connection is only opened by commands that need it
fn run<C: DisplayConfig>(
    command: Command,
    store: &impl ProfileStore,
    connect: impl FnOnce() -> Result<C>,
) -> Result<()> {
    match command {
        Command::Save { name, overwrite } => {
            let client = connect()?;
            commands::save_profile(&client, store, &name, overwrite)
                .with_context(|| format!("save '{name}' failed"))?;
        }
        Command::Switch { name, match_modes } => {
            let strategy = if match_modes {
                ModeStrategy::MatchTiming
            } else {
                ModeStrategy::SavedId
            };
            let saved = commands::load_profile(store, &name)
                .with_context(|| format!("switch to '{name}' failed"))?;
            let client = connect()?;
            commands::apply_profile(&client, &name, &saved, strategy)
                .with_context(|| format!("switch to '{name}' failed"))?;
        }
        Command::Delete { name } => {
            commands::delete_profile(store, &name).with_context(|| format!("delete '{name}' failed"))?;
        }
        Command::List => {
            for name in commands::list_profiles(store).context("list failed")? {
                println!("{name}");
            }
        }
    }

    Ok(())
}
