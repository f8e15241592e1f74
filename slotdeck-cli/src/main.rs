//! Slotdeck - image catalog and resource-slot console for cluster admins
//!
//! Works against a JSON snapshot of the manager state. Commands that change
//! state write the snapshot back when they succeed.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use slotdeck_core::api::MemoryApi;
use slotdeck_core::config::ConsoleConfig;
use slotdeck_core::Console;

mod image_cli;
mod preset_cli;
mod registry_cli;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(name = "slotdeck", version, about = "Image catalog and resource-slot console")]
struct Cli {
    /// Log level (logs go to stderr)
    #[clap(long, value_enum, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Console config file (defaults to the platform config dir)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Manager state snapshot to operate on
    #[clap(long, global = true, default_value = "slotdeck.json")]
    snapshot: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List images from enabled registries
    Images {
        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Install an image by reference (e.g. `python:3.9-ubuntu20.04`)
    Install {
        reference: String,

        /// Target architecture
        #[clap(long, default_value = "x86_64")]
        architecture: String,
    },

    /// Reconcile a slot request with the cluster's accelerator slots
    Reconcile {
        /// Requested amounts as KEY=VALUE (e.g. `gpu=2 fgpu=0.5`)
        #[clap(value_parser = image_cli::parse_slot)]
        slots: Vec<(String, String)>,

        /// Use these slot keys instead of the snapshot's
        #[clap(long, value_delimiter = ',')]
        cluster: Option<Vec<String>>,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// List registries and their enabled state
    Registries {
        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Manage a single registry
    Registry {
        #[clap(subcommand)]
        command: registry_cli::RegistryCommand,
    },

    /// Rescan a registry (all registries when omitted)
    Rescan { hostname: Option<String> },

    /// Manage resource presets
    Preset {
        #[clap(subcommand)]
        command: preset_cli::PresetCommand,
    },
}

impl Command {
    fn mutates(&self) -> bool {
        match self {
            Command::Images { .. } | Command::Registries { .. } | Command::Reconcile { .. } => false,
            Command::Preset { command } => command.mutates(),
            Command::Install { .. } | Command::Registry { .. } | Command::Rescan { .. } => true,
        }
    }
}

/// Initialize tracing with the --log-level flag
fn initialize_tracing(log_level: &LogLevel) {
    let filter = EnvFilter::new(log_level.to_filter_directive());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn open_console(config: Option<&Path>, snapshot: &Path) -> Result<Console<MemoryApi>> {
    let config = ConsoleConfig::load(config)?;
    let api = if snapshot.exists() {
        MemoryApi::load(snapshot)?
    } else {
        debug!("Snapshot {} does not exist, starting empty", snapshot.display());
        MemoryApi::default()
    };
    Console::new(api, config).context("Failed to set up console")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_tracing(&cli.log_level);

    let console = open_console(cli.config.as_deref(), &cli.snapshot)?;
    let mutates = cli.command.mutates();

    match cli.command {
        Command::Images { json } => image_cli::execute_images(&console, json).await?,
        Command::Install {
            reference,
            architecture,
        } => image_cli::execute_install(&console, &reference, &architecture).await?,
        Command::Reconcile {
            slots,
            cluster,
            json,
        } => image_cli::execute_reconcile(&console, slots, cluster, json).await?,
        Command::Registries { json } => registry_cli::execute_list(&console, json).await?,
        Command::Registry { command } => command.execute(&console).await?,
        Command::Rescan { hostname } => registry_cli::execute_rescan(&console, hostname.as_deref()).await?,
        Command::Preset { command } => command.execute(&console).await?,
    }

    if mutates {
        console.api().save(&cli.snapshot).await?;
    }
    Ok(())
}
