//! Registry commands

use anyhow::{bail, Result};
use clap::{Subcommand, ValueEnum};
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use slotdeck_core::api::MemoryApi;
use slotdeck_core::registry::{RegistryEntry, RegistryType};
use slotdeck_core::task::TaskOutcome;
use slotdeck_core::Console;

/// Registry flavor as given on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RegistryKind {
    Docker,
    Harbor,
    Harbor2,
}

impl From<RegistryKind> for RegistryType {
    fn from(kind: RegistryKind) -> Self {
        match kind {
            RegistryKind::Docker => RegistryType::Docker,
            RegistryKind::Harbor => RegistryType::Harbor,
            RegistryKind::Harbor2 => RegistryType::Harbor2,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum RegistryCommand {
    /// Add or update a registry
    Add {
        /// Registry hostname (e.g. cr.example.com or localhost:5000)
        hostname: String,

        /// Registry URL (must start with http:// or https://)
        url: String,

        #[clap(long = "type", value_enum, default_value = "docker")]
        registry_type: RegistryKind,

        /// Project name (required for harbor registries)
        #[clap(long)]
        project: Option<String>,

        #[clap(long)]
        username: Option<String>,

        #[clap(long)]
        password: Option<String>,
    },

    /// Allow images from this registry in the configured domain
    Enable { hostname: String },

    /// Hide images from this registry in the configured domain
    Disable { hostname: String },

    /// Delete a registry
    Delete { hostname: String },
}

impl RegistryCommand {
    pub async fn execute(self, console: &Console<MemoryApi>) -> Result<()> {
        match self {
            RegistryCommand::Add {
                hostname,
                url,
                registry_type,
                project,
                username,
                password,
            } => {
                let entry = RegistryEntry {
                    registry_type: registry_type.into(),
                    project,
                    username,
                    password,
                    ..RegistryEntry::new(&hostname, &url)
                };
                if let Err(e) = console.save_registry(&entry).await {
                    if let Some(validation) = e.as_validation() {
                        bail!("{} [{}]", validation, validation.message_key());
                    }
                    return Err(e.into());
                }
                println!("Saved registry '{hostname}' -> {url}");
            }
            RegistryCommand::Enable { hostname } => {
                console.set_registry_enabled(&hostname, true).await?;
                println!("Enabled registry '{hostname}' for domain '{}'", console.config().domain);
            }
            RegistryCommand::Disable { hostname } => {
                console.set_registry_enabled(&hostname, false).await?;
                println!("Disabled registry '{hostname}' for domain '{}'", console.config().domain);
            }
            RegistryCommand::Delete { hostname } => {
                console.delete_registry(&hostname).await?;
                println!("Deleted registry '{hostname}'");
            }
        }
        Ok(())
    }
}

/// Table row for the registry list
#[derive(Tabled)]
struct RegistryRow {
    #[tabled(rename = "Hostname")]
    hostname: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Type")]
    registry_type: String,
    #[tabled(rename = "Project")]
    project: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
}

pub async fn execute_list(console: &Console<MemoryApi>, json_output: bool) -> Result<()> {
    let entries = console.registries().await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No registries configured.");
        return Ok(());
    }

    let rows: Vec<RegistryRow> = entries
        .iter()
        .map(|entry| RegistryRow {
            hostname: entry.hostname.clone(),
            url: entry.url.clone(),
            registry_type: entry.registry_type.to_string(),
            project: entry.project.clone().unwrap_or_else(|| "-".to_string()),
            enabled: if entry.enabled { "yes" } else { "no" }.to_string(),
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub async fn execute_rescan(console: &Console<MemoryApi>, hostname: Option<&str>) -> Result<()> {
    let target = hostname.unwrap_or("all registries");
    match console.rescan_registry(hostname).await? {
        TaskOutcome::Done => println!("Rescan of {target} finished"),
        TaskOutcome::Cancelled => bail!("Rescan of {target} was cancelled"),
        TaskOutcome::Failed { message } => bail!("Rescan of {target} failed: {message}"),
    }
    Ok(())
}
