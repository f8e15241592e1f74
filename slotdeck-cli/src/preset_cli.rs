//! Resource preset commands

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use slotdeck_core::api::MemoryApi;
use slotdeck_core::preset::{PresetFields, PresetPayload};
use slotdeck_core::{Console, ConsoleResult};

/// Amounts shared by create and modify
#[derive(Args, Debug)]
pub struct PresetAmounts {
    /// CPU cores, or `Unlimited`
    #[clap(long)]
    pub cpu: String,

    /// Memory (`4g`, `512m`; bare numbers are GiB), or `Unlimited`
    #[clap(long)]
    pub mem: String,

    /// Shared memory, must stay below memory
    #[clap(long)]
    pub shmem: Option<String>,

    /// CUDA devices or shares, depending on the cluster
    #[clap(long)]
    pub accelerator: Option<String>,
}

impl PresetAmounts {
    fn into_fields(self, name: String) -> PresetFields {
        PresetFields {
            name,
            cpu: self.cpu,
            mem: self.mem,
            shared_memory: self.shmem,
            accelerator: self.accelerator,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum PresetCommand {
    /// List resource presets
    List {
        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Create a resource preset
    Create {
        name: String,
        #[clap(flatten)]
        amounts: PresetAmounts,
    },

    /// Change the amounts of an existing preset
    Modify {
        name: String,
        #[clap(flatten)]
        amounts: PresetAmounts,
    },

    /// Delete a resource preset
    Delete { name: String },
}

/// Table row for the preset list
#[derive(Tabled)]
struct PresetRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    mem: String,
    #[tabled(rename = "Shared Memory")]
    shmem: String,
    #[tabled(rename = "Accelerator")]
    accelerator: String,
}

fn report(result: ConsoleResult<PresetPayload>, verb: &str) -> Result<()> {
    match result {
        Ok(payload) => {
            println!("{verb} resource preset '{}'", payload.name);
            Ok(())
        }
        Err(e) => match e.as_validation() {
            Some(validation) => bail!("{} [{}]", validation, validation.message_key()),
            None => Err(e.into()),
        },
    }
}

impl PresetCommand {
    pub fn mutates(&self) -> bool {
        !matches!(self, PresetCommand::List { .. })
    }

    pub async fn execute(self, console: &Console<MemoryApi>) -> Result<()> {
        match self {
            PresetCommand::List { json } => execute_list(console, json).await,
            PresetCommand::Create { name, amounts } => {
                let fields = amounts.into_fields(name);
                report(console.create_preset(&fields).await, "Created")
            }
            PresetCommand::Modify { name, amounts } => {
                let fields = amounts.into_fields(name.clone());
                report(console.modify_preset(&name, &fields).await, "Modified")
            }
            PresetCommand::Delete { name } => {
                console.delete_preset(&name).await?;
                println!("Deleted resource preset '{name}'");
                Ok(())
            }
        }
    }
}

async fn execute_list(console: &Console<MemoryApi>, json_output: bool) -> Result<()> {
    let presets = console.presets().await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&presets)?);
        return Ok(());
    }
    if presets.is_empty() {
        println!("No resource presets defined.");
        return Ok(());
    }

    let rows: Vec<PresetRow> = presets
        .iter()
        .map(|preset| {
            let slots = preset.display_slots();
            let accelerator = slots
                .iter()
                .filter(|(key, _)| key.as_str() != "cpu" && key.as_str() != "mem")
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join(", ");
            PresetRow {
                name: preset.name.clone(),
                cpu: slots.get("cpu").cloned().unwrap_or_else(|| "-".to_string()),
                mem: slots.get("mem").cloned().unwrap_or_else(|| "-".to_string()),
                shmem: preset.display_shared_memory().unwrap_or_else(|| "-".to_string()),
                accelerator: if accelerator.is_empty() { "-".to_string() } else { accelerator },
            }
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();
    println!("{table}");
    Ok(())
}
