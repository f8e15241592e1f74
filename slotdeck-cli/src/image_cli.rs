//! Image catalog, install and reconcile commands

use anyhow::{anyhow, Result};
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use slotdeck_core::api::MemoryApi;
use slotdeck_core::image::ImageRecord;
use slotdeck_core::resource::slots::{ClusterSlots, SlotKind};
use slotdeck_core::resource::{reconcile, SlotRequest};
use slotdeck_core::Console;

/// Parse a `KEY=VALUE` slot argument
pub fn parse_slot(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{s}`"))?;
    if key.is_empty() {
        return Err(format!("empty slot key in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Table row for the image catalog
#[derive(Tabled)]
struct ImageRow {
    #[tabled(rename = "Registry")]
    registry: String,
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Language")]
    lang: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Base")]
    base: String,
    #[tabled(rename = "Arch")]
    architecture: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    mem: String,
    #[tabled(rename = "Installed")]
    installed: String,
}

fn limit_range(record: &ImageRecord, kind: &SlotKind) -> String {
    match record.resource_limits.get(kind) {
        Some(pair) => format!("{} ~ {}", pair.min, pair.max),
        None => "-".to_string(),
    }
}

impl From<&ImageRecord> for ImageRow {
    fn from(record: &ImageRecord) -> Self {
        let mut base = record.base_image.join(", ");
        if let Some(tail) = record.constraint.as_ref().and_then(|c| c.base.as_deref()) {
            base.push_str(&format!(" ({tail})"));
        }
        Self {
            registry: record.registry.clone(),
            namespace: record.namespace.clone(),
            lang: record.lang.clone(),
            version: record.base_version.clone(),
            base,
            architecture: record.architecture.clone(),
            cpu: limit_range(record, &SlotKind::Cpu),
            mem: limit_range(record, &SlotKind::Mem),
            installed: if record.installed { "yes" } else { "no" }.to_string(),
        }
    }
}

pub async fn execute_images(console: &Console<MemoryApi>, json_output: bool) -> Result<()> {
    let catalog = console.image_catalog().await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }
    if catalog.is_empty() {
        println!("No images found in enabled registries.");
        return Ok(());
    }

    let rows: Vec<ImageRow> = catalog.iter().map(ImageRow::from).collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub async fn execute_install(console: &Console<MemoryApi>, reference: &str, architecture: &str) -> Result<()> {
    match console.install_image(reference, architecture).await? {
        Some(request) => {
            println!("Install session enqueued for {}", request.reference);
            println!("{}", serde_json::to_string_pretty(&request.config)?);
        }
        None => println!("{reference} is already installed"),
    }
    Ok(())
}

pub async fn execute_reconcile(
    console: &Console<MemoryApi>,
    slots: Vec<(String, String)>,
    cluster: Option<Vec<String>>,
    json_output: bool,
) -> Result<()> {
    if slots.is_empty() {
        return Err(anyhow!("Give at least one KEY=VALUE slot to reconcile"));
    }
    let request: SlotRequest = slots.into_iter().collect();
    let result = match cluster {
        Some(keys) => reconcile(&request, &ClusterSlots::from_keys(keys)),
        None => console.reconcile(&request).await?,
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.is_empty() {
        println!("Nothing left after reconciliation.");
    } else {
        for (key, value) in &result {
            println!("{key} = {value}");
        }
    }
    Ok(())
}
