//! Snapshot-backed API
//!
//! Holds the whole manager state in memory and can load it from or save it
//! to a JSON file. Used by the CLI's offline mode and by tests.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::ConsoleApi;
use crate::image::reference::normalize_architecture;
use crate::image::RawImage;
use crate::preset::PresetRaw;
use crate::registry::{AllowList, RawRegistry, RegistryConfig};
use crate::resource::install::InstallConfig;
use crate::task::{TaskEvent, TaskHandle};
use crate::units::Quantity;

/// An install session the API accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    pub reference: String,
    pub architecture: String,
    pub config: InstallConfig,
}

/// Complete manager state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub images: Vec<RawImage>,

    /// Advertised slot keys mapped to their unit
    #[serde(default)]
    pub resource_slots: BTreeMap<String, String>,

    /// Allow-list per domain
    #[serde(default)]
    pub allowed_registries: BTreeMap<String, AllowList>,

    #[serde(default)]
    pub registries: BTreeMap<String, RawRegistry>,

    #[serde(default)]
    pub presets: BTreeMap<String, PresetRaw>,

    #[serde(default)]
    pub installs: Vec<InstallRecord>,
}

impl Snapshot {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize snapshot")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;
        debug!("Saved snapshot to {}", path.display());
        Ok(())
    }
}

/// In-memory [`ConsoleApi`]
#[derive(Debug, Clone, Default)]
pub struct MemoryApi {
    state: Arc<RwLock<Snapshot>>,
    tasks: Arc<RwLock<HashMap<String, Vec<TaskEvent>>>>,
}

impl MemoryApi {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            state: Arc::new(RwLock::new(snapshot)),
            tasks: Arc::default(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(Snapshot::load_from_path(path)?))
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        self.state.read().await.save_to_path(path)
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> Snapshot {
        self.state.read().await.clone()
    }

    fn decode_preset(name: &str, input: &serde_json::Value) -> Result<PresetRaw> {
        let slots = input
            .get("resource_slots")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("Preset input for '{}' has no resource_slots string", name))?;
        let resource_slots: BTreeMap<String, Quantity> = serde_json::from_str(slots)
            .with_context(|| format!("Invalid resource_slots for preset '{}'", name))?;
        let shared_memory = input
            .get("shared_memory")
            .and_then(|v| v.as_str())
            .map(Quantity::from);
        Ok(PresetRaw {
            name: name.to_string(),
            resource_slots,
            shared_memory,
        })
    }

    async fn start_task(&self, events: Vec<TaskEvent>) -> TaskHandle {
        let handle = TaskHandle {
            task_id: Uuid::new_v4().to_string(),
        };
        self.tasks.write().await.insert(handle.task_id.clone(), events);
        handle
    }
}

#[async_trait]
impl ConsoleApi for MemoryApi {
    async fn list_images(
        &self,
        _fields: &[&str],
        include_uninstalled: bool,
        _include_operating: bool,
    ) -> Result<Vec<RawImage>> {
        let state = self.state.read().await;
        Ok(state
            .images
            .iter()
            .filter(|image| include_uninstalled || image.installed)
            .cloned()
            .collect())
    }

    async fn install_image(&self, reference: &str, architecture: &str, config: &InstallConfig) -> Result<()> {
        let mut state = self.state.write().await;
        let image = state
            .images
            .iter_mut()
            .find(|image| {
                image.reference() == reference
                    && normalize_architecture(&image.architecture) == normalize_architecture(architecture)
            })
            .ok_or_else(|| anyhow!("Image {} ({}) not found", reference, architecture))?;
        image.installed = true;
        state.installs.push(InstallRecord {
            reference: reference.to_string(),
            architecture: architecture.to_string(),
            config: config.clone(),
        });
        info!("Enqueued install session for {}", reference);
        Ok(())
    }

    async fn get_resource_slots(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.state.read().await.resource_slots.clone())
    }

    async fn get_domain_allowed_registries(&self, domain: &str) -> Result<AllowList> {
        Ok(self
            .state
            .read()
            .await
            .allowed_registries
            .get(domain)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_domain_allowed_registries(&self, domain: &str, allowed: &AllowList) -> Result<()> {
        self.state
            .write()
            .await
            .allowed_registries
            .insert(domain.to_string(), allowed.clone());
        Ok(())
    }

    async fn list_registries(&self) -> Result<BTreeMap<String, RawRegistry>> {
        Ok(self.state.read().await.registries.clone())
    }

    async fn set_registry(&self, hostname: &str, config: &RegistryConfig) -> Result<()> {
        let key = urlencoding::encode(hostname).into_owned();
        self.state
            .write()
            .await
            .registries
            .insert(key, RawRegistry::Config(config.clone()));
        Ok(())
    }

    async fn delete_registry(&self, hostname: &str) -> Result<()> {
        let key = urlencoding::encode(hostname).into_owned();
        let mut state = self.state.write().await;
        if state.registries.remove(&key).is_none() && state.registries.remove(hostname).is_none() {
            bail!("Registry '{}' does not exist", hostname);
        }
        Ok(())
    }

    async fn rescan_registry(&self, hostname: Option<&str>) -> Result<TaskHandle> {
        let events = {
            let state = self.state.read().await;
            let known = |h: &str| {
                state.registries.contains_key(h)
                    || state.registries.contains_key(&*urlencoding::encode(h))
            };
            match hostname {
                Some(h) if !known(h) => vec![TaskEvent::Failed {
                    message: format!("unknown registry '{h}'"),
                }],
                _ => {
                    let images: Vec<&RawImage> = state
                        .images
                        .iter()
                        .filter(|image| hostname.map_or(true, |h| image.registry == h))
                        .collect();
                    let total = images.len() as u64;
                    let mut events: Vec<TaskEvent> = (1..=total)
                        .map(|current| TaskEvent::Progress { current, total })
                        .collect();
                    events.push(TaskEvent::Done);
                    events
                }
            }
        };
        Ok(self.start_task(events).await)
    }

    async fn task_events(&self, handle: &TaskHandle) -> Result<BoxStream<'static, TaskEvent>> {
        let events = self
            .tasks
            .write()
            .await
            .remove(&handle.task_id)
            .ok_or_else(|| anyhow!("Unknown task {}", handle))?;
        Ok(stream::iter(events).boxed())
    }

    async fn list_resource_presets(&self, _scope: Option<&str>) -> Result<BTreeMap<String, PresetRaw>> {
        Ok(self.state.read().await.presets.clone())
    }

    async fn add_resource_preset(&self, name: &str, input: &serde_json::Value) -> Result<()> {
        let preset = Self::decode_preset(name, input)?;
        let mut state = self.state.write().await;
        if state.presets.contains_key(name) {
            bail!("Resource preset '{}' already exists", name);
        }
        state.presets.insert(name.to_string(), preset);
        Ok(())
    }

    async fn modify_resource_preset(&self, name: &str, input: &serde_json::Value) -> Result<()> {
        let preset = Self::decode_preset(name, input)?;
        let mut state = self.state.write().await;
        let slot = state
            .presets
            .get_mut(name)
            .ok_or_else(|| anyhow!("Resource preset '{}' does not exist", name))?;
        *slot = preset;
        Ok(())
    }

    async fn delete_resource_preset(&self, name: &str) -> Result<()> {
        if self.state.write().await.presets.remove(name).is_none() {
            bail!("Resource preset '{}' does not exist", name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskTracker;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn snapshot() -> Snapshot {
        serde_json::from_value(serde_json::json!({
            "images": [
                {"registry": "cr.backend.ai", "name": "stable/python", "tag": "3.9-ubuntu20.04", "architecture": "x86_64", "installed": true},
                {"registry": "cr.backend.ai", "name": "stable/r-base", "tag": "4.1-ubuntu20.04", "architecture": "x86_64"}
            ],
            "registries": {"cr.backend.ai": "https://cr.backend.ai"}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_images_hides_uninstalled() {
        let api = MemoryApi::new(snapshot());
        assert_eq!(api.list_images(&[], false, false).await.unwrap().len(), 1);
        assert_eq!(api.list_images(&[], true, false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rescan_emits_progress_then_done() {
        let api = MemoryApi::new(snapshot());
        let handle = api.rescan_registry(Some("cr.backend.ai")).await.unwrap();
        let events = api.task_events(&handle).await.unwrap();
        let outcome = TaskTracker::new().follow(&handle, events).await;
        assert!(outcome.is_success());

        // events are consumed once
        assert!(api.task_events(&handle).await.is_err());
    }

    #[tokio::test]
    async fn test_rescan_unknown_registry_fails() {
        let api = MemoryApi::new(snapshot());
        let handle = api.rescan_registry(Some("nope.example.com")).await.unwrap();
        let events: Vec<TaskEvent> = api.task_events(&handle).await.unwrap().collect().await;
        assert!(matches!(events.as_slice(), [TaskEvent::Failed { .. }]));
    }

    #[tokio::test]
    async fn test_registry_keys_are_url_encoded() {
        let api = MemoryApi::new(Snapshot::default());
        let config = RegistryConfig {
            url: "http://localhost:5000".to_string(),
            ..Default::default()
        };
        api.set_registry("localhost:5000", &config).await.unwrap();
        let listed = api.list_registries().await.unwrap();
        assert!(listed.contains_key("localhost%3A5000"));

        api.delete_registry("localhost:5000").await.unwrap();
        assert!(api.delete_registry("localhost:5000").await.is_err());
    }

    #[tokio::test]
    async fn test_preset_input_is_decoded() {
        let api = MemoryApi::default();
        let input = serde_json::json!({"resource_slots": "{\"cpu\":\"1\",\"mem\":\"2g\"}", "shared_memory": "1g"});
        api.add_resource_preset("small", &input).await.unwrap();
        assert!(api.add_resource_preset("small", &input).await.is_err());

        let presets = api.list_resource_presets(None).await.unwrap();
        let small = presets.get("small").unwrap();
        assert_eq!(small.resource_slots.get("mem"), Some(&Quantity::from("2g")));
        assert_eq!(small.shared_memory, Some(Quantity::from("1g")));

        let bad = serde_json::json!({"resource_slots": {"cpu": "1"}});
        assert!(api.modify_resource_preset("small", &bad).await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("snapshot.json");
        let api = MemoryApi::new(snapshot());
        api.save(&path).await.unwrap();

        let loaded = MemoryApi::load(&path).unwrap();
        assert_eq!(loaded.snapshot().await, snapshot());
    }
}
