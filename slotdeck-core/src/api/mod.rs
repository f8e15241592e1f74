//! API collaborator abstraction
//!
//! Every remote call the console makes goes through [`ConsoleApi`]. The core
//! never performs I/O itself; callers plug in a client for a live manager or
//! the snapshot-backed [`memory::MemoryApi`].

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::BTreeMap;

use crate::image::RawImage;
use crate::preset::PresetRaw;
use crate::registry::{AllowList, RawRegistry, RegistryConfig};
use crate::resource::install::InstallConfig;
use crate::task::{TaskEvent, TaskHandle};

pub use memory::{MemoryApi, Snapshot};

/// Fields requested when listing images
pub const IMAGE_FIELDS: [&str; 9] = [
    "name",
    "tag",
    "registry",
    "architecture",
    "digest",
    "installed",
    "labels { key value }",
    "resource_limits { key min max }",
    "supported_accelerators",
];

/// Remote operations used by the console
#[async_trait]
pub trait ConsoleApi: Send + Sync {
    /// List images with the requested fields
    async fn list_images(
        &self,
        fields: &[&str],
        include_uninstalled: bool,
        include_operating: bool,
    ) -> Result<Vec<RawImage>>;

    /// Enqueue an install session for `reference`
    async fn install_image(&self, reference: &str, architecture: &str, config: &InstallConfig) -> Result<()>;

    /// Slot keys the cluster advertises, mapped to their unit
    async fn get_resource_slots(&self) -> Result<BTreeMap<String, String>>;

    async fn get_domain_allowed_registries(&self, domain: &str) -> Result<AllowList>;

    async fn set_domain_allowed_registries(&self, domain: &str, allowed: &AllowList) -> Result<()>;

    /// Registry listing keyed by (URL-encoded) hostname
    async fn list_registries(&self) -> Result<BTreeMap<String, RawRegistry>>;

    /// Create or replace the registry stored under `hostname`
    async fn set_registry(&self, hostname: &str, config: &RegistryConfig) -> Result<()>;

    async fn delete_registry(&self, hostname: &str) -> Result<()>;

    /// Start rescanning one registry, or all of them when `hostname` is `None`
    async fn rescan_registry(&self, hostname: Option<&str>) -> Result<TaskHandle>;

    /// Progress events of a background task
    async fn task_events(&self, handle: &TaskHandle) -> Result<BoxStream<'static, TaskEvent>>;

    async fn list_resource_presets(&self, scope: Option<&str>) -> Result<BTreeMap<String, PresetRaw>>;

    /// Create a preset; `input` carries `resource_slots` as a JSON string
    async fn add_resource_preset(&self, name: &str, input: &serde_json::Value) -> Result<()>;

    async fn modify_resource_preset(&self, name: &str, input: &serde_json::Value) -> Result<()>;

    async fn delete_resource_preset(&self, name: &str) -> Result<()>;
}
