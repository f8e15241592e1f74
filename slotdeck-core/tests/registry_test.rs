//! Registry catalog operations

mod common;

use anyhow::{bail, Result};
use async_trait::async_trait;
use common::{fixture_console, fixture_snapshot, init_test_logging};
use futures::stream::BoxStream;
use pretty_assertions::assert_eq;
use slotdeck_core::api::{ConsoleApi, MemoryApi};
use slotdeck_core::config::ConsoleConfig;
use slotdeck_core::image::RawImage;
use slotdeck_core::preset::PresetRaw;
use slotdeck_core::registry::{AllowList, RawRegistry, RegistryConfig, RegistryEntry, RegistryType};
use slotdeck_core::resource::InstallConfig;
use slotdeck_core::task::{TaskEvent, TaskHandle};
use slotdeck_core::{Console, ConsoleError, ValidationError};
use std::collections::BTreeMap;

/// Fixture API whose registry writes can be made to fail
struct FailingApi {
    inner: MemoryApi,
    fail_allow_list: bool,
    fail_delete: bool,
}

#[async_trait]
impl ConsoleApi for FailingApi {
    async fn list_images(&self, fields: &[&str], include_uninstalled: bool, include_operating: bool) -> Result<Vec<RawImage>> {
        self.inner.list_images(fields, include_uninstalled, include_operating).await
    }

    async fn install_image(&self, reference: &str, architecture: &str, config: &InstallConfig) -> Result<()> {
        self.inner.install_image(reference, architecture, config).await
    }

    async fn get_resource_slots(&self) -> Result<BTreeMap<String, String>> {
        self.inner.get_resource_slots().await
    }

    async fn get_domain_allowed_registries(&self, domain: &str) -> Result<AllowList> {
        self.inner.get_domain_allowed_registries(domain).await
    }

    async fn set_domain_allowed_registries(&self, domain: &str, allowed: &AllowList) -> Result<()> {
        if self.fail_allow_list {
            bail!("allow-list update rejected");
        }
        self.inner.set_domain_allowed_registries(domain, allowed).await
    }

    async fn list_registries(&self) -> Result<BTreeMap<String, RawRegistry>> {
        self.inner.list_registries().await
    }

    async fn set_registry(&self, hostname: &str, config: &RegistryConfig) -> Result<()> {
        self.inner.set_registry(hostname, config).await
    }

    async fn delete_registry(&self, hostname: &str) -> Result<()> {
        if self.fail_delete {
            bail!("registry delete rejected");
        }
        self.inner.delete_registry(hostname).await
    }

    async fn rescan_registry(&self, hostname: Option<&str>) -> Result<TaskHandle> {
        self.inner.rescan_registry(hostname).await
    }

    async fn task_events(&self, handle: &TaskHandle) -> Result<BoxStream<'static, TaskEvent>> {
        self.inner.task_events(handle).await
    }

    async fn list_resource_presets(&self, scope: Option<&str>) -> Result<BTreeMap<String, PresetRaw>> {
        self.inner.list_resource_presets(scope).await
    }

    async fn add_resource_preset(&self, name: &str, input: &serde_json::Value) -> Result<()> {
        self.inner.add_resource_preset(name, input).await
    }

    async fn modify_resource_preset(&self, name: &str, input: &serde_json::Value) -> Result<()> {
        self.inner.modify_resource_preset(name, input).await
    }

    async fn delete_resource_preset(&self, name: &str) -> Result<()> {
        self.inner.delete_resource_preset(name).await
    }
}

fn failing_console(fail_allow_list: bool, fail_delete: bool) -> Console<FailingApi> {
    init_test_logging();
    let api = FailingApi {
        inner: MemoryApi::new(fixture_snapshot()),
        fail_allow_list,
        fail_delete,
    };
    Console::new(api, ConsoleConfig::builtin().unwrap()).unwrap()
}

async fn registry_hostnames<A: ConsoleApi>(console: &Console<A>) -> Vec<String> {
    console
        .registries()
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.hostname)
        .collect()
}

#[tokio::test]
async fn test_registries_report_enabled_state() {
    let console = fixture_console();
    let entries = console.registries().await.unwrap();

    let enabled: Vec<(&str, bool)> = entries
        .iter()
        .map(|e| (e.hostname.as_str(), e.enabled))
        .collect();
    assert_eq!(
        enabled,
        vec![
            ("cr.backend.ai", true),
            ("index.docker.io", true),
            ("other.example.com", false),
        ]
    );
    assert_eq!(entries[0].registry_type, RegistryType::Harbor2);
    assert_eq!(entries[0].project.as_deref(), Some("stable"));
}

#[tokio::test]
async fn test_enabling_registry_exposes_its_images() {
    let console = fixture_console();
    let allowed = console
        .set_registry_enabled("other.example.com", true)
        .await
        .unwrap();
    assert!(allowed.contains("other.example.com"));

    // enabling twice changes nothing
    let again = console
        .set_registry_enabled("other.example.com", true)
        .await
        .unwrap();
    assert_eq!(again, allowed);

    let catalog = console.image_catalog().await.unwrap();
    assert!(catalog.iter().any(|r| r.registry == "other.example.com"));
}

#[tokio::test]
async fn test_disabling_registry_hides_its_images() {
    let console = fixture_console();
    console
        .set_registry_enabled("cr.backend.ai", false)
        .await
        .unwrap();

    let catalog = console.image_catalog().await.unwrap();
    assert!(catalog.iter().all(|r| r.registry == "index.docker.io"));
}

#[tokio::test]
async fn test_toggling_unknown_registry_fails() {
    let console = fixture_console();
    let err = console
        .set_registry_enabled("nope.example.com", true)
        .await
        .unwrap_err();
    assert!(matches!(err, ConsoleError::NotFound { kind: "registry", .. }));
}

#[tokio::test]
async fn test_save_registry_validates_before_writing() {
    let console = fixture_console();
    let mut entry = RegistryEntry::new("harbor.example.com", "https://harbor.example.com");
    entry.registry_type = RegistryType::Harbor;

    let err = console.save_registry(&entry).await.unwrap_err();
    assert_eq!(
        err.as_validation().map(ValidationError::message_key),
        Some("registry.ProjectNameIsRequired")
    );
    assert_eq!(console.registries().await.unwrap().len(), 3);

    entry.project = Some("library".to_string());
    console.save_registry(&entry).await.unwrap();
    let saved = console
        .registries()
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.hostname == "harbor.example.com")
        .unwrap();
    assert_eq!(saved.project.as_deref(), Some("library"));
    assert!(!saved.enabled);
}

#[tokio::test]
async fn test_save_registry_with_port_keeps_hostname() {
    let console = fixture_console();
    let entry = RegistryEntry::new("localhost:5000", "http://localhost:5000");
    console.save_registry(&entry).await.unwrap();

    let raw = console.api().list_registries().await.unwrap();
    assert!(raw.contains_key("localhost%3A5000"));

    let entries = console.registries().await.unwrap();
    assert!(entries.iter().any(|e| e.hostname == "localhost:5000"));
}

#[tokio::test]
async fn test_delete_registry_drops_it_from_allow_list() {
    let console = fixture_console();
    console.delete_registry("index.docker.io").await.unwrap();

    let allowed = console.allowed_registries().await.unwrap();
    assert_eq!(allowed.hostnames(), &["cr.backend.ai".to_string()]);
    assert!(console
        .registries()
        .await
        .unwrap()
        .iter()
        .all(|e| e.hostname != "index.docker.io"));
}

#[tokio::test]
async fn test_failed_allow_list_update_keeps_registry() {
    let console = failing_console(true, false);
    let err = console.delete_registry("index.docker.io").await.unwrap_err();
    assert!(matches!(err, ConsoleError::Api(_)));

    assert!(registry_hostnames(&console).await.contains(&"index.docker.io".to_string()));
    assert!(console.allowed_registries().await.unwrap().contains("index.docker.io"));
}

#[tokio::test]
async fn test_failed_delete_never_leaves_stale_allow_list_entry() {
    let console = failing_console(false, true);
    let err = console.delete_registry("index.docker.io").await.unwrap_err();
    assert!(matches!(err, ConsoleError::Api(_)));

    // Still listed, only disabled.
    assert!(registry_hostnames(&console).await.contains(&"index.docker.io".to_string()));
    let allowed = console.allowed_registries().await.unwrap();
    assert_eq!(allowed.hostnames(), &["cr.backend.ai".to_string()]);
}

#[tokio::test]
async fn test_rescan_registry_completes() {
    let console = fixture_console();
    let outcome = console.rescan_registry(Some("cr.backend.ai")).await.unwrap();
    assert!(outcome.is_success());

    let outcome = console.rescan_registry(None).await.unwrap();
    assert!(outcome.is_success());

    let outcome = console.rescan_registry(Some("missing.example.com")).await.unwrap();
    assert!(!outcome.is_success());
}
