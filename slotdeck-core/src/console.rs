//! Console orchestration
//!
//! [`Console`] ties the pure catalog, reconciliation and preset logic to a
//! [`ConsoleApi`] collaborator: it fetches what the logic needs, runs it and
//! sends the result back. Validation always happens before the first write,
//! so a rejected operation leaves the remote state untouched.

use tracing::{debug, info, warn};

use crate::alias::AliasTables;
use crate::api::{ConsoleApi, IMAGE_FIELDS};
use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, ConsoleResult};
use crate::image::{parse_images, ImageRecord, ImageReference, KnownRegistries};
use crate::preset::{self, PresetFields, PresetPayload, PresetRaw};
use crate::registry::{self, AllowList, RegistryEntry};
use crate::resource::accelerator::{reconcile, SlotRequest};
use crate::resource::install::InstallRequest;
use crate::resource::slots::ClusterSlots;
use crate::task::{TaskOutcome, TaskTracker};

pub struct Console<A: ConsoleApi> {
    api: A,
    config: ConsoleConfig,
    aliases: AliasTables,
}

impl<A: ConsoleApi> Console<A> {
    pub fn new(api: A, config: ConsoleConfig) -> anyhow::Result<Self> {
        let aliases = config.alias_tables()?;
        debug!(
            "Console for domain '{}' with {} replacement rules and {} aliases",
            config.domain,
            aliases.replacement_count(),
            aliases.alias_count()
        );
        Ok(Self { api, config, aliases })
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub async fn cluster_slots(&self) -> ConsoleResult<ClusterSlots> {
        let slots = self.api.get_resource_slots().await?;
        Ok(ClusterSlots::from_slot_map(&slots))
    }

    pub async fn allowed_registries(&self) -> ConsoleResult<AllowList> {
        Ok(self.api.get_domain_allowed_registries(&self.config.domain).await?)
    }

    /// Images from allow-listed registries, normalized for display
    pub async fn image_catalog(&self) -> ConsoleResult<Vec<ImageRecord>> {
        let allowed = self.allowed_registries().await?;
        let listing = &self.config.images;
        let raw = self
            .api
            .list_images(&IMAGE_FIELDS, listing.include_uninstalled, listing.include_operating)
            .await?;
        Ok(parse_images(&raw, &allowed, &self.aliases))
    }

    /// Registries with their enabled state for this domain
    pub async fn registries(&self) -> ConsoleResult<Vec<RegistryEntry>> {
        let allowed = self.allowed_registries().await?;
        let raw = self.api.list_registries().await?;
        Ok(registry::parse_list(raw, &allowed))
    }

    /// Enable or disable a registry for this domain
    pub async fn set_registry_enabled(&self, hostname: &str, enabled: bool) -> ConsoleResult<AllowList> {
        let known = self.registries().await?;
        if !known.iter().any(|entry| entry.hostname == hostname) {
            return Err(ConsoleError::NotFound {
                kind: "registry",
                name: hostname.to_string(),
            });
        }

        let allowed = self.allowed_registries().await?.toggled(hostname, enabled);
        self.api
            .set_domain_allowed_registries(&self.config.domain, &allowed)
            .await?;
        info!(
            "Registry {} {} for domain {}",
            hostname,
            if enabled { "enabled" } else { "disabled" },
            self.config.domain
        );
        Ok(allowed)
    }

    /// Create or update a registry after validating it
    pub async fn save_registry(&self, entry: &RegistryEntry) -> ConsoleResult<()> {
        entry.validate()?;
        self.api.set_registry(&entry.hostname, &entry.to_config()).await?;
        info!("Saved registry {} ({})", entry.hostname, entry.registry_type);
        Ok(())
    }

    /// Delete a registry and drop it from the domain allow-list
    ///
    /// The allow-list is trimmed first, so a failure part way never leaves it
    /// naming a registry that no longer exists.
    pub async fn delete_registry(&self, hostname: &str) -> ConsoleResult<()> {
        let allowed = self.allowed_registries().await?;
        if allowed.contains(hostname) {
            let trimmed = allowed.without(hostname);
            if let Err(e) = self
                .api
                .set_domain_allowed_registries(&self.config.domain, &trimmed)
                .await
            {
                warn!(
                    "Registry {} kept: allow-list of {} could not be updated: {:#}",
                    hostname, self.config.domain, e
                );
                return Err(e.into());
            }
        }
        if let Err(e) = self.api.delete_registry(hostname).await {
            warn!(
                "Registry {} is disabled for {} but was not deleted: {:#}",
                hostname, self.config.domain, e
            );
            return Err(e.into());
        }
        info!("Deleted registry {}", hostname);
        Ok(())
    }

    /// Rescan one registry (or all) and wait for the background task
    pub async fn rescan_registry(&self, hostname: Option<&str>) -> ConsoleResult<TaskOutcome> {
        let handle = self.api.rescan_registry(hostname).await?;
        info!("Rescanning {} (task {})", hostname.unwrap_or("all registries"), handle);
        let events = self.api.task_events(&handle).await?;
        Ok(TaskTracker::new().follow(&handle, events).await)
    }

    /// Reconcile an arbitrary slot request with the live cluster
    pub async fn reconcile(&self, request: &SlotRequest) -> ConsoleResult<SlotRequest> {
        let cluster = self.cluster_slots().await?;
        Ok(reconcile(request, &cluster))
    }

    /// Enqueue an install session for the image `reference` points at
    ///
    /// Returns `None` when the image is already installed.
    pub async fn install_image(&self, reference: &str, architecture: &str) -> ConsoleResult<Option<InstallRequest>> {
        let known: Vec<String> = self
            .registries()
            .await?
            .into_iter()
            .map(|entry| entry.hostname)
            .collect();
        let target = ImageReference::parse(reference, KnownRegistries::Listed(&known), architecture)?;

        let catalog = self.image_catalog().await?;
        let image = catalog
            .iter()
            .find(|record| record.matches(&target))
            .ok_or_else(|| ConsoleError::NotFound {
                kind: "image",
                name: target.canonical(),
            })?;
        if image.installed {
            info!("Image {} is already installed", target);
            return Ok(None);
        }

        let cluster = self.cluster_slots().await?;
        let request = InstallRequest::for_image(image, &cluster, &self.config.domain, &self.config.group);
        self.api
            .install_image(&request.reference, &request.architecture, &request.config)
            .await?;
        info!("Install of {} enqueued", request.reference);
        Ok(Some(request))
    }

    pub async fn presets(&self) -> ConsoleResult<Vec<PresetRaw>> {
        let presets = self.api.list_resource_presets(None).await?;
        Ok(presets.into_values().collect())
    }

    /// Validate and create a preset
    pub async fn create_preset(&self, fields: &PresetFields) -> ConsoleResult<PresetPayload> {
        let mode = self.cluster_slots().await?.mode();
        let payload = preset::compose(fields, mode)?;
        self.submit_preset(&payload, false).await?;
        Ok(payload)
    }

    /// Validate and update an existing preset; its name never changes
    pub async fn modify_preset(&self, name: &str, fields: &PresetFields) -> ConsoleResult<PresetPayload> {
        let existing = self.api.list_resource_presets(None).await?;
        if !existing.contains_key(name) {
            return Err(ConsoleError::NotFound {
                kind: "resource preset",
                name: name.to_string(),
            });
        }
        let mode = self.cluster_slots().await?.mode();
        let payload = preset::modify(name, fields, mode)?;
        self.submit_preset(&payload, true).await?;
        Ok(payload)
    }

    pub async fn delete_preset(&self, name: &str) -> ConsoleResult<()> {
        self.api.delete_resource_preset(name).await?;
        info!("Deleted resource preset {}", name);
        Ok(())
    }

    async fn submit_preset(&self, payload: &PresetPayload, existing: bool) -> ConsoleResult<()> {
        let input = payload
            .to_api_input()
            .map_err(|e| ConsoleError::Api(anyhow::Error::new(e).context("Failed to encode preset")))?;
        let result = if existing {
            self.api.modify_resource_preset(&payload.name, &input).await
        } else {
            self.api.add_resource_preset(&payload.name, &input).await
        };
        if let Err(e) = &result {
            warn!("Resource preset {} was not saved: {:#}", payload.name, e);
        }
        result?;
        info!("Saved resource preset {}", payload.name);
        Ok(())
    }
}
