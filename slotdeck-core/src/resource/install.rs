//! Install-session requests
//!
//! Installing an image means enqueueing a throwaway batch session that pulls
//! it. The session asks for the image's minimum resources plus a memory
//! margin, reconciled with what the cluster can schedule.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::accelerator::{pad_memory, reconcile, SlotRequest};
use super::slots::{AcceleratorKind, ClusterSlots, SlotKind};
use crate::image::ImageRecord;

/// Command run by the install session once the image is pulled
pub const INSTALL_STARTUP_COMMAND: &str = "echo \"Image is installed\"";

/// Session type used for installs
pub const INSTALL_SESSION_TYPE: &str = "batch";

/// Session config sent with an install request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallConfig {
    /// Reconciled resource request (`cpu`, `mem`, accelerator keys)
    #[serde(flatten)]
    pub resources: SlotRequest,

    pub enqueue_only: bool,

    #[serde(rename = "type")]
    pub session_type: String,

    pub startup_command: String,

    pub domain: String,

    #[serde(rename = "group_name")]
    pub group_name: String,
}

/// Everything needed to ask the API to install one image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallRequest {
    /// `registry/name:tag`
    pub reference: String,
    pub architecture: String,
    pub config: InstallConfig,
}

impl InstallRequest {
    /// Build the request for `image` on a cluster advertising `cluster`
    pub fn for_image(image: &ImageRecord, cluster: &ClusterSlots, domain: &str, group: &str) -> Self {
        let limits = &image.resource_limits;
        let mut resources = SlotRequest::new();

        if let Some(cpu) = limits.get(&SlotKind::Cpu) {
            resources.insert("cpu".to_string(), cpu.min.to_payload());
        }
        if let Some(mem) = limits.get(&SlotKind::Mem) {
            resources.insert("mem".to_string(), pad_memory(&mem.min.to_payload()));
        }
        for kind in [AcceleratorKind::CudaDevice, AcceleratorKind::CudaShares] {
            if let Some(pair) = limits.accelerator(kind) {
                resources.insert(kind.slot_key().to_string(), pair.min.to_payload());
            }
        }

        let resources = reconcile(&resources, cluster);
        debug!("Install request for {}: {:?}", image.reference(), resources);

        Self {
            reference: image.reference(),
            architecture: image.architecture.clone(),
            config: InstallConfig {
                resources,
                enqueue_only: true,
                session_type: INSTALL_SESSION_TYPE.to_string(),
                startup_command: INSTALL_STARTUP_COMMAND.to_string(),
                domain: domain.to_string(),
                group_name: group.to_string(),
            },
        }
    }
}
